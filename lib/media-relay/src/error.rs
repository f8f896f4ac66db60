use std::fmt;

use log::Level;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatSide {
	Origin,
	Destination,
}

impl fmt::Display for ChatSide {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChatSide::Origin => f.write_str("origin"),
			ChatSide::Destination => f.write_str("destination"),
		}
	}
}

#[derive(thiserror::Error, Debug)]
pub enum RelayError {
	#[error("input rejected")]
	InputRejected,
	#[error("{platform} post {id} not found")]
	UpstreamNotFound { platform: &'static str, id: String },
	#[error("upstream request failed: {0:#}")]
	Upstream(anyhow::Error),
	#[error("{platform} post {id}: no media could be fetched")]
	NoMediaFetched { platform: &'static str, id: String },
	#[error("publish failed: {0:#}")]
	Publish(anyhow::Error),
	#[error("permission check failed in {side} chat {chat_id}: {reason}")]
	PermissionDenied {
		chat_id: i64,
		side: ChatSide,
		reason: String,
	},
	#[error("membership lookup failed in {side} chat {chat_id}: {source:#}")]
	MembershipLookup {
		chat_id: i64,
		side: ChatSide,
		source: anyhow::Error,
	},
	#[error("correlation not found")]
	CorrelationNotFound,
	#[error("duplicate delivery")]
	DuplicateDelivery,
}

impl RelayError {
	pub fn level(&self) -> Option<Level> {
		match self {
			RelayError::InputRejected
			| RelayError::CorrelationNotFound
			| RelayError::DuplicateDelivery => None,
			RelayError::UpstreamNotFound { .. } | RelayError::NoMediaFetched { .. } => Some(Level::Warn),
			RelayError::PermissionDenied {
				side: ChatSide::Origin,
				..
			} => Some(Level::Warn),
			RelayError::PermissionDenied {
				side: ChatSide::Destination,
				..
			} => Some(Level::Error),
			RelayError::Upstream(_) | RelayError::Publish(_) | RelayError::MembershipLookup { .. } => {
				Some(Level::Error)
			}
		}
	}

	pub fn log(&self, context: &str) {
		if let Some(level) = self.level() {
			log::log!(level, "{context} {self}");
		}
	}
}
