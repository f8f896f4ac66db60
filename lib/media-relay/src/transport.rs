use async_trait::async_trait;
use bytes::Bytes;

#[derive(Clone, Debug)]
pub enum OutboundMedia {
	Photo {
		file_name: String,
		body: Bytes,
		caption: Option<String>,
	},
	Video {
		file_name: String,
		body: Bytes,
		caption: Option<String>,
		width: Option<u32>,
		height: Option<u32>,
	},
	Document {
		file_name: String,
		body: Bytes,
		thumbnail: Option<Bytes>,
	},
}

impl OutboundMedia {
	pub fn file_name(&self) -> &str {
		match self {
			OutboundMedia::Photo { file_name, .. }
			| OutboundMedia::Video { file_name, .. }
			| OutboundMedia::Document { file_name, .. } => file_name,
		}
	}

	pub fn caption(&self) -> Option<&str> {
		match self {
			OutboundMedia::Photo { caption, .. } | OutboundMedia::Video { caption, .. } => {
				caption.as_deref()
			}
			OutboundMedia::Document { .. } => None,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SentMessage {
	pub chat_id: i64,
	pub message_id: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberRole {
	Owner,
	Administrator,
	Member,
	Restricted,
	Left,
	Banned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChatMembership {
	pub role: MemberRole,
	pub can_send_media: bool,
}

impl ChatMembership {
	pub fn is_administrator(&self) -> bool {
		matches!(self.role, MemberRole::Owner | MemberRole::Administrator)
	}
}

#[async_trait]
pub trait Transport: Send + Sync {
	fn bot_id(&self) -> u64;

	/// Sends all attachments as one group. Either the whole group is accepted or an error is returned.
	async fn send_media_group(
		&self,
		chat_id: i64,
		media: Vec<OutboundMedia>,
		reply_to: Option<i32>,
	) -> anyhow::Result<Vec<SentMessage>>;

	async fn delete_message(&self, chat_id: i64, message_id: i32) -> anyhow::Result<()>;

	async fn get_chat_member(&self, chat_id: i64, user_id: u64) -> anyhow::Result<ChatMembership>;

	async fn send_upload_action(&self, chat_id: i64) -> anyhow::Result<()>;
}
