use bytes::Bytes;

use crate::{
	error::{ChatSide, RelayError},
	exchange::{ExchangeKey, ExchangeRecord, MarkOutcome},
	platforms::file_base_name,
	relay_structs::{MediaItem, MediaKind, MessageEvent},
	thumbnail,
	timer::StepTimer,
	transport::OutboundMedia,
	Relay,
};

pub fn discussion_file_name(record: &ExchangeRecord, source_url: &str) -> String {
	format!(
		"{}-by-{}-{}-{}",
		record.platform,
		record.author,
		record.content_id,
		file_base_name(source_url)
	)
}

/// One slot per item; videos and undecodable photos get none.
async fn build_thumbnails(media: &[MediaItem], size: u32) -> Vec<Option<Bytes>> {
	let mut thumbnails = Vec::with_capacity(media.len());
	for item in media {
		if item.kind != MediaKind::Photo {
			thumbnails.push(None);
			continue;
		}
		let body = item.regular_body.clone();
		let built = tokio::task::spawn_blocking(move || thumbnail::build(&body, size)).await;
		thumbnails.push(match built {
			Ok(Ok(thumbnail)) => Some(Bytes::from(thumbnail)),
			Ok(Err(e)) => {
				log::warn!("source_url={} failed to build thumbnail: {e:#}", item.source_url);
				None
			}
			Err(e) => {
				log::error!("source_url={} thumbnail task failed: {e}", item.source_url);
				None
			}
		});
	}
	thumbnails
}

impl Relay {
	async fn check_permissions(&self, origin_chat: i64, destination_chat: i64) -> Result<(), RelayError> {
		let bot_id = self.transport.bot_id();
		let denied = |chat_id, side, reason: String| RelayError::PermissionDenied {
			chat_id,
			side,
			reason,
		};

		let origin = self
			.transport
			.get_chat_member(origin_chat, bot_id)
			.await
			.map_err(|source| RelayError::MembershipLookup {
				chat_id: origin_chat,
				side: ChatSide::Origin,
				source,
			})?;
		if !origin.is_administrator() {
			return Err(denied(
				origin_chat,
				ChatSide::Origin,
				format!("bot is {:?}, not an administrator", origin.role),
			));
		}

		let destination = self
			.transport
			.get_chat_member(destination_chat, bot_id)
			.await
			.map_err(|source| RelayError::MembershipLookup {
				chat_id: destination_chat,
				side: ChatSide::Destination,
				source,
			})?;
		if !destination.is_administrator() && !destination.can_send_media {
			return Err(denied(
				destination_chat,
				ChatSide::Destination,
				format!("bot is {:?} and may not send media", destination.role),
			));
		}
		Ok(())
	}

	pub async fn handle_linked_message(&self, event: &MessageEvent) -> Result<usize, RelayError> {
		if !event.is_automatic_forward {
			return Err(RelayError::InputRejected);
		}
		let (origin_chat, origin_message) = event.forward_origin.ok_or(RelayError::InputRejected)?;
		let key = ExchangeKey::new(origin_chat, origin_message);
		let record = self
			.exchange
			.wait_for(&key, self.settings.correlation_wait())
			.await
			.ok_or(RelayError::CorrelationNotFound)?;
		let _cleanup = self.exchange.cleanup_guard(key);

		match self.exchange.mark_processing(&key) {
			MarkOutcome::Claimed => {}
			MarkOutcome::AlreadyProcessing => return Err(RelayError::DuplicateDelivery),
			MarkOutcome::NotFound => return Err(RelayError::CorrelationNotFound),
		}

		let mut timer = StepTimer::new(format!("{key} linked message"));
		let context = format!(
			"platform={} content_id={} chat_id={} chat_title={:?} forward_origin_chat_id={origin_chat} forward_origin_message_id={origin_message} forward_origin_title={:?}",
			record.platform, record.content_id, event.chat_id, event.chat_title, event.forward_origin_title
		);
		self.check_permissions(origin_chat, event.chat_id).await?;
		timer.step("check permissions");

		let thumbnails = build_thumbnails(&record.media, self.settings.thumbnail_size).await;
		timer.step("build thumbnails");

		let documents: Vec<OutboundMedia> = record
			.media
			.iter()
			.zip(thumbnails)
			.enumerate()
			.map(|(i, (item, thumbnail))| {
				let source_url = record.source_urls.get(i).unwrap_or(&item.source_url);
				OutboundMedia::Document {
					file_name: discussion_file_name(&record, source_url),
					body: item.original_body.clone(),
					thumbnail,
				}
			})
			.collect();
		let count = documents.len();
		self.transport
			.send_media_group(event.chat_id, documents, Some(event.message_id))
			.await
			.map_err(RelayError::Publish)?;
		timer.step("send documents");
		log::info!("{context} {count} original files sent to discussion");
		Ok(count)
	}
}
