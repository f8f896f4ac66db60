use anyhow::Context;

use crate::{
	exchange::ExchangeKey,
	platforms::file_base_name,
	relay_structs::{MediaItem, MediaKind},
	transport::{OutboundMedia, Transport},
};

pub fn channel_group(post_id: &str, media: &[MediaItem], caption: &str) -> Vec<OutboundMedia> {
	media
		.iter()
		.enumerate()
		.map(|(i, item)| {
			let file_name = format!("{post_id}-{}", file_base_name(&item.source_url));
			let caption = (i == 0).then(|| caption.to_string());
			match item.kind {
				MediaKind::Photo => OutboundMedia::Photo {
					file_name,
					body: item.regular_body.clone(),
					caption,
				},
				MediaKind::Video => OutboundMedia::Video {
					file_name,
					body: item.regular_body.clone(),
					caption,
					width: item.width,
					height: item.height,
				},
			}
		})
		.collect()
}

pub async fn publish(
	transport: &dyn Transport,
	chat_id: i64,
	post_id: &str,
	media: &[MediaItem],
	caption: &str,
	fallback_text: &str,
) -> anyhow::Result<ExchangeKey> {
	let caption = if caption.is_empty() { fallback_text } else { caption };
	let group = channel_group(post_id, media, caption);
	let sent = transport.send_media_group(chat_id, group, None).await?;
	let first = sent.first().context("transport accepted the group but returned no messages")?;
	Ok(ExchangeKey::new(first.chat_id, first.message_id))
}
