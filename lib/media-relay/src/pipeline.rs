use crate::{
	error::RelayError,
	exchange::{ExchangeKey, ExchangeRecord},
	extract,
	fetch::{attempt_with_delay, fetch_media},
	publisher,
	relay_structs::ChannelPostEvent,
	timer::StepTimer,
	Relay,
};

impl Relay {
	pub async fn handle_channel_post(&self, event: &ChannelPostEvent) -> Result<ExchangeKey, RelayError> {
		if event.forwarded {
			return Err(RelayError::InputRejected);
		}
		let mut timer = StepTimer::new(format!(
			"chat_id={} message_id={} channel post",
			event.chat_id, event.message_id
		));
		let source_url = extract::normalize_url(&event.text).ok_or(RelayError::InputRejected)?;
		timer.step("parse url");

		let (platform, id) = self
			.platforms
			.iter()
			.find_map(|platform| platform.extract_id(&source_url).map(|id| (platform.clone(), id)))
			.ok_or(RelayError::InputRejected)?;
		timer.step("extract id");

		let context = format!(
			"platform={} content_id={id} source_url={source_url} chat_id={} chat_title={:?}",
			platform.name(),
			event.chat_id,
			event.chat_title
		);
		if platform.sends_upload_action() {
			if let Err(e) = self.transport.send_upload_action(event.chat_id).await {
				log::warn!("{context} failed to send upload action: {e:#}");
			}
		}

		let (adapter, content_id) = (platform.as_ref(), id.as_str());
		let post = attempt_with_delay(platform.detail_retry(), move |_| adapter.fetch_post(content_id))
			.await
			.map_err(RelayError::Upstream)?
			.ok_or_else(|| RelayError::UpstreamNotFound {
				platform: platform.name(),
				id: id.clone(),
			})?;
		timer.step("fetch detail");

		let mut descriptors = post.media.clone();
		descriptors.truncate(self.settings.max_media_per_post);
		if descriptors.is_empty() {
			return Err(RelayError::NoMediaFetched {
				platform: platform.name(),
				id,
			});
		}
		log::info!("{context} post found, fetching {} media", descriptors.len());
		let media = fetch_media(platform.clone(), descriptors, self.settings.fetch_concurrency).await;
		if media.is_empty() {
			return Err(RelayError::NoMediaFetched {
				platform: platform.name(),
				id,
			});
		}
		timer.step("fetch media");

		let caption = platform.caption(&post, &source_url);
		let key = publisher::publish(
			self.transport.as_ref(),
			event.chat_id,
			&post.id,
			&media,
			&caption,
			&event.text,
		)
		.await
		.map_err(RelayError::Publish)?;
		timer.step("send group");
		log::info!("{context} {} media sent to channel as {key}", media.len());

		self.exchange.insert(
			key,
			ExchangeRecord::new(platform.name(), post.id.clone(), post.author.handle.clone(), media),
		);
		timer.step("store exchange");

		if let Err(e) = self.transport.delete_message(event.chat_id, event.message_id).await {
			log::error!("{context} failed to delete original message: {e:#}");
		}
		timer.step("delete original");
		Ok(key)
	}
}
