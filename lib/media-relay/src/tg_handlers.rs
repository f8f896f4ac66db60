use std::sync::Arc;

use teloxide::types::{Message, MessageOrigin};

use crate::{
	relay_structs::{ChannelPostEvent, MessageEvent},
	Relay,
};

pub fn channel_post_event(msg: &Message) -> ChannelPostEvent {
	ChannelPostEvent {
		text: msg.text().unwrap_or_default().to_string(),
		chat_id: msg.chat.id.0,
		chat_title: msg.chat.title().unwrap_or_default().to_string(),
		message_id: msg.id.0,
		forwarded: msg.forward_origin().is_some(),
	}
}

pub fn message_event(msg: &Message) -> MessageEvent {
	let (forward_origin, forward_origin_title) = match msg.forward_origin() {
		Some(MessageOrigin::Channel {
			chat,
			message_id,
			..
		}) => (
			Some((chat.id.0, message_id.0)),
			chat.title().unwrap_or_default().to_string(),
		),
		_ => (None, String::new()),
	};
	MessageEvent {
		is_automatic_forward: msg.is_automatic_forward(),
		forward_origin,
		forward_origin_title,
		chat_id: msg.chat.id.0,
		chat_title: msg.chat.title().unwrap_or_default().to_string(),
		message_id: msg.id.0,
	}
}

pub async fn channel_post(msg: Message, relay: Arc<Relay>) -> anyhow::Result<()> {
	let event = channel_post_event(&msg);
	if let Err(e) = relay.handle_channel_post(&event).await {
		e.log(&format!(
			"chat_id={} chat_title={:?} message_id={}",
			event.chat_id, event.chat_title, event.message_id
		));
	}
	Ok(())
}

pub async fn linked_message(msg: Message, relay: Arc<Relay>) -> anyhow::Result<()> {
	let event = message_event(&msg);
	if let Err(e) = relay.handle_linked_message(&event).await {
		let (origin_chat, origin_message) = event.forward_origin.unwrap_or_default();
		e.log(&format!(
			"chat_id={} chat_title={:?} forward_origin_chat_id={origin_chat} forward_origin_message_id={origin_message}",
			event.chat_id, event.chat_title
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn message(value: serde_json::Value) -> Message {
		serde_json::from_value(value).unwrap()
	}

	#[test]
	fn channel_post_is_converted() {
		let msg = message(json!({
			"message_id": 77,
			"date": 1700000000,
			"chat": { "id": -1001, "type": "channel", "title": "art" },
			"sender_chat": { "id": -1001, "type": "channel", "title": "art" },
			"text": "https://www.pixiv.net/artworks/1234"
		}));
		let event = channel_post_event(&msg);
		assert_eq!(event.text, "https://www.pixiv.net/artworks/1234");
		assert_eq!(event.chat_id, -1001);
		assert_eq!(event.chat_title, "art");
		assert_eq!(event.message_id, 77);
		assert!(!event.forwarded);
	}

	#[test]
	fn automatic_forward_carries_its_origin() {
		let msg = message(json!({
			"message_id": 55,
			"date": 1700000001,
			"chat": { "id": -1002, "type": "supergroup", "title": "art chat" },
			"sender_chat": { "id": -1001, "type": "channel", "title": "art" },
			"is_automatic_forward": true,
			"forward_origin": {
				"type": "channel",
				"date": 1700000000,
				"chat": { "id": -1001, "type": "channel", "title": "art" },
				"message_id": 1000
			},
			"text": "Artist: title"
		}));
		let event = message_event(&msg);
		assert!(event.is_automatic_forward);
		assert_eq!(event.forward_origin, Some((-1001, 1000)));
		assert_eq!(event.forward_origin_title, "art");
		assert_eq!(event.chat_id, -1002);
		assert_eq!(event.message_id, 55);
	}
}
