use anyhow::bail;
use async_trait::async_trait;
use teloxide::{
	adaptors::Throttle,
	payloads::SendMediaGroupSetters,
	prelude::Requester,
	types::{
		ChatAction, ChatId, ChatMemberKind, InputFile, InputMedia, InputMediaDocument,
		InputMediaPhoto, InputMediaVideo, MessageId, ParseMode, ReplyParameters, UserId,
	},
	Bot, RequestError,
};

use crate::transport::{ChatMembership, MemberRole, OutboundMedia, SentMessage, Transport};

pub struct TelegramTransport {
	bot: Throttle<Bot>,
	bot_id: u64,
}

impl TelegramTransport {
	pub async fn new(bot: Throttle<Bot>) -> anyhow::Result<Self> {
		let me = bot.get_me().await?;
		log::info!("bot_id={} username={:?} connected", me.id.0, me.username);
		Ok(TelegramTransport {
			bot_id: me.id.0,
			bot,
		})
	}
}

fn input_file(file_name: &str, body: &bytes::Bytes) -> InputFile {
	InputFile::memory(body.to_vec()).file_name(file_name.to_string())
}

fn input_media(media: &OutboundMedia) -> InputMedia {
	match media {
		OutboundMedia::Photo {
			file_name,
			body,
			caption,
		} => {
			let mut photo = InputMediaPhoto::new(input_file(file_name, body));
			if let Some(caption) = caption {
				photo = photo.caption(caption.clone()).parse_mode(ParseMode::Html);
			}
			InputMedia::Photo(photo)
		}
		OutboundMedia::Video {
			file_name,
			body,
			caption,
			width,
			height,
		} => {
			let mut video = InputMediaVideo::new(input_file(file_name, body));
			if let Some(caption) = caption {
				video = video.caption(caption.clone()).parse_mode(ParseMode::Html);
			}
			if let Some(width) = width.and_then(|w| u16::try_from(w).ok()) {
				video = video.width(width);
			}
			if let Some(height) = height.and_then(|h| u16::try_from(h).ok()) {
				video = video.height(height);
			}
			InputMedia::Video(video)
		}
		OutboundMedia::Document {
			file_name,
			body,
			thumbnail,
		} => {
			let mut document = InputMediaDocument::new(input_file(file_name, body));
			if let Some(thumbnail) = thumbnail {
				document = document.thumbnail(input_file(&format!("thumbnail-{file_name}"), thumbnail));
			}
			InputMedia::Document(document)
		}
	}
}

fn member_role(kind: &ChatMemberKind) -> MemberRole {
	if kind.is_owner() {
		MemberRole::Owner
	} else if kind.is_administrator() {
		MemberRole::Administrator
	} else if kind.is_restricted() {
		MemberRole::Restricted
	} else if kind.is_left() {
		MemberRole::Left
	} else if kind.is_banned() {
		MemberRole::Banned
	} else {
		MemberRole::Member
	}
}

#[async_trait]
impl Transport for TelegramTransport {
	fn bot_id(&self) -> u64 {
		self.bot_id
	}

	async fn send_media_group(
		&self,
		chat_id: i64,
		media: Vec<OutboundMedia>,
		reply_to: Option<i32>,
	) -> anyhow::Result<Vec<SentMessage>> {
		let group: Vec<InputMedia> = media.iter().map(input_media).collect();
		let mut request = self.bot.send_media_group(ChatId(chat_id), group);
		if let Some(reply_to) = reply_to {
			request = request.reply_parameters(ReplyParameters::new(MessageId(reply_to)));
		}
		match request.await {
			Ok(messages) => Ok(messages
				.iter()
				.map(|m| SentMessage {
					chat_id: m.chat.id.0,
					message_id: m.id.0,
				})
				.collect()),
			Err(RequestError::RetryAfter(after)) => {
				bail!("send_media_group to {chat_id} rate limited, retry after {after:?}")
			}
			Err(RequestError::Network(e)) if e.is_timeout() => {
				bail!("send_media_group to {chat_id} timed out, the group may still have been posted: {e}")
			}
			Err(e) => bail!("send_media_group to {chat_id} failed: {e:?}"),
		}
	}

	async fn delete_message(&self, chat_id: i64, message_id: i32) -> anyhow::Result<()> {
		self.bot.delete_message(ChatId(chat_id), MessageId(message_id)).await?;
		Ok(())
	}

	async fn get_chat_member(&self, chat_id: i64, user_id: u64) -> anyhow::Result<ChatMembership> {
		let member = self.bot.get_chat_member(ChatId(chat_id), UserId(user_id)).await?;
		let can_send_media = match &member.kind {
			ChatMemberKind::Restricted(restricted) => restricted.can_send_documents,
			_ => false,
		};
		Ok(ChatMembership {
			role: member_role(&member.kind),
			can_send_media,
		})
	}

	async fn send_upload_action(&self, chat_id: i64) -> anyhow::Result<()> {
		self.bot.send_chat_action(ChatId(chat_id), ChatAction::UploadPhoto).await?;
		Ok(())
	}
}
