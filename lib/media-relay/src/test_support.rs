use std::{
	collections::HashMap,
	io::Cursor,
	sync::{
		atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering},
		Mutex,
	},
};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageBuffer, ImageFormat, Rgb};

use crate::{
	extract,
	fetch::RetryPolicy,
	platforms::Platform,
	relay_structs::Post,
	transport::{ChatMembership, MemberRole, OutboundMedia, SentMessage, Transport},
};

pub const BOT_ID: u64 = 42;

pub fn png(width: u32, height: u32) -> Vec<u8> {
	let image = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
	let mut out = Cursor::new(Vec::new());
	image.write_to(&mut out, ImageFormat::Png).unwrap();
	out.into_inner()
}

#[derive(Default)]
pub struct ScriptedPlatform {
	post: Option<Post>,
	binaries: HashMap<String, Bytes>,
	failing_detail_attempts: u32,
	pub detail_calls: AtomicU32,
	pub binary_calls: AtomicU32,
}

impl ScriptedPlatform {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_post(mut self, post: Post) -> Self {
		self.post = Some(post);
		self
	}

	pub fn with_binary(mut self, url: &str, body: impl AsRef<[u8]>) -> Self {
		self.binaries.insert(url.to_string(), Bytes::copy_from_slice(body.as_ref()));
		self
	}

	/// The first `attempts` detail calls fail with a transport error.
	pub fn failing_detail(mut self, attempts: u32) -> Self {
		self.failing_detail_attempts = attempts;
		self
	}
}

#[async_trait]
impl Platform for ScriptedPlatform {
	fn name(&self) -> &'static str {
		"pixiv"
	}

	fn label(&self) -> &'static str {
		"Pixiv"
	}

	fn extract_id(&self, text: &str) -> Option<String> {
		extract::pixiv_illust_id(text)
	}

	fn detail_retry(&self) -> RetryPolicy {
		RetryPolicy::new(2, 0)
	}

	async fn fetch_post(&self, id: &str) -> anyhow::Result<Option<Post>> {
		let call = self.detail_calls.fetch_add(1, Ordering::SeqCst);
		if call < self.failing_detail_attempts {
			bail!("connection reset");
		}
		Ok(self.post.clone().filter(|post| post.id == id))
	}

	async fn fetch_binary(&self, url: &str) -> anyhow::Result<Bytes> {
		self.binary_calls.fetch_add(1, Ordering::SeqCst);
		self.binaries
			.get(url)
			.cloned()
			.ok_or_else(|| anyhow!("404 for {url}"))
	}

	fn sends_upload_action(&self) -> bool {
		true
	}
}

#[derive(Clone, Debug)]
pub struct RecordedSend {
	pub chat_id: i64,
	pub media: Vec<OutboundMedia>,
	pub reply_to: Option<i32>,
}

pub struct RecordingTransport {
	sends: Mutex<Vec<RecordedSend>>,
	deletes: Mutex<Vec<(i64, i32)>>,
	upload_actions: Mutex<Vec<i64>>,
	memberships: Mutex<HashMap<i64, Result<ChatMembership, String>>>,
	fail_sends: AtomicBool,
	fail_deletes: AtomicBool,
	next_message_id: AtomicI32,
}

impl RecordingTransport {
	pub fn new() -> Self {
		RecordingTransport {
			sends: Mutex::new(vec![]),
			deletes: Mutex::new(vec![]),
			upload_actions: Mutex::new(vec![]),
			memberships: Mutex::new(HashMap::new()),
			fail_sends: AtomicBool::new(false),
			fail_deletes: AtomicBool::new(false),
			next_message_id: AtomicI32::new(1000),
		}
	}

	pub fn fail_sends(&self, fail: bool) {
		self.fail_sends.store(fail, Ordering::SeqCst);
	}

	pub fn fail_deletes(&self, fail: bool) {
		self.fail_deletes.store(fail, Ordering::SeqCst);
	}

	pub fn set_membership(&self, chat_id: i64, role: MemberRole, can_send_media: bool) {
		self.memberships.lock().unwrap().insert(
			chat_id,
			Ok(ChatMembership {
				role,
				can_send_media,
			}),
		);
	}

	pub fn fail_membership(&self, chat_id: i64) {
		self.memberships
			.lock()
			.unwrap()
			.insert(chat_id, Err("chat not found".to_string()));
	}

	pub fn sends(&self) -> Vec<RecordedSend> {
		self.sends.lock().unwrap().clone()
	}

	pub fn deletes(&self) -> Vec<(i64, i32)> {
		self.deletes.lock().unwrap().clone()
	}

	pub fn upload_actions(&self) -> Vec<i64> {
		self.upload_actions.lock().unwrap().clone()
	}
}

#[async_trait]
impl Transport for RecordingTransport {
	fn bot_id(&self) -> u64 {
		BOT_ID
	}

	async fn send_media_group(
		&self,
		chat_id: i64,
		media: Vec<OutboundMedia>,
		reply_to: Option<i32>,
	) -> anyhow::Result<Vec<SentMessage>> {
		if self.fail_sends.load(Ordering::SeqCst) {
			bail!("Bad Request: group send rejected");
		}
		let sent = media
			.iter()
			.map(|_| SentMessage {
				chat_id,
				message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
			})
			.collect();
		self.sends.lock().unwrap().push(RecordedSend {
			chat_id,
			media,
			reply_to,
		});
		Ok(sent)
	}

	async fn delete_message(&self, chat_id: i64, message_id: i32) -> anyhow::Result<()> {
		if self.fail_deletes.load(Ordering::SeqCst) {
			bail!("Bad Request: message can't be deleted");
		}
		self.deletes.lock().unwrap().push((chat_id, message_id));
		Ok(())
	}

	async fn get_chat_member(&self, chat_id: i64, user_id: u64) -> anyhow::Result<ChatMembership> {
		assert_eq!(user_id, BOT_ID);
		match self.memberships.lock().unwrap().get(&chat_id) {
			Some(Ok(membership)) => Ok(*membership),
			Some(Err(e)) => bail!("{e}"),
			None => Ok(ChatMembership {
				role: MemberRole::Administrator,
				can_send_media: false,
			}),
		}
	}

	async fn send_upload_action(&self, chat_id: i64) -> anyhow::Result<()> {
		self.upload_actions.lock().unwrap().push(chat_id);
		Ok(())
	}
}
