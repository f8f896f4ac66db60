use bytes::Bytes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
	Photo,
	Video,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaDescriptor {
	pub kind: MediaKind,
	pub regular_url: String,
	pub original_url: String,
	pub width: Option<u32>,
	pub height: Option<u32>,
}

impl MediaDescriptor {
	pub fn photo(regular_url: impl Into<String>, original_url: impl Into<String>) -> Self {
		MediaDescriptor {
			kind: MediaKind::Photo,
			regular_url: regular_url.into(),
			original_url: original_url.into(),
			width: None,
			height: None,
		}
	}
}

#[derive(Clone, Debug)]
pub struct MediaItem {
	pub kind: MediaKind,
	pub regular_body: Bytes,
	pub original_body: Bytes,
	pub source_url: String,
	pub width: Option<u32>,
	pub height: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct Author {
	pub handle: String,
	pub display_name: String,
	pub profile_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Post {
	pub id: String,
	pub author: Author,
	pub text_html: String,
	pub tags: Vec<String>,
	pub media: Vec<MediaDescriptor>,
}

#[derive(Clone, Debug, Default)]
pub struct ChannelPostEvent {
	pub text: String,
	pub chat_id: i64,
	pub chat_title: String,
	pub message_id: i32,
	pub forwarded: bool,
}

#[derive(Clone, Debug, Default)]
pub struct MessageEvent {
	pub is_automatic_forward: bool,
	/// (origin chat id, origin message id) of a message forwarded from a channel.
	pub forward_origin: Option<(i64, i32)>,
	pub forward_origin_title: String,
	pub chat_id: i64,
	pub chat_title: String,
	pub message_id: i32,
}
