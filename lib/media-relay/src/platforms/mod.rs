use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{caption, config::Config, fetch::RetryPolicy, relay_structs::Post};

pub mod pixiv;
pub mod twitter;

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36 Edg/109.0.1518.52";

#[async_trait]
pub trait Platform: Send + Sync {
	fn name(&self) -> &'static str;

	fn label(&self) -> &'static str;

	fn extract_id(&self, text: &str) -> Option<String>;

	fn detail_retry(&self) -> RetryPolicy;

	/// `Ok(None)` means the platform answered but has no such post.
	async fn fetch_post(&self, id: &str) -> anyhow::Result<Option<Post>>;

	async fn fetch_binary(&self, url: &str) -> anyhow::Result<Bytes>;

	fn caption(&self, post: &Post, source_url: &str) -> String {
		caption::render(self.label(), post, source_url)
	}

	fn sends_upload_action(&self) -> bool {
		false
	}
}

pub fn from_config(config: &Config) -> anyhow::Result<Vec<Arc<dyn Platform>>> {
	let mut platforms: Vec<Arc<dyn Platform>> = vec![];
	if config.twitter.enabled {
		platforms.push(Arc::new(twitter::TwitterClient::new(&config.twitter)?));
	}
	if config.pixiv.is_enabled() {
		platforms.push(Arc::new(pixiv::PixivClient::new(&config.pixiv)?));
	}
	Ok(platforms)
}

pub fn file_base_name(url: &str) -> String {
	let path = match url::Url::parse(url) {
		Ok(parsed) => parsed.path().to_string(),
		Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
	};
	path.rsplit('/').next().unwrap_or_default().to_string()
}
