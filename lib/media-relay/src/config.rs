use std::{net::SocketAddr, path::Path, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::fetch::RetryPolicy;

pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_PIXIV_PHPSESSID: &str = "PIXIV_PHPSESSID";

/// Bearer token of the public twitter web client.
pub const TWITTER_GUEST_BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
	#[serde(default)]
	pub telegram_token: String,
	pub webhook_url: Option<String>,
	#[serde(default = "default_webhook_addr")]
	pub webhook_addr: SocketAddr,
	#[serde(default)]
	pub pixiv: PixivConfig,
	#[serde(default)]
	pub twitter: TwitterConfig,
	#[serde(default)]
	pub relay: RelaySettings,
}

fn default_webhook_addr() -> SocketAddr {
	([0, 0, 0, 0], 8443).into()
}

#[derive(Deserialize, Debug, Clone)]
pub struct PixivConfig {
	pub enabled: Option<bool>,
	#[serde(default)]
	pub phpsessid: String,
	#[serde(default = "PixivConfig::default_detail_retry")]
	pub detail_retry: RetryPolicy,
	#[serde(default = "PixivConfig::default_base_url")]
	pub base_url: String,
}

impl PixivConfig {
	fn default_detail_retry() -> RetryPolicy {
		RetryPolicy::new(1, 1000)
	}

	fn default_base_url() -> String {
		"https://www.pixiv.net".to_string()
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled.unwrap_or(!self.phpsessid.is_empty())
	}
}

impl Default for PixivConfig {
	fn default() -> Self {
		PixivConfig {
			enabled: None,
			phpsessid: String::new(),
			detail_retry: Self::default_detail_retry(),
			base_url: Self::default_base_url(),
		}
	}
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TwitterConfig {
	pub enabled: bool,
	pub bearer_token: String,
	pub detail_retry: RetryPolicy,
	pub guest_activate_retry: RetryPolicy,
	pub guest_token_ttl_secs: u64,
	pub base_url: String,
}

impl TwitterConfig {
	pub fn guest_token_ttl(&self) -> Duration {
		Duration::from_secs(self.guest_token_ttl_secs)
	}
}

impl Default for TwitterConfig {
	fn default() -> Self {
		TwitterConfig {
			enabled: true,
			bearer_token: TWITTER_GUEST_BEARER_TOKEN.to_string(),
			detail_retry: RetryPolicy::new(10, 1000),
			guest_activate_retry: RetryPolicy::new(100, 1000),
			guest_token_ttl_secs: 15 * 60,
			base_url: "https://api.twitter.com".to_string(),
		}
	}
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RelaySettings {
	pub max_media_per_post: usize,
	pub fetch_concurrency: usize,
	pub correlation_wait_ms: u64,
	pub exchange_ttl_secs: u64,
	pub sweep_interval_secs: u64,
	pub thumbnail_size: u32,
}

impl RelaySettings {
	pub fn correlation_wait(&self) -> Duration {
		Duration::from_millis(self.correlation_wait_ms)
	}

	pub fn exchange_ttl(&self) -> Duration {
		Duration::from_secs(self.exchange_ttl_secs)
	}

	pub fn sweep_interval(&self) -> Duration {
		Duration::from_secs(self.sweep_interval_secs.max(1))
	}
}

impl Default for RelaySettings {
	fn default() -> Self {
		RelaySettings {
			max_media_per_post: 4,
			fetch_concurrency: 4,
			correlation_wait_ms: 3000,
			exchange_ttl_secs: 600,
			sweep_interval_secs: 60,
			thumbnail_size: 320,
		}
	}
}

impl Config {
	pub fn from_toml(text: &str) -> anyhow::Result<Self> {
		let config: Config = toml::from_str(text)?;
		Ok(config)
	}

	pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path)
			.with_context(|| format!("failed to read config {}", path.display()))?;
		let mut config = Self::from_toml(&text)
			.with_context(|| format!("failed to parse config {}", path.display()))?;
		config.apply_env(|name| std::env::var(name).ok());
		config.validate()?;
		Ok(config)
	}

	pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
		if let Some(token) = lookup(ENV_TELEGRAM_BOT_TOKEN).filter(|t| !t.is_empty()) {
			self.telegram_token = token;
		}
		if let Some(session) = lookup(ENV_PIXIV_PHPSESSID).filter(|s| !s.is_empty()) {
			self.pixiv.phpsessid = session;
		}
	}

	pub fn validate(&self) -> anyhow::Result<()> {
		if self.telegram_token.is_empty() {
			bail!("must supply a telegram bot token in the config or {ENV_TELEGRAM_BOT_TOKEN}");
		}
		if self.pixiv.enabled == Some(true) && self.pixiv.phpsessid.is_empty() {
			bail!("pixiv is enabled but no session id is set in the config or {ENV_PIXIV_PHPSESSID}");
		}
		if self.relay.exchange_ttl() <= self.relay.correlation_wait() {
			bail!(
				"relay.exchange_ttl_secs ({}s) must be longer than relay.correlation_wait_ms ({}ms)",
				self.relay.exchange_ttl_secs,
				self.relay.correlation_wait_ms
			);
		}
		Ok(())
	}

	pub fn webhook(&self) -> anyhow::Result<Option<(SocketAddr, url::Url)>> {
		let Some(webhook_url) = &self.webhook_url else {
			return Ok(None);
		};
		let url = url::Url::parse(&format!("{webhook_url}{}", self.telegram_token))
			.context("invalid webhook_url")?;
		Ok(Some((self.webhook_addr, url)))
	}
}
