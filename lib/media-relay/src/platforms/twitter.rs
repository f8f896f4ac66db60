use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use tokio::{sync::Mutex, time::Instant};

use crate::{
	caption::escape_html,
	config::TwitterConfig,
	extract,
	fetch::{attempt_with_delay, RetryPolicy},
	platforms::{Platform, USER_AGENT},
	relay_structs::{Author, MediaDescriptor, MediaKind, Post},
};

const TWEET_DETAIL_PATH: &str = "/graphql/HQ_gjq7zDNvSiJOCSkwUEw/TweetDetail";
const GUEST_ACTIVATE_PATH: &str = "/1.1/guest/activate.json";

#[derive(Deserialize)]
struct GuestActivateResp {
	guest_token: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TweetDetailResp {
	data: Option<TweetDetailData>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TweetDetailData {
	threaded_conversation_with_injections_v2: Option<Conversation>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Conversation {
	instructions: Vec<Instruction>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Instruction {
	#[serde(rename = "type")]
	kind: String,
	entries: Vec<Entry>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Entry {
	content: Option<EntryContent>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct EntryContent {
	entry_type: String,
	item_content: Option<ItemContent>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ItemContent {
	tweet_results: Option<TweetResults>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TweetResults {
	result: Option<Tweet>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct Tweet {
	pub rest_id: String,
	core: Option<TweetCore>,
	legacy: Option<TweetLegacy>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct TweetCore {
	user_results: Option<UserResults>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct UserResults {
	result: Option<UserResult>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct UserResult {
	legacy: Option<UserLegacy>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct UserLegacy {
	pub name: String,
	pub screen_name: String,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct TweetLegacy {
	full_text: String,
	display_text_range: Vec<usize>,
	entities: Entities,
	extended_entities: Option<ExtendedEntities>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct Entities {
	urls: Vec<EntityUrl>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct EntityUrl {
	display_url: String,
	expanded_url: String,
	url: String,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct ExtendedEntities {
	media: Vec<ExtendedMedia>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct ExtendedMedia {
	#[serde(rename = "type")]
	kind: String,
	media_url_https: String,
	sizes: MediaSizes,
	video_info: Option<VideoInfo>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct MediaSizes {
	large: MediaSize,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct MediaSize {
	w: u32,
	h: u32,
}

#[derive(Deserialize, Default, Debug, Clone)]
#[serde(default)]
struct VideoInfo {
	variants: Vec<VideoVariant>,
}

#[derive(Deserialize, Default, Debug, Clone)]
#[serde(default)]
struct VideoVariant {
	bitrate: u64,
	url: String,
}

impl TweetDetailResp {
	fn focal_tweet(self) -> Option<Tweet> {
		self.data?
			.threaded_conversation_with_injections_v2?
			.instructions
			.into_iter()
			.find(|instruction| instruction.kind == "TimelineAddEntries")?
			.entries
			.into_iter()
			.filter_map(|entry| entry.content)
			.find(|content| content.entry_type == "TimelineTimelineItem")?
			.item_content?
			.tweet_results?
			.result
	}
}

impl Tweet {
	pub fn user(&self) -> Option<&UserLegacy> {
		self.core.as_ref()?.user_results.as_ref()?.result.as_ref()?.legacy.as_ref()
	}

	/// Full text cut to the display range, which counts characters, not bytes.
	pub fn display_text(&self) -> String {
		let Some(legacy) = &self.legacy else {
			return String::new();
		};
		match legacy.display_text_range[..] {
			[start, end] if start <= end => legacy.full_text.chars().skip(start).take(end - start).collect(),
			_ => legacy.full_text.clone(),
		}
	}

	pub fn display_html(&self) -> String {
		let mut html = escape_html(&self.display_text());
		let Some(legacy) = &self.legacy else {
			return html;
		};
		for url in legacy.entities.urls.iter().filter(|url| !url.url.is_empty()) {
			html = html.replace(
				&escape_html(&url.url),
				&format!(
					"<a href=\"{}\">{}</a>",
					escape_html(&url.expanded_url),
					escape_html(&url.display_url)
				),
			);
		}
		html
	}

	fn media(&self) -> Vec<MediaDescriptor> {
		let Some(entities) = self.legacy.as_ref().and_then(|l| l.extended_entities.as_ref()) else {
			return vec![];
		};
		entities.media.iter().filter_map(media_descriptor).collect()
	}
}

fn media_descriptor(media: &ExtendedMedia) -> Option<MediaDescriptor> {
	match media.kind.as_str() {
		"photo" if !media.media_url_https.is_empty() => Some(MediaDescriptor::photo(
			media.media_url_https.clone(),
			photo_4k_url(&media.media_url_https),
		)),
		"video" | "animated_gif" => {
			let mut variants = media.video_info.as_ref()?.variants.clone();
			variants.retain(|v| !v.url.is_empty());
			// stable, so equal bitrates keep their listed order
			variants.sort_by(|a, b| b.bitrate.cmp(&a.bitrate));
			let regular = variants.first()?;
			let original = variants.last()?;
			Some(MediaDescriptor {
				kind: MediaKind::Video,
				regular_url: regular.url.clone(),
				original_url: original.url.clone(),
				width: Some(media.sizes.large.w).filter(|w| *w > 0),
				height: Some(media.sizes.large.h).filter(|h| *h > 0),
			})
		}
		_ => None,
	}
}

/// `https://pbs.twimg.com/media/abc.jpg` to `https://pbs.twimg.com/media/abc?format=jpg&name=4096x4096`.
pub fn photo_4k_url(link: &str) -> String {
	let file_start = link.rfind('/').map_or(0, |i| i + 1);
	match link[file_start..].rfind('.') {
		Some(dot) => {
			let (base, ext) = link.split_at(file_start + dot);
			format!("{base}?format={}&name=4096x4096", &ext[1..])
		}
		None => format!("{link}?name=4096x4096"),
	}
}

struct GuestToken {
	token: String,
	obtained_at: Instant,
}

pub struct TwitterClient {
	api: reqwest::Client,
	media: reqwest::Client,
	base_url: String,
	guest_token: Mutex<Option<GuestToken>>,
	guest_token_ttl: Duration,
	guest_activate_retry: RetryPolicy,
	detail_retry: RetryPolicy,
}

impl TwitterClient {
	pub fn new(config: &TwitterConfig) -> anyhow::Result<Self> {
		let mut headers = HeaderMap::new();
		headers.insert(header::REFERER, HeaderValue::from_static("https://twitter.com/"));
		headers.insert(header::ORIGIN, HeaderValue::from_static("https://twitter.com"));
		headers.insert(
			header::AUTHORIZATION,
			HeaderValue::from_str(&format!("Bearer {}", config.bearer_token))
				.context("twitter bearer token contains invalid characters")?,
		);
		let api = reqwest::Client::builder()
			.user_agent(USER_AGENT)
			.default_headers(headers)
			.build()?;
		let media = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
		Ok(TwitterClient {
			api,
			media,
			base_url: config.base_url.trim_end_matches('/').to_string(),
			guest_token: Mutex::new(None),
			guest_token_ttl: config.guest_token_ttl(),
			guest_activate_retry: config.guest_activate_retry,
			detail_retry: config.detail_retry,
		})
	}

	async fn activate_guest(&self) -> anyhow::Result<String> {
		let url = format!("{}{GUEST_ACTIVATE_PATH}", self.base_url);
		let (api, url) = (&self.api, url.as_str());
		let resp: GuestActivateResp = attempt_with_delay(self.guest_activate_retry, move |_| async move {
			let response = api.post(url).send().await?;
			let status = response.status();
			if !status.is_success() {
				log::warn!("failed to activate twitter guest token, status code: {status}, retrying");
				bail!("request to {url} failed: status code: {status}");
			}
			Ok(response.json().await?)
		})
		.await?;
		Ok(resp.guest_token)
	}

	async fn guest_token(&self) -> anyhow::Result<String> {
		let mut guest_token = self.guest_token.lock().await;
		match &*guest_token {
			Some(held) if held.obtained_at.elapsed() <= self.guest_token_ttl => Ok(held.token.clone()),
			_ => {
				let token = self.activate_guest().await?;
				log::debug!("twitter guest token activated");
				*guest_token = Some(GuestToken {
					token: token.clone(),
					obtained_at: Instant::now(),
				});
				Ok(token)
			}
		}
	}

	pub async fn tweet_detail(&self, tweet_id: &str) -> anyhow::Result<Option<Tweet>> {
		let guest_token = self.guest_token().await?;
		let variables = json!({
			"focalTweetId": tweet_id,
			"with_rux_injections": false,
			"includePromotedContent": true,
			"withCommunity": true,
			"withQuickPromoteEligibilityTweetFields": true,
			"withBirdwatchNotes": true,
			"withSuperFollowsUserFields": true,
			"withDownvotePerspective": false,
			"withReactionsMetadata": false,
			"withReactionsPerspective": false,
			"withSuperFollowsTweetFields": true,
			"withVoice": true,
			"withV2Timeline": true,
		});
		let features = json!({
			"responsive_web_twitter_blue_verified_badge_is_enabled": true,
			"verified_phone_label_enabled": false,
			"responsive_web_graphql_timeline_navigation_enabled": true,
			"view_counts_public_visibility_enabled": true,
			"view_counts_everywhere_api_enabled": true,
			"longform_notetweets_consumption_enabled": false,
			"tweetypie_unmention_optimization_enabled": true,
			"responsive_web_uc_gql_enabled": true,
			"vibe_api_enabled": true,
			"responsive_web_edit_tweet_api_enabled": true,
			"graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
			"standardized_nudges_misinfo": true,
			"tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled": false,
			"interactive_text_enabled": true,
			"responsive_web_text_conversations_enabled": false,
			"responsive_web_enhance_cards_enabled": false,
		});
		let url = format!("{}{TWEET_DETAIL_PATH}", self.base_url);
		let response = self
			.api
			.get(&url)
			.query(&[("variables", variables.to_string()), ("features", features.to_string())])
			.header("X-Guest-Token", guest_token)
			.send()
			.await?;
		let status = response.status();
		if !status.is_success() {
			bail!("request to {url} failed: status code: {status}");
		}
		let detail: TweetDetailResp = response.json().await?;
		Ok(detail.focal_tweet())
	}

	pub async fn get_media(&self, link: &str) -> anyhow::Result<Bytes> {
		log::debug!("media_url={link} fetching tweet media");
		let response = self.media.get(link).send().await?;
		let status = response.status();
		if !status.is_success() {
			bail!("failed to fetch tweet media {link}, status code: {status}");
		}
		Ok(response.bytes().await?)
	}
}

fn post_from_tweet(tweet_id: &str, tweet: &Tweet) -> Post {
	let author = match tweet.user() {
		Some(user) => Author {
			handle: user.screen_name.clone(),
			display_name: format!("{} (@{})", user.name, user.screen_name),
			profile_url: Some(format!("https://twitter.com/{}", user.screen_name)),
		},
		None => Author::default(),
	};
	Post {
		id: tweet_id.to_string(),
		author,
		text_html: tweet.display_html(),
		tags: vec![],
		media: tweet.media(),
	}
}

#[async_trait]
impl Platform for TwitterClient {
	fn name(&self) -> &'static str {
		"twitter"
	}

	fn label(&self) -> &'static str {
		"Twitter"
	}

	fn extract_id(&self, text: &str) -> Option<String> {
		extract::tweet_id(text)
	}

	fn detail_retry(&self) -> RetryPolicy {
		self.detail_retry
	}

	async fn fetch_post(&self, id: &str) -> anyhow::Result<Option<Post>> {
		Ok(self.tweet_detail(id).await?.map(|tweet| post_from_tweet(id, &tweet)))
	}

	async fn fetch_binary(&self, url: &str) -> anyhow::Result<Bytes> {
		self.get_media(url).await
	}
}
