use anyhow::{bail, Context};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{de::DeserializeOwned, Deserialize};

use crate::{
	caption::escape_html,
	config::PixivConfig,
	extract,
	fetch::RetryPolicy,
	platforms::{Platform, USER_AGENT},
	relay_structs::{Author, MediaDescriptor, MediaKind, Post},
};

#[derive(Deserialize)]
struct BaseResp {
	#[serde(default)]
	error: bool,
	#[serde(default)]
	message: String,
	#[serde(default)]
	body: serde_json::Value,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Illust {
	pub id: String,
	pub title: String,
	pub user_id: String,
	pub user_name: String,
	pub tags: Option<Tags>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Tags {
	pub tags: Vec<Tag>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Tag {
	pub tag: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct IllustPage {
	pub urls: IllustPageUrls,
	pub width: u32,
	pub height: u32,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct IllustPageUrls {
	pub regular: String,
	pub original: String,
}

pub struct PixivClient {
	http: reqwest::Client,
	base_url: String,
	detail_retry: RetryPolicy,
}

impl PixivClient {
	pub fn new(config: &PixivConfig) -> anyhow::Result<Self> {
		if config.phpsessid.is_empty() {
			bail!("must supply a valid pixiv PHPSESSID");
		}
		let mut headers = HeaderMap::new();
		headers.insert(
			header::ACCEPT_LANGUAGE,
			HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8,en-GB;q=0.7,en-US;q=0.6"),
		);
		headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
		headers.insert(header::REFERER, HeaderValue::from_static("https://www.pixiv.net/"));
		headers.insert(
			header::COOKIE,
			HeaderValue::from_str(&format!("PHPSESSID={}", config.phpsessid))
				.context("PHPSESSID contains invalid characters")?,
		);
		let http = reqwest::Client::builder()
			.user_agent(USER_AGENT)
			.default_headers(headers)
			.build()?;
		Ok(PixivClient {
			http,
			base_url: config.base_url.trim_end_matches('/').to_string(),
			detail_retry: config.detail_retry,
		})
	}

	async fn ajax<B: DeserializeOwned>(&self, path: &str) -> anyhow::Result<Option<B>> {
		let url = format!("{}{path}", self.base_url);
		let response = self.http.get(&url).send().await?;
		let status = response.status();
		if !status.is_success() {
			bail!("request to {url} failed: status code: {status}");
		}
		let resp: BaseResp = response.json().await?;
		if resp.error {
			bail!("request to {url} failed: error: {}", resp.message);
		}
		if resp.body.is_null() {
			return Ok(None);
		}
		Ok(Some(serde_json::from_value(resp.body)?))
	}

	pub async fn illust_detail(&self, illust_id: &str) -> anyhow::Result<Option<Illust>> {
		self.ajax(&format!("/ajax/illust/{illust_id}")).await
	}

	pub async fn illust_pages(&self, illust_id: &str) -> anyhow::Result<Option<Vec<IllustPage>>> {
		self.ajax(&format!("/ajax/illust/{illust_id}/pages")).await
	}

	pub async fn get_image(&self, link: &str) -> anyhow::Result<Bytes> {
		log::debug!("image_url={link} fetching pixiv image");
		let response = self.http.get(link).send().await?;
		let status = response.status();
		if !status.is_success() {
			bail!("failed to fetch pixiv image {link}, status code: {status}");
		}
		Ok(response.bytes().await?)
	}
}

fn media_from_pages(pages: Vec<IllustPage>) -> Vec<MediaDescriptor> {
	pages
		.into_iter()
		.filter(|page| !page.urls.regular.is_empty() && !page.urls.original.is_empty())
		.map(|page| MediaDescriptor {
			kind: MediaKind::Photo,
			regular_url: page.urls.regular,
			original_url: page.urls.original,
			width: Some(page.width).filter(|w| *w > 0),
			height: Some(page.height).filter(|h| *h > 0),
		})
		.collect()
}

fn post_from_illust(illust_id: &str, illust: Illust, pages: Vec<IllustPage>) -> Post {
	let profile_url = if illust.user_id.is_empty() {
		None
	} else {
		Some(format!("https://www.pixiv.net/users/{}", illust.user_id))
	};
	Post {
		id: illust_id.to_string(),
		author: Author {
			handle: illust.user_name.clone(),
			display_name: illust.user_name,
			profile_url,
		},
		text_html: escape_html(&illust.title),
		tags: illust.tags.map(|t| t.tags.into_iter().map(|t| t.tag).collect()).unwrap_or_default(),
		media: media_from_pages(pages),
	}
}

#[async_trait]
impl Platform for PixivClient {
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
		self.detail_retry
	}

	async fn fetch_post(&self, id: &str) -> anyhow::Result<Option<Post>> {
		let Some(illust) = self.illust_detail(id).await? else {
			log::warn!("pixiv_illust_id={id} illust detail body is empty");
			return Ok(None);
		};
		let Some(pages) = self.illust_pages(id).await? else {
			log::warn!("pixiv_illust_id={id} illust pages body is empty");
			return Ok(None);
		};
		Ok(Some(post_from_illust(id, illust, pages)))
	}

	async fn fetch_binary(&self, url: &str) -> anyhow::Result<Bytes> {
		self.get_image(url).await
	}

	fn sends_upload_action(&self) -> bool {
		true
	}
}

#[cfg(test)]
mod tests {
	use httpmock::prelude::*;
	use serde_json::json;

	use super::*;

	fn client(server: &MockServer) -> PixivClient {
		PixivClient::new(&PixivConfig {
			enabled: Some(true),
			phpsessid: "session".to_string(),
			detail_retry: RetryPolicy::new(1, 0),
			base_url: server.base_url(),
		})
		.unwrap()
	}

	#[test]
	fn empty_session_is_rejected() {
		assert!(PixivClient::new(&PixivConfig::default()).is_err());
	}

	#[tokio::test]
	async fn fetch_post_combines_detail_and_pages() {
		let server = MockServer::start_async().await;
		let detail = server
			.mock_async(|when, then| {
				when.method(GET)
					.path("/ajax/illust/1234")
					.header("cookie", "PHPSESSID=session")
					.header("referer", "https://www.pixiv.net/");
				then.status(200).json_body(json!({
					"error": false,
					"message": "",
					"body": {
						"id": "1234",
						"title": "<sunset>",
						"userId": "99",
						"userName": "artist",
						"tags": { "tags": [ { "tag": "original" }, { "tag": "semi-realism" } ] }
					}
				}));
			})
			.await;
		server
			.mock_async(|when, then| {
				when.method(GET).path("/ajax/illust/1234/pages");
				then.status(200).json_body(json!({
					"error": false,
					"message": "",
					"body": [
						{ "urls": { "regular": "https://i.example/r0.jpg", "original": "https://i.example/o0.png" }, "width": 1000, "height": 2000 },
						{ "urls": { "regular": "", "original": "https://i.example/o1.png" }, "width": 1000, "height": 2000 },
						{ "urls": { "regular": "https://i.example/r2.jpg", "original": "https://i.example/o2.png" }, "width": 0, "height": 0 }
					]
				}));
			})
			.await;

		let post = client(&server).fetch_post("1234").await.unwrap().unwrap();
		detail.assert_async().await;
		assert_eq!(post.id, "1234");
		assert_eq!(post.author.handle, "artist");
		assert_eq!(post.author.profile_url.as_deref(), Some("https://www.pixiv.net/users/99"));
		assert_eq!(post.text_html, "&lt;sunset&gt;");
		assert_eq!(post.tags, vec!["original", "semi-realism"]);
		assert_eq!(post.media.len(), 2);
		assert_eq!(post.media[0].original_url, "https://i.example/o0.png");
		assert_eq!(post.media[0].height, Some(2000));
		assert_eq!(post.media[1].regular_url, "https://i.example/r2.jpg");
		assert_eq!(post.media[1].width, None);
	}

	#[tokio::test]
	async fn api_error_flag_is_an_error() {
		let server = MockServer::start_async().await;
		server
			.mock_async(|when, then| {
				when.method(GET).path("/ajax/illust/1");
				then.status(200).json_body(json!({ "error": true, "message": "not allowed", "body": [] }));
			})
			.await;
		let err = client(&server).fetch_post("1").await.unwrap_err();
		assert!(err.to_string().contains("not allowed"));
	}

	#[tokio::test]
	async fn null_body_is_not_found() {
		let server = MockServer::start_async().await;
		server
			.mock_async(|when, then| {
				when.method(GET).path("/ajax/illust/1");
				then.status(200).json_body(json!({ "error": false, "message": "", "body": null }));
			})
			.await;
		assert!(client(&server).fetch_post("1").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn image_download_requires_success_status() {
		let server = MockServer::start_async().await;
		server
			.mock_async(|when, then| {
				when.method(GET).path("/img/ok.jpg");
				then.status(200).body("jpeg-bytes");
			})
			.await;
		server
			.mock_async(|when, then| {
				when.method(GET).path("/img/forbidden.jpg");
				then.status(403);
			})
			.await;
		let client = client(&server);
		let body = client.fetch_binary(&server.url("/img/ok.jpg")).await.unwrap();
		assert_eq!(&body[..], b"jpeg-bytes");
		assert!(client.fetch_binary(&server.url("/img/forbidden.jpg")).await.is_err());
	}
}
