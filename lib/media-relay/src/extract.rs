use std::sync::LazyLock;

use regex::Regex;
use url::Url;

pub static PIXIV_ARTWORK: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"https://www\.pixiv\.net/(.*/)?artworks/(\d+)").unwrap());

pub static TWITTER_STATUS: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"https://(?:mobile\.)?(?:twitter|x)\.com/([^/]+)/status/(\d+)").unwrap()
});

pub fn normalize_url(text: &str) -> Option<String> {
	let url = Url::parse(text.trim()).ok()?;
	let host = url.host_str()?;
	Some(format!("{}://{}{}", url.scheme(), host, url.path()))
}

fn capture_id(pattern: &Regex, text: &str) -> Option<String> {
	let captures = pattern.captures(text)?;
	if captures.len() != 3 {
		return None;
	}
	captures.get(2).map(|m| m.as_str().to_string())
}

pub fn pixiv_illust_id(text: &str) -> Option<String> {
	capture_id(&PIXIV_ARTWORK, &normalize_url(text)?)
}

pub fn tweet_id(text: &str) -> Option<String> {
	capture_id(&TWITTER_STATUS, &normalize_url(text)?)
}
