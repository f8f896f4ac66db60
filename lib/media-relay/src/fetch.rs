use std::{future::Future, sync::Arc, time::Duration};

use serde::Deserialize;
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
	platforms::Platform,
	relay_structs::{MediaDescriptor, MediaItem},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
	pub attempts: u32,
	pub delay_ms: u64,
}

impl RetryPolicy {
	pub const fn new(attempts: u32, delay_ms: u64) -> Self {
		RetryPolicy {
			attempts,
			delay_ms,
		}
	}

	pub fn delay(&self) -> Duration {
		Duration::from_millis(self.delay_ms)
	}
}

/// Runs `f` until it succeeds or `policy.attempts` runs are used up. The last error is returned.
pub async fn attempt_with_delay<T, F, Fut>(policy: RetryPolicy, mut f: F) -> anyhow::Result<T>
where
	F: FnMut(u32) -> Fut,
	Fut: Future<Output = anyhow::Result<T>>,
{
	let attempts = policy.attempts.max(1);
	let mut attempt = 0;
	loop {
		match f(attempt).await {
			Ok(value) => return Ok(value),
			Err(e) if attempt + 1 < attempts => {
				log::debug!("attempt {}/{attempts} failed: {e:#}", attempt + 1);
				attempt += 1;
				tokio::time::sleep(policy.delay()).await;
			}
			Err(e) => return Err(e),
		}
	}
}

async fn fetch_one(platform: &dyn Platform, descriptor: &MediaDescriptor) -> Option<MediaItem> {
	let (regular, original) = tokio::join!(
		platform.fetch_binary(&descriptor.regular_url),
		platform.fetch_binary(&descriptor.original_url),
	);
	let regular_body = match regular {
		Ok(body) => body,
		Err(e) => {
			log::error!(
				"platform={} url={} failed to fetch regular rendition: {e:#}",
				platform.name(),
				descriptor.regular_url
			);
			return None;
		}
	};
	let original_body = match original {
		Ok(body) => body,
		Err(e) => {
			log::error!(
				"platform={} url={} failed to fetch original rendition: {e:#}",
				platform.name(),
				descriptor.original_url
			);
			return None;
		}
	};
	Some(MediaItem {
		kind: descriptor.kind,
		regular_body,
		original_body,
		source_url: descriptor.regular_url.clone(),
		width: descriptor.width,
		height: descriptor.height,
	})
}

pub async fn fetch_media(
	platform: Arc<dyn Platform>,
	descriptors: Vec<MediaDescriptor>,
	concurrency: usize,
) -> Vec<MediaItem> {
	let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
	let mut slots: Vec<Option<MediaItem>> = (0..descriptors.len()).map(|_| None).collect();
	let mut tasks = JoinSet::new();
	for (index, descriptor) in descriptors.into_iter().enumerate() {
		let platform = platform.clone();
		let semaphore = semaphore.clone();
		tasks.spawn(async move {
			let Ok(_permit) = semaphore.acquire_owned().await else {
				return (index, None);
			};
			let item = fetch_one(platform.as_ref(), &descriptor).await;
			if item.is_none() {
				log::warn!("platform={} failed to fetch media {}", platform.name(), descriptor.regular_url);
			}
			(index, item)
		});
	}
	while let Some(joined) = tasks.join_next().await {
		match joined {
			Ok((index, item)) => slots[index] = item,
			Err(e) => log::error!("media fetch task failed: {e}"),
		}
	}
	slots.into_iter().flatten().collect()
}
