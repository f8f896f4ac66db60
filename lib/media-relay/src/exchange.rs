use std::{
	fmt,
	sync::{
		atomic::{AtomicU8, Ordering},
		Arc,
	},
	time::Duration,
};

use dashmap::DashMap;
use tokio::{
	sync::Notify,
	task::JoinHandle,
	time::Instant,
};

use crate::relay_structs::MediaItem;

const PENDING: u8 = 0;
const PROCESSING: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExchangeKey {
	pub chat_id: i64,
	pub message_id: i32,
}

impl ExchangeKey {
	pub fn new(chat_id: i64, message_id: i32) -> Self {
		ExchangeKey {
			chat_id,
			message_id,
		}
	}
}

impl fmt::Display for ExchangeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "key/{}/{}", self.chat_id, self.message_id)
	}
}

#[derive(Debug)]
pub struct ExchangeRecord {
	pub platform: String,
	pub content_id: String,
	pub author: String,
	pub media: Vec<MediaItem>,
	pub source_urls: Vec<String>,
	state: AtomicU8,
	created_at: Instant,
}

impl ExchangeRecord {
	pub fn new(
		platform: impl Into<String>,
		content_id: impl Into<String>,
		author: impl Into<String>,
		media: Vec<MediaItem>,
	) -> Self {
		let source_urls = media.iter().map(|m| m.source_url.clone()).collect();
		ExchangeRecord {
			platform: platform.into(),
			content_id: content_id.into(),
			author: author.into(),
			media,
			source_urls,
			state: AtomicU8::new(PENDING),
			created_at: Instant::now(),
		}
	}

	pub fn is_processing(&self) -> bool {
		self.state.load(Ordering::Acquire) == PROCESSING
	}

	fn try_begin(&self) -> bool {
		self.state
			.compare_exchange(PENDING, PROCESSING, Ordering::AcqRel, Ordering::Acquire)
			.is_ok()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkOutcome {
	Claimed,
	AlreadyProcessing,
	NotFound,
}

#[derive(Default)]
pub struct ExchangeStore {
	records: DashMap<ExchangeKey, Arc<ExchangeRecord>>,
	inserted: Notify,
}

impl ExchangeStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, key: ExchangeKey, record: ExchangeRecord) {
		self.records.insert(key, Arc::new(record));
		self.inserted.notify_waiters();
	}

	pub fn load(&self, key: &ExchangeKey) -> Option<Arc<ExchangeRecord>> {
		self.records.get(key).map(|record| record.value().clone())
	}

	pub fn cleanup(&self, key: &ExchangeKey) {
		self.records.remove(key);
	}

	pub fn cleanup_guard(&self, key: ExchangeKey) -> CleanupGuard<'_> {
		CleanupGuard {
			store: self,
			key,
		}
	}

	/// Moves the record from pending to processing. Only one caller per record ever sees `Claimed`.
	pub fn mark_processing(&self, key: &ExchangeKey) -> MarkOutcome {
		match self.records.get(key) {
			Some(record) if record.try_begin() => MarkOutcome::Claimed,
			Some(_) => MarkOutcome::AlreadyProcessing,
			None => MarkOutcome::NotFound,
		}
	}

	pub async fn wait_for(&self, key: &ExchangeKey, timeout: Duration) -> Option<Arc<ExchangeRecord>> {
		let deadline = Instant::now() + timeout;
		loop {
			let notified = self.inserted.notified();
			tokio::pin!(notified);
			// registered before the lookup so an insert in between still wakes us
			notified.as_mut().enable();
			if let Some(record) = self.load(key) {
				return Some(record);
			}
			if tokio::time::timeout_at(deadline, notified).await.is_err() {
				return None;
			}
		}
	}

	pub fn sweep_expired(&self, ttl: Duration) -> usize {
		let before = self.records.len();
		self.records.retain(|_, record| record.created_at.elapsed() < ttl);
		before.saturating_sub(self.records.len())
	}

	pub fn spawn_sweeper(self: Arc<Self>, interval: Duration, ttl: Duration) -> JoinHandle<()> {
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.tick().await;
			loop {
				ticker.tick().await;
				let swept = self.sweep_expired(ttl);
				if swept > 0 {
					log::info!("swept {swept} exchange records that were never forwarded");
				}
			}
		})
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}

pub struct CleanupGuard<'a> {
	store: &'a ExchangeStore,
	key: ExchangeKey,
}

impl Drop for CleanupGuard<'_> {
	fn drop(&mut self) {
		self.store.cleanup(&self.key);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::relay_structs::MediaKind;
	use bytes::Bytes;

	fn media(url: &str) -> MediaItem {
		MediaItem {
			kind: MediaKind::Photo,
			regular_body: Bytes::from_static(b"regular"),
			original_body: Bytes::from_static(b"original"),
			source_url: url.to_string(),
			width: None,
			height: None,
		}
	}

	fn record() -> ExchangeRecord {
		ExchangeRecord::new(
			"pixiv",
			"1234",
			"someone",
			vec![media("https://i.example/a_p0.jpg"), media("https://i.example/a_p1.jpg")],
		)
	}

	#[test]
	fn key_encoding_is_deterministic() {
		let key = ExchangeKey::new(-1001234, 56);
		assert_eq!(key.to_string(), "key/-1001234/56");
		assert_eq!(key, ExchangeKey::new(-1001234, 56));
		assert_ne!(ExchangeKey::new(-1, 12), ExchangeKey::new(-11, 2));
	}

	#[test]
	fn insert_then_load_returns_every_field() {
		let store = ExchangeStore::new();
		let key = ExchangeKey::new(-100, 7);
		store.insert(key, record());

		let loaded = store.load(&key).unwrap();
		assert_eq!(loaded.platform, "pixiv");
		assert_eq!(loaded.content_id, "1234");
		assert_eq!(loaded.author, "someone");
		assert_eq!(loaded.media.len(), 2);
		assert_eq!(loaded.media[0].original_body, Bytes::from_static(b"original"));
		assert_eq!(
			loaded.source_urls,
			vec!["https://i.example/a_p0.jpg", "https://i.example/a_p1.jpg"]
		);
		assert!(!loaded.is_processing());
	}

	#[test]
	fn cleanup_is_idempotent() {
		let store = ExchangeStore::new();
		let key = ExchangeKey::new(-100, 7);
		store.cleanup(&key);
		store.insert(key, record());
		store.cleanup(&key);
		store.cleanup(&key);
		assert!(store.load(&key).is_none());
		assert!(store.is_empty());
	}

	#[test]
	fn cleanup_guard_removes_on_drop() {
		let store = ExchangeStore::new();
		let key = ExchangeKey::new(-100, 7);
		store.insert(key, record());
		{
			let _guard = store.cleanup_guard(key);
			assert!(store.load(&key).is_some());
		}
		assert!(store.load(&key).is_none());
	}

	#[test]
	fn mark_processing_claims_once() {
		let store = ExchangeStore::new();
		let key = ExchangeKey::new(-100, 7);
		assert_eq!(store.mark_processing(&key), MarkOutcome::NotFound);
		store.insert(key, record());
		assert_eq!(store.mark_processing(&key), MarkOutcome::Claimed);
		assert_eq!(store.mark_processing(&key), MarkOutcome::AlreadyProcessing);
		assert!(store.load(&key).unwrap().is_processing());
	}

	#[tokio::test(start_paused = true)]
	async fn sweeper_reclaims_records_past_their_ttl() {
		let store = Arc::new(ExchangeStore::new());
		store.insert(ExchangeKey::new(-100, 7), record());
		let sweeper = store
			.clone()
			.spawn_sweeper(Duration::from_secs(60), Duration::from_secs(600));

		tokio::time::sleep(Duration::from_secs(300)).await;
		assert_eq!(store.len(), 1);

		store.insert(ExchangeKey::new(-100, 8), record());
		tokio::time::sleep(Duration::from_secs(360)).await;
		assert!(store.load(&ExchangeKey::new(-100, 7)).is_none());
		assert!(store.load(&ExchangeKey::new(-100, 8)).is_some());

		tokio::time::sleep(Duration::from_secs(600)).await;
		assert!(store.is_empty());
		sweeper.abort();
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_mark_processing_has_a_single_winner() {
		for round in 0..50 {
			let store = Arc::new(ExchangeStore::new());
			let key = ExchangeKey::new(-100, round);
			store.insert(key, record());

			let mut handles = Vec::new();
			for _ in 0..8 {
				let store = store.clone();
				handles.push(tokio::spawn(async move { store.mark_processing(&key) }));
			}
			let mut claimed = 0;
			for handle in handles {
				if handle.await.unwrap() == MarkOutcome::Claimed {
					claimed += 1;
				}
			}
			assert_eq!(claimed, 1);
		}
	}

	#[tokio::test]
	async fn wait_for_returns_a_record_inserted_later() {
		let store = Arc::new(ExchangeStore::new());
		let key = ExchangeKey::new(-100, 7);

		let writer = store.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(20)).await;
			writer.insert(key, record());
		});

		let found = store.wait_for(&key, Duration::from_secs(5)).await;
		assert_eq!(found.unwrap().content_id, "1234");
	}

	#[tokio::test(start_paused = true)]
	async fn wait_for_gives_up_after_timeout() {
		let store = ExchangeStore::new();
		store.insert(ExchangeKey::new(-100, 8), record());
		let found = store.wait_for(&ExchangeKey::new(-100, 7), Duration::from_secs(3)).await;
		assert!(found.is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn sweep_removes_only_expired_records() {
		let store = ExchangeStore::new();
		store.insert(ExchangeKey::new(-100, 1), record());
		tokio::time::advance(Duration::from_secs(120)).await;
		store.insert(ExchangeKey::new(-100, 2), record());

		assert_eq!(store.sweep_expired(Duration::from_secs(60)), 1);
		assert!(store.load(&ExchangeKey::new(-100, 1)).is_none());
		assert!(store.load(&ExchangeKey::new(-100, 2)).is_some());
	}
}
