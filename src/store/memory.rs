//! Thread-safe in-memory [`TtlStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{StoreError, StoreFuture, StoreKey, TtlStore},
};

type EntryMap = Arc<RwLock<HashMap<StoreKey, Entry>>>;

#[derive(Clone, Debug)]
struct Entry {
	value: String,
	expires_at: OffsetDateTime,
}
impl Entry {
	fn is_live(&self, now: OffsetDateTime) -> bool {
		now < self.expires_at
	}
}

/// Thread-safe storage backend that keeps entries in-process for tests and demos.
///
/// Expiry is honored lazily: a dead entry behaves as absent on `get`/`take` and is dropped on
/// the next write or take touching its key.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(EntryMap);
impl MemoryStore {
	fn get_now(map: EntryMap, key: StoreKey) -> Option<String> {
		let now = OffsetDateTime::now_utc();

		map.read().get(&key).filter(|entry| entry.is_live(now)).map(|entry| entry.value.clone())
	}

	fn put_now(map: EntryMap, key: StoreKey, value: String, ttl: Duration) -> Result<(), StoreError> {
		let expires_at = OffsetDateTime::now_utc() + ttl;

		map.write().insert(key, Entry { value, expires_at });

		Ok(())
	}

	fn delete_now(map: EntryMap, key: StoreKey) {
		map.write().remove(&key);
	}

	fn take_now(map: EntryMap, key: StoreKey) -> Option<String> {
		let now = OffsetDateTime::now_utc();
		let mut guard = map.write();

		guard.remove(&key).filter(|entry| entry.is_live(now)).map(|entry| entry.value)
	}

	/// Returns the number of live entries; test-support helper.
	pub fn live_len(&self) -> usize {
		let now = OffsetDateTime::now_utc();

		self.0.read().values().filter(|entry| entry.is_live(now)).count()
	}
}
impl TtlStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Ok(Self::get_now(map, key)) })
	}

	fn put<'a>(&'a self, key: &'a StoreKey, value: String, ttl: Duration) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Self::put_now(map, key, value, ttl) })
	}

	fn delete<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move {
			Self::delete_now(map, key);

			Ok(())
		})
	}

	fn take<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Ok(Self::take_now(map, key)) })
	}
}
