// std
use std::time::Duration as StdDuration;
// self
use guardpost::{
	_preludet::*,
	store::{MemoryStore, StoreKey, TtlStore},
};

fn make_store() -> Arc<dyn TtlStore> {
	Arc::new(MemoryStore::default())
}

#[tokio::test]
async fn round_trip_through_the_contract() {
	let store = make_store();
	let key = StoreKey::new("csrf", ["sess-1", "salt-a"]);

	store
		.put(&key, "1735689600000".into(), Duration::seconds(300))
		.await
		.expect("Putting a consumption marker should succeed.");

	assert_eq!(
		store.get(&key).await.expect("Getting a live marker should succeed."),
		Some("1735689600000".into())
	);

	store.delete(&key).await.expect("Deleting the marker should succeed.");

	assert_eq!(store.get(&key).await.expect("Getting after delete should succeed."), None);
}

#[tokio::test]
async fn entries_expire_on_their_ttl() {
	let store = make_store();
	let key = StoreKey::new("rate", ["ip:192.0.2.1", "1735689600"]);

	store
		.put(&key, "3".into(), Duration::seconds(1))
		.await
		.expect("Putting a short-lived counter should succeed.");

	assert_eq!(
		store.get(&key).await.expect("Getting before expiry should succeed."),
		Some("3".into())
	);

	tokio::time::sleep(StdDuration::from_millis(1_100)).await;

	assert_eq!(
		store.get(&key).await.expect("Getting after expiry should succeed."),
		None,
		"an expired entry must behave as absent"
	);
}

#[tokio::test]
async fn take_is_first_winner_only() {
	let store = make_store();
	let key = StoreKey::new("csrf", ["sess-2", "salt-b"]);

	store
		.put(&key, "marker".into(), Duration::seconds(300))
		.await
		.expect("Putting the marker should succeed.");

	assert_eq!(
		store.take(&key).await.expect("First take should succeed."),
		Some("marker".into())
	);
	assert_eq!(store.take(&key).await.expect("Second take should succeed."), None);
	assert_eq!(store.get(&key).await.expect("Get after take should succeed."), None);
}

#[tokio::test]
async fn failing_store_reports_backend_errors() {
	let store: Arc<dyn TtlStore> = Arc::new(FailingStore);
	let key = StoreKey::new("csrf", ["sess-3", "salt-c"]);

	assert!(store.get(&key).await.is_err());
	assert!(store.put(&key, "x".into(), Duration::seconds(1)).await.is_err());
	assert!(store.delete(&key).await.is_err());
	assert!(store.take(&key).await.is_err());
}
