//! TTL key-value storage contract and built-in store implementations.
//!
//! All cross-request state (CSRF consumption markers, rate-limit counters) lives behind
//! [`TtlStore`]. Production deployments adapt their platform cache (Redis, an edge KV, etc.);
//! [`MemoryStore`] covers tests and single-process setups.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`TtlStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract with per-key expiry.
///
/// Implementations must honor TTLs (an expired entry behaves as absent) and must make
/// [`take`](TtlStore::take) atomic: concurrent takers of the same key observe at most one
/// `Some` result. That primitive is what gives CSRF tokens their exactly-once consumption.
pub trait TtlStore
where
	Self: Send + Sync,
{
	/// Fetches the live value for `key`, if present and unexpired.
	fn get<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>>;

	/// Writes `value` under `key`, replacing any previous entry, expiring after `ttl`.
	fn put<'a>(&'a self, key: &'a StoreKey, value: String, ttl: Duration) -> StoreFuture<'a, ()>;

	/// Removes the entry for `key`, if any.
	fn delete<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, ()>;

	/// Atomically removes and returns the live value for `key`.
	fn take<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>>;
}

/// Error type produced by [`TtlStore`] implementations.
///
/// The guard services treat every variant as "store unavailable" and apply their documented
/// fallbacks: CSRF validation degrades to signature+age checks, the rate limiter fails open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// The store did not answer within the adapter's deadline.
	///
	/// Adapters must bound every call with a timeout and surface it as this variant rather
	/// than hanging the request.
	#[error("Store call timed out after {elapsed_ms}ms.")]
	Timeout {
		/// Elapsed milliseconds before the deadline fired.
		elapsed_ms: u64,
	},
}

/// Namespaced key identifying a stored entry.
///
/// Rendered as `namespace:part:part…`; parts built from [`crate::id`] identifiers and
/// [`crate::sign::random_component`] values cannot themselves contain `:` ambiguity in
/// practice, and namespaces keep the services' keyspaces disjoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey(String);
impl StoreKey {
	/// Builds a key from a namespace and its ordered parts.
	pub fn new<I, P>(namespace: &str, parts: I) -> Self
	where
		I: IntoIterator<Item = P>,
		P: AsRef<str>,
	{
		let mut raw = String::from(namespace);

		for part in parts {
			raw.push(':');
			raw.push_str(part.as_ref());
		}

		Self(raw)
	}
}
impl AsRef<str> for StoreKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Display for StoreKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
