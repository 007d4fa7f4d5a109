//! Rust’s turnkey request-authenticity layer—session-bound CSRF tokens, tamper-evident payment
//! links, and fixed-window rate limiting in one crate built for edge runtimes.
//!
//! The crate assumes the platform's single-request execution model: no shared in-process state
//! between requests, with every cross-request record (CSRF consumption markers, rate-limit
//! counters) living in a TTL key-value store behind the [`store::TtlStore`] contract.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod csrf;
pub mod error;
pub mod id;
pub mod obs;
pub mod payment;
pub mod rate;
pub mod sign;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience fixtures and store doubles for integration tests; enabled via `cfg(test)` or
	//! the `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::store::{StoreError, StoreFuture, StoreKey, TtlStore};

	/// Store double whose every operation fails with a backend error, used to exercise the
	/// degraded and fail-open paths.
	#[derive(Clone, Debug, Default)]
	pub struct FailingStore;
	impl FailingStore {
		fn unavailable<T>() -> Result<T, StoreError> {
			Err(StoreError::Backend { message: "store unavailable".into() })
		}
	}
	impl TtlStore for FailingStore {
		fn get<'a>(&'a self, _key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
			Box::pin(async { Self::unavailable() })
		}

		fn put<'a>(
			&'a self,
			_key: &'a StoreKey,
			_value: String,
			_ttl: Duration,
		) -> StoreFuture<'a, ()> {
			Box::pin(async { Self::unavailable() })
		}

		fn delete<'a>(&'a self, _key: &'a StoreKey) -> StoreFuture<'a, ()> {
			Box::pin(async { Self::unavailable() })
		}

		fn take<'a>(&'a self, _key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
			Box::pin(async { Self::unavailable() })
		}
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::RwLock;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
pub use url;
#[cfg(test)] use guardpost as _;
