//! Crate-level error types shared across the guard services, configuration, and stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
///
/// Verification failures are not errors: the CSRF and payment services report them as decision
/// values so callers must branch explicitly. [`Error`] covers the conditions that prevent a
/// decision from being made at all.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Identifier validation failure.
	#[error(transparent)]
	Identifier(#[from] crate::id::IdentifierError),
}

/// Configuration and validation failures raised at startup.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required secret variable is absent from the environment.
	///
	/// No baked-in fallback exists; a process without its secrets must refuse to start.
	#[error("Required secret `{var}` is not configured.")]
	MissingSecret {
		/// Environment variable name.
		var: &'static str,
	},
	/// A secret variable is present but empty.
	#[error("Secret `{var}` must not be empty.")]
	EmptySecret {
		/// Environment variable name.
		var: &'static str,
	},
	/// A TTL/window variable could not be parsed as whole seconds.
	#[error("`{var}` must be a whole number of seconds.")]
	InvalidDuration {
		/// Environment variable name.
		var: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: std::num::ParseIntError,
	},
	/// A duration variable parsed but is not a positive number of seconds.
	#[error("`{var}` must be positive.")]
	NonPositiveDuration {
		/// Environment variable name.
		var: &'static str,
	},
	/// The externalized rate-policy table could not be parsed.
	#[error("Rate-policy table is not valid JSON.")]
	PolicyTable {
		/// Underlying parsing failure.
		#[source]
		source: serde_json::Error,
	},
}
