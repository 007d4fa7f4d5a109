//! Environment-backed configuration for the guard services.
//!
//! Secrets are mandatory: resolution fails when `CSRF_SECRET` or `PAYMENT_SECRET` is absent or
//! empty. There is no fallback secret; a publicly known default would turn every signature into
//! decoration, so a misconfigured process must refuse to start instead.

// std
use std::env;
// self
use crate::{
	_prelude::*,
	csrf::{CsrfGuard, DEFAULT_CSRF_TTL},
	error::ConfigError,
	payment::{DEFAULT_PAYMENT_VALIDITY, PaymentLinkSigner, UnsignedCallbackPolicy},
	rate::{RateLimiter, RatePolicySet},
	sign::SigningKey,
	store::TtlStore,
};

/// HMAC key for CSRF tokens (required).
pub const CSRF_SECRET_VAR: &str = "CSRF_SECRET";
/// HMAC key for payment links (required).
pub const PAYMENT_SECRET_VAR: &str = "PAYMENT_SECRET";
/// CSRF token TTL override in whole seconds (optional).
pub const CSRF_TTL_VAR: &str = "CSRF_TOKEN_TTL_SECS";
/// Payment signature validity override in whole seconds (optional).
pub const PAYMENT_VALIDITY_VAR: &str = "PAYMENT_SIG_TTL_SECS";
/// Opt-in flag (`1`/`true`) tolerating unsigned payment callbacks (optional).
pub const UNSIGNED_CALLBACKS_VAR: &str = "ALLOW_UNSIGNED_PAYMENT_CALLBACKS";
/// JSON rate-policy table override (optional).
pub const RATE_POLICIES_VAR: &str = "RATE_LIMIT_POLICIES";

/// Resolved configuration for the three guard services.
#[derive(Clone, Debug)]
pub struct GuardConfig {
	/// HMAC key for CSRF tokens.
	pub csrf_secret: SigningKey,
	/// HMAC key for payment links.
	pub payment_secret: SigningKey,
	/// CSRF token lifetime.
	pub csrf_ttl: Duration,
	/// Payment signature freshness window.
	pub payment_validity: Duration,
	/// Policy for unsigned payment callbacks.
	pub unsigned_callbacks: UnsignedCallbackPolicy,
	/// Named rate-limit budgets.
	pub rate_policies: RatePolicySet,
}
impl GuardConfig {
	/// Creates a configuration from explicit secrets, with every other knob at its default.
	pub fn new(csrf_secret: SigningKey, payment_secret: SigningKey) -> Self {
		Self {
			csrf_secret,
			payment_secret,
			csrf_ttl: DEFAULT_CSRF_TTL,
			payment_validity: DEFAULT_PAYMENT_VALIDITY,
			unsigned_callbacks: UnsignedCallbackPolicy::default(),
			rate_policies: RatePolicySet::default(),
		}
	}

	/// Resolves configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		let csrf_secret = require_secret(CSRF_SECRET_VAR)?;
		let payment_secret = require_secret(PAYMENT_SECRET_VAR)?;
		let mut config = Self::new(csrf_secret, payment_secret);

		if let Some(ttl) = optional_duration(CSRF_TTL_VAR)? {
			config.csrf_ttl = ttl;
		}
		if let Some(validity) = optional_duration(PAYMENT_VALIDITY_VAR)? {
			config.payment_validity = validity;
		}
		if flag_enabled(UNSIGNED_CALLBACKS_VAR) {
			config.unsigned_callbacks = UnsignedCallbackPolicy::Tolerate;
		}
		if let Ok(raw) = env::var(RATE_POLICIES_VAR) {
			config.rate_policies = RatePolicySet::from_json_str(&raw)?;
		}

		Ok(config)
	}

	/// Overrides the CSRF token lifetime.
	pub fn with_csrf_ttl(mut self, ttl: Duration) -> Self {
		self.csrf_ttl = ttl;

		self
	}

	/// Overrides the payment signature freshness window.
	pub fn with_payment_validity(mut self, validity: Duration) -> Self {
		self.payment_validity = validity;

		self
	}

	/// Overrides the unsigned-callback policy.
	pub fn with_unsigned_callbacks(mut self, policy: UnsignedCallbackPolicy) -> Self {
		self.unsigned_callbacks = policy;

		self
	}

	/// Overrides the rate-policy table.
	pub fn with_rate_policies(mut self, policies: RatePolicySet) -> Self {
		self.rate_policies = policies;

		self
	}

	/// Wires a [`CsrfGuard`] over the provided consumption store.
	pub fn csrf_guard(&self, store: Arc<dyn TtlStore>) -> CsrfGuard {
		CsrfGuard::new(self.csrf_secret.clone()).with_ttl(self.csrf_ttl).with_store(store)
	}

	/// Wires a [`PaymentLinkSigner`].
	pub fn payment_signer(&self) -> PaymentLinkSigner {
		PaymentLinkSigner::new(self.payment_secret.clone())
			.with_validity(self.payment_validity)
			.with_unsigned_policy(self.unsigned_callbacks)
	}

	/// Wires a [`RateLimiter`] over the provided counter store.
	pub fn rate_limiter(&self, store: Arc<dyn TtlStore>) -> RateLimiter {
		RateLimiter::new(store)
	}
}

fn require_secret(var: &'static str) -> Result<SigningKey, ConfigError> {
	match env::var(var) {
		Err(_) => Err(ConfigError::MissingSecret { var }),
		Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptySecret { var }),
		Ok(value) => Ok(SigningKey::new(value)),
	}
}

fn optional_duration(var: &'static str) -> Result<Option<Duration>, ConfigError> {
	let Ok(raw) = env::var(var) else {
		return Ok(None);
	};
	let secs = raw
		.trim()
		.parse::<i64>()
		.map_err(|source| ConfigError::InvalidDuration { var, source })?;

	if secs <= 0 {
		return Err(ConfigError::NonPositiveDuration { var });
	}

	Ok(Some(Duration::seconds(secs)))
}

fn flag_enabled(var: &'static str) -> bool {
	env::var(var).is_ok_and(|raw| matches!(raw.trim(), "1" | "true" | "TRUE" | "True"))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn explicit_construction_uses_documented_defaults() {
		let config =
			GuardConfig::new(SigningKey::new("csrf-secret"), SigningKey::new("pay-secret"));

		assert_eq!(config.csrf_ttl, DEFAULT_CSRF_TTL);
		assert_eq!(config.payment_validity, DEFAULT_PAYMENT_VALIDITY);
		assert_eq!(config.unsigned_callbacks, UnsignedCallbackPolicy::Reject);
		assert_eq!(config.rate_policies, RatePolicySet::default());
	}

	#[test]
	fn builder_overrides_apply() {
		let config =
			GuardConfig::new(SigningKey::new("csrf-secret"), SigningKey::new("pay-secret"))
				.with_csrf_ttl(Duration::seconds(60))
				.with_payment_validity(Duration::seconds(120))
				.with_unsigned_callbacks(UnsignedCallbackPolicy::Tolerate);

		assert_eq!(config.csrf_ttl, Duration::seconds(60));
		assert_eq!(config.payment_validity, Duration::seconds(120));
		assert_eq!(config.unsigned_callbacks, UnsignedCallbackPolicy::Tolerate);
	}

	#[test]
	fn from_env_requires_both_secrets() {
		// Environment mutation is process-global, so this single test owns the variables it
		// touches and restores them before returning.
		unsafe {
			env::remove_var(CSRF_SECRET_VAR);
			env::remove_var(PAYMENT_SECRET_VAR);
		}

		assert!(matches!(
			GuardConfig::from_env(),
			Err(ConfigError::MissingSecret { var: CSRF_SECRET_VAR })
		));

		unsafe {
			env::set_var(CSRF_SECRET_VAR, "csrf-secret");
			env::set_var(PAYMENT_SECRET_VAR, " ");
		}

		assert!(matches!(
			GuardConfig::from_env(),
			Err(ConfigError::EmptySecret { var: PAYMENT_SECRET_VAR })
		));

		unsafe {
			env::set_var(PAYMENT_SECRET_VAR, "pay-secret");
		}

		let config = GuardConfig::from_env().expect("Both secrets present should resolve.");

		assert_eq!(config.csrf_secret.expose(), "csrf-secret");
		assert_eq!(config.payment_secret.expose(), "pay-secret");

		unsafe {
			env::remove_var(CSRF_SECRET_VAR);
			env::remove_var(PAYMENT_SECRET_VAR);
		}
	}
}
