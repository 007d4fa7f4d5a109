//! Optional observability helpers for guard checks.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `guardpost.check` with the `check` (service)
//!   and `stage` (call site) fields.
//! - Enable `metrics` to increment the `guardpost_check_total` counter for every
//!   attempt/accept/reject, labeled by `check` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Guard checks observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheckKind {
	/// CSRF token issuance and validation.
	Csrf,
	/// Payment callback-link signing and verification.
	PaymentLink,
	/// Fixed-window rate limiting.
	RateLimit,
}
impl CheckKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CheckKind::Csrf => "csrf",
			CheckKind::PaymentLink => "payment_link",
			CheckKind::RateLimit => "rate_limit",
		}
	}
}
impl Display for CheckKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheckOutcome {
	/// Entry to a guard operation.
	Attempt,
	/// The check passed with full protections applied.
	Accepted,
	/// The check failed and the request must be refused.
	Rejected,
	/// The check passed, but with reduced protection because the store was unavailable.
	Degraded,
}
impl CheckOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CheckOutcome::Attempt => "attempt",
			CheckOutcome::Accepted => "accepted",
			CheckOutcome::Rejected => "rejected",
			CheckOutcome::Degraded => "degraded",
		}
	}
}
impl Display for CheckOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
