//! Fixed-window rate limiting over the TTL key-value store.
//!
//! Windows are aligned to `now - (now % window)`, so bursts straddling a window edge can see up
//! to double the budget; that imprecision is accepted. The counter increment is read-then-put
//! rather than atomic for the same reason: the limiter is a throttle, not a security boundary,
//! and slight overshoot under race is tolerable. When the store is unavailable the limiter
//! fails open: availability wins over strict throttling.

// crates.io
use http::{HeaderName, HeaderValue, Response, StatusCode, header};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	obs::{CheckKind, CheckOutcome, CheckSpan, record_check_outcome, warn_degraded},
	store::{StoreKey, TtlStore},
};

const STORE_NAMESPACE: &str = "rate";

/// Budget for one named operation: `max_requests` per `window_secs`-second fixed window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePolicy {
	/// Window length in seconds.
	pub window_secs: u64,
	/// Requests allowed per window.
	pub max_requests: u32,
}
impl RatePolicy {
	/// Creates a policy from a window length and request budget.
	pub fn new(max_requests: u32, window_secs: u64) -> Self {
		Self { window_secs, max_requests }
	}

	/// Window length as a [`Duration`].
	pub fn window(&self) -> Duration {
		Duration::seconds(self.window_secs as i64)
	}
}

/// Named operations the default policy table covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateOperation {
	/// Sign-in attempts.
	Login,
	/// Account registration.
	Registration,
	/// Comment submission.
	Comment,
	/// AI-assisted features.
	Ai,
	/// Generic API access.
	Api,
}
impl RateOperation {
	/// Returns a stable label suitable for store keys and log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RateOperation::Login => "login",
			RateOperation::Registration => "registration",
			RateOperation::Comment => "comment",
			RateOperation::Ai => "ai",
			RateOperation::Api => "api",
		}
	}
}
impl Display for RateOperation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Externalized policy table mapping named operations to budgets.
///
/// This is configuration, not logic: deployments override it wholesale via
/// [`from_json_str`](Self::from_json_str) or field by field through serde defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePolicySet {
	/// Budget for sign-in attempts.
	#[serde(default = "default_login")]
	pub login: RatePolicy,
	/// Budget for account registration.
	#[serde(default = "default_registration")]
	pub registration: RatePolicy,
	/// Budget for comment submission.
	#[serde(default = "default_comment")]
	pub comment: RatePolicy,
	/// Budget for AI-assisted features.
	#[serde(default = "default_ai")]
	pub ai: RatePolicy,
	/// Budget for generic API access.
	#[serde(default = "default_api")]
	pub api: RatePolicy,
}
impl RatePolicySet {
	/// Parses a policy table from JSON, filling omitted operations with defaults.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		serde_json::from_str(raw).map_err(|source| ConfigError::PolicyTable { source })
	}

	/// Looks up the budget for a named operation.
	pub fn policy(&self, operation: RateOperation) -> RatePolicy {
		match operation {
			RateOperation::Login => self.login,
			RateOperation::Registration => self.registration,
			RateOperation::Comment => self.comment,
			RateOperation::Ai => self.ai,
			RateOperation::Api => self.api,
		}
	}
}
impl Default for RatePolicySet {
	fn default() -> Self {
		Self {
			login: default_login(),
			registration: default_registration(),
			comment: default_comment(),
			ai: default_ai(),
			api: default_api(),
		}
	}
}

fn default_login() -> RatePolicy {
	RatePolicy::new(5, 300)
}

fn default_registration() -> RatePolicy {
	RatePolicy::new(3, 3_600)
}

fn default_comment() -> RatePolicy {
	RatePolicy::new(10, 60)
}

fn default_ai() -> RatePolicy {
	RatePolicy::new(10, 60)
}

fn default_api() -> RatePolicy {
	RatePolicy::new(60, 60)
}

/// Outcome of a rate-limit check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RateDecision {
	/// Whether the request may proceed.
	pub allowed: bool,
	/// Budget left in the current window after this request.
	pub remaining: u32,
	/// Instant the current window ends and the counter resets.
	pub resets_at: OffsetDateTime,
	/// How long a limited caller should wait; present only when `allowed` is false.
	pub retry_after: Option<Duration>,
}

/// Fixed-window counter over a [`TtlStore`].
pub struct RateLimiter {
	store: Arc<dyn TtlStore>,
}
impl RateLimiter {
	/// Creates a limiter over the provided store.
	pub fn new(store: Arc<dyn TtlStore>) -> Self {
		Self { store }
	}

	/// Checks and consumes budget for `key` against the current clock.
	pub async fn check(&self, key: &str, policy: &RatePolicy) -> RateDecision {
		self.check_at(key, policy, OffsetDateTime::now_utc()).await
	}

	/// Checks and consumes budget for `key` against the provided instant.
	pub async fn check_at(
		&self,
		key: &str,
		policy: &RatePolicy,
		now: OffsetDateTime,
	) -> RateDecision {
		let span = CheckSpan::new(CheckKind::RateLimit, "check");

		record_check_outcome(CheckKind::RateLimit, CheckOutcome::Attempt);

		let window = policy.window_secs.max(1) as i64;
		let now_secs = now.unix_timestamp();
		let window_start = now_secs - now_secs.rem_euclid(window);
		let resets_at = now + Duration::seconds(window - now_secs.rem_euclid(window));
		let counter_key =
			StoreKey::new(STORE_NAMESPACE, [key, window_start.to_string().as_str()]);
		let current = match span.instrument(self.store.get(&counter_key)).await {
			Ok(value) => value.and_then(|raw| raw.parse::<u32>().ok()).unwrap_or(0),
			Err(error) => return fail_open(policy, resets_at, &error.to_string()),
		};

		if current >= policy.max_requests {
			record_check_outcome(CheckKind::RateLimit, CheckOutcome::Rejected);

			return RateDecision {
				allowed: false,
				remaining: 0,
				resets_at,
				retry_after: Some(resets_at - now),
			};
		}

		let write =
			self.store.put(&counter_key, (current + 1).to_string(), policy.window());

		if let Err(error) = span.instrument(write).await {
			return fail_open(policy, resets_at, &error.to_string());
		}

		record_check_outcome(CheckKind::RateLimit, CheckOutcome::Accepted);

		RateDecision {
			allowed: true,
			remaining: policy.max_requests - current - 1,
			resets_at,
			retry_after: None,
		}
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter").finish()
	}
}

fn fail_open(policy: &RatePolicy, resets_at: OffsetDateTime, detail: &str) -> RateDecision {
	warn_degraded(CheckKind::RateLimit, detail);
	record_check_outcome(CheckKind::RateLimit, CheckOutcome::Degraded);

	RateDecision {
		allowed: true,
		remaining: policy.max_requests,
		resets_at,
		retry_after: None,
	}
}

/// Builds the standard rate-limit response headers for a decision.
///
/// Always emits `X-RateLimit-Limit`, `X-RateLimit-Remaining`, and `X-RateLimit-Reset`
/// (unix seconds); adds `Retry-After` when the request was limited.
pub fn rate_limit_headers(
	policy: &RatePolicy,
	decision: &RateDecision,
) -> Vec<(HeaderName, HeaderValue)> {
	let mut headers = vec![
		(HeaderName::from_static("x-ratelimit-limit"), HeaderValue::from(policy.max_requests)),
		(HeaderName::from_static("x-ratelimit-remaining"), HeaderValue::from(decision.remaining)),
		(
			HeaderName::from_static("x-ratelimit-reset"),
			HeaderValue::from(decision.resets_at.unix_timestamp()),
		),
	];

	if let Some(retry_after) = decision.retry_after {
		headers.push((
			header::RETRY_AFTER,
			HeaderValue::from(retry_after.whole_seconds().max(0)),
		));
	}

	headers
}

/// Builds a standard `429 Too Many Requests` response carrying the rate-limit headers and a
/// small JSON body.
pub fn too_many_requests(policy: &RatePolicy, decision: &RateDecision) -> Response<String> {
	let body = serde_json::json!({
		"error": "Too many requests.",
		"retryAfter": decision.retry_after.map(|delay| delay.whole_seconds().max(0)),
	})
	.to_string();
	let mut builder = Response::builder()
		.status(StatusCode::TOO_MANY_REQUESTS)
		.header(header::CONTENT_TYPE, "application/json");

	for (name, value) in rate_limit_headers(policy, decision) {
		builder = builder.header(name, value);
	}

	builder.body(body).expect("Static status and prevalidated headers cannot fail to build.")
}
