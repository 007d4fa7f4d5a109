//! Session-bound, short-lived, single-use CSRF tokens.
//!
//! A token is the three-part string `salt.issuedAtMillis.signature`, signed over the canonical
//! message `sessionId:salt:issuedAtMillis`. Binding to the session stops a token stolen from one
//! session being replayed against another; the TTL bounds the exposure window; the store-backed
//! consumption marker makes each token single-use.
//!
//! Validation degrades deliberately when no store is reachable: signature and age checks still
//! run, replay protection is skipped, and the decision says so. A store outage must not lock
//! every user out of mutating requests.

// self
use crate::{
	_prelude::*,
	id::SessionId,
	obs::{CheckKind, CheckOutcome, CheckSpan, record_check_outcome, warn_degraded},
	sign::{self, SigningKey},
	store::{StoreKey, TtlStore},
};

const STORE_NAMESPACE: &str = "csrf";

/// Default token lifetime.
pub const DEFAULT_CSRF_TTL: Duration = Duration::seconds(300);

/// Parsed CSRF token.
///
/// The issuance timestamp is kept in the millisecond form that travels on the wire so that
/// re-rendering and re-signing are exact inverses of parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrfToken {
	salt: String,
	issued_at_millis: i64,
	signature: String,
}
impl CsrfToken {
	/// Parses the wire form `salt.issuedAtMillis.signature`.
	pub fn parse(raw: &str) -> Result<Self, CsrfRejection> {
		let mut parts = raw.split('.');
		let (Some(salt), Some(millis), Some(signature), None) =
			(parts.next(), parts.next(), parts.next(), parts.next())
		else {
			return Err(CsrfRejection::Malformed);
		};

		if salt.is_empty() || signature.is_empty() {
			return Err(CsrfRejection::Malformed);
		}

		let issued_at_millis = millis.parse::<i64>().map_err(|_| CsrfRejection::Malformed)?;

		Ok(Self {
			salt: salt.to_owned(),
			issued_at_millis,
			signature: signature.to_owned(),
		})
	}

	/// Per-issuance random salt.
	pub fn salt(&self) -> &str {
		&self.salt
	}

	/// Issuance timestamp embedded in the token, in unix milliseconds.
	pub fn issued_at_millis(&self) -> i64 {
		self.issued_at_millis
	}

	/// Hex HMAC signature component.
	pub fn signature(&self) -> &str {
		&self.signature
	}

	fn is_expired_at(&self, now: OffsetDateTime, ttl: Duration) -> bool {
		unix_millis(now) - self.issued_at_millis > ttl.whole_milliseconds() as i64
	}
}
impl Display for CsrfToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}.{}.{}", self.salt, self.issued_at_millis, self.signature)
	}
}

/// Reasons a token is refused.
///
/// The variants exist for diagnostics and logging; callers should collapse them into one
/// uniform client-facing refusal rather than branching on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum CsrfRejection {
	/// No token accompanied the request.
	#[error("CSRF token is missing.")]
	MissingToken,
	/// No session identifier accompanied the request.
	#[error("Session identifier is missing.")]
	MissingSession,
	/// The token is not a well-formed three-part string.
	#[error("CSRF token format is invalid.")]
	Malformed,
	/// The token's age exceeds the configured TTL.
	#[error("CSRF token has expired.")]
	Expired,
	/// The recomputed signature does not match.
	#[error("CSRF token signature mismatch.")]
	SignatureMismatch,
	/// No unconsumed record exists; the token was already used or never issued.
	#[error("CSRF token was already used or is unknown.")]
	AlreadyUsed,
}

/// Outcome of a validation attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CsrfDecision {
	/// Token accepted with one-time consumption enforced by the store.
	Accepted,
	/// Token accepted on signature + age alone because no store was reachable; replay
	/// protection was skipped.
	AcceptedDegraded,
	/// Token refused.
	Rejected(CsrfRejection),
}
impl CsrfDecision {
	/// Returns `true` when the request may proceed.
	pub fn is_accepted(&self) -> bool {
		matches!(self, CsrfDecision::Accepted | CsrfDecision::AcceptedDegraded)
	}

	/// Returns the rejection reason, if the token was refused.
	pub fn rejection(&self) -> Option<CsrfRejection> {
		match self {
			CsrfDecision::Rejected(rejection) => Some(*rejection),
			_ => None,
		}
	}
}

/// Issues and validates session-bound single-use tokens.
pub struct CsrfGuard {
	key: SigningKey,
	ttl: Duration,
	store: Option<Arc<dyn TtlStore>>,
}
impl CsrfGuard {
	/// Creates a guard with the default TTL and no consumption store.
	///
	/// Without a store the guard runs permanently degraded (no replay protection); call
	/// [`with_store`](Self::with_store) in any deployment that has cache infrastructure.
	pub fn new(key: SigningKey) -> Self {
		Self { key, ttl: DEFAULT_CSRF_TTL, store: None }
	}

	/// Attaches the consumption store.
	pub fn with_store(mut self, store: Arc<dyn TtlStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Overrides the token TTL.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;

		self
	}

	/// Configured token TTL.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Issues a token for `session` stamped with the current clock.
	pub async fn issue(&self, session: &SessionId) -> Result<CsrfToken> {
		self.issue_at(session, OffsetDateTime::now_utc()).await
	}

	/// Issues a token for `session` stamped with the provided instant.
	///
	/// The consumption marker is written with the token TTL so the store expires it on its
	/// own. A store failure here is logged and tolerated: the token is still returned, since
	/// the caller can always re-request and issuance must not depend on cache availability.
	pub async fn issue_at(&self, session: &SessionId, now: OffsetDateTime) -> Result<CsrfToken> {
		let span = CheckSpan::new(CheckKind::Csrf, "issue");

		record_check_outcome(CheckKind::Csrf, CheckOutcome::Attempt);

		let salt = sign::random_component();
		let issued_at_millis = unix_millis(now);
		let signature =
			sign::sign(&self.key, &canonical_message(session, &salt, issued_at_millis));
		let token = CsrfToken { salt, issued_at_millis, signature };

		match &self.store {
			Some(store) => {
				let key = consumption_key(session, token.salt());
				let write = store.put(&key, issued_at_millis.to_string(), self.ttl);

				match span.instrument(write).await {
					Ok(()) => record_check_outcome(CheckKind::Csrf, CheckOutcome::Accepted),
					Err(error) => {
						warn_degraded(CheckKind::Csrf, &error.to_string());
						record_check_outcome(CheckKind::Csrf, CheckOutcome::Degraded);
					},
				}
			},
			// No marker means no replay protection; the token itself is still sound.
			None => record_check_outcome(CheckKind::Csrf, CheckOutcome::Degraded),
		}

		Ok(token)
	}

	/// Validates a token against the current clock.
	pub async fn validate(
		&self,
		token: Option<&str>,
		session: Option<&SessionId>,
	) -> CsrfDecision {
		self.validate_at(token, session, OffsetDateTime::now_utc()).await
	}

	/// Validates a token against the provided instant.
	///
	/// Checks run in a fixed order: presence, shape, age, signature, then store consumption.
	/// Consumption uses the store's atomic take, so at most one validation of a given token
	/// ever succeeds, even under concurrent attempts.
	pub async fn validate_at(
		&self,
		token: Option<&str>,
		session: Option<&SessionId>,
		now: OffsetDateTime,
	) -> CsrfDecision {
		let span = CheckSpan::new(CheckKind::Csrf, "validate");

		record_check_outcome(CheckKind::Csrf, CheckOutcome::Attempt);

		let Some(raw) = token.filter(|raw| !raw.is_empty()) else {
			return reject(CsrfRejection::MissingToken);
		};
		let Some(session) = session else {
			return reject(CsrfRejection::MissingSession);
		};
		let parsed = match CsrfToken::parse(raw) {
			Ok(parsed) => parsed,
			Err(rejection) => return reject(rejection),
		};

		if parsed.is_expired_at(now, self.ttl) {
			return reject(CsrfRejection::Expired);
		}

		let message = canonical_message(session, parsed.salt(), parsed.issued_at_millis());

		if !sign::verify(&self.key, &message, parsed.signature()) {
			return reject(CsrfRejection::SignatureMismatch);
		}

		let Some(store) = &self.store else {
			record_check_outcome(CheckKind::Csrf, CheckOutcome::Degraded);

			return CsrfDecision::AcceptedDegraded;
		};
		let key = consumption_key(session, parsed.salt());

		match span.instrument(store.take(&key)).await {
			Ok(Some(_)) => {
				record_check_outcome(CheckKind::Csrf, CheckOutcome::Accepted);

				CsrfDecision::Accepted
			},
			Ok(None) => reject(CsrfRejection::AlreadyUsed),
			Err(error) => {
				warn_degraded(CheckKind::Csrf, &error.to_string());
				record_check_outcome(CheckKind::Csrf, CheckOutcome::Degraded);

				CsrfDecision::AcceptedDegraded
			},
		}
	}
}
impl Debug for CsrfGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CsrfGuard")
			.field("ttl", &self.ttl)
			.field("store", &self.store.as_ref().map(|_| ".."))
			.finish()
	}
}

fn reject(rejection: CsrfRejection) -> CsrfDecision {
	record_check_outcome(CheckKind::Csrf, CheckOutcome::Rejected);

	CsrfDecision::Rejected(rejection)
}

fn canonical_message(session: &SessionId, salt: &str, issued_at_millis: i64) -> String {
	format!("{session}:{salt}:{issued_at_millis}")
}

fn consumption_key(session: &SessionId, salt: &str) -> StoreKey {
	StoreKey::new(STORE_NAMESPACE, [session.as_ref(), salt])
}

fn unix_millis(instant: OffsetDateTime) -> i64 {
	(instant.unix_timestamp_nanos() / 1_000_000) as i64
}
