//! Tamper-evident payment callback links.
//!
//! A signed link carries `order_no`, `nonce`, `ts`, and `sig` query parameters, with the
//! signature computed over the canonical message `orderNo|amountMinor|userId|nonce|timestamp`
//! (unix seconds). Field order and the `|` delimiter are fixed: the verifier reconstructs the
//! message byte-for-byte, taking amount and user from the server-side order record rather than
//! trusting anything in the URL.
//!
//! Signatures are stateless: validity is a pure function of the inputs plus a freshness window.
//! The nonce is not tracked server-side, so a captured link stays replayable until the window
//! lapses; order-status transitions are expected to be idempotent within it.

// self
use crate::{
	_prelude::*,
	id::{OrderNo, UserId},
	obs::{CheckKind, CheckOutcome, CheckSpan, record_check_outcome, warn_degraded},
	sign::{self, SigningKey},
};

const PARAM_ORDER_NO: &str = "order_no";
const PARAM_NONCE: &str = "nonce";
const PARAM_TIMESTAMP: &str = "ts";
const PARAM_SIGNATURE: &str = "sig";

/// Default signature freshness window.
pub const DEFAULT_PAYMENT_VALIDITY: Duration = Duration::seconds(300);

/// Server-side facts about an order, fetched from the order record.
///
/// Amounts are integral minor units (cents); verification never parses an amount out of the
/// callback URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentClaims {
	/// Order number the callback settles.
	pub order_no: OrderNo,
	/// Order amount in minor currency units.
	pub amount_minor: u64,
	/// User the order belongs to.
	pub user_id: UserId,
}
impl PaymentClaims {
	/// Bundles the server-side facts for signing or verification.
	pub fn new(order_no: OrderNo, amount_minor: u64, user_id: UserId) -> Self {
		Self { order_no, amount_minor, user_id }
	}
}

/// Policy for callbacks that arrive without any signature parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnsignedCallbackPolicy {
	/// Refuse unsigned callbacks.
	#[default]
	Reject,
	/// Accept unsigned callbacks, logging the access; legacy/testing escape hatch that must be
	/// enabled explicitly.
	Tolerate,
}

/// Reasons a callback is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum PaymentRejection {
	/// The callback carried no signature parameters and policy refuses unsigned access.
	#[error("Payment callback is unsigned.")]
	MissingSignature,
	/// The callback carried a partial or unparsable parameter set.
	#[error("Payment callback parameters are malformed.")]
	Malformed,
	/// The signature timestamp is older than the validity window.
	#[error("Payment signature has expired.")]
	Stale,
	/// The recomputed signature does not match.
	#[error("Payment signature mismatch.")]
	SignatureMismatch,
}

/// Outcome of a verification attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PaymentDecision {
	/// Signature verified against the server-side order facts.
	Accepted,
	/// Unsigned callback tolerated by explicit policy; the access was logged.
	AcceptedUnsigned,
	/// Callback refused.
	Rejected(PaymentRejection),
}
impl PaymentDecision {
	/// Returns `true` when the callback may proceed.
	pub fn is_accepted(&self) -> bool {
		matches!(self, PaymentDecision::Accepted | PaymentDecision::AcceptedUnsigned)
	}

	/// Returns the rejection reason, if the callback was refused.
	pub fn rejection(&self) -> Option<PaymentRejection> {
		match self {
			PaymentDecision::Rejected(rejection) => Some(*rejection),
			_ => None,
		}
	}
}

/// Signature triple extracted from a callback URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackProof {
	/// Random nonce minted at signing time.
	pub nonce: String,
	/// Signing timestamp in unix seconds.
	pub timestamp: i64,
	/// Hex HMAC signature.
	pub signature: String,
}

/// Parameters a payment-completion request arrived with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentCallback {
	/// Order number, used by the route handler to fetch the order record.
	pub order_no: OrderNo,
	/// Signature triple; `None` for legacy unsigned callbacks.
	pub proof: Option<CallbackProof>,
}
impl PaymentCallback {
	/// Extracts callback parameters from a request URL.
	///
	/// The signature triple must arrive complete or not at all; a partial triple is malformed
	/// rather than "unsigned".
	pub fn from_url(url: &Url) -> Result<Self, PaymentRejection> {
		let mut order_no = None;
		let mut nonce = None;
		let mut timestamp = None;
		let mut signature = None;

		for (name, value) in url.query_pairs() {
			match name.as_ref() {
				PARAM_ORDER_NO => order_no = Some(value.into_owned()),
				PARAM_NONCE => nonce = Some(value.into_owned()),
				PARAM_TIMESTAMP => timestamp = Some(value.into_owned()),
				PARAM_SIGNATURE => signature = Some(value.into_owned()),
				_ => {},
			}
		}

		let order_no = order_no
			.and_then(|raw| OrderNo::new(raw).ok())
			.ok_or(PaymentRejection::Malformed)?;
		let proof = match (nonce, timestamp, signature) {
			(None, None, None) => None,
			(Some(nonce), Some(timestamp), Some(signature)) => {
				let timestamp =
					timestamp.parse::<i64>().map_err(|_| PaymentRejection::Malformed)?;

				Some(CallbackProof { nonce, timestamp, signature })
			},
			_ => return Err(PaymentRejection::Malformed),
		};

		Ok(Self { order_no, proof })
	}
}

/// Signs and verifies payment callback links.
pub struct PaymentLinkSigner {
	key: SigningKey,
	validity: Duration,
	unsigned_policy: UnsignedCallbackPolicy,
}
impl PaymentLinkSigner {
	/// Creates a signer with the default validity window and unsigned callbacks refused.
	pub fn new(key: SigningKey) -> Self {
		Self {
			key,
			validity: DEFAULT_PAYMENT_VALIDITY,
			unsigned_policy: UnsignedCallbackPolicy::default(),
		}
	}

	/// Overrides the signature freshness window.
	pub fn with_validity(mut self, validity: Duration) -> Self {
		self.validity = validity;

		self
	}

	/// Overrides the unsigned-callback policy.
	pub fn with_unsigned_policy(mut self, policy: UnsignedCallbackPolicy) -> Self {
		self.unsigned_policy = policy;

		self
	}

	/// Configured freshness window.
	pub fn validity(&self) -> Duration {
		self.validity
	}

	/// Builds a signed callback URL stamped with the current clock.
	pub fn sign_url(&self, base: &Url, claims: &PaymentClaims) -> Url {
		self.sign_url_at(base, claims, OffsetDateTime::now_utc())
	}

	/// Builds a signed callback URL stamped with the provided instant.
	pub fn sign_url_at(&self, base: &Url, claims: &PaymentClaims, now: OffsetDateTime) -> Url {
		let _guard = CheckSpan::new(CheckKind::PaymentLink, "sign").entered();

		record_check_outcome(CheckKind::PaymentLink, CheckOutcome::Attempt);

		let nonce = sign::random_component();
		let timestamp = now.unix_timestamp();
		let signature =
			sign::sign(&self.key, &canonical_message(claims, &nonce, timestamp));
		let mut url = base.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair(PARAM_ORDER_NO, claims.order_no.as_ref());
		pairs.append_pair(PARAM_NONCE, &nonce);
		pairs.append_pair(PARAM_TIMESTAMP, &timestamp.to_string());
		pairs.append_pair(PARAM_SIGNATURE, &signature);

		drop(pairs);
		record_check_outcome(CheckKind::PaymentLink, CheckOutcome::Accepted);

		url
	}

	/// Verifies a callback against the current clock.
	pub fn verify(&self, callback: &PaymentCallback, claims: &PaymentClaims) -> PaymentDecision {
		self.verify_at(callback, claims, OffsetDateTime::now_utc())
	}

	/// Verifies a callback against the provided instant.
	///
	/// `claims` must come from the order record; the canonical message is rebuilt from those
	/// server-side facts plus the callback's nonce and timestamp.
	pub fn verify_at(
		&self,
		callback: &PaymentCallback,
		claims: &PaymentClaims,
		now: OffsetDateTime,
	) -> PaymentDecision {
		let _guard = CheckSpan::new(CheckKind::PaymentLink, "verify").entered();

		record_check_outcome(CheckKind::PaymentLink, CheckOutcome::Attempt);

		let Some(proof) = &callback.proof else {
			return match self.unsigned_policy {
				UnsignedCallbackPolicy::Reject => reject(PaymentRejection::MissingSignature),
				UnsignedCallbackPolicy::Tolerate => {
					warn_degraded(CheckKind::PaymentLink, "unsigned callback tolerated");
					record_check_outcome(CheckKind::PaymentLink, CheckOutcome::Degraded);

					PaymentDecision::AcceptedUnsigned
				},
			};
		};

		if now.unix_timestamp() - proof.timestamp > self.validity.whole_seconds() {
			return reject(PaymentRejection::Stale);
		}

		let message = canonical_message(claims, &proof.nonce, proof.timestamp);

		if !sign::verify(&self.key, &message, &proof.signature) {
			return reject(PaymentRejection::SignatureMismatch);
		}

		record_check_outcome(CheckKind::PaymentLink, CheckOutcome::Accepted);

		PaymentDecision::Accepted
	}
}
impl Debug for PaymentLinkSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PaymentLinkSigner")
			.field("validity", &self.validity)
			.field("unsigned_policy", &self.unsigned_policy)
			.finish()
	}
}

fn reject(rejection: PaymentRejection) -> PaymentDecision {
	record_check_outcome(CheckKind::PaymentLink, CheckOutcome::Rejected);

	PaymentDecision::Rejected(rejection)
}

fn canonical_message(claims: &PaymentClaims, nonce: &str, timestamp: i64) -> String {
	format!(
		"{}|{}|{}|{}|{}",
		claims.order_no, claims.amount_minor, claims.user_id, nonce, timestamp
	)
}
