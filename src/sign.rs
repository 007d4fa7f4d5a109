//! Keyed message authentication shared by the CSRF and payment-link services.
//!
//! Signatures are HMAC-SHA256 rendered as fixed-length lowercase hex. Signing is deterministic;
//! uniqueness comes from caller-supplied salts and nonces built with [`random_component`].

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
// self
use crate::_prelude::*;

type HmacSha256 = Hmac<Sha256>;

const RANDOM_COMPONENT_BYTES: usize = 16;

/// Redacted signing secret wrapper keeping key material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey(String);
impl SigningKey {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner key material. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for SigningKey {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for SigningKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SigningKey").field(&"<redacted>").finish()
	}
}
impl Display for SigningKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Computes the HMAC-SHA256 signature of `message` under `key` as lowercase hex.
pub fn sign(key: &SigningKey, message: &str) -> String {
	let mut mac = HmacSha256::new_from_slice(key.expose().as_bytes())
		.expect("HMAC-SHA256 accepts keys of any length.");

	mac.update(message.as_bytes());

	hex::encode(mac.finalize().into_bytes())
}

/// Recomputes the signature for `message` and compares it against `signature` in constant time.
pub fn verify(key: &SigningKey, message: &str, signature: &str) -> bool {
	constant_time_eq(sign(key, message).as_bytes(), signature.as_bytes())
}

/// Compares two byte views without early exit on the first mismatching byte.
///
/// Length inequality short-circuits; the lengths of the values compared here (hex digests) are
/// not secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
	a.ct_eq(b).into()
}

/// Produces a URL-safe random component for salts and nonces.
///
/// The base64url alphabet contains neither `.` nor `|`, so components never collide with the
/// token and canonical-message delimiters.
pub fn random_component() -> String {
	let mut buf = [0_u8; RANDOM_COMPONENT_BYTES];

	rand::rng().fill_bytes(&mut buf);

	URL_SAFE_NO_PAD.encode(buf)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn sign_matches_rfc_4231_case_two() {
		let key = SigningKey::new("Jefe");
		let signature = sign(&key, "what do ya want for nothing?");

		assert_eq!(
			signature,
			"5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
		);
	}

	#[test]
	fn sign_is_deterministic_and_key_sensitive() {
		let key = SigningKey::new("secret-a");
		let other = SigningKey::new("secret-b");

		assert_eq!(sign(&key, "message"), sign(&key, "message"));
		assert_ne!(sign(&key, "message"), sign(&other, "message"));
		assert_ne!(sign(&key, "message"), sign(&key, "massage"));
	}

	#[test]
	fn verify_rejects_tampered_signatures() {
		let key = SigningKey::new("secret");
		let mut signature = sign(&key, "message");

		assert!(verify(&key, "message", &signature));

		let flipped = if signature.ends_with('0') { '1' } else { '0' };

		signature.pop();
		signature.push(flipped);

		assert!(!verify(&key, "message", &signature));
		assert!(!verify(&key, "message", "short"));
	}

	#[test]
	fn constant_time_eq_handles_length_mismatch() {
		assert!(constant_time_eq(b"abc", b"abc"));
		assert!(!constant_time_eq(b"abc", b"abd"));
		assert!(!constant_time_eq(b"abc", b"abcd"));
	}

	#[test]
	fn random_components_are_unique_and_delimiter_free() {
		let a = random_component();
		let b = random_component();

		assert_ne!(a, b);
		assert!(!a.contains('.'));
		assert!(!a.contains('|'));
		assert_eq!(a.len(), 22, "16 bytes of base64url without padding");
	}

	#[test]
	fn key_formatters_redact() {
		let key = SigningKey::new("super-secret");

		assert_eq!(format!("{key:?}"), "SigningKey(\"<redacted>\")");
		assert_eq!(format!("{key}"), "<redacted>");
	}
}
