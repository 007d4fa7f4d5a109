// crates.io
use time::macros;
// self
use guardpost::{
	_preludet::*,
	csrf::{CsrfDecision, CsrfGuard, CsrfRejection, DEFAULT_CSRF_TTL},
	id::SessionId,
	sign::SigningKey,
	store::MemoryStore,
};

fn make_session(raw: &str) -> SessionId {
	SessionId::new(raw).expect("Session fixture should be valid for CSRF lifecycle tests.")
}

fn make_guard(store: Arc<MemoryStore>) -> CsrfGuard {
	CsrfGuard::new(SigningKey::new("csrf-lifecycle-secret")).with_store(store)
}

#[tokio::test]
async fn freshness_boundary_sits_at_the_ttl() {
	let store = Arc::new(MemoryStore::default());
	let guard = make_guard(store.clone());
	let session = make_session("sess-fresh");
	let issued = macros::datetime!(2025-06-01 12:00 UTC);
	let fresh = guard
		.issue_at(&session, issued)
		.await
		.expect("Issuing the fresh-side token should succeed.")
		.to_string();

	assert_eq!(
		guard.validate_at(Some(&fresh), Some(&session), issued + Duration::seconds(299)).await,
		CsrfDecision::Accepted
	);

	let stale = guard
		.issue_at(&session, issued)
		.await
		.expect("Issuing the stale-side token should succeed.")
		.to_string();

	assert_eq!(
		guard.validate_at(Some(&stale), Some(&session), issued + Duration::seconds(301)).await,
		CsrfDecision::Rejected(CsrfRejection::Expired)
	);
}

#[tokio::test]
async fn tokens_are_single_use() {
	let store = Arc::new(MemoryStore::default());
	let guard = make_guard(store.clone());
	let session = make_session("sess-once");
	let token =
		guard.issue(&session).await.expect("Issuing the token should succeed.").to_string();

	assert_eq!(guard.validate(Some(&token), Some(&session)).await, CsrfDecision::Accepted);
	// Signature and age are still fine; only the consumption marker is gone.
	assert_eq!(
		guard.validate(Some(&token), Some(&session)).await,
		CsrfDecision::Rejected(CsrfRejection::AlreadyUsed)
	);
}

#[tokio::test]
async fn tokens_are_bound_to_their_session() {
	let store = Arc::new(MemoryStore::default());
	let guard = make_guard(store.clone());
	let session_a = make_session("sess-a");
	let session_b = make_session("sess-b");
	let token =
		guard.issue(&session_a).await.expect("Issuing for session A should succeed.").to_string();

	assert_eq!(
		guard.validate(Some(&token), Some(&session_b)).await,
		CsrfDecision::Rejected(CsrfRejection::SignatureMismatch)
	);
	assert_eq!(
		guard.validate(Some(&token), Some(&session_a)).await,
		CsrfDecision::Accepted,
		"the failed cross-session attempt must not consume the token"
	);
}

#[tokio::test]
async fn flipping_any_signature_character_invalidates() {
	let store = Arc::new(MemoryStore::default());
	let guard = make_guard(store.clone());
	let session = make_session("sess-flip");
	let token =
		guard.issue(&session).await.expect("Issuing the token should succeed.").to_string();
	let (prefix, signature) =
		token.rsplit_once('.').expect("Token wire form should contain a signature part.");

	for position in [0, signature.len() / 2, signature.len() - 1] {
		let mut flipped: Vec<char> = signature.chars().collect();

		flipped[position] = if flipped[position] == '0' { '1' } else { '0' };

		let tampered = format!("{prefix}.{}", flipped.into_iter().collect::<String>());

		assert_eq!(
			guard.validate(Some(&tampered), Some(&session)).await,
			CsrfDecision::Rejected(CsrfRejection::SignatureMismatch),
			"flipping signature byte {position} should invalidate the token"
		);
	}
}

#[tokio::test]
async fn store_outage_degrades_to_signature_and_age() {
	// Issue through a storeless guard so the token exists without any consumption marker,
	// then validate against a store that fails every call.
	let key = SigningKey::new("csrf-lifecycle-secret");
	let issuer = CsrfGuard::new(key.clone());
	let session = make_session("sess-degraded");
	let token =
		issuer.issue(&session).await.expect("Storeless issuance should succeed.").to_string();
	let validator = CsrfGuard::new(key).with_store(Arc::new(FailingStore));

	assert_eq!(
		validator.validate(Some(&token), Some(&session)).await,
		CsrfDecision::AcceptedDegraded,
		"a well-signed fresh token must still be accepted while the store is down"
	);

	// Replay protection is genuinely skipped in degraded mode.
	assert_eq!(
		validator.validate(Some(&token), Some(&session)).await,
		CsrfDecision::AcceptedDegraded
	);
}

#[tokio::test]
async fn concurrent_validation_has_a_single_winner() {
	let store = Arc::new(MemoryStore::default());
	let guard = Arc::new(make_guard(store.clone()));
	let session = make_session("sess-race");
	let token =
		guard.issue(&session).await.expect("Issuing the contested token should succeed.").to_string();
	let guard_a = guard.clone();
	let guard_b = guard.clone();
	let session_a = session.clone();
	let session_b = session.clone();
	let token_a = token.clone();
	let token_b = token;
	let task_a = tokio::spawn(async move {
		guard_a.validate(Some(&token_a), Some(&session_a)).await
	});
	let task_b = tokio::spawn(async move {
		guard_b.validate(Some(&token_b), Some(&session_b)).await
	});
	let (decision_a, decision_b) = tokio::join!(task_a, task_b);
	let decision_a = decision_a.expect("Validation task A should not panic.");
	let decision_b = decision_b.expect("Validation task B should not panic.");
	let accepted = [decision_a, decision_b]
		.iter()
		.filter(|decision| matches!(decision, CsrfDecision::Accepted))
		.count();

	assert_eq!(accepted, 1, "exactly one concurrent validation should consume the token");
	assert!(
		[decision_a, decision_b]
			.iter()
			.any(|decision| matches!(
				decision,
				CsrfDecision::Rejected(CsrfRejection::AlreadyUsed)
			)),
		"the loser should observe the consumed marker"
	);
}

#[tokio::test]
async fn ttl_override_applies_to_validation() {
	let store = Arc::new(MemoryStore::default());
	let guard = make_guard(store.clone()).with_ttl(Duration::seconds(30));
	let session = make_session("sess-short");
	let issued = macros::datetime!(2025-06-01 12:00 UTC);
	let token = guard
		.issue_at(&session, issued)
		.await
		.expect("Issuing with a short TTL should succeed.")
		.to_string();

	assert_eq!(guard.ttl(), Duration::seconds(30));
	assert_ne!(guard.ttl(), DEFAULT_CSRF_TTL);
	assert_eq!(
		guard.validate_at(Some(&token), Some(&session), issued + Duration::seconds(31)).await,
		CsrfDecision::Rejected(CsrfRejection::Expired)
	);
}
