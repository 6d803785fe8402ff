mod common;

// crates.io
use serde_json::json;
use time::{Duration, OffsetDateTime};
// self
use common::*;
use globular_client::{
	auth::{AuthContext, Token},
	error::Error,
	rpc::{Metadata, RpcCode, RpcError},
};

fn expiring_in(secs: i64) -> Token {
	Token::with_expiry("current", OffsetDateTime::now_utc() + Duration::seconds(secs))
}

#[tokio::test]
async fn stale_token_is_renewed_before_the_call() {
	let service = ScriptedService::new();
	let renewer = CountingRefresher::new();
	let caller = caller(AuthContext::with_token(expiring_in(30)), renewer.clone());
	let response = caller
		.unary(|| service.clone(), ECHO, json!({ "ping": 1 }), Metadata::new())
		.await
		.expect("Echo should succeed.");

	assert_eq!(response, json!({ "ping": 1 }));
	assert_eq!(renewer.count(), 1);
	assert_eq!(service.bearers(), vec![bearer("renewed-1")]);
}

#[tokio::test]
async fn fresh_token_is_sent_unchanged() {
	let service = ScriptedService::new();
	let renewer = CountingRefresher::new();
	let caller = caller(AuthContext::with_token(expiring_in(3_600)), renewer.clone());

	caller
		.unary(|| service.clone(), ECHO, json!({}), Metadata::new())
		.await
		.expect("Echo should succeed.");

	assert_eq!(renewer.count(), 0);
	assert_eq!(service.bearers(), vec![bearer("current")]);
}

#[tokio::test]
async fn failed_proactive_refresh_does_not_block_the_call() {
	let service = ScriptedService::new();
	let renewer = CountingRefresher::failing();
	let caller = caller(AuthContext::with_token(expiring_in(10)), renewer.clone());

	caller
		.unary(|| service.clone(), ECHO, json!({}), Metadata::new())
		.await
		.expect("Echo should succeed with the current token.");

	assert_eq!(renewer.count(), 1);
	assert_eq!(service.bearers(), vec![bearer("current")]);
}

#[tokio::test]
async fn expiry_failure_retries_once_with_the_renewed_token() {
	let service = ScriptedService::new();

	service.push_unary(Err(expired())).push_unary(Ok(Some(json!({ "token": "abc" }))));

	let renewer = CountingRefresher::new();
	let caller = caller(AuthContext::with_token(Token::new("old")), renewer.clone());
	let response = caller
		.unary(|| service.clone(), ECHO, json!({}), Metadata::new())
		.await
		.expect("Retry should succeed.");

	assert_eq!(response, json!({ "token": "abc" }));
	assert_eq!(renewer.count(), 1);
	assert_eq!(service.bearers(), vec![bearer("old"), bearer("renewed-1")]);
}

#[tokio::test]
async fn unauthenticated_code_without_expiry_phrase_is_not_retried() {
	let service = ScriptedService::new();
	let rejected = RpcError::new(RpcCode::Unauthenticated, "invalid password");

	service.push_unary(Err(rejected.clone()));

	let renewer = CountingRefresher::new();
	let caller = caller(AuthContext::with_token(Token::new("old")), renewer.clone());
	let err = caller
		.unary(|| service.clone(), ECHO, json!({}), Metadata::new())
		.await
		.expect_err("Failure should surface.");

	assert!(matches!(err, Error::Rpc(ref e) if *e == rejected), "{err:?}");
	assert_eq!(renewer.count(), 0);
	assert_eq!(service.call_count(), 1);
}

#[tokio::test]
async fn failed_retry_reports_the_first_error() {
	let service = ScriptedService::new();

	service
		.push_unary(Err(expired()))
		.push_unary(Err(RpcError::new(RpcCode::PermissionDenied, "not allowed")));

	let renewer = CountingRefresher::new();
	let caller = caller(AuthContext::with_token(Token::new("old")), renewer.clone());
	let err = caller
		.unary(|| service.clone(), ECHO, json!({}), Metadata::new())
		.await
		.expect_err("Both attempts fail.");

	assert!(matches!(err, Error::Rpc(ref e) if *e == expired()), "{err:?}");
	assert_eq!(service.call_count(), 2);
}

#[tokio::test]
async fn failed_forced_refresh_reports_the_first_error() {
	let service = ScriptedService::new();

	service.push_unary(Err(expired()));

	let renewer = CountingRefresher::failing();
	let caller = caller(AuthContext::with_token(Token::new("old")), renewer.clone());
	let err = caller
		.unary(|| service.clone(), ECHO, json!({}), Metadata::new())
		.await
		.expect_err("Refresh fails.");

	assert!(matches!(err, Error::Rpc(ref e) if *e == expired()), "{err:?}");
	assert_eq!(renewer.count(), 1);
	assert_eq!(service.call_count(), 1);
}

#[tokio::test]
async fn other_failures_are_not_retried() {
	let service = ScriptedService::new();

	service.push_unary(Err(RpcError::new(RpcCode::NotFound, "no such account")));

	let renewer = CountingRefresher::new();
	let caller = caller(AuthContext::with_token(Token::new("old")), renewer.clone());
	let err = caller
		.unary(|| service.clone(), ECHO, json!({}), Metadata::new())
		.await
		.expect_err("Failure should surface.");

	assert_eq!(err.to_string(), "no such account");
	assert_eq!(renewer.count(), 0);
	assert_eq!(service.call_count(), 1);
}

#[tokio::test]
async fn unknown_method_never_reaches_the_transport() {
	let service = ScriptedService::new();
	let caller = caller(AuthContext::new(), CountingRefresher::new());

	for method in ["Missing", WATCH] {
		let err = caller
			.unary(|| service.clone(), method, json!({}), Metadata::new())
			.await
			.expect_err("Only unary methods are callable.");

		assert!(matches!(err, Error::MethodNotFound { .. }), "{err:?}");
	}

	assert_eq!(service.call_count(), 0);
}

#[tokio::test]
async fn empty_response_is_an_error() {
	let service = ScriptedService::new();

	service.push_unary(Ok(None));

	let caller = caller(AuthContext::new(), CountingRefresher::new());
	let err = caller
		.unary(|| service.clone(), ECHO, json!({}), Metadata::new())
		.await
		.expect_err("Empty payloads are rejected.");

	assert!(matches!(err, Error::EmptyResponse { ref method } if method == ECHO));
}

#[tokio::test]
async fn token_metadata_overrides_caller_headers() {
	let service = ScriptedService::new();
	let caller = caller(AuthContext::with_token(Token::new("abc")), CountingRefresher::new());
	let headers: Metadata =
		[("Authorization", "Bearer spoofed"), ("domain", "globular.io")].into_iter().collect();

	caller.unary(|| service.clone(), ECHO, json!({}), headers).await.expect("Echo succeeds.");

	let call = &service.calls()[0];

	assert_eq!(call.metadata.get("authorization"), Some("Bearer abc"));
	assert_eq!(call.metadata.get("domain"), Some("globular.io"));
}

#[tokio::test]
async fn concurrent_expiry_failures_share_one_refresh() -> color_eyre::Result<()> {
	let service = ScriptedService::new();

	service.push_unary(Err(expired())).push_unary(Err(expired()));

	let renewer = CountingRefresher::new();
	let caller = caller(AuthContext::with_token(Token::new("old")), renewer.clone());
	let (a, b) = tokio::join!(
		caller.unary(|| service.clone(), ECHO, json!({ "n": 1 }), Metadata::new()),
		caller.unary(|| service.clone(), ECHO, json!({ "n": 2 }), Metadata::new()),
	);

	assert_eq!(a?, json!({ "n": 1 }));
	assert_eq!(b?, json!({ "n": 2 }));
	assert_eq!(renewer.count(), 1);
	assert_eq!(caller.refresher().metrics.coalesced(), 1);

	Ok(())
}
