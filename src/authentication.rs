//! Sign-in and token renewal against `authentication.AuthenticationService`.

// self
use crate::{
	_prelude::*,
	auth::{AUTHORIZATION, AuthContext, RefreshFuture, Token, TokenRefresher},
	rpc::{Call, Caller, Metadata, MethodKind, ServiceClient, unary},
};

/// Unary method exchanging credentials for a token.
pub const AUTHENTICATE: &str = "Authenticate";
/// Unary method exchanging a token for a renewed one.
pub const REFRESH_TOKEN: &str = "RefreshToken";

#[derive(Serialize)]
struct Credentials<'a> {
	name: &'a str,
	password: &'a str,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
	token: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
	token: String,
}

/// Signs users in and out of the context owned by a [`Caller`].
#[derive(Clone)]
pub struct Authenticator {
	caller: Arc<Caller>,
	client: Arc<dyn ServiceClient>,
}
impl Authenticator {
	/// Binds the authentication service `client` to `caller`.
	pub fn new(caller: Arc<Caller>, client: Arc<dyn ServiceClient>) -> Self {
		Self { caller, client }
	}

	/// Returns the context receiving tokens.
	pub fn context(&self) -> &AuthContext {
		self.caller.refresher().context()
	}

	/// Exchanges `name` and `password` for a token and installs it in the context.
	pub async fn authenticate(&self, name: &str, password: &str) -> Result<Token> {
		let response: TokenResponse = self
			.caller
			.unary_as(
				|| self.client.clone(),
				AUTHENTICATE,
				&Credentials { name, password },
				Metadata::new(),
			)
			.await?;
		let token = Token::new(response.token);

		self.context().set(token.clone());

		Ok(token)
	}

	/// Drops the current token.
	pub fn logout(&self) {
		self.context().clear();
	}
}
impl Debug for Authenticator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Authenticator").field("caller", &self.caller).finish_non_exhaustive()
	}
}

/// [`TokenRefresher`] backed by the `RefreshToken` method.
///
/// The call bypasses [`Caller`] so that a renewal can never trigger another renewal.
#[derive(Clone)]
pub struct RpcTokenRefresher {
	client: Arc<dyn ServiceClient>,
}
impl RpcTokenRefresher {
	/// Wraps the authentication service `client`.
	pub fn new(client: Arc<dyn ServiceClient>) -> Self {
		Self { client }
	}

	async fn renew(&self, current: &Token) -> Result<Token> {
		if self.client.resolve(REFRESH_TOKEN) != Some(MethodKind::Unary) {
			return Err(Error::MethodNotFound { method: REFRESH_TOKEN.to_owned() });
		}

		let request =
			unary::encode(REFRESH_TOKEN, &TokenRequest { token: current.secret.expose() })?;
		let mut metadata = Metadata::new();

		metadata.insert(AUTHORIZATION, current.bearer());

		let response = self
			.client
			.call_unary(Call { method: REFRESH_TOKEN.to_owned(), request, metadata })
			.await?
			.ok_or_else(|| Error::EmptyResponse { method: REFRESH_TOKEN.to_owned() })?;
		let TokenResponse { token } = unary::decode(REFRESH_TOKEN, response)?;

		Ok(Token::new(token))
	}
}
impl TokenRefresher for RpcTokenRefresher {
	fn refresh<'a>(&'a self, current: &'a Token) -> RefreshFuture<'a> {
		Box::pin(self.renew(current))
	}
}
impl Debug for RpcTokenRefresher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RpcTokenRefresher").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		auth::Refresher,
		rpc::{Message, MessageStream, RpcCode, RpcError, RpcFuture},
		service::{AddressResolver, ServiceId},
	};

	#[derive(Default)]
	struct AuthService {
		calls: Mutex<Vec<Call>>,
		authenticate_failures: AtomicUsize,
	}
	impl ServiceClient for AuthService {
		fn resolve(&self, method: &str) -> Option<MethodKind> {
			ServiceId::Authentication.descriptor().method_kind(method)
		}

		fn call_unary(&self, call: Call) -> RpcFuture<'_, Option<Message>> {
			Box::pin(async move {
				let method = call.method.clone();

				self.calls.lock().push(call);

				match method.as_str() {
					AUTHENTICATE if self.authenticate_failures.load(Ordering::SeqCst) > 0 => {
						self.authenticate_failures.fetch_sub(1, Ordering::SeqCst);

						Err(RpcError::unknown("Unauthenticated"))
					},
					AUTHENTICATE => Ok(Some(json!({ "token": "abc" }))),
					REFRESH_TOKEN => Ok(Some(json!({ "token": "renewed" }))),
					_ => Ok(None),
				}
			})
		}

		fn open_stream(&self, _: Call) -> RpcFuture<'_, MessageStream> {
			Box::pin(async { Err(RpcError::new(RpcCode::Unimplemented, "No streams.")) })
		}
	}

	fn wire(service: Arc<AuthService>, token: Option<&str>) -> Authenticator {
		let context = token.map(|t| AuthContext::with_token(Token::new(t))).unwrap_or_default();
		let refresher = Arc::new(Refresher::new(
			context,
			Arc::new(RpcTokenRefresher::new(service.clone())),
		));
		let caller = Arc::new(Caller::new(refresher, AddressResolver::new()));

		Authenticator::new(caller, service)
	}

	#[tokio::test]
	async fn authenticate_stores_the_returned_token() {
		let service = Arc::new(AuthService::default());
		let auth = wire(service.clone(), None);
		let token = auth.authenticate("sa", "adminadmin").await.expect("Sign-in should succeed.");

		assert_eq!(token.secret.expose(), "abc");
		assert_eq!(auth.context().token().map(|t| t.secret), Some(token.secret));

		let calls = service.calls.lock();

		assert_eq!(calls[0].request, json!({ "name": "sa", "password": "adminadmin" }));
		assert!(calls[0].metadata.is_empty());
	}

	#[tokio::test]
	async fn authenticate_retries_once_after_a_forced_refresh() {
		let service = Arc::new(AuthService::default());

		service.authenticate_failures.store(1, Ordering::SeqCst);

		let auth = wire(service.clone(), Some("old"));
		let token = auth.authenticate("sa", "adminadmin").await.expect("Retry should succeed.");

		assert_eq!(token.secret.expose(), "abc");

		let methods: Vec<_> = service.calls.lock().iter().map(|c| c.method.clone()).collect();

		assert_eq!(methods, vec![AUTHENTICATE, REFRESH_TOKEN, AUTHENTICATE]);
		assert_eq!(auth.caller.refresher().metrics.attempts(), 1);
	}

	#[tokio::test]
	async fn refresher_sends_the_current_token() {
		let service = Arc::new(AuthService::default());
		let renewer = RpcTokenRefresher::new(service.clone());
		let renewed = renewer.refresh(&Token::new("old")).await.expect("Refresh should succeed.");

		assert_eq!(renewed.secret.expose(), "renewed");

		let calls = service.calls.lock();

		assert_eq!(calls[0].request, json!({ "token": "old" }));
		assert_eq!(calls[0].metadata.get(AUTHORIZATION), Some("Bearer old"));
	}

	#[tokio::test]
	async fn logout_clears_the_context() {
		let auth = wire(Arc::new(AuthService::default()), Some("abc"));

		auth.logout();

		assert!(auth.context().token().is_none());
	}
}
