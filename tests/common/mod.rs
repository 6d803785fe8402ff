#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use futures_util::{StreamExt, stream};
use parking_lot::Mutex;
use serde_json::json;
// self
use globular_client::{
	auth::{AUTHORIZATION, AuthContext, RefreshFuture, Refresher, Token, TokenRefresher},
	error::Error,
	rpc::{Call, Caller, Message, MessageStream, MethodKind, RpcError, RpcFuture, ServiceClient},
	service::AddressResolver,
};

pub const ECHO: &str = "Echo";
pub const WATCH: &str = "Watch";

/// Outcome of one scripted stream start.
pub type StreamScript = Result<Vec<Result<Message, RpcError>>, RpcError>;

/// Service double replaying scripted responses and recording every call.
#[derive(Default)]
pub struct ScriptedService {
	unary: Mutex<VecDeque<Result<Option<Message>, RpcError>>>,
	streams: Mutex<VecDeque<StreamScript>>,
	calls: Mutex<Vec<Call>>,
	/// Keeps opened streams pending after their scripted frames.
	pub hold_open: bool,
}
impl ScriptedService {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn holding_open() -> Arc<Self> {
		Arc::new(Self { hold_open: true, ..Default::default() })
	}

	pub fn push_unary(&self, outcome: Result<Option<Message>, RpcError>) -> &Self {
		self.unary.lock().push_back(outcome);

		self
	}

	pub fn push_stream(&self, outcome: StreamScript) -> &Self {
		self.streams.lock().push_back(outcome);

		self
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().clone()
	}

	pub fn call_count(&self) -> usize {
		self.calls.lock().len()
	}

	/// Bearer header of every recorded call, in order.
	pub fn bearers(&self) -> Vec<Option<String>> {
		self.calls
			.lock()
			.iter()
			.map(|call| call.metadata.get(AUTHORIZATION).map(str::to_owned))
			.collect()
	}
}
impl ServiceClient for ScriptedService {
	fn resolve(&self, method: &str) -> Option<MethodKind> {
		match method {
			ECHO => Some(MethodKind::Unary),
			WATCH => Some(MethodKind::ServerStreaming),
			_ => None,
		}
	}

	fn call_unary(&self, call: Call) -> RpcFuture<'_, Option<Message>> {
		let echo = call.request.clone();

		self.calls.lock().push(call);

		let outcome = self.unary.lock().pop_front().unwrap_or(Ok(Some(echo)));

		Box::pin(async move { outcome })
	}

	fn open_stream(&self, call: Call) -> RpcFuture<'_, MessageStream> {
		self.calls.lock().push(call);

		let outcome = self.streams.lock().pop_front().unwrap_or(Ok(Vec::new()));
		let hold_open = self.hold_open;

		Box::pin(async move {
			let frames = stream::iter(outcome?);

			Ok::<MessageStream, RpcError>(if hold_open {
				frames.chain(stream::pending()).boxed()
			} else {
				frames.boxed()
			})
		})
	}
}

/// Renewer issuing `renewed-1`, `renewed-2`, ... and counting invocations.
#[derive(Default)]
pub struct CountingRefresher {
	count: AtomicUsize,
	pub fail: bool,
}
impl CountingRefresher {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn failing() -> Arc<Self> {
		Arc::new(Self { fail: true, ..Default::default() })
	}

	pub fn count(&self) -> usize {
		self.count.load(Ordering::SeqCst)
	}
}
impl TokenRefresher for CountingRefresher {
	fn refresh<'a>(&'a self, _: &'a Token) -> RefreshFuture<'a> {
		Box::pin(async move {
			let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;

			tokio::task::yield_now().await;

			if self.fail {
				return Err(Error::Rpc(RpcError::unknown("refresh rejected")));
			}

			Ok(Token::new(format!("renewed-{n}")))
		})
	}
}

/// Builds a caller over `context` backed by `renewer`.
pub fn caller(context: AuthContext, renewer: Arc<CountingRefresher>) -> Caller {
	Caller::new(Arc::new(Refresher::new(context, renewer)), AddressResolver::new())
}

pub fn bearer(token: &str) -> Option<String> {
	Some(format!("Bearer {token}"))
}

pub fn expired() -> RpcError {
	RpcError::unknown("rpc error: token is expired")
}

pub fn frame(id: i64) -> Result<Message, RpcError> {
	Ok(json!({ "id": id }))
}
