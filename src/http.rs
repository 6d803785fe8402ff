//! reqwest-backed [`ServiceClient`] speaking JSON over HTTP.
//!
//! Calls are `POST {address}/{Method}` with a JSON body and the call metadata as request
//! headers. A non-zero `grpc-status` header (with `grpc-message`) takes priority over the HTTP
//! status when classifying failures. Server-streaming responses are newline-delimited JSON; a
//! line of the form `{"error":{"code":16,"message":"..."}}` reports a mid-stream failure.

// crates.io
use futures_util::{Stream, StreamExt, stream};
use reqwest::{
	Response,
	header::{CONTENT_TYPE, HeaderMap},
};
// self
use crate::{
	_prelude::*,
	auth::{AuthContext, Refresher},
	authentication::{Authenticator, RpcTokenRefresher},
	config::ClientConfig,
	error::ConfigError,
	rpc::{
		Call, Caller, Message, MessageStream, MethodKind, RpcCode, RpcError, RpcFuture,
		ServiceClient,
	},
	service::{AddressResolver, ServiceDescriptor, ServiceId},
	store::{self, FileStore, MemoryStore, SettingsStore},
};

const GRPC_STATUS: &str = "grpc-status";
const GRPC_MESSAGE: &str = "grpc-message";

/// Client for one Globular service reached through a reqwest [`ReqwestClient`].
#[derive(Clone, Debug)]
pub struct HttpServiceClient {
	http: ReqwestClient,
	address: Url,
	descriptor: &'static ServiceDescriptor,
}
impl HttpServiceClient {
	/// Binds `http` to the resolved `address` of `service`.
	pub fn new(http: ReqwestClient, address: Url, service: ServiceId) -> Self {
		Self { http, address, descriptor: service.descriptor() }
	}

	/// Returns the service address.
	pub fn address(&self) -> &Url {
		&self.address
	}

	fn endpoint(&self, method: &str) -> String {
		format!("{}/{method}", self.address.as_str().trim_end_matches('/'))
	}

	async fn send(&self, call: &Call) -> Result<Response, RpcError> {
		let body = serde_json::to_vec(&call.request)
			.map_err(|e| RpcError::new(RpcCode::InvalidArgument, e.to_string()))?;
		let mut request = self
			.http
			.post(self.endpoint(&call.method))
			.header(CONTENT_TYPE, "application/json")
			.body(body);

		for (key, value) in call.metadata.iter() {
			request = request.header(key, value);
		}

		let response = request.send().await.map_err(RpcError::transport)?;

		check_status(response).await
	}
}
impl ServiceClient for HttpServiceClient {
	fn resolve(&self, method: &str) -> Option<MethodKind> {
		self.descriptor.method_kind(method)
	}

	fn call_unary(&self, call: Call) -> RpcFuture<'_, Option<Message>> {
		Box::pin(async move {
			let response = self.send(&call).await?;
			let bytes = response.bytes().await.map_err(RpcError::transport)?;

			decode_unary(&bytes)
		})
	}

	fn open_stream(&self, call: Call) -> RpcFuture<'_, MessageStream> {
		Box::pin(async move {
			let response = self.send(&call).await?;

			Ok::<_, RpcError>(ndjson_messages(response.bytes_stream()))
		})
	}
}

/// Fully wired client stack built from a [`ClientConfig`].
pub struct HttpStack {
	/// Shared token cell.
	pub context: AuthContext,
	/// Persisted settings backend.
	pub settings: Arc<dyn SettingsStore>,
	/// Wrapper issuing authenticated calls.
	pub caller: Arc<Caller>,
	/// Sign-in and logout helper.
	pub authenticator: Authenticator,
	http: ReqwestClient,
}
impl HttpStack {
	/// Builds a default reqwest client and wires the stack with [`HttpStack::from_config`].
	pub fn connect(config: &ClientConfig) -> Result<Self> {
		let http = ReqwestClient::builder().build().map_err(ConfigError::from)?;

		Self::from_config(config, http)
	}

	/// Wires the settings store, resolver, refresher, caller, and authenticator.
	///
	/// A token persisted by a previous run is restored into the context, and every later token
	/// change is written back to the settings store.
	pub fn from_config(config: &ClientConfig, http: ReqwestClient) -> Result<Self> {
		let settings: Arc<dyn SettingsStore> = match &config.settings_path {
			Some(path) => Arc::new(FileStore::open(path)?),
			None => Arc::new(MemoryStore::default()),
		};
		let context = AuthContext::new();

		store::restore_token(&context, settings.as_ref())?;
		store::persist_tokens(&context, settings.clone());

		let resolver = AddressResolver::from_config(config).with_settings(settings.clone());
		let auth_address = resolver.resolve_id(ServiceId::Authentication, None)?;
		let auth_client: Arc<dyn ServiceClient> = Arc::new(HttpServiceClient::new(
			http.clone(),
			auth_address,
			ServiceId::Authentication,
		));
		let refresher = Arc::new(Refresher::new(
			context.clone(),
			Arc::new(RpcTokenRefresher::new(auth_client.clone())),
		));
		let caller = Arc::new(Caller::from_config(config, refresher, resolver));
		let authenticator = Authenticator::new(caller.clone(), auth_client);

		Ok(Self { context, settings, caller, authenticator, http })
	}

	/// Builds a client for `service` under the current base URL.
	pub fn client(&self, service: ServiceId) -> Result<HttpServiceClient> {
		let address = self.caller.resolver().resolve_id(service, None)?;

		Ok(HttpServiceClient::new(self.http.clone(), address, service))
	}

	/// Returns a factory suitable for [`Caller::stream`].
	pub fn stream_factory(&self, service: ServiceId) -> impl FnOnce(&Url) -> HttpServiceClient {
		let http = self.http.clone();

		move |address| HttpServiceClient::new(http, address.clone(), service)
	}
}
impl Debug for HttpStack {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpStack")
			.field("context", &self.context)
			.field("caller", &self.caller)
			.field("authenticator", &self.authenticator)
			.finish_non_exhaustive()
	}
}

async fn check_status(response: Response) -> Result<Response, RpcError> {
	if let Some(err) = grpc_status(response.headers()) {
		return Err(err);
	}

	let status = response.status();

	if status.is_success() {
		return Ok(response);
	}

	let body = response.text().await.unwrap_or_default();
	let message = if body.trim().is_empty() {
		status.canonical_reason().unwrap_or("Request failed").to_owned()
	} else {
		body
	};

	Err(RpcError::new(RpcCode::from_http_status(status.as_u16()), message))
}

fn grpc_status(headers: &HeaderMap) -> Option<RpcError> {
	let code = headers.get(GRPC_STATUS)?.to_str().ok()?.trim().parse::<i32>().ok()?;

	if code == 0 {
		return None;
	}

	let message = headers
		.get(GRPC_MESSAGE)
		.and_then(|value| value.to_str().ok())
		.unwrap_or_default()
		.to_owned();

	Some(RpcError::new(RpcCode::from_i32(code), message))
}

fn decode_unary(bytes: &[u8]) -> Result<Option<Message>, RpcError> {
	if bytes.trim_ascii().is_empty() {
		return Ok(None);
	}

	let message: Message = serde_json::from_slice(bytes).map_err(|e| {
		RpcError::new(RpcCode::Internal, format!("Malformed response payload: {e}."))
	})?;

	Ok(if message.is_null() { None } else { Some(message) })
}

/// Splits a byte stream into newline-delimited JSON frames.
fn ndjson_messages<S, B, E>(bytes: S) -> MessageStream
where
	S: 'static + Send + Stream<Item = Result<B, E>>,
	B: 'static + Send + AsRef<[u8]>,
	E: 'static + Send + Display,
{
	let reader = FrameReader { bytes: Box::pin(bytes), buf: Vec::new(), done: false };

	stream::unfold(reader, |mut reader| async move {
		reader.next_frame().await.map(|frame| (frame, reader))
	})
	.boxed()
}

struct FrameReader<S> {
	bytes: Pin<Box<S>>,
	buf: Vec<u8>,
	done: bool,
}
impl<S, B, E> FrameReader<S>
where
	S: Stream<Item = Result<B, E>>,
	B: AsRef<[u8]>,
	E: Display,
{
	async fn next_frame(&mut self) -> Option<Result<Message, RpcError>> {
		loop {
			if let Some(end) = self.buf.iter().position(|b| *b == b'\n') {
				let line: Vec<u8> = self.buf.drain(..=end).collect();

				match parse_frame(&line) {
					Some(frame) => return Some(frame),
					None => continue,
				}
			}
			if self.done {
				let rest = std::mem::take(&mut self.buf);

				return parse_frame(&rest);
			}

			match self.bytes.next().await {
				Some(Ok(chunk)) => self.buf.extend_from_slice(chunk.as_ref()),
				Some(Err(e)) => {
					self.done = true;
					self.buf.clear();

					return Some(Err(RpcError::transport(e)));
				},
				None => self.done = true,
			}
		}
	}
}

#[derive(Deserialize)]
struct ErrorFrame {
	#[serde(default)]
	code: i32,
	#[serde(default)]
	message: String,
}

fn parse_frame(line: &[u8]) -> Option<Result<Message, RpcError>> {
	let line = line.trim_ascii();

	if line.is_empty() {
		return None;
	}

	let message: Message = match serde_json::from_slice(line) {
		Ok(message) => message,
		Err(e) =>
			return Some(Err(RpcError::new(
				RpcCode::Internal,
				format!("Malformed stream frame: {e}."),
			))),
	};

	if let Some(error) = message.as_object().filter(|o| o.len() == 1).and_then(|o| o.get("error"))
		&& let Ok(frame) = serde_json::from_value::<ErrorFrame>(error.clone())
	{
		return Some(Err(RpcError::new(RpcCode::from_i32(frame.code), frame.message)));
	}

	Some(Ok(message))
}
