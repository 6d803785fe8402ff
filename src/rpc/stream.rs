//! Server-streaming call wrapper.

// crates.io
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	obs::{self, CallKind, CallOutcome, CallSpan},
	rpc::{Call, Caller, Message, Metadata, MethodKind, ServiceClient, retry},
};

/// Hook observing the live call, invoked before every start attempt.
pub type OnCall = Box<dyn FnMut(&CallHandle) + Send>;

/// Per-call options for [`Caller::stream`].
#[derive(Default)]
pub struct StreamOptions {
	/// Base URL replacing the resolver's choice for this call.
	pub base_url: Option<Url>,
	/// Receives the [`CallHandle`] so an external party can cancel the call.
	pub on_call: Option<OnCall>,
	/// Extra headers; the token metadata is applied on top.
	pub headers: Metadata,
}
impl StreamOptions {
	/// Overrides the base URL.
	pub fn with_base_url(mut self, base_url: Url) -> Self {
		self.base_url = Some(base_url);

		self
	}

	/// Installs the call observer hook.
	pub fn with_on_call(mut self, hook: impl 'static + FnMut(&CallHandle) + Send) -> Self {
		self.on_call = Some(Box::new(hook));

		self
	}

	/// Sets extra headers.
	pub fn with_headers(mut self, headers: Metadata) -> Self {
		self.headers = headers;

		self
	}
}
impl Debug for StreamOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StreamOptions")
			.field("base_url", &self.base_url)
			.field("on_call_set", &self.on_call.is_some())
			.field("headers", &self.headers)
			.finish()
	}
}

/// Cancels a running stream from outside the wrapper.
#[derive(Clone, Debug, Default)]
pub struct CallHandle(CancellationToken);
impl CallHandle {
	/// Stops the call; the wrapper resolves with [`StreamEnd::Cancelled`].
	pub fn cancel(&self) {
		self.0.cancel();
	}

	/// Returns `true` once [`cancel`](Self::cancel) was called.
	pub fn is_cancelled(&self) -> bool {
		self.0.is_cancelled()
	}
}

/// How a stream that did not fail came to an end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEnd {
	/// The server closed the stream.
	Completed,
	/// A [`CallHandle`] cancelled the call.
	Cancelled,
}

impl Caller {
	/// Opens a server-streaming call and forwards every message to `on_message`.
	///
	/// The address of `service` is resolved (honouring `options.base_url`), the client is built
	/// with `factory`, and the call is started. Only a failure to start is eligible for the
	/// forced-refresh restart; errors after the stream has started end the call unchanged.
	pub async fn stream<C, F, M>(
		&self,
		factory: F,
		method: &str,
		request: Message,
		mut on_message: M,
		service: &str,
		options: StreamOptions,
	) -> Result<StreamEnd>
	where
		C: ServiceClient,
		F: FnOnce(&Url) -> C,
		M: FnMut(Message),
	{
		const KIND: CallKind = CallKind::Stream;

		let span = CallSpan::new(KIND, method);

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let span_ref = &span;
		let result = span
			.instrument(async move {
				self.preflight(KIND).await;

				let StreamOptions { base_url, mut on_call, headers } = options;
				let address = self.resolver.resolve(service, base_url.as_ref())?;
				let client = factory(&address);

				if client.resolve(method) != Some(MethodKind::ServerStreaming) {
					return Err(Error::MethodNotFound { method: method.to_owned() });
				}

				let handle = CallHandle::default();
				let cancelled = handle.0.clone();
				let client = &client;
				let start = retry::drive(&self.refresher, span_ref, KIND, &headers, |metadata| {
					if let Some(hook) = on_call.as_mut() {
						hook(&handle);
					}

					client.open_stream(Call {
						method: method.to_owned(),
						request: request.clone(),
						metadata,
					})
				});
				let mut messages = tokio::select! {
					biased;
					_ = cancelled.cancelled() => return Ok(StreamEnd::Cancelled),
					started = start => started?,
				};

				loop {
					tokio::select! {
						biased;
						_ = cancelled.cancelled() => return Ok(StreamEnd::Cancelled),
						next = messages.next() => match next {
							Some(Ok(message)) => on_message(message),
							Some(Err(e)) => return Err(e.into()),
							None => return Ok(StreamEnd::Completed),
						},
					}
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}
}
