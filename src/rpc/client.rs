//! Explicit call interface implemented by generated or hand-written service clients.
//!
//! A [`ServiceClient`] resolves method names up front and exposes exactly two call shapes:
//! unary ([`ServiceClient::call_unary`]) and server streaming ([`ServiceClient::open_stream`]).
//! Both take the same [`Call`] descriptor, so wrappers never need to know how a transport lays
//! out its arguments.

// crates.io
use futures_util::stream::BoxStream;
// self
use crate::{_prelude::*, rpc::Metadata, rpc::expiry};

/// Payload exchanged with Globular services.
pub type Message = Value;

/// Stream of messages produced by a server-streaming call once it has started.
pub type MessageStream = BoxStream<'static, Result<Message, RpcError>>;

/// Boxed future returned by [`ServiceClient`] calls.
pub type RpcFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RpcError>> + 'a + Send>>;

/// Shape of a method exposed by a [`ServiceClient`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
	/// Single request, single response.
	Unary,
	/// Single request, stream of responses.
	ServerStreaming,
}

/// Call descriptor: one per attempt, never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
	/// Method name as exposed by the service.
	pub method: String,
	/// Request payload.
	pub request: Message,
	/// Headers sent with the call, including `authorization` when a token is held.
	pub metadata: Metadata,
}

/// Client bound to one service address.
pub trait ServiceClient
where
	Self: Send + Sync,
{
	/// Returns the shape of `method`, or `None` if the service does not expose it.
	fn resolve(&self, method: &str) -> Option<MethodKind>;

	/// Performs a unary call; `Ok(None)` means the transport succeeded without a payload.
	fn call_unary(&self, call: Call) -> RpcFuture<'_, Option<Message>>;

	/// Starts a server-streaming call; resolving `Ok` means the stream has started.
	fn open_stream(&self, call: Call) -> RpcFuture<'_, MessageStream>;
}
impl<C> ServiceClient for Arc<C>
where
	C: ?Sized + ServiceClient,
{
	fn resolve(&self, method: &str) -> Option<MethodKind> {
		(**self).resolve(method)
	}

	fn call_unary(&self, call: Call) -> RpcFuture<'_, Option<Message>> {
		(**self).call_unary(call)
	}

	fn open_stream(&self, call: Call) -> RpcFuture<'_, MessageStream> {
		(**self).open_stream(call)
	}
}

/// Canonical gRPC status codes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcCode {
	/// Not an error.
	Ok,
	/// The operation was cancelled.
	Cancelled,
	/// Unknown error.
	#[default]
	Unknown,
	/// Client specified an invalid argument.
	InvalidArgument,
	/// Deadline expired before the operation could complete.
	DeadlineExceeded,
	/// Some requested entity was not found.
	NotFound,
	/// Some entity that the client attempted to create already exists.
	AlreadyExists,
	/// The caller lacks permission for the operation.
	PermissionDenied,
	/// Some resource has been exhausted.
	ResourceExhausted,
	/// The system is not in a state required for the operation.
	FailedPrecondition,
	/// The operation was aborted.
	Aborted,
	/// Operation was attempted past the valid range.
	OutOfRange,
	/// Operation is not implemented or supported.
	Unimplemented,
	/// Internal error.
	Internal,
	/// The service is currently unavailable.
	Unavailable,
	/// Unrecoverable data loss or corruption.
	DataLoss,
	/// The request lacks valid authentication credentials.
	Unauthenticated,
}
impl RpcCode {
	/// Maps a numeric `grpc-status` value; out-of-range values become [`RpcCode::Unknown`].
	pub fn from_i32(value: i32) -> Self {
		match value {
			0 => Self::Ok,
			1 => Self::Cancelled,
			3 => Self::InvalidArgument,
			4 => Self::DeadlineExceeded,
			5 => Self::NotFound,
			6 => Self::AlreadyExists,
			7 => Self::PermissionDenied,
			8 => Self::ResourceExhausted,
			9 => Self::FailedPrecondition,
			10 => Self::Aborted,
			11 => Self::OutOfRange,
			12 => Self::Unimplemented,
			13 => Self::Internal,
			14 => Self::Unavailable,
			15 => Self::DataLoss,
			16 => Self::Unauthenticated,
			_ => Self::Unknown,
		}
	}

	/// Maps an HTTP status following the gRPC HTTP-to-status table.
	pub fn from_http_status(status: u16) -> Self {
		match status {
			200..=299 => Self::Ok,
			400 => Self::Internal,
			401 => Self::Unauthenticated,
			403 => Self::PermissionDenied,
			404 => Self::Unimplemented,
			429 => Self::ResourceExhausted,
			502..=504 => Self::Unavailable,
			_ => Self::Unknown,
		}
	}
}

/// Failure reported by a service or its transport.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{message}")]
pub struct RpcError {
	/// Structured status code, when the transport supplied one.
	pub code: RpcCode,
	/// Human-readable message as sent by the service.
	pub message: String,
}
impl RpcError {
	/// Creates an error with an explicit code.
	pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
		Self { code, message: message.into() }
	}

	/// Creates an error carrying only a message.
	pub fn unknown(message: impl Into<String>) -> Self {
		Self::new(RpcCode::Unknown, message)
	}

	/// Wraps a network-level failure.
	pub fn transport(err: impl Display) -> Self {
		Self::new(RpcCode::Unavailable, err.to_string())
	}

	/// Returns `true` if a forced token refresh may fix this failure.
	///
	/// Only the message is consulted, against [`EXPIRY_PHRASES`](crate::rpc::EXPIRY_PHRASES);
	/// the status code alone never qualifies.
	pub fn is_expiry(&self) -> bool {
		expiry::is_expiry_message(&self.message)
	}
}
