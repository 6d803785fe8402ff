//! Client-level error types shared across the RPC wrappers, refresher, and stores.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Payload could not be encoded or decoded.
	#[error(transparent)]
	Codec(#[from] CodecError),
	/// Failure reported by the remote service or its transport.
	#[error(transparent)]
	Rpc(#[from] crate::rpc::RpcError),

	/// The resolved client does not expose the requested method.
	#[error("RPC method not found: {method}.")]
	MethodNotFound {
		/// Requested method name.
		method: String,
	},
	/// The call succeeded at the transport level but carried no payload.
	#[error("RPC method `{method}` returned an empty response.")]
	EmptyResponse {
		/// Method that produced the empty response.
		method: String,
	},
	/// The logical service identifier is not part of the address table.
	#[error("Unknown serviceId: {service}.")]
	UnknownService {
		/// Identifier supplied by the caller.
		service: String,
	},
	/// A refresh was requested while the context holds no token.
	#[error("No token is available for refresh.")]
	MissingToken,
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A base URL or service address could not be parsed.
	#[error("Base URL `{value}` is invalid.")]
	InvalidBaseUrl {
		/// Offending input.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configuration file could not be read.
	#[error("Failed to read configuration file {path}.")]
	Read {
		/// Path of the configuration file.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Configuration file is not valid TOML for [`ClientConfig`](crate::config::ClientConfig).
	#[error("Failed to parse configuration file {path}.")]
	Parse {
		/// Path of the configuration file.
		path: String,
		/// Underlying TOML failure.
		#[source]
		source: toml::de::Error,
	},
	/// The staleness window must not be negative.
	#[error("The staleness window must not be negative.")]
	NegativeStalenessWindow,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Payload encoding and decoding failures.
#[derive(Debug, ThisError)]
pub enum CodecError {
	/// Request value could not be serialized into a message.
	#[error("Failed to encode the request for `{method}`.")]
	Encode {
		/// Method the request was destined for.
		method: String,
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// Response message does not match the expected type.
	#[error("Failed to decode the response of `{method}`.")]
	Decode {
		/// Method that produced the response.
		method: String,
		/// Structured decoding failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
