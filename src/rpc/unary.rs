//! Unary call wrapper.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::CodecError,
	obs::{self, CallKind, CallOutcome, CallSpan},
	rpc::{Call, Caller, Message, Metadata, MethodKind, ServiceClient, retry},
};

impl Caller {
	/// Invokes `method` on the client produced by `factory`.
	///
	/// Proactively refreshes a token close to expiry, fails with [`Error::MethodNotFound`]
	/// without touching the transport when the client lacks a unary `method`, and treats a
	/// payload-less success as [`Error::EmptyResponse`]. An expiry-classified failure triggers one
	/// forced refresh and one retry; if either fails the first error is returned.
	pub async fn unary<C, F>(
		&self,
		factory: F,
		method: &str,
		request: Message,
		headers: Metadata,
	) -> Result<Message>
	where
		C: ServiceClient,
		F: FnOnce() -> C,
	{
		const KIND: CallKind = CallKind::Unary;

		let span = CallSpan::new(KIND, method);

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let span_ref = &span;
		let headers = &headers;
		let result = span
			.instrument(async move {
				self.preflight(KIND).await;

				let client = factory();

				if client.resolve(method) != Some(MethodKind::Unary) {
					return Err(Error::MethodNotFound { method: method.to_owned() });
				}

				let client = &client;
				let response =
					retry::drive(&self.refresher, span_ref, KIND, headers, |metadata| {
						client.call_unary(Call {
							method: method.to_owned(),
							request: request.clone(),
							metadata,
						})
					})
					.await?;

				response.ok_or_else(|| Error::EmptyResponse { method: method.to_owned() })
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	/// Typed variant of [`Caller::unary`] that encodes `request` and decodes the response.
	pub async fn unary_as<C, F, Req, Resp>(
		&self,
		factory: F,
		method: &str,
		request: &Req,
		headers: Metadata,
	) -> Result<Resp>
	where
		C: ServiceClient,
		F: FnOnce() -> C,
		Req: ?Sized + Serialize,
		Resp: DeserializeOwned,
	{
		let request = encode(method, request)?;
		let response = self.unary(factory, method, request, headers).await?;

		decode(method, response)
	}
}

/// Serializes a request into a [`Message`].
pub(crate) fn encode<Req>(method: &str, request: &Req) -> Result<Message>
where
	Req: ?Sized + Serialize,
{
	serde_json::to_value(request)
		.map_err(|source| CodecError::Encode { method: method.to_owned(), source }.into())
}

/// Deserializes a [`Message`], keeping the JSON path of the first mismatch.
pub(crate) fn decode<Resp>(method: &str, message: Message) -> Result<Resp>
where
	Resp: DeserializeOwned,
{
	serde_path_to_error::deserialize(message)
		.map_err(|source| CodecError::Decode { method: method.to_owned(), source }.into())
}
