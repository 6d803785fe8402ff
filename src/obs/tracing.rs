// self
use crate::{_prelude::*, obs::CallKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// A span builder used by the RPC wrappers and the refresher.
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a new span tagged with the provided call kind + method.
	pub fn new(kind: CallKind, method: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("globular_client.call", kind = kind.as_str(), method);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, method);

			Self {}
		}
	}

	/// Emits a debug event inside the span when a call is retried after a forced refresh.
	pub fn retrying(&self, reason: &str) {
		#[cfg(feature = "tracing")]
		{
			self.span.in_scope(|| tracing::debug!(reason, "retrying after forced token refresh"));
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = reason;
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
