// self
use crate::{_prelude::*, obs::CheckKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCheck<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCheck<F> = F;

/// A span builder used by guard checks.
#[derive(Clone, Debug)]
pub struct CheckSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CheckSpan {
	/// Creates a new span tagged with the provided check kind + stage.
	pub fn new(kind: CheckKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("guardpost.check", check = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> CheckSpanGuard {
		#[cfg(feature = "tracing")]
		{
			CheckSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			CheckSpanGuard {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCheck<Fut>
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

/// RAII guard returned by [`CheckSpan::entered`].
pub struct CheckSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for CheckSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CheckSpanGuard(..)")
	}
}

/// Emits a warning describing a reduced-protection or fail-open event.
///
/// Store unavailability must stay visible in logs even though the services keep serving.
pub fn warn_degraded(kind: CheckKind, detail: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(check = kind.as_str(), detail, "guard check degraded");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, detail);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn check_span_noop_without_tracing() {
		let _guard = CheckSpan::new(CheckKind::Csrf, "test").entered();
		// Compile-time smoke test ensures the guard exists even when tracing is disabled.
	}

	#[test]
	fn warn_degraded_noop_without_tracing() {
		warn_degraded(CheckKind::RateLimit, "store unavailable");
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = CheckSpan::new(CheckKind::PaymentLink, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
