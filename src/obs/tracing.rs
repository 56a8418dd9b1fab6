// self
use crate::{_prelude::*, obs::Stage};

#[cfg(feature = "tracing")]
pub(crate) type InstrumentedStage<F> = tracing::instrument::Instrumented<F>;
#[cfg(not(feature = "tracing"))]
pub(crate) type InstrumentedStage<F> = F;

/// Span wrapper used around pipeline stages.
#[derive(Clone, Debug)]
pub(crate) struct StageSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl StageSpan {
	/// Creates a new span tagged with the stage and the request path.
	pub(crate) fn new(stage: Stage, path: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("api_session.stage", stage = stage.as_str(), path);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, path);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub(crate) fn instrument<Fut>(&self, fut: Fut) -> InstrumentedStage<Fut>
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
