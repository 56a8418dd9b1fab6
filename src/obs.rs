//! Optional observability helpers for the request pipeline.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `api_session.stage` with the `stage` and
//!   `path` fields, plus events for refresh coordination and login redirects.
//! - Enable `metrics` to increment the `api_session_stage_total` counter for every
//!   attempt/success/failure/queued outcome, labeled by `stage` + `outcome`.

mod metrics;
mod tracing;

pub(crate) use metrics::*;
pub(crate) use tracing::*;

// self
use crate::_prelude::*;

/// Emits a `tracing` event when the feature is enabled and compiles to nothing otherwise.
macro_rules! log_event {
	($level:ident, $($arg:tt)+) => {
		#[cfg(feature = "tracing")]
		{
			::tracing::$level!($($arg)+);
		}
	};
}
pub(crate) use log_event;

/// Pipeline stages observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// First attempt of a caller's request.
	Dispatch,
	/// Replay of a request after a successful refresh.
	Replay,
	/// Call to the refresh endpoint.
	Refresh,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::Dispatch => "dispatch",
			Stage::Replay => "replay",
			Stage::Refresh => "refresh",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Caller parked behind an in-flight refresh.
	Queued,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
			StageOutcome::Queued => "queued",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
