//! Single-flight refresh coordination.
//!
//! The first caller that hits an auth failure while the coordinator is [`RefreshPhase::Idle`]
//! becomes the leader and issues the refresh call. Callers that fail while a refresh is in
//! flight are parked in an ordered queue of one-shot channels. When the leader finishes it
//! releases every waiter in insertion order with the same outcome and returns the coordinator
//! to idle. Each waiter also learns its release rank, which equals its queue position. The
//! state lock is never held across an `.await`.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use futures::channel::oneshot;
// self
use crate::{_prelude::*, session::TokenSecret};

/// Coordinator phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
	/// No refresh call is in flight.
	Idle,
	/// A leader is waiting on the refresh endpoint.
	Refreshing,
}

/// Result broadcast to waiters when a refresh completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// New access token to replay with.
	Refreshed(TokenSecret),
	/// Refresh failed; the session is gone.
	Failed,
	/// Leader went away before the refresh finished; the stored session was not touched.
	Abandoned,
}

/// Role handed to a caller by [`RefreshCoordinator::begin`].
#[derive(Debug)]
pub enum RefreshTicket {
	/// Caller must perform the refresh and then call [`RefreshLeader::complete`].
	Leader(RefreshLeader),
	/// Caller must await the leader's outcome.
	Waiter(RefreshWaiter),
}

#[derive(Debug)]
struct CoordinatorState {
	phase: RefreshPhase,
	waiters: VecDeque<oneshot::Sender<(usize, RefreshOutcome)>>,
}

/// Per-client refresh state: the in-flight flag plus the pending queue.
#[derive(Debug)]
pub struct RefreshCoordinator {
	state: Mutex<CoordinatorState>,
	metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator.
	pub fn new() -> Self {
		Self {
			state: Mutex::new(CoordinatorState {
				phase: RefreshPhase::Idle,
				waiters: VecDeque::new(),
			}),
			metrics: RefreshMetrics::default(),
		}
	}

	/// Current phase.
	pub fn phase(&self) -> RefreshPhase {
		self.state.lock().phase
	}

	/// Number of callers parked behind the in-flight refresh.
	pub fn pending(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Counters for this coordinator.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Claims the leader role when idle, otherwise enqueues the caller.
	pub fn begin(self: &Arc<Self>) -> RefreshTicket {
		let mut state = self.state.lock();

		match state.phase {
			RefreshPhase::Idle => {
				state.phase = RefreshPhase::Refreshing;
				self.metrics.record_attempt();

				RefreshTicket::Leader(RefreshLeader {
					coordinator: Arc::clone(self),
					completed: false,
				})
			},
			RefreshPhase::Refreshing => {
				let (tx, rx) = oneshot::channel();

				state.waiters.push_back(tx);
				self.metrics.record_queued();

				RefreshTicket::Waiter(RefreshWaiter(rx))
			},
		}
	}

	fn finish(&self, outcome: RefreshOutcome) {
		let waiters = {
			let mut state = self.state.lock();

			state.phase = RefreshPhase::Idle;

			std::mem::take(&mut state.waiters)
		};

		match &outcome {
			RefreshOutcome::Refreshed(_) => self.metrics.record_success(),
			RefreshOutcome::Failed | RefreshOutcome::Abandoned => self.metrics.record_failure(),
		}

		for (rank, waiter) in waiters.into_iter().enumerate() {
			// A waiter whose caller was dropped has nothing left to resume.
			let _ = waiter.send((rank, outcome.clone()));
		}
	}
}
impl Default for RefreshCoordinator {
	fn default() -> Self {
		Self::new()
	}
}

/// Leader handle. Dropping it without [`complete`](Self::complete) releases the waiters with
/// [`RefreshOutcome::Abandoned`].
#[derive(Debug)]
pub struct RefreshLeader {
	coordinator: Arc<RefreshCoordinator>,
	completed: bool,
}
impl RefreshLeader {
	/// Publishes the outcome to every waiter in insertion order and returns to idle.
	pub fn complete(mut self, outcome: RefreshOutcome) {
		self.completed = true;
		self.coordinator.finish(outcome);
	}
}
impl Drop for RefreshLeader {
	fn drop(&mut self) {
		if !self.completed {
			self.coordinator.finish(RefreshOutcome::Abandoned);
		}
	}
}

/// Waiter handle resolved by the leader.
#[derive(Debug)]
pub struct RefreshWaiter(oneshot::Receiver<(usize, RefreshOutcome)>);
impl RefreshWaiter {
	/// Waits for the leader's outcome.
	pub async fn wait(self) -> RefreshOutcome {
		self.wait_ranked().await.1
	}

	/// Waits for the leader's outcome along with the order in which this waiter was released.
	/// A vanished coordinator counts as an abandoned refresh with rank `usize::MAX`.
	pub async fn wait_ranked(self) -> (usize, RefreshOutcome) {
		self.0.await.unwrap_or((usize::MAX, RefreshOutcome::Abandoned))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn leader(ticket: RefreshTicket) -> RefreshLeader {
		match ticket {
			RefreshTicket::Leader(leader) => leader,
			RefreshTicket::Waiter(_) => panic!("Idle coordinator should hand out the leader role."),
		}
	}

	fn waiter(ticket: RefreshTicket) -> RefreshWaiter {
		match ticket {
			RefreshTicket::Waiter(waiter) => waiter,
			RefreshTicket::Leader(_) => panic!("Busy coordinator should queue the caller."),
		}
	}

	#[tokio::test]
	async fn only_first_caller_leads() {
		let coordinator = Arc::new(RefreshCoordinator::new());
		let lead = leader(coordinator.begin());
		let first = waiter(coordinator.begin());
		let second = waiter(coordinator.begin());

		assert_eq!(coordinator.phase(), RefreshPhase::Refreshing);
		assert_eq!(coordinator.pending(), 2);

		lead.complete(RefreshOutcome::Refreshed(TokenSecret::new("NEW")));

		assert_eq!(coordinator.phase(), RefreshPhase::Idle);
		assert_eq!(coordinator.pending(), 0);
		assert_eq!(first.wait().await, RefreshOutcome::Refreshed(TokenSecret::new("NEW")));
		assert_eq!(second.wait().await, RefreshOutcome::Refreshed(TokenSecret::new("NEW")));
		assert_eq!(coordinator.metrics().attempts(), 1);
		assert_eq!(coordinator.metrics().queued(), 2);
		assert_eq!(coordinator.metrics().successes(), 1);
	}

	#[tokio::test]
	async fn waiters_are_released_in_insertion_order() {
		let coordinator = Arc::new(RefreshCoordinator::new());
		let lead = leader(coordinator.begin());
		let queued = (0..4).map(|_| waiter(coordinator.begin())).collect::<Vec<_>>();

		lead.complete(RefreshOutcome::Refreshed(TokenSecret::new("NEW")));

		// Await in reverse so the ranks reflect the release order, not the polling order.
		let mut ranks = Vec::new();

		for ticket in queued.into_iter().rev() {
			let (rank, outcome) = ticket.wait_ranked().await;

			assert_eq!(outcome, RefreshOutcome::Refreshed(TokenSecret::new("NEW")));
			ranks.push(rank);
		}

		assert_eq!(ranks, vec![3, 2, 1, 0]);
	}

	#[tokio::test]
	async fn dropped_leader_abandons_waiters_and_resets() {
		let coordinator = Arc::new(RefreshCoordinator::new());
		let lead = leader(coordinator.begin());
		let parked = waiter(coordinator.begin());

		drop(lead);

		assert_eq!(parked.wait().await, RefreshOutcome::Abandoned);
		assert_eq!(coordinator.phase(), RefreshPhase::Idle);
		assert_eq!(coordinator.metrics().failures(), 1);

		let _next = leader(coordinator.begin());
	}

	#[tokio::test]
	async fn coordinators_are_independent() {
		let a = Arc::new(RefreshCoordinator::new());
		let b = Arc::new(RefreshCoordinator::new());
		let _lead_a = leader(a.begin());
		let _lead_b = leader(b.begin());

		assert_eq!(a.pending(), 0);
		assert_eq!(b.pending(), 0);
	}
}
