//! Navigation hook invoked when the session is lost.
//!
//! A browser client would assign `window.location`; embedders plug in whatever "go to the
//! login screen" means for them (route change, channel message, process exit).

// self
use crate::{_prelude::*, obs::log_event};

/// Receives client-side navigation requests.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Navigates to `location` (for example `/login`).
	fn navigate(&self, location: &str);
}
impl<F> Navigator for F
where
	F: Fn(&str) + Send + Sync,
{
	fn navigate(&self, location: &str) {
		self(location)
	}
}

/// Default navigator that only logs the redirect.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNavigator;
impl Navigator for LogNavigator {
	fn navigate(&self, location: &str) {
		log_event!(warn, location, "Session lost; navigation requested.");

		let _ = location;
	}
}

/// Navigator that records every location, in order.
#[derive(Debug, Default)]
pub struct RecordingNavigator(Mutex<Vec<String>>);
impl RecordingNavigator {
	/// Locations navigated to so far.
	pub fn visits(&self) -> Vec<String> {
		self.0.lock().clone()
	}

	/// Most recent location, if any.
	pub fn last(&self) -> Option<String> {
		self.0.lock().last().cloned()
	}
}
impl Navigator for RecordingNavigator {
	fn navigate(&self, location: &str) {
		self.0.lock().push(location.to_owned());
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	#[test]
	fn recording_navigator_keeps_order() {
		let navigator = RecordingNavigator::default();

		navigator.navigate("/login");
		navigator.navigate("/login?expired=1");

		assert_eq!(navigator.visits(), vec!["/login".to_owned(), "/login?expired=1".to_owned()]);
		assert_eq!(navigator.last().as_deref(), Some("/login?expired=1"));
	}

	#[test]
	fn closures_are_navigators() {
		let hits = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&hits);
		let navigator: Arc<dyn Navigator> = Arc::new(move |location: &str| {
			assert_eq!(location, "/login");
			counter.fetch_add(1, Ordering::Relaxed);
		});

		navigator.navigate("/login");
		LogNavigator.navigate("/login");

		assert_eq!(hits.load(Ordering::Relaxed), 1);
	}
}
