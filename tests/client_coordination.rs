//! Refresh coordination against an in-process backend whose refresh endpoint is held open until
//! the test releases it, so queued callers are observed deterministically.

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use futures::channel::oneshot;
use parking_lot::Mutex;
// self
use api_session::{
	client::ApiClient,
	config::ClientConfig,
	error::{Error, TransportError},
	http::{ApiResponse, OutgoingRequest, Transport, TransportFuture},
	http_types::{HeaderName, HeaderValue, StatusCode},
	navigate::RecordingNavigator,
	session::LoginInfo,
	store::{MemoryStore, SessionStore},
	url::Url,
};

type FakeClient = ApiClient<FakeBackend>;

/// Accepts only `Bearer NEW`; the refresh endpoint waits on `gate` before answering.
struct FakeBackend {
	refresh_succeeds: bool,
	gate: Mutex<Option<oneshot::Receiver<()>>>,
	refresh_calls: AtomicUsize,
	seen: Mutex<Vec<(String, Option<String>)>>,
}
impl FakeBackend {
	fn new(refresh_succeeds: bool, gate: Option<oneshot::Receiver<()>>) -> Arc<Self> {
		Arc::new(Self {
			refresh_succeeds,
			gate: Mutex::new(gate),
			refresh_calls: AtomicUsize::new(0),
			seen: Mutex::new(Vec::new()),
		})
	}

	fn refresh_calls(&self) -> usize {
		self.refresh_calls.load(Ordering::SeqCst)
	}

	fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
		self.seen.lock().iter().filter(|(p, _)| p == path).map(|(_, b)| b.clone()).collect()
	}
}
impl Transport for FakeBackend {
	fn send(&self, request: OutgoingRequest) -> TransportFuture<'_, ApiResponse> {
		Box::pin(async move {
			let path = request.url.path().to_owned();
			let bearer = request.bearer_token().map(str::to_owned);

			self.seen.lock().push((path.clone(), bearer.clone()));

			if path.ends_with("/auth/refresh") {
				self.refresh_calls.fetch_add(1, Ordering::SeqCst);

				let gate = self.gate.lock().take();

				if let Some(gate) = gate {
					gate.await.map_err(|_| TransportError::Request {
						message: "Refresh gate dropped.".into(),
					})?;
				}

				return Ok(if self.refresh_succeeds {
					ApiResponse::new(StatusCode::OK, br#"{"accessToken":"NEW"}"#.to_vec())
						.with_header(
							HeaderName::from_static("x-xsrf-token"),
							HeaderValue::from_static("X2"),
						)
				} else {
					ApiResponse::new(StatusCode::UNAUTHORIZED, b"refresh expired".to_vec())
				});
			}

			Ok(match bearer.as_deref() {
				Some("NEW") => ApiResponse::new(StatusCode::OK, path.into_bytes()),
				_ => ApiResponse::new(StatusCode::UNAUTHORIZED, Vec::new()),
			})
		})
	}
}

async fn build(
	backend: &Arc<FakeBackend>,
) -> (FakeClient, Arc<MemoryStore>, Arc<RecordingNavigator>) {
	let config = ClientConfig::builder(
		Url::parse("https://api.example.com/v1").expect("Base URL should parse."),
	)
	.build()
	.expect("Config should build.");
	let store_backend = Arc::new(MemoryStore::default());
	let store: Arc<dyn SessionStore> = store_backend.clone();
	let navigator = Arc::new(RecordingNavigator::default());
	let client = ApiClient::with_transport(config, Arc::clone(backend), store)
		.with_navigator(navigator.clone());

	client
		.vault()
		.save_session(&LoginInfo::with_access_token("OLD"))
		.await
		.expect("Seeding the session should succeed.");

	(client, store_backend, navigator)
}

async fn release_when_queued(client: &FakeClient, gate: oneshot::Sender<()>) {
	while client.coordinator().pending() < 1 {
		tokio::task::yield_now().await;
	}

	let _ = gate.send(());
}

#[tokio::test]
async fn queued_caller_replays_with_leader_token() {
	let (release, gate) = oneshot::channel();
	let backend = FakeBackend::new(true, Some(gate));
	let (client, store, navigator) = build(&backend).await;
	let (a, b, ()) =
		futures::join!(client.get("/a"), client.get("/b"), release_when_queued(&client, release));

	assert_eq!(a.expect("Leader should replay successfully.").text(), "/v1/a");
	assert_eq!(b.expect("Waiter should replay successfully.").text(), "/v1/b");
	assert_eq!(backend.refresh_calls(), 1);
	assert_eq!(
		backend.bearers_for("/v1/a"),
		vec![Some("OLD".to_owned()), Some("NEW".to_owned())]
	);
	assert_eq!(
		backend.bearers_for("/v1/b"),
		vec![Some("OLD".to_owned()), Some("NEW".to_owned())]
	);
	assert_eq!(store.snapshot("XSRF-TOKEN").as_deref(), Some("X2"));
	assert!(
		LoginInfo::parse(&store.snapshot("loginInfo").expect("Login info should persist."))
			.and_then(|info| info.access_token().map(|t| t.expose() == "NEW"))
			.unwrap_or(false)
	);
	assert!(navigator.visits().is_empty());
	assert_eq!(client.coordinator().pending(), 0);
	assert_eq!(client.coordinator().metrics().queued(), 1);
}

#[tokio::test]
async fn failed_refresh_expires_leader_and_waiters_alike() {
	let (release, gate) = oneshot::channel();
	let backend = FakeBackend::new(false, Some(gate));
	let (client, store, navigator) = build(&backend).await;
	let (a, b, ()) =
		futures::join!(client.get("/a"), client.get("/b"), release_when_queued(&client, release));

	match a {
		Err(Error::SessionExpired { original, cause: Some(cause) }) => {
			assert_eq!(original.status, 401);
			assert_eq!(cause.status(), Some(401));
		},
		other => panic!("Leader should carry the refresh failure, got {other:?}."),
	}
	match b {
		Err(Error::SessionExpired { cause: None, .. }) => {},
		other => panic!("Waiter should expire without a cause, got {other:?}."),
	}

	assert_eq!(backend.refresh_calls(), 1);
	assert!(store.is_empty());
	assert_eq!(navigator.visits(), vec!["/login".to_owned()]);
	assert_eq!(client.coordinator().metrics().failures(), 1);
}

#[tokio::test]
async fn later_failures_start_a_fresh_refresh() {
	let backend = FakeBackend::new(true, None);
	let (client, store, _) = build(&backend).await;

	client.get("/a").await.expect("First refresh cycle should succeed.");

	client.clear_session().await.expect("Clearing should succeed.");

	assert!(store.is_empty());

	client
		.vault()
		.save_session(&LoginInfo::with_access_token("OLD"))
		.await
		.expect("Reseeding the session should succeed.");
	client.get("/b").await.expect("Second refresh cycle should succeed.");

	assert_eq!(backend.refresh_calls(), 2);
	assert_eq!(client.coordinator().metrics().attempts(), 2);
}

#[tokio::test]
async fn separate_clients_refresh_independently() {
	let backend = FakeBackend::new(true, None);
	let (first, _, _) = build(&backend).await;
	let (second, _, _) = build(&backend).await;

	first.get("/a").await.expect("First client should refresh.");
	second.get("/b").await.expect("Second client should refresh on its own.");

	assert_eq!(backend.refresh_calls(), 2);
	assert_eq!(first.coordinator().metrics().attempts(), 1);
	assert_eq!(second.coordinator().metrics().attempts(), 1);
}

#[tokio::test]
async fn clones_share_refresh_state() {
	let (release, gate) = oneshot::channel();
	let backend = FakeBackend::new(true, Some(gate));
	let (client, _, _) = build(&backend).await;
	let clone = client.clone();
	let (a, b, ()) =
		futures::join!(client.get("/a"), clone.get("/b"), release_when_queued(&client, release));

	a.expect("Original should replay.");
	b.expect("Clone should replay.");

	assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test]
async fn dropped_leader_releases_waiters_without_logging_out() {
	// The sender stays alive so the refresh never answers.
	let (_hold, gate) = oneshot::channel::<()>();
	let backend = FakeBackend::new(true, Some(gate));
	let (client, store, navigator) = build(&backend).await;
	let mut leader = Box::pin(client.get("/a"));

	assert!(futures::poll!(&mut leader).is_pending());

	let mut queued = Box::pin(client.get("/b"));

	assert!(futures::poll!(&mut queued).is_pending());
	assert_eq!(client.coordinator().pending(), 1);

	drop(leader);

	match queued.await {
		Err(Error::RefreshAbandoned { original }) => assert_eq!(original.status, 401),
		other => panic!("Queued caller should see an abandoned refresh, got {other:?}."),
	}

	assert!(store.snapshot("loginInfo").is_some());
	assert!(navigator.visits().is_empty());
	assert_eq!(client.coordinator().pending(), 0);
	assert_eq!(backend.refresh_calls(), 1);
}
