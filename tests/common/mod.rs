//! Shared fixtures for integration tests.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use api_session::{
	client::ApiClient,
	config::ClientConfig,
	http::ReqwestTransport,
	navigate::RecordingNavigator,
	session::{LoginInfo, TokenSecret},
	store::{MemoryStore, SessionStore},
	url::Url,
};

/// Client type used by reqwest-backed integration tests.
pub type ReqwestTestClient = ApiClient<ReqwestTransport>;

/// Default configuration pointed at `base_url`.
pub fn test_config(base_url: &str) -> ClientConfig {
	ClientConfig::builder(Url::parse(base_url).expect("Test base URL should parse."))
		.build()
		.expect("Default client config should build for tests.")
}

/// Builds a reqwest-backed client over an in-memory store with a recording navigator.
pub fn build_reqwest_test_client(
	config: ClientConfig,
) -> (ReqwestTestClient, Arc<MemoryStore>, Arc<RecordingNavigator>) {
	let store_backend = Arc::new(MemoryStore::default());
	let store: Arc<dyn SessionStore> = store_backend.clone();
	let navigator = Arc::new(RecordingNavigator::default());
	let transport =
		ReqwestTransport::new(&config).expect("Failed to build Reqwest transport for tests.");
	let client =
		ApiClient::with_transport(config, transport, store).with_navigator(navigator.clone());

	(client, store_backend, navigator)
}

/// Seeds the login blob and, optionally, the stored anti-forgery token.
pub async fn seed_session<T>(client: &ApiClient<T>, access: &str, xsrf: Option<&str>)
where
	T: ?Sized + api_session::http::Transport,
{
	client
		.vault()
		.save_session(&LoginInfo::with_access_token(access))
		.await
		.expect("Failed to seed login info.");

	if let Some(xsrf) = xsrf {
		client
			.vault()
			.save_xsrf_token(&TokenSecret::new(xsrf))
			.await
			.expect("Failed to seed anti-forgery token.");
	}
}

/// Reads the stored access token as a plain string.
pub async fn stored_access_token<T>(client: &ApiClient<T>) -> Option<String>
where
	T: ?Sized + api_session::http::Transport,
{
	client
		.vault()
		.access_token()
		.await
		.expect("Reading the stored access token should succeed.")
		.map(|token| token.expose().to_owned())
}
