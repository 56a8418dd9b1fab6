//! Client configuration: backend location, refresh policy, anti-forgery wiring, and store keys.

mod builder;

pub use builder::*;

// std
use std::{env, time::Duration};
// self
use crate::{_prelude::*, error::ConfigError};

/// Environment variable holding the backend base URL.
pub const ENV_BASE_URL: &str = "API_BASE_URL";
/// Environment variable overriding the refresh endpoint path.
pub const ENV_REFRESH_PATH: &str = "API_REFRESH_PATH";
/// Environment variable overriding the login redirect path.
pub const ENV_LOGIN_PATH: &str = "API_LOGIN_PATH";

/// Where the anti-forgery token is read from and cleared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum XsrfSource {
	/// Persistent store entry, rotated from the `x-xsrf-token` response header.
	#[default]
	Store,
	/// Cookie set by the backend and held by the transport's cookie jar.
	Cookie,
}

/// Keys under which session values live in the [`SessionStore`](crate::store::SessionStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKeys {
	/// Key of the JSON login blob.
	pub login_info: String,
	/// Key (and cookie name) of the anti-forgery token.
	pub xsrf: String,
}
impl Default for SessionKeys {
	fn default() -> Self {
		Self { login_info: "loginInfo".into(), xsrf: "XSRF-TOKEN".into() }
	}
}

/// Validated configuration consumed by [`ApiClient`](crate::client::ApiClient).
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Backend origin (and optional path prefix) every relative request is resolved against.
	pub base_url: Url,
	/// Path of the refresh endpoint.
	pub refresh_path: String,
	/// Client-side location navigated to once the session is lost.
	pub login_path: String,
	/// Response statuses that trigger a refresh attempt.
	pub refresh_statuses: Vec<u16>,
	/// Source of the anti-forgery token.
	pub xsrf_source: XsrfSource,
	/// Request header carrying the anti-forgery token.
	pub xsrf_request_header: HeaderName,
	/// Response header carrying a rotated anti-forgery token.
	pub xsrf_response_header: HeaderName,
	/// Store keys.
	pub keys: SessionKeys,
	/// Optional per-request transport timeout.
	pub timeout: Option<Duration>,
}
impl ClientConfig {
	/// Default refresh endpoint path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "/auth/refresh";
	/// Default login redirect path.
	pub const DEFAULT_LOGIN_PATH: &'static str = "/login";
	/// Default request header carrying the anti-forgery token.
	pub const DEFAULT_XSRF_REQUEST_HEADER: &'static str = "X-XSRF-TOKEN";
	/// Default response header carrying a rotated anti-forgery token.
	pub const DEFAULT_XSRF_RESPONSE_HEADER: &'static str = "x-xsrf-token";
	/// Default refresh trigger statuses.
	pub const DEFAULT_REFRESH_STATUSES: [u16; 2] = [401, 403];

	/// Returns a builder seeded with defaults.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Builds a configuration from `API_BASE_URL`, `API_REFRESH_PATH`, and `API_LOGIN_PATH`.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let raw = lookup(ENV_BASE_URL)
			.filter(|value| !value.trim().is_empty())
			.ok_or(ConfigError::MissingEnv { name: ENV_BASE_URL })?;
		let base_url = Url::parse(raw.trim())
			.map_err(|source| ConfigError::InvalidBaseUrl { source })?;
		let mut builder = Self::builder(base_url);

		if let Some(path) = lookup(ENV_REFRESH_PATH) {
			builder = builder.refresh_path(path);
		}
		if let Some(path) = lookup(ENV_LOGIN_PATH) {
			builder = builder.login_path(path);
		}

		builder.build()
	}

	/// Returns `true` when `status` should trigger a refresh attempt.
	pub fn triggers_refresh(&self, status: u16) -> bool {
		self.refresh_statuses.contains(&status)
	}

	/// Resolves a request path against the base URL.
	///
	/// Relative paths are appended to the base (keeping any base path prefix) with duplicate
	/// slashes collapsed; absolute `http(s)://` URLs are used as-is.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		let invalid = |source| ConfigError::InvalidPath { path: path.to_owned(), source };

		if path.starts_with("http://") || path.starts_with("https://") {
			return Url::parse(path).map_err(invalid);
		}

		let base = self.base_url.as_str().trim_end_matches('/');
		let tail = path.trim_start_matches('/');

		if tail.is_empty() {
			return Url::parse(base).map_err(invalid);
		}

		Url::parse(&format!("{base}/{tail}")).map_err(invalid)
	}

	/// Absolute URL of the refresh endpoint.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		self.resolve(&self.refresh_path)
	}
}
