// std
use std::time::Duration;
// self
use crate::{
	_prelude::*,
	config::{ClientConfig, SessionKeys, XsrfSource},
	error::ConfigError,
};

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Backend base URL.
	pub base_url: Url,
	/// Refresh endpoint path.
	pub refresh_path: String,
	/// Login redirect path.
	pub login_path: String,
	/// Refresh trigger statuses.
	pub refresh_statuses: Vec<u16>,
	/// Anti-forgery token source.
	pub xsrf_source: XsrfSource,
	/// Request header name for the anti-forgery token.
	pub xsrf_request_header: String,
	/// Response header name for rotated anti-forgery tokens.
	pub xsrf_response_header: String,
	/// Store keys.
	pub keys: SessionKeys,
	/// Optional transport timeout.
	pub timeout: Option<Duration>,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with defaults for the provided base URL.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: ClientConfig::DEFAULT_REFRESH_PATH.into(),
			login_path: ClientConfig::DEFAULT_LOGIN_PATH.into(),
			refresh_statuses: ClientConfig::DEFAULT_REFRESH_STATUSES.to_vec(),
			xsrf_source: XsrfSource::default(),
			xsrf_request_header: ClientConfig::DEFAULT_XSRF_REQUEST_HEADER.into(),
			xsrf_response_header: ClientConfig::DEFAULT_XSRF_RESPONSE_HEADER.into(),
			keys: SessionKeys::default(),
			timeout: None,
		}
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the login redirect path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}

	/// Replaces the statuses that trigger a refresh; an empty set disables refreshing.
	pub fn refresh_statuses<I>(mut self, statuses: I) -> Self
	where
		I: IntoIterator<Item = u16>,
	{
		self.refresh_statuses = statuses.into_iter().collect();

		self
	}

	/// Selects where the anti-forgery token lives.
	pub fn xsrf_source(mut self, source: XsrfSource) -> Self {
		self.xsrf_source = source;

		self
	}

	/// Overrides the anti-forgery request header name.
	pub fn xsrf_request_header(mut self, name: impl Into<String>) -> Self {
		self.xsrf_request_header = name.into();

		self
	}

	/// Overrides the anti-forgery response header name.
	pub fn xsrf_response_header(mut self, name: impl Into<String>) -> Self {
		self.xsrf_response_header = name.into();

		self
	}

	/// Overrides the store keys.
	pub fn keys(mut self, keys: SessionKeys) -> Self {
		self.keys = keys;

		self
	}

	/// Bounds every transport call, including the refresh call.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		if !matches!(self.base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { url: self.base_url.to_string() });
		}

		ensure_rooted("refresh", &self.refresh_path)?;
		ensure_rooted("login", &self.login_path)?;

		if let Some(&status) = self.refresh_statuses.iter().find(|s| !(400..=599).contains(*s)) {
			return Err(ConfigError::InvalidTriggerStatus { status });
		}

		let mut refresh_statuses = self.refresh_statuses;

		refresh_statuses.sort_unstable();
		refresh_statuses.dedup();

		Ok(ClientConfig {
			base_url: self.base_url,
			refresh_path: self.refresh_path,
			login_path: self.login_path,
			refresh_statuses,
			xsrf_source: self.xsrf_source,
			xsrf_request_header: header_name(&self.xsrf_request_header)?,
			xsrf_response_header: header_name(&self.xsrf_response_header)?,
			keys: self.keys,
			timeout: self.timeout,
		})
	}
}

fn ensure_rooted(field: &'static str, path: &str) -> Result<(), ConfigError> {
	if path.starts_with('/') {
		Ok(())
	} else {
		Err(ConfigError::UnrootedPath { field, path: path.to_owned() })
	}
}

fn header_name(raw: &str) -> Result<HeaderName, ConfigError> {
	HeaderName::from_bytes(raw.as_bytes())
		.map_err(|_| ConfigError::InvalidHeaderName { name: raw.to_owned() })
}
