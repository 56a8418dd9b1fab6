//! Transport primitives for API calls.
//!
//! The module exposes [`Transport`] alongside the request/response values that flow through
//! the client. [`ApiRequest`] is what callers build (a path relative to the configured base
//! URL); [`OutgoingRequest`] is what a transport receives once the request stage has resolved
//! the URL and attached credentials. Custom transports only need [`Transport::send`]; cookie
//! support is optional and defaults to "no cookies".

// crates.io
use serde::de::DeserializeOwned;
#[cfg(feature = "reqwest")] use ::http::header::SET_COOKIE;
#[cfg(feature = "reqwest")] use reqwest::cookie::{CookieStore, Jar};
// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")] use crate::{config::ClientConfig, error::ConfigError};

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing API calls.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by
/// every in-flight call of a client, and the returned futures must be `Send`.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Executes a fully prepared request. Non-2xx statuses are responses, not errors.
	fn send(&self, request: OutgoingRequest) -> TransportFuture<'_, ApiResponse>;

	/// Returns the value of the cookie `name` visible to the backend origin, if the transport
	/// keeps a cookie jar.
	fn cookie(&self, name: &str) -> Option<String> {
		let _ = name;

		None
	}

	/// Expires the cookie `name` for the backend origin.
	fn expire_cookie(&self, name: &str) {
		let _ = name;
	}
}

/// Caller-facing request description.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the configured base URL, or an absolute `http(s)://` URL.
	pub path: String,
	/// Caller-supplied headers; credentials are layered on top.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
	retried: bool,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), headers: HeaderMap::new(), body: None, retried: false }
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `value` as the JSON body and sets `Content-Type: application/json`.
	pub fn json<T>(mut self, value: &T) -> Result<Self, serde_json::Error>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(value)?);
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Returns `true` once the request has been through a refresh-and-replay cycle.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Marks the request as retried so an auth failure never triggers another refresh for it.
	pub fn mark_retried(&mut self) {
		self.retried = true;
	}

	/// Builder-style variant of [`mark_retried`](Self::mark_retried).
	pub fn retried(mut self) -> Self {
		self.mark_retried();

		self
	}
}

/// Resolved request handed to a [`Transport`].
#[derive(Clone, Debug)]
pub struct OutgoingRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL.
	pub url: Url,
	/// Final header set, credentials included.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
}
impl OutgoingRequest {
	/// Returns the bearer token carried in `Authorization`, if any.
	pub fn bearer_token(&self) -> Option<&str> {
		self.headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
	}
}

/// Buffered HTTP response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Builds a response, mostly useful for custom transports and tests.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns a header value as UTF-8, ignoring values that are not valid strings.
	pub fn header_str(&self, name: &HeaderName) -> Option<&str> {
		self.headers.get(name)?.to_str().ok()
	}

	/// Decodes the body lossily as UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Deserializes the JSON body, reporting the failing path on error.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
	}
}

/// Reqwest-backed [`Transport`] with a cookie jar scoped to the backend origin.
///
/// The jar carries the refresh cookie issued at login, so the refresh call authenticates the
/// same way a browser does with `withCredentials`. The transport also remembers the `Path`
/// each cookie was set with, because a cookie can only be expired at its own path.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	jar: Arc<Jar>,
	origin: Url,
	cookie_paths: Arc<RwLock<HashMap<String, String>>>,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport for the configured backend, honoring the optional timeout.
	pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
		let jar = Arc::new(Jar::default());
		let mut builder = ReqwestClient::builder().cookie_provider(Arc::clone(&jar));

		if let Some(timeout) = config.timeout {
			builder = builder.timeout(timeout);
		}

		Ok(Self::with_client(builder.build()?, jar, config.base_url.clone()))
	}

	/// Wraps an existing client. The client must have been built with `jar` as its cookie
	/// provider for cookie lookups to observe what the backend sets.
	pub fn with_client(client: ReqwestClient, jar: Arc<Jar>, origin: Url) -> Self {
		Self { client, jar, origin, cookie_paths: Default::default() }
	}

	/// Shared cookie jar.
	pub fn jar(&self) -> &Arc<Jar> {
		&self.jar
	}

	/// Records the effective path of every cookie set by a response from `url`.
	pub fn remember_cookie_paths(&self, headers: &HeaderMap, url: &Url) {
		let mut paths = self.cookie_paths.write();

		for value in headers.get_all(SET_COOKIE).iter().filter_map(|v| v.to_str().ok()) {
			if let Some((name, path)) = set_cookie_path(value, url) {
				paths.insert(name, path);
			}
		}
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn send(&self, request: OutgoingRequest) -> TransportFuture<'_, ApiResponse> {
		Box::pin(async move {
			let mut builder =
				self.client.request(request.method, request.url).headers(request.headers);

			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();

			self.remember_cookie_paths(&headers, response.url());
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}

	fn cookie(&self, name: &str) -> Option<String> {
		let header = self.jar.cookies(&self.origin)?;

		find_cookie(header.to_str().ok()?, name)
	}

	fn expire_cookie(&self, name: &str) {
		let path = self.cookie_paths.write().remove(name).unwrap_or_else(|| "/".into());

		self.jar.add_cookie_str(&format!("{name}=; Max-Age=0; Path={path}"), &self.origin);
	}
}

/// Extracts `name` from a `Cookie` header value (`a=1; b=2`).
pub fn find_cookie(header: &str, name: &str) -> Option<String> {
	header
		.split(';')
		.map(str::trim)
		.find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
		.filter(|value| !value.is_empty())
		.map(str::to_owned)
}

/// Returns the cookie name and effective path of a `Set-Cookie` value received from `url`.
///
/// Without a usable `Path` attribute the path defaults to the directory of the request path.
pub fn set_cookie_path(header: &str, url: &Url) -> Option<(String, String)> {
	let mut parts = header.split(';').map(str::trim);
	let (name, _) = parts.next()?.split_once('=')?;
	let name = name.trim();

	if name.is_empty() {
		return None;
	}

	let explicit = parts
		.filter_map(|attr| attr.split_once('='))
		.filter(|(key, _)| key.trim().eq_ignore_ascii_case("path"))
		.map(|(_, value)| value.trim())
		.filter(|value| value.starts_with('/'))
		.next_back();
	let path = match explicit {
		Some(path) => path.to_owned(),
		None => match url.path().rfind('/') {
			Some(0) | None => "/".to_owned(),
			Some(idx) => url.path()[..idx].to_owned(),
		},
	};

	Some((name.to_owned(), path))
}
