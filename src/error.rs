//! Client-level error types shared across the request pipeline, stores, and refresh handling.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) before any HTTP status was received.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Backend answered with a non-success status that was passed through untouched.
	#[error(transparent)]
	Status(#[from] StatusError),

	/// Refresh endpoint answered 2xx but the body did not carry an access token.
	#[error("Refresh endpoint returned a malformed body.")]
	InvalidRefreshResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the refresh response.
		status: u16,
	},
	/// Session refresh failed; stored credentials were wiped and the login redirect issued.
	#[error("Session expired after a {} response and could not be refreshed.", .original.status)]
	SessionExpired {
		/// Failure that triggered the refresh attempt.
		original: StatusError,
		/// Refresh failure, when this caller issued the refresh call itself.
		#[source]
		cause: Option<Box<Error>>,
	},
	/// The caller that was refreshing went away before finishing. The stored session is left as
	/// it was, so a later call may still succeed or refresh again.
	#[error("Session refresh was abandoned after a {} response.", .original.status)]
	RefreshAbandoned {
		/// Failure that queued this caller behind the refresh.
		original: StatusError,
	},
}
impl Error {
	/// HTTP status carried by the error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status(e) => Some(e.status),
			Self::InvalidRefreshResponse { status, .. } => Some(*status),
			Self::SessionExpired { original, .. } | Self::RefreshAbandoned { original } =>
				Some(original.status),
			_ => None,
		}
	}

	/// Returns `true` when the error ended the stored session.
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::SessionExpired { .. })
	}
}

/// Configuration and validation failures raised while building a client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than http/https.
	#[error("Base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// URL that failed validation.
		url: String,
	},
	/// Request path cannot be resolved against the base URL.
	#[error("Request path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configured endpoint path is not rooted.
	#[error("The {field} path must start with `/`: {path}.")]
	UnrootedPath {
		/// Which path failed validation.
		field: &'static str,
		/// Offending path value.
		path: String,
	},
	/// Header name cannot be used on the wire.
	#[error("Header name `{name}` is invalid.")]
	InvalidHeaderName {
		/// Offending header name.
		name: String,
	},
	/// Refresh trigger status is not an error status.
	#[error("Refresh trigger status {status} must be within 400..=599.")]
	InvalidTriggerStatus {
		/// Offending status code.
		status: u16,
	},
	/// Required environment variable is not set.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Variable name.
		name: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Outgoing request could not be assembled by the transport.
	#[error("Request could not be built: {message}.")]
	Request {
		/// Human-readable reason.
		message: String,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_builder() {
			Self::Request { message: e.to_string() }
		} else {
			Self::network(e)
		}
	}
}

/// Non-success HTTP response surfaced to the caller.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Request failed with status {status}.")]
pub struct StatusError {
	/// HTTP status code.
	pub status: u16,
	/// Response body decoded lossily as UTF-8.
	pub body: String,
}
