//! Request and response stages.
//!
//! Neither stage fails on missing or unreadable credentials: an unreadable store, a corrupt
//! login blob, or a token that cannot be encoded as a header simply means the header is not
//! sent, and the backend's answer decides what happens next.

// self
use crate::{
	_prelude::*,
	client::ApiClient,
	config::XsrfSource,
	http::{ApiRequest, ApiResponse, OutgoingRequest, Transport},
	obs::log_event,
	session::TokenSecret,
};

impl<T> ApiClient<T>
where
	T: ?Sized + Transport,
{
	/// Resolves the URL and layers headers: defaults, then the caller's, then credentials.
	pub(crate) async fn prepare(&self, request: &ApiRequest) -> Result<OutgoingRequest> {
		let url = self.config.resolve(&request.path)?;
		let mut headers = self.default_headers();

		headers.extend(request.headers.clone());

		if let Some(token) = self.stored_access_token().await {
			set_bearer(&mut headers, &token);
		}
		if let Some(token) = self.current_xsrf_token().await {
			set_secret(&mut headers, self.config.xsrf_request_header.clone(), &token);
		}

		Ok(OutgoingRequest {
			method: request.method.clone(),
			url,
			headers,
			body: request.body.clone(),
		})
	}

	/// Stores a rotated anti-forgery token announced by a successful response.
	pub(crate) async fn capture_xsrf(&self, response: &ApiResponse) {
		if self.config.xsrf_source != XsrfSource::Store {
			return;
		}

		let Some(value) = response
			.header_str(&self.config.xsrf_response_header)
			.filter(|value| !value.is_empty())
		else {
			return;
		};
		let token = TokenSecret::new(value);

		match self.vault.save_xsrf_token(&token).await {
			Ok(()) => {
				log_event!(debug, xsrf = %token.fingerprint(), "Stored rotated anti-forgery token.");
			},
			Err(_e) => {
				log_event!(warn, error = %_e, "Failed to store rotated anti-forgery token.");
			},
		}
	}

	async fn stored_access_token(&self) -> Option<TokenSecret> {
		self.vault
			.access_token()
			.await
			.inspect_err(|_e| {
				log_event!(warn, error = %_e, "Failed to read stored access token.");
			})
			.ok()
			.flatten()
	}

	async fn current_xsrf_token(&self) -> Option<TokenSecret> {
		match self.config.xsrf_source {
			XsrfSource::Store => self
				.vault
				.xsrf_token()
				.await
				.inspect_err(|_e| {
					log_event!(warn, error = %_e, "Failed to read stored anti-forgery token.");
				})
				.ok()
				.flatten(),
			XsrfSource::Cookie => self.transport.cookie(&self.config.keys.xsrf).map(TokenSecret::new),
		}
	}
}

/// Sets `Authorization: Bearer <token>`, replacing any previous value.
pub(crate) fn set_bearer(headers: &mut HeaderMap, token: &TokenSecret) {
	match HeaderValue::from_str(&token.bearer()) {
		Ok(mut value) => {
			value.set_sensitive(true);
			headers.insert(AUTHORIZATION, value);
		},
		Err(_) => {
			headers.remove(AUTHORIZATION);
			log_event!(warn, token = %token.fingerprint(), "Access token is not a valid header value.");
		},
	}
}

fn set_secret(headers: &mut HeaderMap, name: HeaderName, token: &TokenSecret) {
	match HeaderValue::from_str(token.expose()) {
		Ok(mut value) => {
			value.set_sensitive(true);
			headers.insert(name, value);
		},
		Err(_) => {
			log_event!(warn, header = %name, "Anti-forgery token is not a valid header value.");
		},
	}
}
