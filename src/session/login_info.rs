//! The persisted login blob.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, session::TokenSecret};

/// JSON object stored under the login-info key.
///
/// Only `accessToken` is interpreted. Every other field written at login is carried through
/// rewrites untouched so refreshes never drop profile data the application stored alongside
/// the token.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginInfo {
	/// Current bearer access token.
	#[serde(rename = "accessToken", default, skip_serializing_if = "Option::is_none")]
	pub access_token: Option<TokenSecret>,
	/// Remaining fields, preserved verbatim.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl LoginInfo {
	/// Creates a blob holding only an access token.
	pub fn with_access_token(token: impl Into<String>) -> Self {
		Self { access_token: Some(TokenSecret::new(token)), extra: Map::new() }
	}

	/// Parses a stored blob; malformed JSON or a non-object payload yields `None`.
	pub fn parse(raw: &str) -> Option<Self> {
		serde_json::from_str(raw).ok()
	}

	/// Serializes the blob for storage.
	pub fn to_json(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}

	/// Returns the access token when present and non-empty.
	pub fn access_token(&self) -> Option<&TokenSecret> {
		self.access_token.as_ref().filter(|token| !token.is_empty())
	}

	/// Replaces the access token, keeping every other field.
	pub fn set_access_token(&mut self, token: TokenSecret) {
		self.access_token = Some(token);
	}
}
impl Debug for LoginInfo {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginInfo")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("extra_fields", &self.extra.keys().collect::<Vec<_>>())
			.finish()
	}
}
