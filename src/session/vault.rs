//! Typed access to session values held in a [`SessionStore`].

// self
use crate::{
	_prelude::*,
	config::SessionKeys,
	obs::log_event,
	session::{LoginInfo, TokenSecret},
	store::{SessionStore, StoreError},
};

/// Reads and rewrites the login blob and the anti-forgery token.
///
/// Corrupt entries never surface as errors: a login blob that fails to parse loads as "no
/// session". Backend failures still propagate so callers can decide whether to continue.
#[derive(Clone)]
pub struct SessionVault {
	store: Arc<dyn SessionStore>,
	keys: SessionKeys,
}
impl SessionVault {
	/// Wraps a store using the provided keys.
	pub fn new(store: Arc<dyn SessionStore>, keys: SessionKeys) -> Self {
		Self { store, keys }
	}

	/// Keys this vault reads and writes.
	pub fn keys(&self) -> &SessionKeys {
		&self.keys
	}

	/// Loads the login blob, returning `None` when missing or corrupt.
	pub async fn load_session(&self) -> Result<Option<LoginInfo>, StoreError> {
		let Some(raw) = self.store.get(&self.keys.login_info).await? else {
			return Ok(None);
		};
		let parsed = LoginInfo::parse(&raw);

		if parsed.is_none() {
			log_event!(warn, key = %self.keys.login_info, "Ignoring malformed login info entry.");
		}

		Ok(parsed)
	}

	/// Returns the stored access token when present and non-empty.
	pub async fn access_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.load_session().await?.and_then(|info| info.access_token().cloned()))
	}

	/// Persists a whole login blob, typically right after login.
	pub async fn save_session(&self, info: &LoginInfo) -> Result<(), StoreError> {
		let raw = info.to_json().map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize login info: {e}"),
		})?;

		self.store.set(&self.keys.login_info, raw).await
	}

	/// Rewrites the access token inside the stored blob, starting from an empty blob when
	/// nothing usable is stored.
	pub async fn replace_access_token(&self, token: TokenSecret) -> Result<LoginInfo, StoreError> {
		let mut info = self.load_session().await?.unwrap_or_default();

		info.set_access_token(token);
		self.save_session(&info).await?;

		Ok(info)
	}

	/// Returns the stored anti-forgery token when present and non-empty.
	pub async fn xsrf_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self
			.store
			.get(&self.keys.xsrf)
			.await?
			.filter(|value| !value.is_empty())
			.map(TokenSecret::new))
	}

	/// Overwrites the stored anti-forgery token.
	pub async fn save_xsrf_token(&self, token: &TokenSecret) -> Result<(), StoreError> {
		self.store.set(&self.keys.xsrf, token.expose().to_owned()).await
	}

	/// Deletes the login blob and the anti-forgery token.
	///
	/// Both removals are attempted even if the first fails; the first error is returned.
	pub async fn clear(&self) -> Result<(), StoreError> {
		let login = self.store.remove(&self.keys.login_info).await;
		let xsrf = self.store.remove(&self.keys.xsrf).await;

		login.and(xsrf)
	}
}
impl Debug for SessionVault {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionVault").field("keys", &self.keys).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::MemoryStore;

	fn vault() -> (SessionVault, MemoryStore) {
		let store = MemoryStore::default();

		(SessionVault::new(Arc::new(store.clone()), SessionKeys::default()), store)
	}

	#[tokio::test]
	async fn stored_token_reads_back() {
		let (vault, _) = vault();

		vault
			.save_session(&LoginInfo::with_access_token("T"))
			.await
			.expect("Saving login info should succeed.");

		let token = vault.access_token().await.expect("Reading token should succeed.");

		assert_eq!(token.as_ref().map(TokenSecret::expose), Some("T"));
	}

	#[tokio::test]
	async fn corrupt_blob_loads_as_no_session() {
		let (vault, store) = vault();

		store.set("loginInfo", "{\"accessToken\":".into()).await.expect("Seed should succeed.");

		assert!(vault.load_session().await.expect("Load should not fail.").is_none());
		assert!(vault.access_token().await.expect("Read should not fail.").is_none());
	}

	#[tokio::test]
	async fn replace_access_token_starts_fresh_over_corrupt_blob() {
		let (vault, store) = vault();

		store.set("loginInfo", "garbage".into()).await.expect("Seed should succeed.");
		vault
			.replace_access_token(TokenSecret::new("NEW"))
			.await
			.expect("Replacing token should succeed.");

		assert_eq!(store.snapshot("loginInfo").as_deref(), Some(r#"{"accessToken":"NEW"}"#));
	}

	#[tokio::test]
	async fn clear_removes_both_entries() {
		let (vault, store) = vault();

		vault
			.save_session(&LoginInfo::with_access_token("T"))
			.await
			.expect("Saving login info should succeed.");
		vault.save_xsrf_token(&TokenSecret::new("X1")).await.expect("Saving XSRF should succeed.");
		vault.clear().await.expect("Clearing should succeed.");

		assert!(store.is_empty());
		assert!(vault.xsrf_token().await.expect("Read should succeed.").is_none());
	}
}
