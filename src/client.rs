//! The session-aware API client.
//!
//! [`ApiClient::send`] runs every call through the request stage (credential attachment), the
//! transport, and the response stage. Auth-class failures are recovered by one coordinated
//! refresh followed by a single replay; everything else is surfaced untouched.

mod interceptor;

// self
use crate::{
	_prelude::*,
	config::{ClientConfig, XsrfSource},
	error::StatusError,
	http::{ApiRequest, ApiResponse, Transport},
	navigate::{LogNavigator, Navigator},
	obs::{self, Stage, StageOutcome, StageSpan, log_event},
	refresh::{RefreshCoordinator, RefreshOutcome, RefreshTicket},
	session::{SessionVault, TokenSecret},
	store::SessionStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Body returned by the refresh endpoint.
#[derive(Deserialize)]
struct RefreshResponse {
	#[serde(rename = "accessToken")]
	access_token: TokenSecret,
}

enum Attempt {
	Success(ApiResponse),
	Failed(StatusError),
}

/// HTTP client that attaches session credentials and coordinates token refreshes.
///
/// Clones share the transport, store, default headers, and refresh coordinator, so a refresh
/// started through one clone parks auth failures from every other clone. Separate instances
/// built with [`ApiClient::with_transport`] never share refresh state.
pub struct ApiClient<T>
where
	T: ?Sized + Transport,
{
	config: Arc<ClientConfig>,
	transport: Arc<T>,
	vault: SessionVault,
	coordinator: Arc<RefreshCoordinator>,
	navigator: Arc<dyn Navigator>,
	default_headers: Arc<RwLock<HeaderMap>>,
}
impl<T> ApiClient<T>
where
	T: ?Sized + Transport,
{
	/// Creates a client over the caller-provided transport and store.
	///
	/// The client logs login redirects until [`with_navigator`](Self::with_navigator) installs
	/// a real navigation hook.
	pub fn with_transport(
		config: ClientConfig,
		transport: impl Into<Arc<T>>,
		store: Arc<dyn SessionStore>,
	) -> Self {
		let vault = SessionVault::new(store, config.keys.clone());

		Self {
			config: Arc::new(config),
			transport: transport.into(),
			vault,
			coordinator: Default::default(),
			navigator: Arc::new(LogNavigator),
			default_headers: Default::default(),
		}
	}

	/// Installs the hook that receives the login redirect.
	pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
		self.navigator = navigator;

		self
	}

	/// Adds a header sent with every request unless the caller overrides it.
	pub fn with_default_header(self, name: HeaderName, value: HeaderValue) -> Self {
		self.default_headers.write().insert(name, value);

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Session vault backing this client.
	pub fn vault(&self) -> &SessionVault {
		&self.vault
	}

	/// Refresh coordinator shared by this client and its clones.
	pub fn coordinator(&self) -> &RefreshCoordinator {
		&self.coordinator
	}

	/// Underlying transport.
	pub fn transport(&self) -> &T {
		&self.transport
	}

	/// Snapshot of the headers applied before per-request credentials.
	pub fn default_headers(&self) -> HeaderMap {
		self.default_headers.read().clone()
	}

	/// Sends `request`, refreshing the session and replaying once on an auth-class failure.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let span = StageSpan::new(Stage::Dispatch, &request.path);

		span.instrument(self.send_with_refresh(request)).await
	}

	/// Sends a `GET` request.
	pub async fn get(&self, path: impl Into<String>) -> Result<ApiResponse> {
		self.send(ApiRequest::get(path)).await
	}

	/// Sends a `DELETE` request.
	pub async fn delete(&self, path: impl Into<String>) -> Result<ApiResponse> {
		self.send(ApiRequest::delete(path)).await
	}

	/// Sends a `POST` request with a JSON body.
	pub async fn post_json<B>(&self, path: impl Into<String>, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		self.send(ApiRequest::post(path).json(body).map_err(encode_error)?).await
	}

	/// Sends a `PUT` request with a JSON body.
	pub async fn put_json<B>(&self, path: impl Into<String>, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		self.send(ApiRequest::put(path).json(body).map_err(encode_error)?).await
	}

	/// Drops the stored session without navigating, e.g. for an explicit logout.
	pub async fn clear_session(&self) -> Result<()> {
		self.default_headers.write().remove(AUTHORIZATION);

		if self.config.xsrf_source == XsrfSource::Cookie {
			self.transport.expire_cookie(&self.config.keys.xsrf);
		}

		self.vault.clear().await?;

		Ok(())
	}

	async fn send_with_refresh(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		let failure = match self.attempt(Stage::Dispatch, &request, None).await? {
			Attempt::Success(response) => return Ok(response),
			Attempt::Failed(failure) => failure,
		};

		if request.is_retried() || !self.config.triggers_refresh(failure.status) {
			return Err(failure.into());
		}

		request.mark_retried();

		let token = match self.coordinator.begin() {
			RefreshTicket::Leader(leader) => match self.refresh_session().await {
				Ok(token) => {
					leader.complete(RefreshOutcome::Refreshed(token.clone()));

					token
				},
				Err(cause) => {
					self.expire_session().await;
					leader.complete(RefreshOutcome::Failed);

					return Err(Error::SessionExpired {
						original: failure,
						cause: Some(Box::new(cause)),
					});
				},
			},
			RefreshTicket::Waiter(waiter) => {
				obs::record_stage_outcome(Stage::Refresh, StageOutcome::Queued);
				log_event!(debug, path = %request.path, "Waiting on in-flight session refresh.");

				let (_rank, outcome) = waiter.wait_ranked().await;

				log_event!(debug, path = %request.path, rank = _rank, "Released from session refresh.");

				match outcome {
					RefreshOutcome::Refreshed(token) => token,
					RefreshOutcome::Failed =>
						return Err(Error::SessionExpired { original: failure, cause: None }),
					RefreshOutcome::Abandoned =>
						return Err(Error::RefreshAbandoned { original: failure }),
				}
			},
		};

		self.replay(&request, &token).await
	}

	async fn replay(&self, request: &ApiRequest, token: &TokenSecret) -> Result<ApiResponse> {
		let span = StageSpan::new(Stage::Replay, &request.path);

		match span.instrument(self.attempt(Stage::Replay, request, Some(token))).await? {
			Attempt::Success(response) => Ok(response),
			Attempt::Failed(failure) => Err(failure.into()),
		}
	}

	async fn attempt(
		&self,
		stage: Stage,
		request: &ApiRequest,
		token: Option<&TokenSecret>,
	) -> Result<Attempt> {
		obs::record_stage_outcome(stage, StageOutcome::Attempt);

		let mut outgoing = self.prepare(request).await?;

		if let Some(token) = token {
			interceptor::set_bearer(&mut outgoing.headers, token);
		}

		let response = self.transport.send(outgoing).await.inspect_err(|_| {
			obs::record_stage_outcome(stage, StageOutcome::Failure);
		})?;

		if response.is_success() {
			self.capture_xsrf(&response).await;
			obs::record_stage_outcome(stage, StageOutcome::Success);

			return Ok(Attempt::Success(response));
		}

		obs::record_stage_outcome(stage, StageOutcome::Failure);

		Ok(Attempt::Failed(status_error(&response)))
	}

	async fn refresh_session(&self) -> Result<TokenSecret> {
		const STAGE: Stage = Stage::Refresh;

		let span = StageSpan::new(STAGE, &self.config.refresh_path);

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		let result = span.instrument(self.request_refresh()).await;

		match &result {
			Ok(_) => obs::record_stage_outcome(STAGE, StageOutcome::Success),
			Err(_e) => {
				obs::record_stage_outcome(STAGE, StageOutcome::Failure);
				log_event!(error, error = %_e, "Session refresh failed.");
			},
		}

		result
	}

	async fn request_refresh(&self) -> Result<TokenSecret> {
		log_event!(info, "Refreshing session.");

		// The refresh call skips the failure path entirely, so an auth failure here ends the
		// session instead of queueing behind itself.
		let request = ApiRequest::post(self.config.refresh_path.as_str());
		let outgoing = self.prepare(&request).await?;
		let response = self.transport.send(outgoing).await?;

		if !response.is_success() {
			return Err(status_error(&response).into());
		}

		let status = response.status.as_u16();
		let body: RefreshResponse =
			response.json().map_err(|source| Error::InvalidRefreshResponse { source, status })?;
		let token = body.access_token;

		self.vault.replace_access_token(token.clone()).await?;
		self.capture_xsrf(&response).await;
		interceptor::set_bearer(&mut self.default_headers.write(), &token);
		log_event!(info, token = %token.fingerprint(), "Session refreshed.");

		Ok(token)
	}

	async fn expire_session(&self) {
		if let Err(_e) = self.clear_session().await {
			log_event!(warn, error = %_e, "Failed to clear stored session.");
		}

		log_event!(warn, location = %self.config.login_path, "Redirecting to login.");
		self.navigator.navigate(&self.config.login_path);
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client with its own reqwest transport and cookie jar.
	pub fn new(config: ClientConfig, store: Arc<dyn SessionStore>) -> Result<Self> {
		let transport = ReqwestTransport::new(&config)?;

		Ok(Self::with_transport(config, transport, store))
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ?Sized + Transport,
{
	fn clone(&self) -> Self {
		Self {
			config: Arc::clone(&self.config),
			transport: Arc::clone(&self.transport),
			vault: self.vault.clone(),
			coordinator: Arc::clone(&self.coordinator),
			navigator: Arc::clone(&self.navigator),
			default_headers: Arc::clone(&self.default_headers),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("refresh_phase", &self.coordinator.phase())
			.finish()
	}
}

fn status_error(response: &ApiResponse) -> StatusError {
	StatusError { status: response.status.as_u16(), body: response.text() }
}

fn encode_error(e: serde_json::Error) -> Error {
	crate::error::TransportError::Request { message: format!("Failed to encode JSON body: {e}") }
		.into()
}
