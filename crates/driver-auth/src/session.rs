//! Session management for the driver backend.
//!
//! `SessionManager` owns the single live credential, runs the SMS and
//! magic-link sign-in protocols, keeps the token store in sync and refreshes
//! expired access tokens. Lifecycle state is tracked by an explicit FSM
//! (see [`crate::session_fsm`]).

use crate::classifier::{check_envelope, classify_transport_error, ErrorMapping};
use crate::claims::{extract_claims, resolve_identity, IdentityResolution};
use crate::protocol::{
    decode_data, malformed, AccessTokenData, ConfirmAuthenticationData, MagicLinkAuthData,
    StartAuthenticationData,
};
use crate::request::{endpoints, ClientContext, Location, RequestBuilder};
use crate::session_fsm::{SessionMachine, SessionMachineInput, SessionState, SessionStateChanged};
use crate::transport::{ApiRequest, HttpTransport, Method, Transport};
use crate::{AuthError, AuthResult};
use parking_lot::Mutex;
use sdk_config_and_utils::{Config, DeviceInfo, Locale, Paths};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use token_store::{now_millis, open_store, Credential, Identity, StoredSnapshot, TokenStore};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Lifetime assumed for a token whose claims carry no expiry.
pub const DEFAULT_TOKEN_LIFETIME_MS: i64 = 60 * 60 * 1000;

/// Token type used when the backend omits one.
pub const DEFAULT_TOKEN_TYPE: &str = "bearer";

/// Backend status that marks a restored session as unusable.
const SERVICE_UNAVAILABLE: u16 = 503;

/// Callback type for session state change notifications.
pub type SessionStateCallback = Box<dyn Fn(SessionStateChanged) + Send + Sync>;

/// In-progress sign-in, never persisted.
#[derive(Debug, Clone)]
struct AuthenticationAttempt {
    phone: String,
    verification_token: String,
}

#[derive(Debug, Default)]
struct SessionInner {
    credential: Option<Credential>,
    identity: Option<Identity>,
    attempt: Option<AuthenticationAttempt>,
    context: ClientContext,
    location: Option<Location>,
}

/// Refresh failure handed to every caller that waited on the same refresh.
#[derive(Debug, Clone)]
struct SharedFailure {
    message: String,
    payload: Option<Value>,
}

impl SharedFailure {
    fn to_error(&self) -> AuthError {
        AuthError::Authentication {
            message: self.message.clone(),
            payload: self.payload.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct RefreshGate {
    generation: u64,
    last: Option<Result<String, SharedFailure>>,
}

/// Session manager for one driver account.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    store: Box<dyn TokenStore>,
    requests: RequestBuilder,
    inner: Mutex<SessionInner>,
    /// Internal FSM for tracking session state transitions.
    fsm: Mutex<SessionMachine>,
    /// Serializes refreshes started by `ensure_valid`.
    refresh_gate: tokio::sync::Mutex<RefreshGate>,
    refresh_generation: AtomicU64,
    state_callback: Mutex<Option<SessionStateCallback>>,
}

impl SessionManager {
    /// Create an empty session manager. Call [`restore`](Self::restore) to
    /// pick up a persisted session.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Box<dyn TokenStore>,
        base_url: Url,
        context: ClientContext,
    ) -> Self {
        Self {
            transport,
            store,
            requests: RequestBuilder::new(base_url),
            inner: Mutex::new(SessionInner {
                context,
                ..SessionInner::default()
            }),
            fsm: Mutex::new(SessionMachine::new()),
            refresh_gate: tokio::sync::Mutex::new(RefreshGate::default()),
            refresh_generation: AtomicU64::new(0),
            state_callback: Mutex::new(None),
        }
    }

    /// Create a session manager and restore the persisted session before returning.
    pub fn open(
        transport: Arc<dyn Transport>,
        store: Box<dyn TokenStore>,
        base_url: Url,
        context: ClientContext,
    ) -> Self {
        let manager = Self::new(transport, store, base_url, context);
        manager.restore();
        manager
    }

    /// Build a manager from configuration, using the HTTP transport.
    pub fn from_config(config: &Config, paths: &Paths) -> AuthResult<Self> {
        let base_url = config
            .base_url()
            .map_err(|e| AuthError::Config(e.to_string()))?;
        let transport =
            HttpTransport::new().map_err(|e| AuthError::Config(e.to_string()))?;
        let store = open_store(&config.token_store_kind(paths));
        let context = ClientContext::new(config.device.clone(), config.locale.clone());

        Ok(Self::open(Arc::new(transport), store, base_url, context))
    }

    /// Set a callback to be notified of session state changes.
    pub fn set_state_callback(&self, callback: SessionStateCallback) {
        *self.state_callback.lock() = Some(callback);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from(self.fsm.lock().state())
    }

    /// Transition the FSM and notify callback if state changed.
    fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionState> {
        let (old_state, new_state) = {
            let mut fsm = self.fsm.lock();
            let old_state = SessionState::from(fsm.state());
            fsm.consume(input).map_err(|_| {
                AuthError::InvalidStateTransition(format!(
                    "Cannot apply {:?} in state {:?}",
                    input,
                    fsm.state()
                ))
            })?;
            (old_state, SessionState::from(fsm.state()))
        };

        if old_state != new_state {
            debug!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Session state transition"
            );
            self.notify_state_change(new_state);
        }

        Ok(new_state)
    }

    fn notify_state_change(&self, state: SessionState) {
        let driver_id = self
            .inner
            .lock()
            .identity
            .as_ref()
            .map(|identity| identity.driver_id);

        let cb = self.state_callback.lock();
        if let Some(callback) = cb.as_ref() {
            callback(SessionStateChanged { state, driver_id });
        }
    }

    /// Load the persisted session, if any, into memory.
    ///
    /// Unreadable snapshots are discarded. An identity whose claims were
    /// never resolved is re-read from the access token.
    pub fn restore(&self) -> SessionState {
        let snapshot = match self.store.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Stored session unreadable, discarding");
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Failed to clear unreadable session");
                }
                None
            }
        };

        let Some(StoredSnapshot {
            token: credential,
            session_info: mut identity,
            ..
        }) = snapshot
        else {
            debug!("No stored session");
            return self.state();
        };

        if credential.is_empty() {
            warn!("Stored session has no tokens, discarding");
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "Failed to clear empty session");
            }
            return self.state();
        }

        let mut claims_updated = false;
        if identity.needs_claims() {
            match extract_claims(&credential.access_token) {
                Ok(claims) if claims.driver_id != 0 => {
                    identity = claims.identity(identity.session_id.clone());
                    claims_updated = true;
                }
                Ok(_) => debug!("Stored token carries no driver id"),
                Err(e) => debug!(error = %e, "Stored token claims unreadable"),
            }
        }
        if identity.session_id.is_empty() {
            identity.session_id = Uuid::new_v4().to_string();
        }

        let stale = credential.is_expired();
        {
            let mut inner = self.inner.lock();
            inner.credential = Some(credential.clone());
            inner.identity = Some(identity.clone());
        }
        if claims_updated {
            self.persist(StoredSnapshot::new(credential, identity.clone()));
        }

        let input = if stale {
            SessionMachineInput::RestoredStale
        } else {
            SessionMachineInput::Restored
        };
        if let Err(e) = self.transition(&input) {
            warn!(error = %e, "Restored session in unexpected state");
        }

        info!(
            session_id = %identity.session_id,
            driver_id = identity.driver_id,
            stale,
            "Session restored"
        );
        self.state()
    }

    /// Step one of SMS sign-in: ask the backend to text a code to `phone`.
    ///
    /// Any pending attempt is discarded first.
    pub async fn start_sms_sign_in(
        &self,
        device: DeviceInfo,
        locale: Locale,
        phone: &str,
    ) -> AuthResult<()> {
        let context = ClientContext::new(device, locale);
        context.validate()?;
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(AuthError::validation("phone is required"));
        }

        self.discard_attempt();

        let location = self.inner.lock().location;
        let request = self
            .requests
            .request(
                Method::Post,
                endpoints::START_AUTHENTICATION,
                &context,
                location.as_ref(),
            )?
            .with_body(json!({ "phone": phone }));

        let data = self.send(request, ErrorMapping::Typed).await?;
        let start: StartAuthenticationData = decode_data(data, "startAuthentication")?;

        {
            let mut inner = self.inner.lock();
            inner.attempt = Some(AuthenticationAttempt {
                phone: phone.to_string(),
                verification_token: start.verification_token,
            });
            inner.context = context;
        }
        self.transition(&SessionMachineInput::AttemptStarted)?;

        info!("SMS code requested");
        Ok(())
    }

    /// Step two of SMS sign-in: confirm the texted code.
    ///
    /// A wrong code keeps the attempt so another code can be tried; any other
    /// failure abandons it.
    pub async fn confirm_sms_sign_in(
        &self,
        device: DeviceInfo,
        locale: Locale,
        sms_code: &str,
    ) -> AuthResult<Identity> {
        let context = ClientContext::new(device, locale);
        context.validate()?;
        let sms_code = sms_code.trim();
        if sms_code.is_empty() {
            return Err(AuthError::validation("SMS code is required"));
        }

        let (attempt, location) = {
            let inner = self.inner.lock();
            (inner.attempt.clone(), inner.location)
        };
        let attempt =
            attempt.ok_or_else(|| AuthError::validation("no sign-in attempt pending"))?;

        let request = self
            .requests
            .request(
                Method::Post,
                endpoints::CONFIRM_AUTHENTICATION,
                &context,
                location.as_ref(),
            )?
            .with_body(json!({
                "phone": attempt.phone,
                "verification_token": attempt.verification_token,
                "verification_code": sms_code,
            }));

        let data = match self.send(request, ErrorMapping::Typed).await {
            Ok(data) => data,
            Err(e @ AuthError::InvalidSmsCode { .. }) => return Err(e),
            Err(e) => {
                self.abandon_attempt(&attempt.verification_token);
                return Err(e);
            }
        };

        let confirmed: ConfirmAuthenticationData =
            match decode_data(data.clone(), "confirmAuthentication") {
                Ok(confirmed) => confirmed,
                Err(e) => {
                    self.abandon_attempt(&attempt.verification_token);
                    return Err(e);
                }
            };
        let issued = confirmed.token.and_then(|token| {
            token
                .refresh_token
                .filter(|refresh| !refresh.is_empty())
                .map(|refresh| (refresh, token.token_type))
        });
        let Some((refresh_token, token_type)) = issued else {
            self.abandon_attempt(&attempt.verification_token);
            return Err(malformed(
                "confirmAuthentication",
                "no refresh_token",
                data,
            ));
        };

        let session_id = Uuid::new_v4().to_string();
        let resolution = resolve_identity(&refresh_token, &session_id);
        if let IdentityResolution::Degraded { reason, .. } = &resolution {
            warn!(
                session_id = %session_id,
                reason = %reason,
                "Token claims unreadable, using placeholder identity"
            );
        }

        let identity = resolution.identity(&session_id);
        let credential = Credential {
            access_token: refresh_token.clone(),
            refresh_token,
            token_type: token_type_or_default(token_type),
            expires_at: resolution
                .expires_at()
                .unwrap_or_else(|| now_millis() + DEFAULT_TOKEN_LIFETIME_MS),
        };

        self.install_session(
            credential,
            identity.clone(),
            context,
            Some(&attempt.verification_token),
        )?;

        info!(
            session_id = %identity.session_id,
            driver_id = identity.driver_id,
            degraded = identity.degraded,
            "Signed in with SMS code"
        );
        Ok(identity)
    }

    /// Ask the backend to email a sign-in link. No state changes.
    pub async fn request_magic_link(&self, email: &str) -> AuthResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::validation("email is required"));
        }

        let (context, location) = {
            let inner = self.inner.lock();
            (inner.context.clone(), inner.location)
        };
        let request = self
            .requests
            .request(
                Method::Post,
                endpoints::SEND_MAGIC_LINK,
                &context,
                location.as_ref(),
            )?
            .with_body(json!({ "email": email }));

        self.send(request, ErrorMapping::Generic).await?;
        info!("Magic link requested");
        Ok(())
    }

    /// Sign in with the token carried by a magic link.
    ///
    /// The returned refresh token is usable as a bearer token on its own, so
    /// a failed upgrade to an access token keeps the session with a
    /// placeholder identity instead of failing.
    pub async fn complete_magic_link_sign_in(
        &self,
        token: &str,
        device: DeviceInfo,
        location: Option<Location>,
    ) -> AuthResult<Identity> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::validation("magic link token is required"));
        }

        let context = {
            let mut inner = self.inner.lock();
            if location.is_some() {
                inner.location = location;
            }
            ClientContext::new(device, inner.context.locale.clone())
        };
        context.validate()?;

        let request = self
            .requests
            .request(
                Method::Post,
                endpoints::AUTHENTICATE_WITH_MAGIC_LINK,
                &context,
                location.as_ref(),
            )?
            .with_body(json!({ "token": token }));

        let data = self.send(request, ErrorMapping::Typed).await?;
        let auth: MagicLinkAuthData = decode_data(data.clone(), "authenticateWithMagicLink")?;
        let Some((refresh_token, token_type)) = auth.into_token() else {
            return Err(malformed(
                "authenticateWithMagicLink",
                "no refresh_token",
                data,
            ));
        };

        let session_id = Uuid::new_v4().to_string();
        let placeholder = Identity::placeholder(session_id.as_str());
        let credential = Credential {
            access_token: refresh_token.clone(),
            refresh_token,
            token_type: token_type_or_default(token_type),
            expires_at: now_millis() + DEFAULT_TOKEN_LIFETIME_MS,
        };
        self.install_session(credential, placeholder, context, None)?;

        match self.exchange_refresh_for_access_token(location).await {
            Ok(_) => {}
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    error = %e,
                    "Access token exchange failed, keeping magic-link token"
                );
            }
        }

        let identity = self
            .identity()
            .ok_or_else(|| AuthError::authentication("session cleared during sign-in"))?;
        info!(
            session_id = %identity.session_id,
            driver_id = identity.driver_id,
            degraded = identity.degraded,
            "Signed in with magic link"
        );
        Ok(identity)
    }

    /// Trade the refresh token for a fresh access token.
    ///
    /// Failures never clear the session; the caller decides what to do.
    pub async fn exchange_refresh_for_access_token(
        &self,
        location: Option<Location>,
    ) -> AuthResult<String> {
        let (refresh_token, context, location) = {
            let inner = self.inner.lock();
            let credential = inner
                .credential
                .as_ref()
                .filter(|credential| credential.has_refresh_token())
                .ok_or_else(|| AuthError::authentication("no refresh token"))?;
            (
                credential.refresh_token.clone(),
                inner.context.clone(),
                location.or(inner.location),
            )
        };

        let request = self
            .requests
            .request(
                Method::Post,
                endpoints::GET_ACCESS_TOKEN,
                &context,
                location.as_ref(),
            )?
            .with_body(json!({ "refresh_token": refresh_token }));

        let data = self
            .send(request, ErrorMapping::Typed)
            .await
            .map_err(exchange_failure)?;
        let issued: AccessTokenData =
            decode_data(data.clone(), "getAccessToken").map_err(exchange_failure)?;
        let Some(access_token) = issued.access_token.filter(|token| !token.is_empty()) else {
            return Err(AuthError::Authentication {
                message: "token exchange returned no access_token".to_string(),
                payload: Some(data),
            });
        };

        let claims = extract_claims(&access_token);
        let snapshot = {
            let mut inner = self.inner.lock();
            let SessionInner {
                credential,
                identity,
                ..
            } = &mut *inner;

            let credential = match credential.as_mut() {
                Some(credential) if credential.refresh_token == refresh_token => credential,
                _ => {
                    return Err(AuthError::authentication(
                        "session changed during token exchange",
                    ))
                }
            };
            let identity =
                identity.get_or_insert_with(|| Identity::unresolved(Uuid::new_v4().to_string()));

            let expires_at = match claims {
                Ok(claims) => {
                    if identity.is_resolved()
                        && claims.driver_id != 0
                        && claims.driver_id != identity.driver_id
                    {
                        return Err(AuthError::Decode(format!(
                            "driver id changed from {} to {} during token exchange",
                            identity.driver_id, claims.driver_id
                        )));
                    }
                    if claims.driver_id != 0 {
                        *identity = claims.identity(identity.session_id.clone());
                    } else {
                        debug!("Exchanged token carries no driver id, keeping identity");
                    }
                    claims.expires_at
                }
                Err(e) => {
                    warn!(error = %e, "Exchanged token claims unreadable, keeping identity");
                    None
                }
            };

            credential.access_token = access_token.clone();
            if let Some(token_type) = issued.token_type.filter(|t| !t.is_empty()) {
                credential.token_type = token_type;
            }
            credential.expires_at =
                expires_at.unwrap_or_else(|| now_millis() + DEFAULT_TOKEN_LIFETIME_MS);

            StoredSnapshot::new(credential.clone(), identity.clone())
        };

        self.persist(snapshot);
        self.transition(&SessionMachineInput::Refreshed)?;

        debug!("Access token exchanged");
        Ok(access_token)
    }

    /// Make sure a usable, unexpired access token is held.
    ///
    /// An expired token is refreshed once; callers arriving while that
    /// refresh runs share its outcome. A failed refresh logs the session out.
    pub async fn ensure_valid(&self) -> AuthResult<()> {
        match self.token_status() {
            TokenStatus::Missing => Err(AuthError::authentication("no token")),
            TokenStatus::Live => Ok(()),
            TokenStatus::Expired => self.refresh_expired().await.map(|_| ()),
        }
    }

    fn token_status(&self) -> TokenStatus {
        let inner = self.inner.lock();
        match inner.credential.as_ref() {
            None => TokenStatus::Missing,
            Some(credential) if credential.is_empty() => TokenStatus::Missing,
            Some(credential) if credential.is_expired() => TokenStatus::Expired,
            Some(_) => TokenStatus::Live,
        }
    }

    async fn refresh_expired(&self) -> AuthResult<String> {
        let observed = self.refresh_generation.load(Ordering::Acquire);
        let mut gate = self.refresh_gate.lock().await;

        if gate.generation != observed {
            if let Some(outcome) = gate.last.clone() {
                debug!("Joining concurrent refresh result");
                return outcome.map_err(|failure| failure.to_error());
            }
        }

        // The session may have changed while waiting on the gate
        match self.token_status() {
            TokenStatus::Missing => return Err(AuthError::authentication("no token")),
            TokenStatus::Live => return self.current_access_token(),
            TokenStatus::Expired => {}
        }

        info!("Access token expired, refreshing");
        let refresh_token = self.credential().map(|c| c.refresh_token);
        if let Err(e) = self.transition(&SessionMachineInput::TokenExpired) {
            debug!(error = %e, "Expiry not recorded");
        }

        let outcome = match self.exchange_refresh_for_access_token(None).await {
            Ok(token) => Ok(token),
            Err(e) => {
                warn!(error = %e, "Refresh failed, clearing session");
                let unchanged = self.credential().map(|c| c.refresh_token) == refresh_token;
                if unchanged {
                    self.clear_session(&SessionMachineInput::RefreshFailed);
                }
                Err(SharedFailure {
                    message: "refresh failed".to_string(),
                    payload: e.payload().cloned(),
                })
            }
        };

        gate.generation = gate.generation.wrapping_add(1);
        gate.last = Some(outcome.clone());
        self.refresh_generation
            .store(gate.generation, Ordering::Release);

        outcome.map_err(|failure| failure.to_error())
    }

    fn current_access_token(&self) -> AuthResult<String> {
        self.inner
            .lock()
            .credential
            .as_ref()
            .map(|credential| credential.access_token.clone())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::authentication("no token"))
    }

    /// Valid access token for an outbound authenticated call.
    pub async fn get_valid_access_token(&self) -> AuthResult<String> {
        self.ensure_valid().await?;
        self.current_access_token()
    }

    /// Request to `path` carrying the bearer token and session parameters.
    pub async fn build_authenticated_request(
        &self,
        method: Method,
        path: &str,
    ) -> AuthResult<ApiRequest> {
        let token = self.get_valid_access_token().await?;
        let (context, location, identity) = {
            let inner = self.inner.lock();
            (inner.context.clone(), inner.location, inner.identity.clone())
        };

        let mut request = self
            .requests
            .request(method, path, &context, location.as_ref())?
            .with_bearer(&token);
        if let Some(identity) = identity {
            request = request
                .with_query("session_id", identity.session_id)
                .with_query("driver_id", identity.driver_id.to_string());
        }
        Ok(request)
    }

    /// Best-effort check that the held session still works.
    ///
    /// Returns `false` when no valid token can be obtained or the probe call
    /// answers 503. Any other probe failure counts as valid.
    pub async fn validate_existing(&self) -> bool {
        let request = match self
            .build_authenticated_request(Method::Get, endpoints::GET_DRIVER_STATE)
            .await
        {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "No valid session to validate");
                return false;
            }
        };

        match self.transport.send(request).await {
            Ok(response) if response.status == SERVICE_UNAVAILABLE => {
                info!("Session rejected by probe");
                false
            }
            Ok(response) => {
                debug!(status = response.status, "Session probe answered");
                true
            }
            Err(e) => {
                debug!(error = %e, "Session probe inconclusive");
                true
            }
        }
    }

    /// True when an unexpired credential is held. Never blocks on I/O.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.token_status(), TokenStatus::Live)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.lock().identity.clone()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.inner.lock().credential.clone()
    }

    pub fn has_pending_attempt(&self) -> bool {
        self.inner.lock().attempt.is_some()
    }

    /// Location sent with subsequent calls.
    pub fn set_location(&self, location: Option<Location>) {
        self.inner.lock().location = location;
    }

    /// Forget the session in memory and on disk. Idempotent.
    pub fn logout(&self) {
        self.clear_session(&SessionMachineInput::LoggedOut);
        info!("Logged out");
    }

    fn clear_session(&self, input: &SessionMachineInput) {
        {
            let mut inner = self.inner.lock();
            inner.credential = None;
            inner.identity = None;
            inner.attempt = None;
        }
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored session");
        }
        if self.transition(input).is_err() {
            let _ = self.transition(&SessionMachineInput::LoggedOut);
        }
    }

    /// Make `credential` the live session and persist it.
    ///
    /// With `attempt_token`, only the matching attempt is consumed; otherwise
    /// any pending attempt is dropped.
    fn install_session(
        &self,
        credential: Credential,
        identity: Identity,
        context: ClientContext,
        attempt_token: Option<&str>,
    ) -> AuthResult<()> {
        {
            let mut inner = self.inner.lock();
            inner.credential = Some(credential.clone());
            inner.identity = Some(identity.clone());
            inner.context = context;
            let consumed = match (&inner.attempt, attempt_token) {
                (Some(attempt), Some(token)) => attempt.verification_token == token,
                _ => true,
            };
            if consumed {
                inner.attempt = None;
            }
        }
        self.persist(StoredSnapshot::new(credential, identity));
        self.transition(&SessionMachineInput::SignedIn)?;
        Ok(())
    }

    fn discard_attempt(&self) {
        let discarded = self.inner.lock().attempt.take().is_some();
        if discarded {
            debug!("Discarding pending sign-in attempt");
            self.resync_after_discard();
        }
    }

    fn abandon_attempt(&self, verification_token: &str) {
        let abandoned = {
            let mut inner = self.inner.lock();
            let matches = inner
                .attempt
                .as_ref()
                .map(|attempt| attempt.verification_token == verification_token)
                .unwrap_or(false);
            if matches {
                inner.attempt = None;
            }
            matches
        };
        if abandoned {
            debug!("Sign-in attempt abandoned");
            self.resync_after_discard();
        }
    }

    /// Leave `AttemptPending`, landing on the state of any credential still held.
    fn resync_after_discard(&self) {
        if let Err(e) = self.transition(&SessionMachineInput::AttemptDiscarded) {
            debug!(error = %e, "No attempt state to leave");
            return;
        }
        let held_expired = self.credential().map(|credential| credential.is_expired());
        let input = match held_expired {
            Some(false) => SessionMachineInput::Restored,
            Some(true) => SessionMachineInput::RestoredStale,
            None => return,
        };
        let _ = self.transition(&input);
    }

    fn persist(&self, snapshot: StoredSnapshot) {
        if let Err(e) = self.store.save(&snapshot) {
            warn!(error = %e, "Failed to persist session");
        }
    }

    async fn send(&self, request: ApiRequest, mapping: ErrorMapping) -> AuthResult<Value> {
        let endpoint = request.url.path().to_string();
        let response = self.transport.send(request).await.map_err(|e| {
            warn!(endpoint = %endpoint, error = %e, "Transport failure");
            classify_transport_error(&e)
        })?;

        debug!(endpoint = %endpoint, status = response.status, "Response received");
        check_envelope(response, mapping).map_err(|e| {
            warn!(
                endpoint = %endpoint,
                kind = ?e.kind(),
                error = %e,
                "Request failed"
            );
            e
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenStatus {
    Missing,
    Live,
    Expired,
}

fn token_type_or_default(token_type: Option<String>) -> String {
    token_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string())
}

fn exchange_failure(error: AuthError) -> AuthError {
    AuthError::Authentication {
        message: format!("token exchange failed: {}", error),
        payload: error.payload().cloned(),
    }
}
