//! Session lifecycle manager.
//!
//! Owns the local view of the signed-in user and decides when tokens are
//! refreshed, revalidated, or dropped. Identity events and connectivity
//! changes arrive through subscriptions registered at construction.
//!
//! State lives behind one mutex that is never held across an `.await` or
//! while observers run.

use crate::auth_fsm::{SessionMachine, SessionMachineInput, SessionPhase, SessionSnapshot};
use crate::navigation::{Navigator, ProtectedRoutes};
use crate::platform::Platform;
use crate::username::validate_username;
use crate::{AuthError, AuthOperation, AuthResult};
use chrono::Duration as ChronoDuration;
use client_config_and_utils::{ObserverRegistry, SessionSettings, Subscription, Timer};
use connectivity_monitor::{ConnectivityChange, ConnectivityMonitor};
use identity_client::{
    AuthEvent, AuthEventKind, Credentials, IdentityClient, OtpPurpose, Session, SignUpRequest,
    User, UserUpdate,
};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use parking_lot::{Mutex, MutexGuard};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables for the manager.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Tokens expiring within this window are refreshed before being handed out.
    pub refresh_horizon: ChronoDuration,
    pub protected_routes: ProtectedRoutes,
    pub home_route: String,
    pub password_update_route: String,
    pub recovery_redirect_delay: Duration,
    pub password_reset_redirect_url: Option<String>,
}

impl From<&SessionSettings> for SessionConfig {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            refresh_horizon: ChronoDuration::seconds(settings.refresh_horizon_secs),
            protected_routes: ProtectedRoutes::new(settings.protected_path_prefixes.clone()),
            home_route: settings.home_route.clone(),
            password_update_route: settings.password_update_route.clone(),
            recovery_redirect_delay: Duration::from_millis(settings.recovery_redirect_delay_ms),
            password_reset_redirect_url: settings.password_reset_redirect_url.clone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&SessionSettings::default())
    }
}

/// External collaborators the manager drives.
pub struct SessionCollaborators {
    /// `None` when the identity service is not configured; operations then
    /// fail with [`AuthError::ServiceUnavailable`].
    pub identity: Option<Arc<dyn IdentityClient>>,
    pub navigator: Arc<dyn Navigator>,
    pub platform: Arc<dyn Platform>,
    pub connectivity: Option<ConnectivityMonitor>,
}

/// A committed sign-in.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: User,
    pub session: Session,
}

/// Result of creating an account. No session until the address is verified
/// when the service requires it.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: User,
    pub session: Option<Session>,
}

/// Account creation input.
#[derive(Clone)]
pub struct SignUpParams {
    pub email: String,
    pub password: String,
    /// Validated locally, never sent or stored.
    pub username: Option<String>,
    pub captcha_token: Option<String>,
}

/// Foreground signal that prompts a revalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeTrigger {
    VisibilityVisible,
    WindowFocus,
    PageShowPersisted,
}

impl fmt::Display for ResumeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResumeTrigger::VisibilityVisible => "visibility_visible",
            ResumeTrigger::WindowFocus => "window_focus",
            ResumeTrigger::PageShowPersisted => "page_show_persisted",
        };
        f.write_str(name)
    }
}

struct SessionState {
    machine: SessionMachine,
    user: Option<User>,
    session: Option<Session>,
    /// Open deferral windows; identity events are ignored while non-zero.
    defer_depth: u32,
    return_url: Option<String>,
    recovery_redirect: Option<Timer>,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        SessionPhase::from(self.machine.state())
    }

    fn snapshot(&self) -> SessionSnapshot {
        let phase = self.phase();
        SessionSnapshot {
            phase,
            user_id: self.user.as_ref().map(|u| u.id.clone()),
            email: self.user.as_ref().and_then(|u| u.email.clone()),
            is_authenticated: self.user.is_some(),
            is_password_recovery: phase.is_password_recovery(),
        }
    }

    fn transition(&mut self, input: SessionMachineInput) {
        if self.machine.consume(&input).is_err() {
            debug!(
                input = ?input,
                state = ?self.machine.state(),
                "Ignoring impossible session transition"
            );
        }
    }
}

struct ManagerInner {
    config: SessionConfig,
    identity: Option<Arc<dyn IdentityClient>>,
    navigator: Arc<dyn Navigator>,
    platform: Arc<dyn Platform>,
    connectivity: Option<ConnectivityMonitor>,
    state: Mutex<SessionState>,
    observers: ObserverRegistry<SessionSnapshot>,
    subscriptions: Mutex<Vec<Subscription>>,
}

/// Client-side session lifecycle.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct SessionLifecycleManager {
    inner: Arc<ManagerInner>,
}

impl SessionLifecycleManager {
    /// Create the manager and subscribe it to identity events and
    /// connectivity changes.
    pub fn new(config: SessionConfig, collaborators: SessionCollaborators) -> Self {
        let SessionCollaborators {
            identity,
            navigator,
            platform,
            connectivity,
        } = collaborators;

        let inner = Arc::new(ManagerInner {
            config,
            identity,
            navigator,
            platform,
            connectivity,
            state: Mutex::new(SessionState {
                machine: SessionMachine::new(),
                user: None,
                session: None,
                defer_depth: 0,
                return_url: None,
                recovery_redirect: None,
            }),
            observers: ObserverRegistry::new(),
            subscriptions: Mutex::new(Vec::new()),
        });

        let mut subscriptions = Vec::new();

        if let Some(identity) = &inner.identity {
            let weak: Weak<ManagerInner> = Arc::downgrade(&inner);
            subscriptions.push(identity.on_auth_state_change(Box::new(
                move |event: &AuthEvent| {
                    if let Some(inner) = weak.upgrade() {
                        inner.handle_event(event);
                    }
                },
            )));
        }

        if let (Some(monitor), Some(identity)) = (&inner.connectivity, &inner.identity) {
            let identity = identity.clone();
            subscriptions.push(monitor.subscribe(move |change: &ConnectivityChange| {
                if !change.online_changed() {
                    return;
                }
                if change.current.is_online {
                    info!("Back online, resuming token auto-refresh");
                    identity.start_auto_refresh();
                } else {
                    info!("Offline, pausing token auto-refresh");
                    identity.stop_auto_refresh();
                }
            }));
        }

        *inner.subscriptions.lock() = subscriptions;

        Self { inner }
    }

    /// Load the persisted session, refreshing it when already expired.
    ///
    /// A session that cannot be refreshed is dropped locally. Does nothing
    /// while server rendering.
    pub async fn initialize_session(&self) -> AuthResult<()> {
        if self.inner.platform.is_server_rendering() {
            debug!("Server rendering, skipping session initialization");
            return Ok(());
        }

        let identity = self.inner.identity()?;
        let stored = identity
            .get_session()
            .await
            .map_err(|e| AuthError::from_identity(AuthOperation::InitializeSession, e))?;

        let Some(stored) = stored else {
            info!("No existing session found");
            return Ok(());
        };

        if !stored.is_expired() {
            info!(user_id = %stored.user.id, "Restored session");
            self.inner.apply_session(&stored);
            return Ok(());
        }

        info!(user_id = %stored.user.id, "Stored session expired, attempting refresh");
        match self.inner.refresh().await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Could not refresh stored session, clearing it");
                self.inner.clear_local();
                Ok(())
            }
        }
    }

    /// Sign in with email and password.
    pub async fn login(&self, credentials: &Credentials) -> AuthResult<AuthOutcome> {
        self.login_inner(credentials, None::<fn(String) -> std::future::Ready<anyhow::Result<()>>>)
            .await
    }

    /// Sign in, running `hook` with the user id after the credentials are
    /// accepted and before the session is committed. A failing hook aborts
    /// the sign-in.
    pub async fn login_with_hook<H, Fut>(
        &self,
        credentials: &Credentials,
        hook: H,
    ) -> AuthResult<AuthOutcome>
    where
        H: FnOnce(String) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.login_inner(credentials, Some(hook)).await
    }

    async fn login_inner<H, Fut>(
        &self,
        credentials: &Credentials,
        hook: Option<H>,
    ) -> AuthResult<AuthOutcome>
    where
        H: FnOnce(String) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let identity = self.inner.identity()?;

        let exchanged = identity
            .exchange_password(credentials)
            .await
            .map_err(|e| AuthError::from_identity(AuthOperation::Login, e))?;

        if let Some(hook) = hook {
            debug!(user_id = %exchanged.user.id, "Running pre-session hook");
            hook(exchanged.user.id.clone()).await.map_err(|e| {
                warn!(error = %e, "Pre-session hook failed, login aborted");
                AuthError::operation_failed(AuthOperation::Login, e)
            })?;
        }

        let session = identity
            .set_session(&exchanged.access_token, &exchanged.refresh_token)
            .await
            .map_err(|e| AuthError::from_identity(AuthOperation::Login, e))?;

        self.inner.apply_session(&session);
        info!(user_id = %session.user.id, "Logged in");

        Ok(AuthOutcome {
            user: session.user.clone(),
            session,
        })
    }

    /// Create an account. The username is checked locally before any
    /// network call.
    pub async fn sign_up(&self, params: &SignUpParams) -> AuthResult<SignUpOutcome> {
        if let Some(username) = &params.username {
            validate_username(username)?;
        }

        let identity = self.inner.identity()?;
        let response = identity
            .sign_up(&SignUpRequest {
                email: params.email.clone(),
                password: params.password.clone(),
                captcha_token: params.captcha_token.clone(),
            })
            .await
            .map_err(|e| AuthError::from_identity(AuthOperation::SignUp, e))?;

        match &response.session {
            Some(session) => {
                self.inner.apply_session(session);
                info!(user_id = %response.user.id, "Signed up and signed in");
            }
            None => info!(user_id = %response.user.id, "Signed up, verification pending"),
        }

        Ok(SignUpOutcome {
            user: response.user,
            session: response.session,
        })
    }

    /// Verify a one-time code. The resulting session is applied as any
    /// other sign-in.
    pub async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> AuthResult<AuthOutcome> {
        let identity = self.inner.identity()?;
        let session = identity
            .verify_otp(email, code, purpose)
            .await
            .map_err(|e| AuthError::from_identity(AuthOperation::VerifyOtp, e))?;

        self.inner.apply_session(&session);
        Ok(AuthOutcome {
            user: session.user.clone(),
            session,
        })
    }

    /// Verify a one-time code with identity events suppressed until `hook`
    /// has run and the session is applied.
    ///
    /// On any failure, including a failing or panicking hook, the deferral
    /// ends and the local user and session are left as they were.
    pub async fn verify_otp_with_callback<H, Fut>(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
        hook: H,
    ) -> AuthResult<AuthOutcome>
    where
        H: FnOnce(String) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let identity = self.inner.identity()?;
        let _deferral = self.inner.defer_updates();

        let session = identity
            .verify_otp(email, code, purpose)
            .await
            .map_err(|e| AuthError::from_identity(AuthOperation::VerifyOtp, e))?;

        hook(session.user.id.clone()).await.map_err(|e| {
            warn!(error = %e, "Pre-apply hook failed, session not applied");
            AuthError::operation_failed(AuthOperation::VerifyOtp, e)
        })?;

        self.inner.apply_session(&session);
        if purpose == OtpPurpose::Recovery {
            self.inner.enter_recovery();
        }

        Ok(AuthOutcome {
            user: session.user.clone(),
            session,
        })
    }

    pub async fn resend_otp(&self, email: &str, purpose: OtpPurpose) -> AuthResult<()> {
        let identity = self.inner.identity()?;
        identity
            .resend(email, purpose)
            .await
            .map_err(|e| AuthError::from_identity(AuthOperation::ResendOtp, e))
    }

    /// Send a password reset mail.
    pub async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        let identity = self.inner.identity()?;
        identity
            .reset_password_for_email(email, self.inner.config.password_reset_redirect_url.as_deref())
            .await
            .map_err(|e| AuthError::from_identity(AuthOperation::RequestPasswordReset, e))
    }

    /// Set a new password; completes a pending password recovery.
    pub async fn update_password(&self, new_password: &str) -> AuthResult<User> {
        let identity = self.inner.identity()?;
        if self.inner.lock_state().session.is_none() {
            return Err(AuthError::NotAuthenticated);
        }

        let user = identity
            .update_user(&UserUpdate {
                password: Some(new_password.to_string()),
                ..Default::default()
            })
            .await
            .map_err(|e| AuthError::from_identity(AuthOperation::UpdatePassword, e))?;

        self.inner.mutate(|state| {
            if let Some(session) = state.session.as_mut() {
                session.user = user.clone();
            }
            state.user = Some(user.clone());
            if state.phase().is_password_recovery() {
                state.transition(SessionMachineInput::PasswordUpdated);
            }
            state.recovery_redirect = None;
        });

        info!(user_id = %user.id, "Password updated");
        Ok(user)
    }

    /// Sign out remotely, then clear local state regardless of the remote
    /// outcome. Leaves protected routes for the home route.
    pub async fn logout(&self) {
        self.inner.logout().await;
    }

    /// A usable access token, refreshed first when it expires soon.
    ///
    /// A failed refresh hands out the old token while it is still valid and
    /// logs out once it has expired. While offline no refresh is attempted.
    pub async fn get_token(&self) -> Option<String> {
        let session = self.current_session()?;
        let horizon = self.inner.config.refresh_horizon;
        if !session.expires_within(horizon) {
            return Some(session.access_token);
        }

        if self.inner.is_offline() {
            debug!("Offline, not refreshing token");
            return (!session.is_expired()).then_some(session.access_token);
        }

        match self.inner.refresh().await {
            Ok(refreshed) => Some(refreshed.access_token),
            Err(e) if session.is_expired() => {
                warn!(error = %e, "Token expired and refresh failed, logging out");
                self.inner.logout().await;
                None
            }
            Err(e) => {
                debug!(error = %e, "Refresh failed, using current token");
                Some(session.access_token)
            }
        }
    }

    /// Confirm the session with the identity service.
    pub async fn validate_session(&self) -> bool {
        if self.current_session().is_none() {
            return false;
        }

        if self.inner.is_offline() {
            debug!("Offline, keeping local session unvalidated");
            return true;
        }

        match self.inner.refresh().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Session validation failed, logging out");
                self.inner.logout().await;
                false
            }
        }
    }

    /// Revalidate after the app returns to the foreground.
    ///
    /// Each call performs its own round trip.
    pub async fn refresh_on_resume(&self, trigger: ResumeTrigger) {
        if self.current_session().is_none() {
            return;
        }

        if self.inner.is_offline() {
            debug!(%trigger, "Offline, skipping resume refresh");
            return;
        }

        debug!(%trigger, "Refreshing session on resume");
        if let Err(e) = self.inner.refresh().await {
            warn!(%trigger, error = %e, "Resume refresh failed, logging out");
            self.inner.logout().await;
        }
    }

    pub fn set_return_url(&self, url: impl Into<String>) {
        self.inner.lock_state().return_url = Some(url.into());
    }

    /// The stored return URL, at most once.
    pub fn get_and_clear_return_url(&self) -> Option<String> {
        self.inner.lock_state().return_url.take()
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.lock_state().user.clone()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.inner.lock_state().session.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.lock_state().user.is_some()
    }

    pub fn is_password_recovery(&self) -> bool {
        self.phase().is_password_recovery()
    }

    pub fn is_deferring_updates(&self) -> bool {
        self.inner.lock_state().defer_depth > 0
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock_state().phase()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock_state().snapshot()
    }

    /// Observe session changes until the returned guard is dropped.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&SessionSnapshot) + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(observer)
    }
}

/// Ends a deferral window when dropped, on every exit path.
struct DeferGuard<'a> {
    inner: &'a ManagerInner,
}

impl Drop for DeferGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        state.defer_depth = state.defer_depth.saturating_sub(1);
    }
}

impl ManagerInner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock()
    }

    fn identity(&self) -> AuthResult<&Arc<dyn IdentityClient>> {
        self.identity.as_ref().ok_or(AuthError::ServiceUnavailable)
    }

    fn is_offline(&self) -> bool {
        self.connectivity
            .as_ref()
            .is_some_and(|monitor| !monitor.is_online())
    }

    fn defer_updates(&self) -> DeferGuard<'_> {
        self.lock_state().defer_depth += 1;
        DeferGuard { inner: self }
    }

    /// Run `f` under the lock and notify observers if the snapshot changed.
    fn mutate<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let (result, changed) = {
            let mut state = self.lock_state();
            let before = state.snapshot();
            let result = f(&mut state);
            let after = state.snapshot();
            (result, (before != after).then_some(after))
        };

        if let Some(snapshot) = changed {
            debug!(phase = ?snapshot.phase, user_id = ?snapshot.user_id, "Session state changed");
            self.observers.notify(&snapshot);
        }
        result
    }

    fn apply_session(&self, session: &Session) {
        self.mutate(|state| {
            state.user = Some(session.user.clone());
            state.session = Some(session.clone());
            state.transition(SessionMachineInput::SignedIn);
        });
    }

    fn clear_local(&self) {
        self.mutate(|state| {
            state.user = None;
            state.session = None;
            state.recovery_redirect = None;
            state.transition(SessionMachineInput::SignedOut);
        });
    }

    fn redirect_if_protected(&self) {
        let path = self.navigator.current_path();
        if self.config.protected_routes.contains(&path) {
            info!(from = %path, to = %self.config.home_route, "Leaving protected route");
            self.navigator.navigate(&self.config.home_route);
        }
    }

    fn enter_recovery(self: &Arc<Self>) {
        let delay = self.config.recovery_redirect_delay;
        let weak = Arc::downgrade(self);
        let navigate = move || {
            if let Some(inner) = weak.upgrade() {
                inner.navigator.navigate(&inner.config.password_update_route);
            }
        };

        let immediate = self.mutate(|state| {
            state.transition(SessionMachineInput::RecoveryStarted);
            if tokio::runtime::Handle::try_current().is_ok() {
                state.recovery_redirect = Some(Timer::after(delay, navigate));
                None
            } else {
                Some(navigate)
            }
        });

        info!("Password recovery started");
        if let Some(navigate) = immediate {
            navigate();
        }
    }

    async fn refresh(&self) -> AuthResult<Session> {
        let identity = self.identity()?;
        let session = identity
            .refresh_session()
            .await
            .map_err(|e| AuthError::from_identity(AuthOperation::Refresh, e))?;
        self.apply_session(&session);
        Ok(session)
    }

    async fn logout(&self) {
        if let Some(identity) = &self.identity {
            // The SIGNED_OUT this triggers is handled below, once.
            let _deferral = self.defer_updates();
            if let Err(e) = identity.sign_out().await {
                warn!(error = %e, "Remote sign-out failed, clearing local session anyway");
            }
        }

        self.clear_local();
        self.redirect_if_protected();
        info!("Logged out");
    }

    fn handle_event(self: &Arc<Self>, event: &AuthEvent) {
        if self.lock_state().defer_depth > 0 {
            debug!(kind = ?event.kind, "Updates deferred, ignoring auth event");
            return;
        }

        match event.kind {
            AuthEventKind::InitialSession
            | AuthEventKind::SignedIn
            | AuthEventKind::TokenRefreshed
            | AuthEventKind::UserUpdated => {
                if let Some(session) = &event.session {
                    self.apply_session(session);
                }
            }
            AuthEventKind::SignedOut => {
                self.clear_local();
                self.redirect_if_protected();
            }
            AuthEventKind::PasswordRecovery => {
                if let Some(session) = &event.session {
                    self.apply_session(session);
                }
                self.enter_recovery();
            }
        }
    }
}
