//! Supabase Auth (GoTrue) REST implementation of [`IdentityClient`].

use crate::jwt::token_expiry;
use crate::{
    AuthEvent, AuthEventKind, AuthStateHandler, Credentials, IdentityClient, IdentityError,
    IdentityResult, OtpPurpose, Session, SessionStore, SignUpRequest, SignUpResponse, User,
    UserUpdate,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use client_config_and_utils::{ObserverRegistry, Subscription};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Background refresh cadence.
#[derive(Debug, Clone)]
pub struct AutoRefreshConfig {
    /// How often the stored session is checked.
    pub tick: Duration,
    /// Refresh once the access token expires within this margin.
    pub margin: ChronoDuration,
}

impl Default for AutoRefreshConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(30),
            margin: ChronoDuration::seconds(90),
        }
    }
}

/// Token grant response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        Session {
            expires_at: Utc::now() + ChronoDuration::seconds(self.expires_in),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user: self.user,
        }
    }
}

/// `/signup` answers with tokens when autoconfirm is on, otherwise with the
/// bare user awaiting verification.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    WithSession(TokenResponse),
    Pending(User),
}

/// Error body shapes returned by GoTrue.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self, raw: String) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .unwrap_or(raw)
    }
}

struct GoTrueInner {
    http_client: Client,
    base_url: Url,
    publishable_key: String,
    store: Arc<dyn SessionStore>,
    events: ObserverRegistry<AuthEvent>,
    auto_refresh: Mutex<Option<JoinHandle<()>>>,
    auto_refresh_config: AutoRefreshConfig,
}

/// Identity client backed by a Supabase Auth server.
#[derive(Clone)]
pub struct GoTrueClient {
    inner: Arc<GoTrueInner>,
}

impl GoTrueClient {
    /// Create a client for the project at `base_url`.
    pub fn new(base_url: Url, publishable_key: &str, store: Arc<dyn SessionStore>) -> Self {
        Self::with_auto_refresh_config(
            base_url,
            publishable_key,
            store,
            AutoRefreshConfig::default(),
        )
    }

    pub fn with_auto_refresh_config(
        base_url: Url,
        publishable_key: &str,
        store: Arc<dyn SessionStore>,
        auto_refresh_config: AutoRefreshConfig,
    ) -> Self {
        Self {
            inner: Arc::new(GoTrueInner {
                http_client: Client::new(),
                base_url,
                publishable_key: publishable_key.to_string(),
                store,
                events: ObserverRegistry::new(),
                auto_refresh: Mutex::new(None),
                auto_refresh_config,
            }),
        }
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.inner
            .auto_refresh
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl GoTrueInner {
    fn endpoint(&self, path: &str) -> IdentityResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/auth/v1/{}", base, path))?)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header("apikey", &self.publishable_key)
    }

    async fn send(&self, builder: RequestBuilder) -> IdentityResult<Response> {
        let response = builder.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&raw)
            .unwrap_or_default()
            .into_message(raw);
        warn!(status = %status, message = %message, "Identity request rejected");

        Err(IdentityError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn post_json<T: DeserializeOwned>(&self, url: Url, body: &Value) -> IdentityResult<T> {
        let response = self
            .send(self.request(reqwest::Method::POST, url).json(body))
            .await?;
        Ok(response.json().await?)
    }

    async fn grant(&self, grant_type: &str, body: &Value) -> IdentityResult<Session> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        debug!(grant_type, "Requesting token grant");

        let data: TokenResponse = self.post_json(url, body).await?;
        Ok(data.into_session())
    }

    async fn fetch_user(&self, access_token: &str) -> IdentityResult<User> {
        let url = self.endpoint("user")?;
        let response = self
            .send(
                self.request(reqwest::Method::GET, url)
                    .bearer_auth(access_token),
            )
            .await?;
        Ok(response.json().await?)
    }

    fn commit(&self, session: &Session, kind: AuthEventKind) -> IdentityResult<()> {
        self.store.save(session)?;
        self.emit(AuthEvent::new(kind, Some(session.clone())));
        Ok(())
    }

    fn emit(&self, event: AuthEvent) {
        debug!(kind = ?event.kind, "Auth state change");
        self.events.notify(&event);
    }

    fn current_session(&self) -> IdentityResult<Session> {
        self.store.load()?.ok_or(IdentityError::NoSession)
    }

    async fn refresh(&self) -> IdentityResult<Session> {
        let current = self.current_session()?;
        let session = self
            .grant(
                "refresh_token",
                &json!({ "refresh_token": current.refresh_token }),
            )
            .await?;
        self.commit(&session, AuthEventKind::TokenRefreshed)?;
        info!(user_id = %session.user.id, "Token refreshed successfully");
        Ok(session)
    }

    /// One auto-refresh tick. Non-transient failures end the session.
    async fn refresh_if_due(&self) {
        let session = match self.store.load() {
            Ok(Some(session)) => session,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Could not read stored session");
                return;
            }
        };

        if !session.expires_within(self.auto_refresh_config.margin) {
            return;
        }

        match self.refresh().await {
            Ok(_) => {}
            Err(e) if e.is_transient() => {
                debug!(error = %e, "Background refresh failed, will retry");
            }
            Err(e) => {
                warn!(error = %e, "Background refresh rejected, ending session");
                if let Err(clear_err) = self.store.clear() {
                    warn!(error = %clear_err, "Failed to clear stored session");
                }
                self.emit(AuthEvent::signed_out());
            }
        }
    }
}

async fn auto_refresh_loop(inner: Weak<GoTrueInner>, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.refresh_if_due().await;
    }
}

#[async_trait]
impl IdentityClient for GoTrueClient {
    async fn get_session(&self) -> IdentityResult<Option<Session>> {
        self.inner.store.load()
    }

    async fn refresh_session(&self) -> IdentityResult<Session> {
        self.inner.refresh().await
    }

    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> IdentityResult<Session> {
        let expires_at = token_expiry(access_token)?;

        let session = if expires_at <= Utc::now() {
            debug!("Provided access token already expired, refreshing");
            self.inner
                .grant("refresh_token", &json!({ "refresh_token": refresh_token }))
                .await?
        } else {
            let user = self.inner.fetch_user(access_token).await?;
            Session {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                expires_at,
                user,
            }
        };

        self.inner.commit(&session, AuthEventKind::SignedIn)?;
        info!(user_id = %session.user.id, "Session committed");
        Ok(session)
    }

    async fn exchange_password(&self, credentials: &Credentials) -> IdentityResult<Session> {
        self.inner
            .grant(
                "password",
                &json!({
                    "email": credentials.email,
                    "password": credentials.password,
                }),
            )
            .await
    }

    async fn sign_up(&self, request: &SignUpRequest) -> IdentityResult<SignUpResponse> {
        let mut body = json!({
            "email": request.email,
            "password": request.password,
        });
        if let Some(captcha_token) = &request.captcha_token {
            body["gotrue_meta_security"] = json!({ "captcha_token": captcha_token });
        }

        let url = self.inner.endpoint("signup")?;
        match self.inner.post_json::<SignUpBody>(url, &body).await? {
            SignUpBody::WithSession(tokens) => {
                let session = tokens.into_session();
                self.inner.commit(&session, AuthEventKind::SignedIn)?;
                Ok(SignUpResponse {
                    user: session.user.clone(),
                    session: Some(session),
                })
            }
            SignUpBody::Pending(user) => {
                info!(user_id = %user.id, "Account created, awaiting verification");
                Ok(SignUpResponse {
                    user,
                    session: None,
                })
            }
        }
    }

    async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> IdentityResult<Session> {
        let url = self.inner.endpoint("verify")?;
        let tokens: TokenResponse = self
            .inner
            .post_json(
                url,
                &json!({
                    "email": email,
                    "token": code,
                    "type": purpose.as_str(),
                }),
            )
            .await?;

        let session = tokens.into_session();
        let kind = match purpose {
            OtpPurpose::Recovery => AuthEventKind::PasswordRecovery,
            _ => AuthEventKind::SignedIn,
        };
        self.inner.commit(&session, kind)?;
        Ok(session)
    }

    async fn resend(&self, email: &str, purpose: OtpPurpose) -> IdentityResult<()> {
        let url = self.inner.endpoint("resend")?;
        self.inner
            .send(
                self.inner
                    .request(reqwest::Method::POST, url)
                    .json(&json!({ "email": email, "type": purpose.as_str() })),
            )
            .await?;
        Ok(())
    }

    async fn update_user(&self, update: &UserUpdate) -> IdentityResult<User> {
        let mut session = self.inner.current_session()?;
        let url = self.inner.endpoint("user")?;
        let response = self
            .inner
            .send(
                self.inner
                    .request(reqwest::Method::PUT, url)
                    .bearer_auth(&session.access_token)
                    .json(update),
            )
            .await?;
        let user: User = response.json().await?;

        session.user = user.clone();
        self.inner.commit(&session, AuthEventKind::UserUpdated)?;
        Ok(user)
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> IdentityResult<()> {
        let mut url = self.inner.endpoint("recover")?;
        if let Some(redirect_to) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }
        self.inner
            .send(
                self.inner
                    .request(reqwest::Method::POST, url)
                    .json(&json!({ "email": email })),
            )
            .await?;
        Ok(())
    }

    async fn sign_out(&self) -> IdentityResult<()> {
        let revoked = match self.inner.store.load()? {
            Some(session) => {
                let url = self.inner.endpoint("logout")?;
                self.inner
                    .send(
                        self.inner
                            .request(reqwest::Method::POST, url)
                            .bearer_auth(&session.access_token),
                    )
                    .await
                    .map(|_| ())
            }
            None => Ok(()),
        };

        // The local session is dropped even when revocation fails.
        self.inner.store.clear()?;
        self.inner.emit(AuthEvent::signed_out());
        revoked
    }

    fn start_auto_refresh(&self) {
        let mut slot = self.inner.auto_refresh.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, auto-refresh not started");
            return;
        };

        let tick = self.inner.auto_refresh_config.tick;
        *slot = Some(runtime.spawn(auto_refresh_loop(Arc::downgrade(&self.inner), tick)));
        debug!(tick_ms = tick.as_millis() as u64, "Auto-refresh started");
    }

    fn stop_auto_refresh(&self) {
        if let Some(handle) = self.inner.auto_refresh.lock().take() {
            handle.abort();
            debug!("Auto-refresh stopped");
        }
    }

    fn on_auth_state_change(&self, handler: AuthStateHandler) -> Subscription {
        self.inner.events.subscribe(handler)
    }
}

impl Drop for GoTrueInner {
    fn drop(&mut self) {
        if let Some(handle) = self.auto_refresh.get_mut().take() {
            handle.abort();
        }
    }
}
