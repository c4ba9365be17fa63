//! The identity client seam used by the session lifecycle core.

use crate::{
    AuthEvent, Credentials, IdentityResult, OtpPurpose, Session, SignUpRequest, SignUpResponse,
    User, UserUpdate,
};
use async_trait::async_trait;
use client_config_and_utils::Subscription;

/// Callback for auth state notifications.
pub type AuthStateHandler = Box<dyn Fn(&AuthEvent) + Send + Sync>;

/// Operations the lifecycle core needs from the identity service.
///
/// Methods that commit a session (`set_session`, `verify_otp`, `sign_up`
/// with an immediate session, `refresh_session`) persist it and emit the
/// matching [`AuthEvent`] before returning. `exchange_password` validates
/// credentials only and commits nothing.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// The currently committed session, if any.
    async fn get_session(&self) -> IdentityResult<Option<Session>>;

    /// Exchange the stored refresh token for a new session.
    async fn refresh_session(&self) -> IdentityResult<Session>;

    /// Commit a session from a token pair.
    async fn set_session(&self, access_token: &str, refresh_token: &str)
        -> IdentityResult<Session>;

    /// Validate credentials and return tokens without committing them.
    async fn exchange_password(&self, credentials: &Credentials) -> IdentityResult<Session>;

    async fn sign_up(&self, request: &SignUpRequest) -> IdentityResult<SignUpResponse>;

    /// Verify a one-time code and commit the resulting session.
    async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> IdentityResult<Session>;

    async fn resend(&self, email: &str, purpose: OtpPurpose) -> IdentityResult<()>;

    async fn update_user(&self, update: &UserUpdate) -> IdentityResult<User>;

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> IdentityResult<()>;

    /// Revoke and forget the current session.
    async fn sign_out(&self) -> IdentityResult<()>;

    fn start_auto_refresh(&self);

    fn stop_auto_refresh(&self);

    /// Register for auth state notifications until the subscription drops.
    fn on_auth_state_change(&self, handler: AuthStateHandler) -> Subscription;
}
