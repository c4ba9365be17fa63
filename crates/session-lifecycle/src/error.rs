//! Session lifecycle error types.

use identity_client::IdentityError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Operation an [`AuthError::OperationFailed`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthOperation {
    InitializeSession,
    Login,
    SignUp,
    VerifyOtp,
    ResendOtp,
    Refresh,
    RequestPasswordReset,
    UpdatePassword,
}

impl AuthOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthOperation::InitializeSession => "initialize_session",
            AuthOperation::Login => "login",
            AuthOperation::SignUp => "sign_up",
            AuthOperation::VerifyOtp => "verify_otp",
            AuthOperation::ResendOtp => "resend_otp",
            AuthOperation::Refresh => "refresh",
            AuthOperation::RequestPasswordReset => "request_password_reset",
            AuthOperation::UpdatePassword => "update_password",
        }
    }
}

impl fmt::Display for AuthOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No identity client is configured
    #[error("Identity service unavailable")]
    ServiceUnavailable,

    /// Invalid email or password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Username failed local validation
    #[error("Invalid username format: {0}")]
    InvalidUsernameFormat(String),

    /// The identity service could not be reached
    #[error("Network error: {0}")]
    NetworkError(String),

    /// One-time code rejected
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Token refresh error
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Operation needs a session
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Unexpected failure converted at the operation boundary
    #[error("{operation} failed: {message}")]
    OperationFailed {
        operation: AuthOperation,
        message: String,
    },
}

/// Stable error code for UI localization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorKind {
    ServiceUnavailable,
    InvalidCredentials,
    InvalidUsernameFormat,
    NetworkError,
    VerificationFailed,
    RefreshFailed,
    NotAuthenticated,
    OperationFailed,
}

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::ServiceUnavailable => AuthErrorKind::ServiceUnavailable,
            AuthError::InvalidCredentials(_) => AuthErrorKind::InvalidCredentials,
            AuthError::InvalidUsernameFormat(_) => AuthErrorKind::InvalidUsernameFormat,
            AuthError::NetworkError(_) => AuthErrorKind::NetworkError,
            AuthError::VerificationFailed(_) => AuthErrorKind::VerificationFailed,
            AuthError::RefreshFailed(_) => AuthErrorKind::RefreshFailed,
            AuthError::NotAuthenticated => AuthErrorKind::NotAuthenticated,
            AuthError::OperationFailed { .. } => AuthErrorKind::OperationFailed,
        }
    }

    /// HTTP-like status classification.
    pub fn status(&self) -> u16 {
        match self {
            AuthError::InvalidUsernameFormat(_) | AuthError::VerificationFailed(_) => 400,
            AuthError::InvalidCredentials(_)
            | AuthError::RefreshFailed(_)
            | AuthError::NotAuthenticated => 401,
            AuthError::ServiceUnavailable | AuthError::NetworkError(_) => 503,
            AuthError::OperationFailed { .. } => 500,
        }
    }

    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthError::NetworkError(_) | AuthError::ServiceUnavailable
        )
    }

    pub(crate) fn operation_failed(operation: AuthOperation, message: impl fmt::Display) -> Self {
        AuthError::OperationFailed {
            operation,
            message: message.to_string(),
        }
    }

    /// Classify an identity adapter failure for `operation`.
    pub(crate) fn from_identity(operation: AuthOperation, error: IdentityError) -> Self {
        if error.is_transport() {
            return AuthError::NetworkError(error.to_string());
        }

        let message = match &error {
            IdentityError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        };
        let client_error = error.status().is_some_and(|s| (400..500).contains(&s));

        match (operation, &error) {
            (_, IdentityError::NoSession) if operation != AuthOperation::Refresh => {
                AuthError::NotAuthenticated
            }
            (AuthOperation::Refresh, _) => AuthError::RefreshFailed(message),
            (AuthOperation::Login, _) if client_error => AuthError::InvalidCredentials(message),
            (AuthOperation::VerifyOtp, _) if client_error => AuthError::VerificationFailed(message),
            _ => AuthError::OperationFailed { operation, message },
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
