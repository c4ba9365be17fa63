//! Session lifecycle for the Momentum client.
//!
//! This crate provides:
//! - [`SessionLifecycleManager`]: login, sign-up, OTP, logout, token access,
//!   and revalidation on resume, coordinated with connectivity
//! - An explicit FSM for the session phase (anonymous, authenticated,
//!   password recovery)
//! - The [`AuthError`] taxonomy surfaced to the UI
//! - [`Navigator`] and [`Platform`] collaborator traits

mod auth_fsm;
mod error;
mod manager;
mod navigation;
mod platform;
mod username;

#[cfg(test)]
mod tests;

pub use auth_fsm::session_machine;
pub use auth_fsm::{
    SessionMachine, SessionMachineInput, SessionMachineState, SessionPhase, SessionSnapshot,
};
pub use error::{AuthError, AuthErrorKind, AuthOperation, AuthResult};
pub use manager::{
    AuthOutcome, ResumeTrigger, SessionCollaborators, SessionConfig, SessionLifecycleManager,
    SignUpOutcome, SignUpParams,
};
pub use navigation::{HeadlessNavigator, Navigator, ProtectedRoutes};
pub use platform::{DesktopPlatform, Platform};
pub use username::{validate_username, USERNAME_MAX_CHARS, USERNAME_MIN_CHARS};
