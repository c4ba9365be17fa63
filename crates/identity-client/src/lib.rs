//! Identity service adapter for the Momentum client.
//!
//! This crate provides:
//! - The [`IdentityClient`] trait the session lifecycle core talks to
//! - Session, user, and auth event types
//! - [`SessionStore`] persistence (in-memory and JSON file)
//! - [`GoTrueClient`], an implementation against the Supabase Auth REST API
//!   with a background auto-refresh task

mod client;
mod error;
mod gotrue;
mod jwt;
mod store;
mod types;

pub use client::{AuthStateHandler, IdentityClient};
pub use error::{IdentityError, IdentityResult};
pub use gotrue::{AutoRefreshConfig, GoTrueClient};
pub use jwt::token_expiry;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use types::{
    AuthEvent, AuthEventKind, Credentials, OtpPurpose, Session, SignUpRequest, SignUpResponse,
    User, UserUpdate,
};
