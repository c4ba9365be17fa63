//! Local username validation for sign-up.

use crate::{AuthError, AuthResult};

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 30;

/// Accepts 3 to 30 characters with no control characters.
pub fn validate_username(username: &str) -> AuthResult<()> {
    let length = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&length) {
        return Err(AuthError::InvalidUsernameFormat(format!(
            "must be {}-{} characters, got {}",
            USERNAME_MIN_CHARS, USERNAME_MAX_CHARS, length
        )));
    }

    if username.chars().any(char::is_control) {
        return Err(AuthError::InvalidUsernameFormat(
            "must not contain control characters".to_string(),
        ));
    }

    Ok(())
}
