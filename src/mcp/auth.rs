//! Shared-secret authorization for the `initialize` handshake.
//!
//! The client supplies its token out of band through the
//! `MCP_AUTHORIZATION_TOKEN` environment variable.

use crate::error::McpError;

/// Environment variable holding the client's token.
pub const AUTHORIZATION_TOKEN_ENV: &str = "MCP_AUTHORIZATION_TOKEN";

/// Compares two byte strings without short-circuiting on the first mismatch.
///
/// Only the length comparison leaks timing.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Checks a supplied token against the expected secret.
///
/// # Errors
///
/// - [`McpError::Internal`] if no expected token is configured
/// - [`McpError::AuthorizationRequired`] if `supplied` is missing or empty
/// - [`McpError::AuthorizationFailed`] if the tokens differ
pub fn check_token(expected: Option<&str>, supplied: Option<&str>) -> Result<(), McpError> {
    let expected = expected
        .filter(|token| !token.is_empty())
        .ok_or_else(|| McpError::internal("Server authorization is misconfigured."))?;

    let supplied = supplied
        .filter(|token| !token.is_empty())
        .ok_or(McpError::AuthorizationRequired)?;

    if constant_time_eq(expected.as_bytes(), supplied.as_bytes()) {
        Ok(())
    } else {
        Err(McpError::AuthorizationFailed)
    }
}

/// Reads the client token from the process environment.
#[must_use]
pub fn token_from_env() -> Option<String> {
    std::env::var(AUTHORIZATION_TOKEN_ENV).ok()
}
