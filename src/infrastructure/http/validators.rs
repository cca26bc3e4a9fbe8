//! Declarative input validation (spec §4.G "Validation"): every constraint
//! named in the spec as a small pure function, so a handler's validation
//! step reads as a list of checks rather than ad hoc string poking.

use super::error::ApiError;

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// `handle`, `teamName`: 1-50 chars, `^[A-Za-z0-9_-]+$`.
pub fn identifier(field: &str, value: &str) -> Result<(), ApiError> {
    if value.is_empty() || value.chars().count() > 50 || !value.chars().all(is_identifier_char) {
        return Err(ApiError::validation(format!("{field} must be 1-50 chars matching [A-Za-z0-9_-]+")));
    }
    Ok(())
}

/// `uid`: 24 lowercase hex chars.
pub fn uid(value: &str) -> Result<(), ApiError> {
    if value.len() != 24 || !value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
        return Err(ApiError::validation("uid must be 24 lowercase hex chars"));
    }
    Ok(())
}

pub fn bounded_string(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ApiError::validation(format!("{field} must be {min}-{max} chars")));
    }
    Ok(())
}

/// Task priority: 1..5 inclusive.
pub fn priority(value: u8) -> Result<(), ApiError> {
    if !(1..=5).contains(&value) {
        return Err(ApiError::validation("priority must be 1..5"));
    }
    Ok(())
}

/// Swarm `maxAgents`: 1..100.
pub fn max_agents(value: u32) -> Result<(), ApiError> {
    if !(1..=100).contains(&value) {
        return Err(ApiError::validation("maxAgents must be 1..100"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_rejects_bad_chars() {
        assert!(identifier("handle", "ok-name_1").is_ok());
        assert!(identifier("handle", "bad name").is_err());
        assert!(identifier("handle", "").is_err());
    }

    #[test]
    fn uid_requires_24_lowercase_hex() {
        assert!(uid("abcdef0123456789abcdef01").is_ok());
        assert!(uid("ABCDEF0123456789ABCDEF01").is_err());
        assert!(uid("tooshort").is_err());
    }

    #[test]
    fn priority_bounds() {
        assert!(priority(1).is_ok());
        assert!(priority(5).is_ok());
        assert!(priority(0).is_err());
        assert!(priority(6).is_err());
    }
}
