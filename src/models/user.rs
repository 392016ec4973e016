// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub is_admin: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Public view of a user (no password hash).
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "username")]
    pub user_name: String,
    pub email: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for user registration.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 20, message = "First name must be between 2 and 20 characters"))]
    pub first_name: String,
    #[validate(length(min = 2, max = 20, message = "Last name must be between 2 and 20 characters"))]
    pub last_name: String,
    #[validate(length(min = 2, max = 20, message = "Username must be between 2 and 20 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(custom(function = validate_password_strength))]
    pub password: String,
    pub repeat_password: String,
}

/// Password policy: at least 8 chars with upper, lower, digit and special.
fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.len() < 8 {
        return Err(ValidationError::new("password_too_short")
            .with_message("Password must be at least 8 characters".into()));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::new("password_needs_uppercase")
            .with_message("Password must contain at least one uppercase letter".into()));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ValidationError::new("password_needs_lowercase")
            .with_message("Password must contain at least one lowercase letter".into()));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("password_needs_digit")
            .with_message("Password must contain at least one number".into()));
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new("password_needs_special")
            .with_message("Password must contain at least one special character".into()));
    }
    Ok(())
}

/// DTO for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_policy_accepts_strong_password() {
        assert!(validate_password_strength("Str0ng!pass").is_ok());
    }

    #[test]
    fn password_policy_rejects_weak_passwords() {
        assert!(validate_password_strength("short1!").is_err());
        assert!(validate_password_strength("nouppercase1!").is_err());
        assert!(validate_password_strength("NOLOWERCASE1!").is_err());
        assert!(validate_password_strength("NoDigits!!").is_err());
        assert!(validate_password_strength("NoSpecial123").is_err());
    }
}
