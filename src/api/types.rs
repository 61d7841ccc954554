//! Request and response bodies for the auth endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Login credentials.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email, user id, or phone number.
    pub email_or_id_or_phone: String,
    /// Password.
    pub password: String,
}

impl LoginRequest {
    /// Create a new login request.
    pub fn new(email_or_id_or_phone: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email_or_id_or_phone: email_or_id_or_phone.into(),
            password: password.into(),
        }
    }
}

/// Registration payload.
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Login id, for backends that take one.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 4, max = 20, message = "User ID must be 4 to 20 characters"))]
    pub user_id: Option<String>,
    /// Email address.
    #[validate(
        email(message = "Invalid email address"),
        length(max = 100, message = "Email must be at most 100 characters")
    )]
    pub email: String,
    /// Real name.
    #[validate(
        custom(function = "not_blank"),
        length(max = 50, message = "Name must be at most 50 characters")
    )]
    pub username: String,
    /// Password.
    #[validate(length(min = 8, max = 30, message = "Password must be 8 to 30 characters"))]
    pub password: String,
    /// Mobile number in `010-XXXX-XXXX` form.
    #[validate(custom(function = "mobile_number"))]
    pub phone_number: String,
}

impl RegisterRequest {
    /// Create a new registration payload.
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            user_id: None,
            email: email.into(),
            username: username.into(),
            password: password.into(),
            phone_number: phone_number.into(),
        }
    }

    /// Set the login id.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Account lookup hints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindIdRequest {
    /// Real name.
    pub username: String,
    /// Mobile number.
    pub phone_number: String,
}

impl FindIdRequest {
    /// Create a new lookup request.
    pub fn new(username: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            phone_number: phone_number.into(),
        }
    }
}

/// Result of an account lookup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundAccount {
    /// User id (possibly masked by the server).
    #[serde(alias = "maskedUserId")]
    pub user_id: String,
    /// Email address, when disclosed.
    #[serde(default)]
    pub email: Option<String>,
    /// Server notice.
    #[serde(default)]
    pub message: Option<String>,
}

/// Password reset for a logged-out user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequest {
    /// User id.
    pub user_id: String,
    /// Mobile number on the account.
    pub phone_number: String,
    /// New password.
    pub new_password: String,
}

/// Password change for the logged-in user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    /// Current password.
    pub old_password: String,
    /// New password.
    pub new_password: String,
}

/// Account withdrawal confirmation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    /// Current password.
    pub current_password: String,
}

/// Tokens issued by the refresh endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefreshResponse {
    /// New access token.
    pub access_token: String,
    /// Rotated refresh token, if the server rotates them.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Pull a human-readable message out of a response body.
///
/// Handles `{"message": ..}` envelopes and bare strings.
pub fn response_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Reject empty or whitespace-only values.
pub fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("not_blank")
            .with_message("Must not be empty".into()));
    }
    Ok(())
}

/// Accept only `010-XXXX-XXXX` mobile numbers.
pub fn mobile_number(value: &str) -> Result<(), validator::ValidationError> {
    let parts: Vec<&str> = value.split('-').collect();
    let valid = matches!(parts.as_slice(), ["010", mid, last]
        if mid.len() == 4
            && last.len() == 4
            && mid.chars().all(|c| c.is_ascii_digit())
            && last.chars().all(|c| c.is_ascii_digit()));
    if !valid {
        return Err(validator::ValidationError::new("mobile_number")
            .with_message("Phone number must look like 010-1234-5678".into()));
    }
    Ok(())
}
