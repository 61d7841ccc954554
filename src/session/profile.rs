//! Opaque user profile returned by the login endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Profile issued by the server on login.
///
/// The shape is owned by the backend; the client keeps the value as-is and
/// only reads a few well-known fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(Value);

impl UserProfile {
    /// Wrap a server value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Display name.
    pub fn username(&self) -> Option<&str> {
        self.str_field("username")
    }

    /// Login id.
    pub fn user_id(&self) -> Option<&str> {
        self.str_field("userId")
    }

    /// Email address.
    pub fn email(&self) -> Option<&str> {
        self.str_field("email")
    }

    /// Access token, if the backend issues one.
    pub fn access_token(&self) -> Option<&str> {
        self.str_field("accessToken").filter(|t| !t.is_empty())
    }

    /// Refresh token, if the backend issues one.
    pub fn refresh_token(&self) -> Option<&str> {
        self.str_field("refreshToken").filter(|t| !t.is_empty())
    }

    /// Replace the token fields after a refresh.
    ///
    /// Non-object profiles are left unchanged.
    pub fn set_tokens(&mut self, access_token: &str, refresh_token: Option<&str>) {
        if let Value::Object(map) = &mut self.0 {
            map.insert(
                "accessToken".to_string(),
                Value::String(access_token.to_string()),
            );
            if let Some(refresh) = refresh_token {
                map.insert(
                    "refreshToken".to_string(),
                    Value::String(refresh.to_string()),
                );
            }
        }
    }

    /// The raw server value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the raw server value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for UserProfile {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
