//! Remote API access for Cellar.
//!
//! This module provides the shared HTTP client, the endpoint paths, and the
//! request/response bodies of the auth endpoints.

mod client;
pub mod types;

pub use client::{decode, ApiClient};
pub use types::{
    response_message, FindIdRequest, FoundAccount, LoginRequest, PasswordChangeRequest,
    PasswordResetRequest, RegisterRequest, TokenRefreshResponse, WithdrawalRequest,
};

/// Endpoint paths, relative to the API base URL.
pub mod paths {
    /// Login.
    pub const LOGIN: &str = "/api/auth/login";
    /// Registration.
    pub const REGISTER: &str = "/api/auth/register";
    /// Account id lookup.
    pub const FIND_ID: &str = "/api/auth/find-id";
    /// Password reset (logged out).
    pub const PASSWORD_RESET: &str = "/api/auth/password/reset";
    /// Access token refresh.
    pub const REFRESH: &str = "/api/auth/refresh";
    /// Password change (logged in).
    pub const PASSWORD_CHANGE: &str = "/api/user/password/change";
    /// Account withdrawal.
    pub const WITHDRAWAL: &str = "/api/user/withdrawal";
    /// Post collection.
    pub const POSTS: &str = "/api/posts";

    /// A single post.
    pub fn post(id: i64) -> String {
        format!("{POSTS}/{id}")
    }
}
