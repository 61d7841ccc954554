//! Cellar - client-side state for the Cellar wine shop
//!
//! Session and board stores that sit between a front end and the shop's
//! HTTP API, implemented in Rust.

pub mod api;
pub mod board;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use api::{
    ApiClient, FindIdRequest, FoundAccount, LoginRequest, PasswordChangeRequest,
    PasswordResetRequest, RegisterRequest, WithdrawalRequest,
};
pub use board::{BoardState, BoardStore, Post, PostAction, PostPayload};
pub use config::{Config, CredentialMode};
pub use error::{CellarError, Result};
pub use session::{
    open_storage, FileStorage, MemoryStorage, Session, SessionStorage, SessionStore,
    SignUpOutcome, UserProfile,
};
