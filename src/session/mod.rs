//! Session module for Cellar.
//!
//! This module provides the session store (current identity and login
//! flag), the opaque user profile, and persistence of the session record.

mod profile;
mod storage;
mod store;

pub use profile::UserProfile;
pub use storage::{open_storage, FileStorage, MemoryStorage, SessionStorage, SESSION_KEY};
pub use store::{Session, SessionStore, SignUpOutcome};
