//! Board module for Cellar.
//!
//! This module provides the client-side post list:
//! - The post model and write payload
//! - The board store (list fetch, create, update, delete)

mod post;
mod store;

pub use post::{posts_from_value, Post, PostPayload};
pub use store::{BoardState, BoardStore, PostAction, FETCH_FAILED};
