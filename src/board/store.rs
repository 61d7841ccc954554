//! Board store: the client-side snapshot of the post list.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{paths, ApiClient};
use crate::session::SessionStore;

use super::post::{posts_from_value, Post, PostPayload};

/// Error shown when the list cannot be loaded.
pub const FETCH_FAILED: &str = "Failed to load posts.";

/// Snapshot of the board state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    /// Posts from the last successful fetch, in server order.
    pub posts: Vec<Post>,
    /// Whether a remote call is in flight.
    pub loading: bool,
    /// Error from the last operation.
    pub error: Option<String>,
    /// Success notice from the last mutation.
    pub message: Option<String>,
}

/// Kind of board write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    /// Create a post.
    Create,
    /// Update a post.
    Update,
    /// Delete a post.
    Delete,
}

impl PostAction {
    /// Error set when a write is attempted while logged out.
    pub fn login_required(&self) -> &'static str {
        match self {
            PostAction::Create => "You must log in to write a post.",
            PostAction::Update => "You must log in to edit a post.",
            PostAction::Delete => "You must log in to delete a post.",
        }
    }

    /// Error set when the server answers 403.
    pub fn forbidden(&self) -> &'static str {
        match self {
            PostAction::Create => "You are not allowed to write posts. Please log in again.",
            PostAction::Update => "You can only edit your own posts.",
            PostAction::Delete => "You can only delete your own posts.",
        }
    }

    /// Error set when the server gives no message.
    pub fn failed(&self) -> &'static str {
        match self {
            PostAction::Create => "Failed to create the post.",
            PostAction::Update => "Failed to update the post.",
            PostAction::Delete => "Failed to delete the post.",
        }
    }

    /// Message set on success.
    pub fn succeeded(&self) -> &'static str {
        match self {
            PostAction::Create => "Post created successfully.",
            PostAction::Update => "Post updated successfully.",
            PostAction::Delete => "Post deleted successfully.",
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    board: BoardState,
    in_flight: usize,
}

/// Holder of the post list and its status fields.
///
/// Every successful write is followed by a full re-fetch; server responses
/// to writes are never merged into the list.
pub struct BoardStore {
    client: Arc<ApiClient>,
    session: Arc<SessionStore>,
    state: RwLock<Inner>,
}

impl BoardStore {
    /// Create an empty store.
    pub fn new(client: Arc<ApiClient>, session: Arc<SessionStore>) -> Self {
        Self {
            client,
            session,
            state: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state snapshot.
    pub fn state(&self) -> BoardState {
        self.read().board.clone()
    }

    /// Posts from the last successful fetch.
    pub fn posts(&self) -> Vec<Post> {
        self.read().board.posts.clone()
    }

    /// Look up a post in the current snapshot.
    pub fn post(&self, id: i64) -> Option<Post> {
        self.read().board.posts.iter().find(|p| p.id == id).cloned()
    }

    /// Whether a remote call is in flight.
    pub fn is_loading(&self) -> bool {
        self.read().board.loading
    }

    /// Error from the last operation.
    pub fn error(&self) -> Option<String> {
        self.read().board.error.clone()
    }

    /// Success notice from the last mutation.
    pub fn message(&self) -> Option<String> {
        self.read().board.message.clone()
    }

    /// Clear the error.
    pub fn clear_error(&self) {
        self.write().board.error = None;
    }

    /// Clear the success notice.
    pub fn clear_message(&self) {
        self.write().board.message = None;
    }

    fn start_loading(&self) -> LoadingGuard<'_> {
        let mut inner = self.write();
        inner.in_flight += 1;
        inner.board.loading = true;
        LoadingGuard { store: self }
    }

    /// Reload the full post list.
    ///
    /// A response that is not a list replaces the snapshot with an empty
    /// one. On failure the error is set and the snapshot is emptied.
    /// Returns whether the list was loaded.
    pub async fn fetch_posts(&self) -> bool {
        let _loading = self.start_loading();
        self.write().board.error = None;

        let result = self.client.get::<Value>(paths::POSTS).await;
        let result = result.and_then(posts_from_value);

        let mut inner = self.write();
        match result {
            Ok(posts) => {
                debug!("Loaded {} posts", posts.len());
                inner.board.posts = posts;
                true
            }
            Err(e) => {
                warn!("Failed to load posts: {}", e);
                inner.board.error = Some(FETCH_FAILED.to_string());
                inner.board.posts.clear();
                false
            }
        }
    }

    /// Create a post. Returns whether the server accepted it.
    pub async fn create_post(&self, payload: &PostPayload) -> bool {
        self.mutate(PostAction::Create, Method::POST, paths::POSTS, Some(payload))
            .await
    }

    /// Replace a post's title and content. Returns whether the server accepted it.
    pub async fn update_post(&self, id: i64, payload: &PostPayload) -> bool {
        self.mutate(PostAction::Update, Method::PUT, &paths::post(id), Some(payload))
            .await
    }

    /// Delete a post. Returns whether the server accepted it.
    pub async fn delete_post(&self, id: i64) -> bool {
        self.mutate(PostAction::Delete, Method::DELETE, &paths::post(id), None)
            .await
    }

    async fn mutate(
        &self,
        action: PostAction,
        method: Method,
        path: &str,
        payload: Option<&PostPayload>,
    ) -> bool {
        {
            let mut inner = self.write();
            inner.board.error = None;
            inner.board.message = None;
        }

        if !self.session.is_logged_in() {
            debug!("{:?} rejected locally: not logged in", action);
            self.write().board.error = Some(action.login_required().to_string());
            return false;
        }

        let result = {
            let _loading = self.start_loading();
            self.client.execute(method, path, payload).await
        };

        match result {
            Ok(_) => {
                info!("{:?} succeeded: {}", action, path);
                self.write().board.message = Some(action.succeeded().to_string());
                self.fetch_posts().await;
                true
            }
            Err(e) => {
                warn!("{:?} failed: {}", action, e);
                let error = if e.is_forbidden() {
                    action.forbidden().to_string()
                } else {
                    e.server_message()
                        .map(str::to_string)
                        .unwrap_or_else(|| action.failed().to_string())
                };
                self.write().board.error = Some(error);
                false
            }
        }
    }
}

/// Clears `loading` once the last in-flight call finishes, even if the
/// future is dropped mid-call.
struct LoadingGuard<'a> {
    store: &'a BoardStore,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.store.write();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        inner.board.loading = inner.in_flight > 0;
    }
}
