//! Post model for Cellar.
//!
//! Posts are created server-side; the client only ever holds the snapshot
//! returned by the last list fetch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::api::types::not_blank;
use crate::Result;

/// Post entity as listed by the board endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Unique post ID. Paged list items name it `postId`.
    #[serde(alias = "postId")]
    pub id: i64,
    /// Post title.
    #[serde(default)]
    pub title: String,
    /// Post body/content.
    #[serde(default)]
    pub content: String,
    /// Display name of the author.
    #[serde(default)]
    pub author_username: String,
    /// Post creation timestamp, as sent by the server.
    #[serde(default, alias = "created_at")]
    pub created_at: String,
    /// View count.
    #[serde(default)]
    pub views: i64,
}

impl Post {
    /// Check if `username` wrote this post.
    pub fn is_written_by(&self, username: &str) -> bool {
        !self.author_username.is_empty() && self.author_username == username
    }
}

/// Body of a create or update request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Validate)]
pub struct PostPayload {
    /// Post title.
    #[validate(
        custom(function = "not_blank"),
        length(max = 100, message = "Title must be at most 100 characters")
    )]
    pub title: String,
    /// Post body/content.
    #[validate(
        custom(function = "not_blank"),
        length(max = 5000, message = "Content must be at most 5000 characters")
    )]
    pub content: String,
}

impl PostPayload {
    /// Create a new payload.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Extract the post list from a list response.
///
/// Accepts a bare array, `{"data": [..]}`, or `{"data": {"content": [..]}}`.
/// Any other shape is an empty list.
pub fn posts_from_value(value: Value) -> Result<Vec<Post>> {
    let list = match value {
        Value::Array(list) => Value::Array(list),
        Value::Object(mut map) => match map.remove("data") {
            Some(data @ Value::Array(_)) => data,
            Some(Value::Object(mut page)) => match page.remove("content") {
                Some(content @ Value::Array(_)) => content,
                _ => return Ok(Vec::new()),
            },
            _ => return Ok(Vec::new()),
        },
        _ => return Ok(Vec::new()),
    };
    Ok(serde_json::from_value(list)?)
}
