use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row ids are assigned by the gateway.
pub type Id = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Id,
    pub thread_id: Id,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Id,
    pub post_id: Id,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payloads. `id` and `created_at` come back from the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewThread {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub thread_id: Id,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: Id,
    pub content: String,
}
