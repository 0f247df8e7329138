use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A post or a comment. Comments carry the id of the node they were written
/// under; top-level posts have no parent. The parent links form a tree
/// rooted at a post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContentNode {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Which engagement counter a key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterKind {
    Likes,
    Comments,
}

impl CounterKind {
    /// Suffix used in cache keys: `post:<id>:likes`, `post:<id>:commentcount`.
    pub fn as_str(self) -> &'static str {
        match self {
            CounterKind::Likes => "likes",
            CounterKind::Comments => "commentcount",
        }
    }
}

/// One entry returned by a top-N ranking query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedChild {
    pub child_id: Uuid,
    pub score: i64,
}
