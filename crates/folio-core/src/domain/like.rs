use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a like points at. Posts are the primary target; comment likes share
/// the same invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LikeTarget {
    Post(Uuid),
    Comment(Uuid),
}

impl LikeTarget {
    pub fn id(&self) -> Uuid {
        match self {
            LikeTarget::Post(id) | LikeTarget::Comment(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LikeTarget::Post(_) => "post",
            LikeTarget::Comment(_) => "comment",
        }
    }
}

impl fmt::Display for LikeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Composite identity of a like: at most one row per key may exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LikeKey {
    pub user_id: Uuid,
    pub target: LikeTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub user_id: Uuid,
    pub target: LikeTarget,
    pub created_at: DateTime<Utc>,
}

impl Like {
    pub fn new(key: LikeKey) -> Self {
        Self {
            user_id: key.user_id,
            target: key.target,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> LikeKey {
        LikeKey {
            user_id: self.user_id,
            target: self.target,
        }
    }
}

/// Per (user, target) toggle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeState {
    NotLiked,
    Liked,
}

impl LikeState {
    pub fn flipped(self) -> Self {
        match self {
            LikeState::NotLiked => LikeState::Liked,
            LikeState::Liked => LikeState::NotLiked,
        }
    }
}

/// Result of a toggle, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeOutcome {
    pub liked: bool,
    pub total_likes: u64,
}
