use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Derived dashboard event. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityEvent {
    #[serde(rename = "post")]
    PostCreated {
        post_id: Uuid,
        message: String,
        time: DateTime<Utc>,
    },
    #[serde(rename = "comment")]
    CommentCreated {
        comment_id: Uuid,
        post_id: Uuid,
        message: String,
        time: DateTime<Utc>,
    },
    #[serde(rename = "user")]
    UserRegistered {
        user_id: Uuid,
        message: String,
        time: DateTime<Utc>,
    },
}

impl ActivityEvent {
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            ActivityEvent::PostCreated { time, .. }
            | ActivityEvent::CommentCreated { time, .. }
            | ActivityEvent::UserRegistered { time, .. } => *time,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ActivityEvent::PostCreated { message, .. }
            | ActivityEvent::CommentCreated { message, .. }
            | ActivityEvent::UserRegistered { message, .. } => message,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ActivityEvent::PostCreated { .. } => "post",
            ActivityEvent::CommentCreated { .. } => "comment",
            ActivityEvent::UserRegistered { .. } => "user",
        }
    }
}

/// Dashboard summary: totals, trailing-week counts and the activity feed.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub posts_count: u64,
    pub users_count: u64,
    pub comments_count: u64,
    pub new_posts_this_week: u64,
    pub new_users_this_week: u64,
    pub new_comments_this_week: u64,
    pub recent_activity: Vec<ActivityEvent>,
}
