use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

pub const COMMENT_MAX_CHARS: usize = 1000;

/// Deepest reply allowed. Top-level comments sit at depth 0, a reply to one
/// of them at depth 1.
pub const MAX_REPLY_DEPTH: usize = 32;

/// Comment entity - top-level when `parent_id` is `None`, otherwise a reply
/// to another comment on the same post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub like_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentPatch {
    pub content: Option<String>,
}

impl Comment {
    pub fn new(user_id: Uuid, input: NewComment) -> DomainResult<Self> {
        let content = validate_comment(&input.content)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            post_id: input.post_id,
            user_id,
            parent_id: input.parent_id,
            content,
            like_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_patch(&mut self, patch: CommentPatch) -> DomainResult<()> {
        if let Some(content) = patch.content {
            self.content = validate_comment(&content)?;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

}

fn validate_comment(content: &str) -> DomainResult<String> {
    if content.trim().is_empty() {
        return Err(DomainError::validation("please add a comment"));
    }
    if content.chars().count() > COMMENT_MAX_CHARS {
        return Err(DomainError::validation(format!(
            "comment cannot be more than {} characters",
            COMMENT_MAX_CHARS
        )));
    }
    Ok(content.to_string())
}

/// A comment with its replies, assembled at read time.
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentThread>,
}

/// Assemble flat comments of one post into threads, oldest first at every
/// level. Replies whose parent is not in `comments` are dropped. Anything
/// nested below [`MAX_REPLY_DEPTH`] is flattened into its deepest allowed
/// ancestor, so the result never nests deeper than the write path allows.
pub fn build_threads(comments: Vec<Comment>) -> Vec<CommentThread> {
    let mut children: HashMap<Option<Uuid>, Vec<Comment>> = HashMap::new();
    for comment in comments {
        children.entry(comment.parent_id).or_default().push(comment);
    }
    // Newest first so `pop` yields the oldest sibling.
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    }

    struct Frame {
        comment: Comment,
        pending: Vec<Comment>,
        replies: Vec<CommentThread>,
    }

    let mut roots = Vec::new();
    let mut top = children.remove(&None).unwrap_or_default();
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        let next = match stack.last_mut() {
            Some(frame) => frame.pending.pop(),
            None => top.pop(),
        };
        match next {
            Some(comment) => {
                let pending = children.remove(&Some(comment.id)).unwrap_or_default();
                let depth = stack.len();
                match stack.last_mut() {
                    Some(frame) if depth >= MAX_REPLY_DEPTH => {
                        frame.pending.extend(pending);
                        frame.replies.push(CommentThread {
                            comment,
                            replies: Vec::new(),
                        });
                    }
                    _ => stack.push(Frame {
                        comment,
                        pending,
                        replies: Vec::new(),
                    }),
                }
            }
            None => {
                let Some(done) = stack.pop() else {
                    break;
                };
                let thread = CommentThread {
                    comment: done.comment,
                    replies: done.replies,
                };
                match stack.last_mut() {
                    Some(parent) => parent.replies.push(thread),
                    None => roots.push(thread),
                }
            }
        }
    }

    roots
}
