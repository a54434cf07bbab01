//! Cross-entity integrity rules and cascade planning.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{Comment, LikeTarget, MAX_REPLY_DEPTH, Post};
use crate::error::{DomainError, DomainResult};
use crate::ports::{ContentRepository, Mutation, WriteBatch};

/// Deletions needed to remove an entity and everything that depends on it,
/// ordered children before parents.
#[derive(Debug, Clone)]
pub struct CascadePlan {
    pub batch: WriteBatch,
    /// Comments removed by the plan, replies included.
    pub comments: u64,
}

#[derive(Clone)]
pub struct IntegrityManager {
    repo: Arc<dyn ContentRepository>,
}

impl IntegrityManager {
    pub fn new(repo: Arc<dyn ContentRepository>) -> Self {
        Self { repo }
    }

    /// A new comment must target an existing post, and its parent (if any)
    /// must be an older comment on that same post, at most `MAX_REPLY_DEPTH`
    /// levels below a top-level comment.
    pub async fn check_new_comment(&self, comment: &Comment) -> DomainResult<()> {
        if self.repo.find_post(comment.post_id).await?.is_none() {
            return Err(DomainError::not_found("post", comment.post_id));
        }

        let Some(parent_id) = comment.parent_id else {
            return Ok(());
        };
        let parent = self.repo.find_comment(parent_id).await?.ok_or_else(|| {
            DomainError::validation(format!("parent comment {} does not exist", parent_id))
        })?;

        if parent.post_id != comment.post_id {
            return Err(DomainError::validation(format!(
                "parent comment {} belongs to a different post",
                parent_id
            )));
        }
        if parent.created_at > comment.created_at {
            return Err(DomainError::validation(
                "parent comment must be created before its replies",
            ));
        }

        // Walk up at most MAX_REPLY_DEPTH ancestors; the new reply sits one
        // level below its parent.
        let mut depth = 1;
        let mut cursor = parent.parent_id;
        while let Some(ancestor_id) = cursor {
            depth += 1;
            if depth > MAX_REPLY_DEPTH {
                return Err(DomainError::validation(format!(
                    "replies cannot be nested more than {} levels deep",
                    MAX_REPLY_DEPTH
                )));
            }
            let ancestor = self.repo.find_comment(ancestor_id).await?.ok_or_else(|| {
                DomainError::IntegrityViolation(format!(
                    "ancestor comment {} of {} is missing",
                    ancestor_id, parent_id
                ))
            })?;
            cursor = ancestor.parent_id;
        }
        Ok(())
    }

    /// Plan removal of a comment with its whole reply subtree and their likes.
    pub async fn plan_comment_removal(&self, root: &Comment) -> DomainResult<CascadePlan> {
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        let mut seen = HashSet::from([root.id]);
        let mut frontier = vec![root.id];

        while let Some(id) = frontier.pop() {
            for reply in self.repo.replies_to(id).await? {
                if !seen.insert(reply.id) {
                    return Err(DomainError::IntegrityViolation(format!(
                        "comment {} appears twice in the reply tree of {}",
                        reply.id, root.id
                    )));
                }
                children.entry(id).or_default().push(reply.id);
                frontier.push(reply.id);
            }
        }

        let mut batch = WriteBatch::new();
        let removed = push_subtree(&mut batch, root.id, &children);
        Ok(CascadePlan {
            batch,
            comments: removed,
        })
    }

    /// Plan removal of a post: every comment thread, all likes, then the post.
    pub async fn plan_post_removal(&self, post: &Post) -> DomainResult<CascadePlan> {
        let comments = self.repo.comments_of_post(post.id).await?;
        let ids: HashSet<Uuid> = comments.iter().map(|c| c.id).collect();

        let mut roots = Vec::new();
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for comment in &comments {
            match comment.parent_id {
                Some(parent) if ids.contains(&parent) => {
                    children.entry(parent).or_default().push(comment.id)
                }
                Some(parent) => {
                    return Err(DomainError::IntegrityViolation(format!(
                        "comment {} on post {} replies to foreign comment {}",
                        comment.id, post.id, parent
                    )));
                }
                None => roots.push(comment.id),
            }
        }

        let mut batch = WriteBatch::new();
        let mut removed = 0;
        for root in roots {
            removed += push_subtree(&mut batch, root, &children);
        }
        if removed != comments.len() as u64 {
            return Err(DomainError::IntegrityViolation(format!(
                "post {} has comments unreachable from any top-level comment",
                post.id
            )));
        }

        batch
            .push(Mutation::DeleteLikesOf(LikeTarget::Post(post.id)))
            .push(Mutation::DeletePost(post.id));
        Ok(CascadePlan {
            batch,
            comments: removed,
        })
    }
}

/// Append deletions for `root`'s subtree in post-order. Returns the number
/// of comments scheduled.
fn push_subtree(batch: &mut WriteBatch, root: Uuid, children: &HashMap<Uuid, Vec<Uuid>>) -> u64 {
    // (comment, children already expanded)
    let mut stack = vec![(root, false)];
    let mut removed = 0;

    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            batch
                .push(Mutation::DeleteLikesOf(LikeTarget::Comment(id)))
                .push(Mutation::DeleteComment(id));
            removed += 1;
            continue;
        }
        stack.push((id, true));
        if let Some(kids) = children.get(&id) {
            stack.extend(kids.iter().map(|kid| (*kid, false)));
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deleted_comments(batch: &WriteBatch) -> Vec<Uuid> {
        batch
            .steps()
            .iter()
            .filter_map(|m| match m {
                Mutation::DeleteComment(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_push_subtree_is_post_order() {
        let (root, a, b, a1) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let children = HashMap::from([(root, vec![a, b]), (a, vec![a1])]);

        let mut batch = WriteBatch::new();
        let removed = push_subtree(&mut batch, root, &children);
        let order = deleted_comments(&batch);

        assert_eq!(removed, 4);
        let pos = |id| order.iter().position(|x| *x == id).unwrap();
        assert!(pos(a1) < pos(a));
        assert!(pos(a) < pos(root));
        assert!(pos(b) < pos(root));
        assert_eq!(order.last(), Some(&root));
    }

    #[test]
    fn test_likes_removed_before_their_comment() {
        let root = Uuid::new_v4();
        let mut batch = WriteBatch::new();
        push_subtree(&mut batch, root, &HashMap::new());

        assert_eq!(
            batch.steps(),
            &[
                Mutation::DeleteLikesOf(LikeTarget::Comment(root)),
                Mutation::DeleteComment(root),
            ]
        );
    }
}
