//! Threaded comments on any entity, with @mentions, reactions and the
//! notifications they trigger.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use db::models::{
    comment::{
        CommentEntityType, CommentMention, CommentReaction, CommentVisibility, CommentWithAuthor,
        EntityComment, NewComment, ReactionCount,
    },
    notification::{NewNotification, Notification},
    user::UserSummary,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use strum_macros::Display;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use utils::response::OffsetPagination;
use uuid::Uuid;

use super::{
    markdown::{self, Mention},
    validation::{ValidationError, required, required_text},
};

pub const MAX_CONTENT_CHARS: usize = 10_000;
pub const RATE_LIMIT_MAX: i64 = 10;
pub const RATE_LIMIT_WINDOW_SECS: i64 = 60;
pub const MAX_THREAD_DEPTH: i32 = 5;
pub const ALLOWED_REACTIONS: [&str; 12] = [
    "👍", "👎", "❤️", "🎉", "😄", "😕", "🚀", "👀", "✅", "❌", "💡", "🔥",
];

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("comment not found")]
    NotFound,
    #[error("parent comment not found")]
    ParentNotFound,
    #[error("only the author can {0} this comment")]
    NotAuthor(&'static str),
    #[error("too many comments, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },
    #[error("emoji {0} is not an allowed reaction")]
    InvalidReaction(String),
}

/// Trimmed comment body, rejecting empty and oversized content.
pub fn validate_content(raw: Option<&str>) -> Result<String, ValidationError> {
    let content = required_text(raw, "content")?;
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ValidationError::new(
            "content",
            format!("Content exceeds {MAX_CONTENT_CHARS} characters"),
            format!("يتجاوز المحتوى {MAX_CONTENT_CHARS} حرف"),
        ));
    }
    Ok(content)
}

pub fn is_rate_limited(recent_count: i64) -> bool {
    recent_count >= RATE_LIMIT_MAX
}

/// Advisory-lock key shared by every post from one author on one entity.
pub fn rate_limit_lock_key(author_id: Uuid, entity_type: CommentEntityType, entity_id: Uuid) -> String {
    format!("entity-comment-rate:{author_id}:{entity_type}:{entity_id}")
}

pub fn is_allowed_reaction(emoji: &str) -> bool {
    ALLOWED_REACTIONS.contains(&emoji)
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateComment {
    pub entity_type: Option<CommentEntityType>,
    pub entity_id: Option<Uuid>,
    pub content: Option<String>,
    pub parent_id: Option<Uuid>,
    pub visibility: Option<CommentVisibility>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateComment {
    pub content: Option<String>,
    pub visibility: Option<CommentVisibility>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct CommentNode {
    #[serde(flatten)]
    #[ts(flatten)]
    pub comment: CommentWithAuthor,
    pub reactions: Vec<ReactionCount>,
    pub replies: Vec<CommentNode>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct CommentListing {
    pub comments: Vec<CommentNode>,
    pub pagination: OffsetPagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReactionAction {
    Added,
    Removed,
}

/// Arrange thread rows (root first) into a tree rooted at `root_id`.
pub fn build_tree(
    rows: Vec<CommentWithAuthor>,
    root_id: Uuid,
    reactions: &HashMap<Uuid, Vec<ReactionCount>>,
) -> Option<CommentNode> {
    let mut children: HashMap<Uuid, Vec<CommentWithAuthor>> = HashMap::new();
    let mut root = None;
    for row in rows {
        if row.comment.id == root_id {
            root = Some(row);
        } else if let Some(parent) = row.comment.parent_id {
            children.entry(parent).or_default().push(row);
        }
    }

    fn attach(
        comment: CommentWithAuthor,
        children: &mut HashMap<Uuid, Vec<CommentWithAuthor>>,
        reactions: &HashMap<Uuid, Vec<ReactionCount>>,
    ) -> CommentNode {
        let replies = children
            .remove(&comment.comment.id)
            .unwrap_or_default()
            .into_iter()
            .map(|child| attach(child, children, reactions))
            .collect();
        CommentNode {
            reactions: reactions.get(&comment.comment.id).cloned().unwrap_or_default(),
            comment,
            replies,
        }
    }

    root.map(|r| attach(r, &mut children, reactions))
}

fn group_reactions(counts: Vec<ReactionCount>) -> HashMap<Uuid, Vec<ReactionCount>> {
    let mut grouped: HashMap<Uuid, Vec<ReactionCount>> = HashMap::new();
    for count in counts {
        grouped.entry(count.comment_id).or_default().push(count);
    }
    grouped
}

fn to_position(offset: usize) -> i32 {
    i32::try_from(offset).unwrap_or(i32::MAX)
}

pub struct CommentService {
    pool: PgPool,
}

impl CommentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        entity_type: CommentEntityType,
        entity_id: Uuid,
        limit: i64,
        offset: i64,
        include_replies: bool,
    ) -> Result<CommentListing, CommentError> {
        let (top_level, total) =
            EntityComment::list_top_level(&self.pool, entity_type, entity_id, limit, offset).await?;
        let top_ids: Vec<Uuid> = top_level.iter().map(|c| c.comment.id).collect();

        let replies = if include_replies {
            EntityComment::find_replies(&self.pool, &top_ids).await?
        } else {
            Vec::new()
        };

        let all_ids: Vec<Uuid> = top_ids
            .iter()
            .copied()
            .chain(replies.iter().map(|r| r.comment.id))
            .collect();
        let reactions = group_reactions(CommentReaction::summarize(&self.pool, &all_ids).await?);

        let mut replies_by_parent: HashMap<Uuid, Vec<CommentNode>> = HashMap::new();
        for reply in replies {
            if let Some(parent) = reply.comment.parent_id {
                replies_by_parent.entry(parent).or_default().push(CommentNode {
                    reactions: reactions.get(&reply.comment.id).cloned().unwrap_or_default(),
                    comment: reply,
                    replies: Vec::new(),
                });
            }
        }

        let comments = top_level
            .into_iter()
            .map(|comment| CommentNode {
                reactions: reactions.get(&comment.comment.id).cloned().unwrap_or_default(),
                replies: replies_by_parent.remove(&comment.comment.id).unwrap_or_default(),
                comment,
            })
            .collect();

        Ok(CommentListing {
            comments,
            pagination: OffsetPagination::new(total, limit, offset),
        })
    }

    pub async fn thread(&self, root_id: Uuid, max_depth: i32) -> Result<CommentNode, CommentError> {
        let depth = max_depth.clamp(0, MAX_THREAD_DEPTH);
        let rows = EntityComment::find_thread(&self.pool, root_id, depth).await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.comment.id).collect();
        let reactions = group_reactions(CommentReaction::summarize(&self.pool, &ids).await?);
        build_tree(rows, root_id, &reactions).ok_or(CommentError::NotFound)
    }

    pub async fn create(
        &self,
        author_id: Uuid,
        data: CreateComment,
    ) -> Result<CommentWithAuthor, CommentError> {
        let entity_type = required(data.entity_type, "entity_type")?;
        let entity_id = required(data.entity_id, "entity_id")?;
        let content = validate_content(data.content.as_deref())?;

        let parent = match data.parent_id {
            Some(parent_id) => {
                let parent = EntityComment::find_by_id(&self.pool, parent_id)
                    .await?
                    .ok_or(CommentError::ParentNotFound)?;
                if parent.entity_type != entity_type || parent.entity_id != entity_id {
                    return Err(ValidationError::new(
                        "parent_id",
                        "Parent comment belongs to a different entity",
                        "التعليق الأصلي يخص كياناً مختلفاً",
                    )
                    .into());
                }
                Some(parent)
            }
            None => None,
        };

        let mentions = markdown::extract_mentions(&content);
        let new_comment = NewComment {
            entity_type,
            entity_id,
            parent_id: parent.as_ref().map(|p| p.id),
            depth: parent.as_ref().map(|p| p.depth + 1).unwrap_or(0),
            author_id,
            content_html: markdown::render(&content),
            content,
            visibility: data.visibility.unwrap_or_default(),
        };

        // Count and insert under one lock so concurrent posts cannot all pass the check.
        let mut tx = self.pool.begin().await?;
        EntityComment::lock_for_posting(&mut *tx, &rate_limit_lock_key(author_id, entity_type, entity_id))
            .await?;
        let since = Utc::now() - Duration::seconds(RATE_LIMIT_WINDOW_SECS);
        let recent =
            EntityComment::count_recent_by_author(&mut *tx, author_id, entity_type, entity_id, since)
                .await?;
        if is_rate_limited(recent) {
            return Err(CommentError::RateLimited {
                retry_after_secs: RATE_LIMIT_WINDOW_SECS,
            });
        }
        let comment = EntityComment::create(&mut *tx, &new_comment).await?;
        let mentioned = self
            .store_mentions(&mut tx, &comment, author_id, &mentions)
            .await?;

        let reply_target = parent
            .as_ref()
            .map(|p| p.author_id)
            .filter(|id| *id != author_id && !mentioned.contains(id));
        if let Some(parent_author) = reply_target {
            Notification::create(
                &mut *tx,
                &NewNotification {
                    user_id: parent_author,
                    notification_type: "comment_reply",
                    title_en: "New reply to your comment".to_string(),
                    title_ar: "رد جديد على تعليقك".to_string(),
                    body_en: None,
                    body_ar: None,
                    entity_type: Some(entity_type.to_string()),
                    entity_id: Some(entity_id),
                },
            )
            .await?;
        }
        tx.commit().await?;

        info!(
            comment_id = %comment.id,
            entity_type = %entity_type,
            entity_id = %entity_id,
            mentions = mentioned.len(),
            "Comment created"
        );

        EntityComment::find_with_author(&self.pool, comment.id)
            .await?
            .ok_or(CommentError::NotFound)
    }

    /// Resolve mentions to users, store them and notify the newly mentioned.
    async fn store_mentions(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        comment: &EntityComment,
        author_id: Uuid,
        mentions: &[Mention],
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let usernames: Vec<String> = mentions.iter().map(|m| m.username.clone()).collect();
        let users = UserSummary::find_by_usernames(&self.pool, &usernames).await?;
        let by_name: HashMap<String, Uuid> = users
            .into_iter()
            .map(|u| (u.username.to_lowercase(), u.id))
            .collect();

        let resolved: Vec<(Uuid, String, i32, i32)> = mentions
            .iter()
            .filter_map(|m| {
                by_name.get(&m.username.to_lowercase()).map(|id| {
                    (*id, m.username.clone(), to_position(m.start), to_position(m.end))
                })
            })
            .collect();
        debug!(
            comment_id = %comment.id,
            found = mentions.len(),
            resolved = resolved.len(),
            "Resolved mentions"
        );

        let newly_mentioned =
            CommentMention::replace_for_comment(&mut **tx, comment.id, &resolved).await?;
        let mut notified = Vec::new();
        for user_id in newly_mentioned.into_iter().filter(|id| *id != author_id) {
            Notification::create(
                &mut **tx,
                &NewNotification {
                    user_id,
                    notification_type: "mention",
                    title_en: "You were mentioned in a comment".to_string(),
                    title_ar: "تمت الإشارة إليك في تعليق".to_string(),
                    body_en: None,
                    body_ar: None,
                    entity_type: Some(comment.entity_type.to_string()),
                    entity_id: Some(comment.entity_id),
                },
            )
            .await?;
            notified.push(user_id);
        }
        Ok(notified)
    }

    async fn owned_comment(
        &self,
        id: Uuid,
        user_id: Uuid,
        verb: &'static str,
    ) -> Result<EntityComment, CommentError> {
        let comment = EntityComment::find_by_id(&self.pool, id)
            .await?
            .ok_or(CommentError::NotFound)?;
        if comment.author_id != user_id {
            return Err(CommentError::NotAuthor(verb));
        }
        Ok(comment)
    }

    pub async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        data: UpdateComment,
    ) -> Result<CommentWithAuthor, CommentError> {
        let existing = self.owned_comment(id, user_id, "edit").await?;
        if data.content.is_none() && data.visibility.is_none() {
            return Err(ValidationError::required("content").into());
        }
        let content = data
            .content
            .as_deref()
            .map(|c| validate_content(Some(c)))
            .transpose()?;

        let mut tx = self.pool.begin().await?;
        let updated = match &content {
            Some(content) => {
                let html = markdown::render(content);
                let updated = EntityComment::update_content(
                    &mut *tx,
                    id,
                    Some(content),
                    Some(&html),
                    data.visibility,
                )
                .await?;
                let mentions = markdown::extract_mentions(content);
                self.store_mentions(&mut tx, &updated, user_id, &mentions)
                    .await?;
                updated
            }
            None => EntityComment::update_content(&mut *tx, id, None, None, data.visibility).await?,
        };
        tx.commit().await?;
        debug!(comment_id = %updated.id, was_edited = existing.is_edited, "Comment updated");

        EntityComment::find_with_author(&self.pool, id)
            .await?
            .ok_or(CommentError::NotFound)
    }

    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<(), CommentError> {
        self.owned_comment(id, user_id, "delete").await?;
        EntityComment::soft_delete(&self.pool, id).await?;
        info!(comment_id = %id, "Comment deleted");
        Ok(())
    }

    pub async fn toggle_reaction(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> Result<ReactionAction, CommentError> {
        if !is_allowed_reaction(emoji) {
            return Err(CommentError::InvalidReaction(emoji.to_string()));
        }
        let comment = EntityComment::find_by_id(&self.pool, comment_id)
            .await?
            .ok_or(CommentError::NotFound)?;

        let added = CommentReaction::toggle(&self.pool, comment_id, user_id, emoji).await?;
        if !added {
            return Ok(ReactionAction::Removed);
        }
        if comment.author_id != user_id {
            Notification::create(
                &self.pool,
                &NewNotification {
                    user_id: comment.author_id,
                    notification_type: "comment_reaction",
                    title_en: format!("Someone reacted {emoji} to your comment"),
                    title_ar: format!("تفاعل أحدهم بـ {emoji} مع تعليقك"),
                    body_en: None,
                    body_ar: None,
                    entity_type: Some(comment.entity_type.to_string()),
                    entity_id: Some(comment.entity_id),
                },
            )
            .await?;
        }
        Ok(ReactionAction::Added)
    }

    pub async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<UserSummary>, CommentError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(UserSummary::search(&self.pool, query, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: Uuid, parent_id: Option<Uuid>, depth: i32) -> CommentWithAuthor {
        let now = Utc::now();
        CommentWithAuthor {
            comment: EntityComment {
                id,
                entity_type: CommentEntityType::Dossier,
                entity_id: Uuid::nil(),
                parent_id,
                depth,
                author_id: Uuid::nil(),
                content: "text".into(),
                content_html: "text".into(),
                visibility: CommentVisibility::Public,
                is_edited: false,
                edited_at: None,
                is_deleted: false,
                deleted_at: None,
                created_at: now,
                updated_at: now,
            },
            author_username: Some("amal".into()),
            author_name: None,
            reply_count: 0,
        }
    }

    #[test]
    fn test_content_limits() {
        assert_eq!(validate_content(Some("  hello  ")).unwrap(), "hello");
        assert!(validate_content(Some("   ")).is_err());
        assert!(validate_content(None).is_err());
        let arabic = "ب".repeat(MAX_CONTENT_CHARS);
        assert!(validate_content(Some(&arabic)).is_ok());
        let too_long = "a".repeat(MAX_CONTENT_CHARS + 1);
        assert_eq!(validate_content(Some(&too_long)).unwrap_err().field, "content");
    }

    #[test]
    fn test_rate_limit_boundary() {
        assert!(!is_rate_limited(9));
        assert!(is_rate_limited(10));
    }

    #[test]
    fn test_rate_limit_lock_key_scopes_author_and_entity() {
        let author = Uuid::new_v4();
        let entity = Uuid::new_v4();
        let key = rate_limit_lock_key(author, CommentEntityType::Dossier, entity);
        assert_eq!(key, rate_limit_lock_key(author, CommentEntityType::Dossier, entity));
        assert_eq!(key, format!("entity-comment-rate:{author}:dossier:{entity}"));
        assert_ne!(key, rate_limit_lock_key(author, CommentEntityType::Mou, entity));
        assert_ne!(key, rate_limit_lock_key(Uuid::new_v4(), CommentEntityType::Dossier, entity));
        assert_ne!(key, rate_limit_lock_key(author, CommentEntityType::Dossier, Uuid::new_v4()));
    }

    #[test]
    fn test_reaction_allow_list() {
        assert!(is_allowed_reaction("🚀"));
        assert!(is_allowed_reaction("❤️"));
        assert!(!is_allowed_reaction("🍕"));
        assert_eq!(ReactionAction::Removed.to_string(), "removed");
    }

    #[test]
    fn test_build_tree_nests_replies() {
        let root = Uuid::new_v4();
        let child = Uuid::new_v4();
        let grandchild = Uuid::new_v4();
        let rows = vec![
            row(root, None, 0),
            row(child, Some(root), 1),
            row(grandchild, Some(child), 2),
        ];
        let mut reactions = HashMap::new();
        reactions.insert(
            child,
            vec![ReactionCount {
                comment_id: child,
                emoji: "👍".into(),
                count: 2,
                user_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            }],
        );

        let tree = build_tree(rows, root, &reactions).unwrap();
        assert_eq!(tree.replies.len(), 1);
        assert_eq!(tree.replies[0].reactions[0].count, 2);
        assert_eq!(tree.replies[0].replies[0].comment.comment.id, grandchild);
    }

    #[test]
    fn test_build_tree_without_root() {
        let rows = vec![row(Uuid::new_v4(), Some(Uuid::new_v4()), 1)];
        assert!(build_tree(rows, Uuid::new_v4(), &HashMap::new()).is_none());
    }
}
