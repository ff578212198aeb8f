use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres, Type};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, EnumIter,
)]
#[sqlx(type_name = "comment_entity_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommentEntityType {
    Dossier,
    Country,
    Organization,
    Forum,
    Mou,
    Event,
    Position,
    IntakeTicket,
    Engagement,
    WorkingGroup,
    Document,
    Brief,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "comment_visibility", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CommentVisibility {
    #[default]
    Public,
    Internal,
    Team,
    Private,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct EntityComment {
    pub id: Uuid,
    pub entity_type: CommentEntityType,
    pub entity_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub depth: i32,
    pub author_id: Uuid,
    pub content: String,
    pub content_html: String,
    pub visibility: CommentVisibility,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment joined with its author's profile and reply count.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    #[sqlx(flatten)]
    #[ts(flatten)]
    pub comment: EntityComment,
    pub author_username: Option<String>,
    pub author_name: Option<String>,
    pub reply_count: i64,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub entity_type: CommentEntityType,
    pub entity_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub depth: i32,
    pub author_id: Uuid,
    pub content: String,
    pub content_html: String,
    pub visibility: CommentVisibility,
}

const COMMENT_COLUMNS: &str = "c.id, c.entity_type, c.entity_id, c.parent_id, c.depth, c.author_id, \
    c.content, c.content_html, c.visibility, c.is_edited, c.edited_at, c.is_deleted, c.deleted_at, \
    c.created_at, c.updated_at";

const AUTHOR_JOIN: &str = "u.username AS author_username, u.full_name AS author_name, \
    (SELECT COUNT(*) FROM entity_comments r WHERE r.parent_id = c.id AND NOT r.is_deleted) AS reply_count";

impl EntityComment {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, EntityComment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM entity_comments c WHERE c.id = $1 AND NOT c.is_deleted"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_with_author(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<CommentWithAuthor>, sqlx::Error> {
        sqlx::query_as::<_, CommentWithAuthor>(&format!(
            "SELECT {COMMENT_COLUMNS}, {AUTHOR_JOIN}
             FROM entity_comments c
             LEFT JOIN users u ON u.id = c.author_id
             WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Comments `author_id` left on one entity since `since`, deleted ones included.
    /// Transaction-scoped advisory lock on `key`; released at commit or rollback.
    pub async fn lock_for_posting<'e, E>(executor: E, key: &str) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn count_recent_by_author<'e, E>(
        executor: E,
        author_id: Uuid,
        entity_type: CommentEntityType,
        entity_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM entity_comments
               WHERE author_id = $1 AND entity_type = $2 AND entity_id = $3 AND created_at >= $4"#,
        )
        .bind(author_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(since)
        .fetch_one(executor)
        .await
    }

    pub async fn create<'e, E>(executor: E, data: &NewComment) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, EntityComment>(&format!(
            "INSERT INTO entity_comments AS c (id, entity_type, entity_id, parent_id, depth, author_id,
                 content, content_html, visibility)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(data.entity_type)
        .bind(data.entity_id)
        .bind(data.parent_id)
        .bind(data.depth)
        .bind(data.author_id)
        .bind(&data.content)
        .bind(&data.content_html)
        .bind(data.visibility)
        .fetch_one(executor)
        .await
    }

    /// Top-level comments on an entity, newest first, plus the total count.
    pub async fn list_top_level(
        pool: &PgPool,
        entity_type: CommentEntityType,
        entity_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CommentWithAuthor>, i64), sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM entity_comments
               WHERE entity_type = $1 AND entity_id = $2 AND parent_id IS NULL AND NOT is_deleted"#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(pool)
        .await?;

        let rows = sqlx::query_as::<_, CommentWithAuthor>(&format!(
            "SELECT {COMMENT_COLUMNS}, {AUTHOR_JOIN}
             FROM entity_comments c
             LEFT JOIN users u ON u.id = c.author_id
             WHERE c.entity_type = $1 AND c.entity_id = $2 AND c.parent_id IS NULL AND NOT c.is_deleted
             ORDER BY c.created_at DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(entity_type)
        .bind(entity_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok((rows, total))
    }

    /// Direct replies to any of `parent_ids`, oldest first.
    pub async fn find_replies(
        pool: &PgPool,
        parent_ids: &[Uuid],
    ) -> Result<Vec<CommentWithAuthor>, sqlx::Error> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, CommentWithAuthor>(&format!(
            "SELECT {COMMENT_COLUMNS}, {AUTHOR_JOIN}
             FROM entity_comments c
             LEFT JOIN users u ON u.id = c.author_id
             WHERE c.parent_id = ANY($1) AND NOT c.is_deleted
             ORDER BY c.created_at ASC"
        ))
        .bind(parent_ids)
        .fetch_all(pool)
        .await
    }

    /// The comment and its descendants down to `max_depth` levels below it.
    pub async fn find_thread(
        pool: &PgPool,
        root_id: Uuid,
        max_depth: i32,
    ) -> Result<Vec<CommentWithAuthor>, sqlx::Error> {
        sqlx::query_as::<_, CommentWithAuthor>(&format!(
            "WITH RECURSIVE thread AS (
                 SELECT id, 0 AS level FROM entity_comments WHERE id = $1
                 UNION ALL
                 SELECT e.id, t.level + 1
                 FROM entity_comments e JOIN thread t ON e.parent_id = t.id
                 WHERE t.level < $2 AND NOT e.is_deleted
             )
             SELECT {COMMENT_COLUMNS}, {AUTHOR_JOIN}
             FROM thread t
             JOIN entity_comments c ON c.id = t.id
             LEFT JOIN users u ON u.id = c.author_id
             ORDER BY t.level ASC, c.created_at ASC"
        ))
        .bind(root_id)
        .bind(max_depth)
        .fetch_all(pool)
        .await
    }

    pub async fn update_content<'e, E>(
        executor: E,
        id: Uuid,
        content: Option<&str>,
        content_html: Option<&str>,
        visibility: Option<CommentVisibility>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, EntityComment>(&format!(
            "UPDATE entity_comments AS c SET
                content = COALESCE($2, c.content),
                content_html = COALESCE($3, c.content_html),
                visibility = COALESCE($4, c.visibility),
                is_edited = c.is_edited OR $2 IS NOT NULL,
                edited_at = CASE WHEN $2 IS NOT NULL THEN now() ELSE c.edited_at END,
                updated_at = now()
             WHERE c.id = $1
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(content)
        .bind(content_html)
        .bind(visibility)
        .fetch_one(executor)
        .await
    }

    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE entity_comments SET is_deleted = true, deleted_at = now(), updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CommentMention {
    pub id: Uuid,
    pub comment_id: Uuid,
    pub mentioned_user_id: Uuid,
    pub username: String,
    pub start_position: i32,
    pub end_position: i32,
    pub created_at: DateTime<Utc>,
}

impl CommentMention {
    /// Replace the stored mentions of a comment, returning the users newly mentioned.
    pub async fn replace_for_comment<'e, E>(
        executor: E,
        comment_id: Uuid,
        mentions: &[(Uuid, String, i32, i32)],
    ) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user_ids: Vec<Uuid> = mentions.iter().map(|m| m.0).collect();
        let usernames: Vec<String> = mentions.iter().map(|m| m.1.clone()).collect();
        let starts: Vec<i32> = mentions.iter().map(|m| m.2).collect();
        let ends: Vec<i32> = mentions.iter().map(|m| m.3).collect();

        sqlx::query_scalar::<_, Uuid>(
            r#"WITH removed AS (
                   DELETE FROM comment_mentions
                   WHERE comment_id = $1 AND NOT (mentioned_user_id = ANY($2))
               ),
               inserted AS (
                   INSERT INTO comment_mentions (id, comment_id, mentioned_user_id, username, start_position, end_position)
                   SELECT gen_random_uuid(), $1, m.user_id, m.username, m.start_pos, m.end_pos
                   FROM UNNEST($2::uuid[], $3::text[], $4::int4[], $5::int4[])
                        AS m(user_id, username, start_pos, end_pos)
                   ON CONFLICT (comment_id, mentioned_user_id) DO NOTHING
                   RETURNING mentioned_user_id
               )
               SELECT mentioned_user_id FROM inserted"#,
        )
        .bind(comment_id)
        .bind(&user_ids)
        .bind(&usernames)
        .bind(&starts)
        .bind(&ends)
        .fetch_all(executor)
        .await
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ReactionCount {
    pub comment_id: Uuid,
    pub emoji: String,
    pub count: i64,
    pub user_ids: Vec<Uuid>,
}

pub struct CommentReaction;

impl CommentReaction {
    /// Remove the reaction if present, otherwise add it. Returns true when added.
    pub async fn toggle(
        pool: &PgPool,
        comment_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> Result<bool, sqlx::Error> {
        let removed = sqlx::query(
            "DELETE FROM comment_reactions WHERE comment_id = $1 AND user_id = $2 AND emoji = $3",
        )
        .bind(comment_id)
        .bind(user_id)
        .bind(emoji)
        .execute(pool)
        .await?
        .rows_affected();

        if removed > 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"INSERT INTO comment_reactions (id, comment_id, user_id, emoji)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (comment_id, user_id, emoji) DO NOTHING"#,
        )
        .bind(Uuid::new_v4())
        .bind(comment_id)
        .bind(user_id)
        .bind(emoji)
        .execute(pool)
        .await?;
        Ok(true)
    }

    pub async fn summarize(
        pool: &PgPool,
        comment_ids: &[Uuid],
    ) -> Result<Vec<ReactionCount>, sqlx::Error> {
        if comment_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, ReactionCount>(
            r#"SELECT comment_id, emoji, COUNT(*) AS count, array_agg(user_id) AS user_ids
               FROM comment_reactions
               WHERE comment_id = ANY($1)
               GROUP BY comment_id, emoji
               ORDER BY MIN(created_at)"#,
        )
        .bind(comment_ids)
        .fetch_all(pool)
        .await
    }
}
