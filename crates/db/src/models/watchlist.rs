use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Executor, FromRow, PgPool, Postgres, QueryBuilder, Type};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::priority::Priority;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, EnumIter,
)]
#[sqlx(type_name = "watchable_entity_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WatchableEntityType {
    Person,
    Engagement,
    Commitment,
    Dossier,
    Organization,
    Forum,
    Position,
    Mou,
    WorkingGroup,
}

impl WatchableEntityType {
    /// Table holding the display name of this entity type, and its `(en, ar)` name columns.
    pub fn name_source(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Commitment => ("commitments", "title_en", "title_ar"),
            Self::Position => ("positions", "title_en", "title_ar"),
            Self::Mou => ("mous", "title_en", "title_ar"),
            _ => ("dossiers", "name_en", "name_ar"),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct WatchlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entity_type: WatchableEntityType,
    pub entity_id: Uuid,
    pub priority: Priority,
    pub notes: Option<String>,
    pub notify_on_modification: bool,
    pub notify_on_relationship_change: bool,
    pub notify_on_deadline: bool,
    pub deadline_reminder_days: Vec<i32>,
    pub is_active: bool,
    pub source_template_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const WATCH_COLUMNS: &str = "id, user_id, entity_type, entity_id, priority, notes, notify_on_modification, \
    notify_on_relationship_change, notify_on_deadline, deadline_reminder_days, is_active, \
    source_template_id, created_at, updated_at";

#[derive(Debug, Clone, Deserialize, TS)]
pub struct NewWatch {
    pub entity_type: WatchableEntityType,
    pub entity_id: Uuid,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub notify_on_modification: Option<bool>,
    #[serde(default)]
    pub notify_on_relationship_change: Option<bool>,
    #[serde(default)]
    pub notify_on_deadline: Option<bool>,
    #[serde(default)]
    pub deadline_reminder_days: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateWatch {
    pub priority: Option<Priority>,
    pub notes: Option<String>,
    pub notify_on_modification: Option<bool>,
    pub notify_on_relationship_change: Option<bool>,
    pub notify_on_deadline: Option<bool>,
    pub deadline_reminder_days: Option<Vec<i32>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct WatchFilter {
    pub entity_type: Option<WatchableEntityType>,
    pub priority: Option<Priority>,
    pub active_only: bool,
    pub before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct WatchSummaryRow {
    pub entity_type: WatchableEntityType,
    pub priority: Priority,
    pub count: i64,
}

impl WatchlistItem {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, WatchlistItem>(&format!(
            "SELECT {WATCH_COLUMNS} FROM user_watchlist WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_for_entity(
        pool: &PgPool,
        user_id: Uuid,
        entity_type: WatchableEntityType,
        entity_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, WatchlistItem>(&format!(
            "SELECT {WATCH_COLUMNS} FROM user_watchlist
             WHERE user_id = $1 AND entity_type = $2 AND entity_id = $3"
        ))
        .bind(user_id)
        .bind(entity_type)
        .bind(entity_id)
        .fetch_optional(pool)
        .await
    }

    /// Newest first, `limit` rows after the `before` cursor, plus the total matching the filter.
    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        filter: &WatchFilter,
        limit: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        fn push_filters(query: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, filter: &WatchFilter) {
            query.push(" WHERE user_id = ").push_bind(user_id);
            if let Some(entity_type) = filter.entity_type {
                query.push(" AND entity_type = ").push_bind(entity_type);
            }
            if let Some(priority) = filter.priority {
                query.push(" AND priority = ").push_bind(priority);
            }
            if filter.active_only {
                query.push(" AND is_active");
            }
        }

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM user_watchlist");
        push_filters(&mut count, user_id, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {WATCH_COLUMNS} FROM user_watchlist"));
        push_filters(&mut query, user_id, filter);
        if let Some(before) = filter.before {
            query.push(" AND created_at < ").push_bind(before);
        }
        query.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);

        let rows = query.build_query_as::<WatchlistItem>().fetch_all(pool).await?;
        Ok((rows, total))
    }

    pub async fn summary(pool: &PgPool, user_id: Uuid) -> Result<Vec<WatchSummaryRow>, sqlx::Error> {
        sqlx::query_as::<_, WatchSummaryRow>(
            r#"SELECT entity_type, priority, COUNT(*) AS count
               FROM user_watchlist
               WHERE user_id = $1
               GROUP BY entity_type, priority
               ORDER BY entity_type, priority DESC"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// `(total, active)` watch counts for a user.
    pub async fn totals(pool: &PgPool, user_id: Uuid) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as::<_, (i64, i64)>(
            r#"SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active)
               FROM user_watchlist WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Insert a watch; `None` when the user already watches the entity.
    pub async fn create<'e, E>(
        executor: E,
        user_id: Uuid,
        data: &NewWatch,
        source_template_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, WatchlistItem>(&format!(
            "INSERT INTO user_watchlist (id, user_id, entity_type, entity_id, priority, notes,
                 notify_on_modification, notify_on_relationship_change, notify_on_deadline,
                 deadline_reminder_days, source_template_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, COALESCE($10, '{{7,3,1}}'::integer[]), $11)
             ON CONFLICT (user_id, entity_type, entity_id) DO NOTHING
             RETURNING {WATCH_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(data.entity_type)
        .bind(data.entity_id)
        .bind(data.priority.unwrap_or_default())
        .bind(&data.notes)
        .bind(data.notify_on_modification.unwrap_or(true))
        .bind(data.notify_on_relationship_change.unwrap_or(true))
        .bind(data.notify_on_deadline.unwrap_or(true))
        .bind(&data.deadline_reminder_days)
        .bind(source_template_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        data: &UpdateWatch,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, WatchlistItem>(&format!(
            "UPDATE user_watchlist AS w SET
                priority = COALESCE($3, w.priority),
                notes = COALESCE($4, w.notes),
                notify_on_modification = COALESCE($5, w.notify_on_modification),
                notify_on_relationship_change = COALESCE($6, w.notify_on_relationship_change),
                notify_on_deadline = COALESCE($7, w.notify_on_deadline),
                deadline_reminder_days = COALESCE($8, w.deadline_reminder_days),
                is_active = COALESCE($9, w.is_active),
                updated_at = now()
             WHERE w.id = $1 AND w.user_id = $2
             RETURNING {WATCH_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(data.priority)
        .bind(&data.notes)
        .bind(data.notify_on_modification)
        .bind(data.notify_on_relationship_change)
        .bind(data.notify_on_deadline)
        .bind(&data.deadline_reminder_days)
        .bind(data.is_active)
        .fetch_optional(pool)
        .await
    }

    /// Flip `is_active`, returning the new value.
    pub async fn toggle_active(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<bool>, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            r#"UPDATE user_watchlist SET is_active = NOT is_active, updated_at = now()
               WHERE id = $1 AND user_id = $2
               RETURNING is_active"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_watchlist WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_entity(
        pool: &PgPool,
        user_id: Uuid,
        entity_type: WatchableEntityType,
        entity_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM user_watchlist WHERE user_id = $1 AND entity_type = $2 AND entity_id = $3",
        )
        .bind(user_id)
        .bind(entity_type)
        .bind(entity_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_many(pool: &PgPool, ids: &[Uuid], user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_watchlist WHERE id = ANY($1) AND user_id = $2")
            .bind(ids)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// `(entity_id, name_en, name_ar)` for watched entities of one type.
    pub async fn entity_names(
        pool: &PgPool,
        entity_type: WatchableEntityType,
        ids: &[Uuid],
    ) -> Result<Vec<(Uuid, String, String)>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let (table, en, ar) = entity_type.name_source();
        sqlx::query_as::<_, (Uuid, String, String)>(&format!(
            "SELECT id, {en}, {ar} FROM {table} WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(pool)
        .await
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct WatchlistEvent {
    pub id: Uuid,
    pub watch_id: Uuid,
    pub event_type: String,
    pub title_en: String,
    pub title_ar: String,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub metadata: Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl WatchlistEvent {
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        watch_id: Option<Uuid>,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, WatchlistEvent>(
            r#"SELECT e.id, e.watch_id, e.event_type, e.title_en, e.title_ar, e.description_en,
                      e.description_ar, e.metadata, e.is_read, e.created_at
               FROM watchlist_events e
               JOIN user_watchlist w ON w.id = e.watch_id
               WHERE w.user_id = $1
                 AND ($2::uuid IS NULL OR e.watch_id = $2)
                 AND ($3::timestamptz IS NULL OR e.created_at < $3)
               ORDER BY e.created_at DESC
               LIMIT $4"#,
        )
        .bind(user_id)
        .bind(watch_id)
        .bind(before)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct WatchlistTemplate {
    pub id: Uuid,
    pub name_en: String,
    pub name_ar: String,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub applicable_roles: Vec<String>,
    pub default_priority: Priority,
    pub is_system_template: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
    pub is_applied: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct TemplateItem {
    pub entity_type: WatchableEntityType,
    pub entity_id: Uuid,
}

const TEMPLATE_SELECT: &str = "SELECT t.id, t.name_en, t.name_ar, t.description_en, t.description_ar,
        t.applicable_roles, t.default_priority, t.is_system_template, t.created_by, t.created_at,
        (SELECT COUNT(*) FROM watchlist_template_items i WHERE i.template_id = t.id) AS item_count,
        EXISTS (SELECT 1 FROM user_watchlist_templates a
                WHERE a.template_id = t.id AND a.user_id = $1) AS is_applied
     FROM watchlist_templates t";

impl WatchlistTemplate {
    /// Templates open to `role` (or with no role restriction) plus those the user authored.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        role: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, WatchlistTemplate>(&format!(
            "{TEMPLATE_SELECT}
             WHERE cardinality(t.applicable_roles) = 0
                OR $2 = ANY(t.applicable_roles)
                OR t.created_by = $1
             ORDER BY t.is_system_template DESC, t.name_en"
        ))
        .bind(user_id)
        .bind(role)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, WatchlistTemplate>(&format!("{TEMPLATE_SELECT} WHERE t.id = $2"))
            .bind(user_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn items<'e, E>(executor: E, template_id: Uuid) -> Result<Vec<TemplateItem>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, TemplateItem>(
            "SELECT entity_type, entity_id FROM watchlist_template_items WHERE template_id = $1",
        )
        .bind(template_id)
        .fetch_all(executor)
        .await
    }

    pub async fn record_applied<'e, E>(
        executor: E,
        template_id: Uuid,
        user_id: Uuid,
        auto_sync: bool,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"INSERT INTO user_watchlist_templates (user_id, template_id, auto_sync)
               VALUES ($1, $2, $3)
               ON CONFLICT (user_id, template_id)
               DO UPDATE SET auto_sync = EXCLUDED.auto_sync, applied_at = now()"#,
        )
        .bind(user_id)
        .bind(template_id)
        .bind(auto_sync)
        .execute(executor)
        .await?;
        Ok(())
    }
}
