//! Per-user watchlists over dossiers, commitments, positions and MoUs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use db::models::{
    watchlist::{
        NewWatch, UpdateWatch, WatchFilter, WatchSummaryRow, WatchableEntityType, WatchlistEvent,
        WatchlistItem, WatchlistTemplate,
    },
};
use futures::future::try_join_all;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::validation::ValidationError;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;
pub const DEFAULT_EVENTS_LIMIT: i64 = 20;
pub const MAX_EVENTS_LIMIT: i64 = 50;
pub const MAX_BULK_ITEMS: usize = 100;

#[derive(Debug, Error)]
pub enum WatchlistError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("watch not found")]
    NotFound,
    #[error("entity is already on the watchlist")]
    AlreadyWatched,
    #[error("template not found")]
    TemplateNotFound,
}

/// Reminder offsets must be positive day counts within a year.
pub fn validate_reminder_days(days: Option<&[i32]>) -> Result<(), ValidationError> {
    match days {
        Some(days) if days.iter().any(|d| !(1..=365).contains(d)) => Err(ValidationError::new(
            "deadline_reminder_days",
            "Reminder days must be between 1 and 365",
            "يجب أن تكون أيام التذكير بين 1 و 365",
        )),
        _ => Ok(()),
    }
}

fn validate_batch_size(len: usize, field: &str) -> Result<(), ValidationError> {
    if len == 0 {
        return Err(ValidationError::required(field));
    }
    if len > MAX_BULK_ITEMS {
        return Err(ValidationError::new(
            field,
            format!("At most {MAX_BULK_ITEMS} entries per request"),
            format!("الحد الأقصى {MAX_BULK_ITEMS} عنصر لكل طلب"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct WatchEntry {
    #[serde(flatten)]
    #[ts(flatten)]
    pub watch: WatchlistItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub entity_name_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub entity_name_ar: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct WatchlistPage {
    pub watchlist: Vec<WatchEntry>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<DateTime<Utc>>,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, Serialize, TS)]
pub struct WatchTotals {
    pub total: i64,
    pub active: i64,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct WatchSummary {
    pub summary: Vec<WatchSummaryRow>,
    pub totals: WatchTotals,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct WatchCheck {
    pub is_watched: bool,
    pub watch: Option<WatchlistItem>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct WatchEventsPage {
    pub events: Vec<WatchlistEvent>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<DateTime<Utc>>,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

/// Split a `limit + 1` fetch into the page and whether another page exists.
fn split_page<T>(mut rows: Vec<T>, limit: i64) -> (Vec<T>, bool) {
    let limit = usize::try_from(limit).unwrap_or(0);
    let has_more = rows.len() > limit;
    rows.truncate(limit);
    (rows, has_more)
}

pub struct WatchlistService {
    pool: PgPool,
}

impl WatchlistService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        filter: &WatchFilter,
        limit: i64,
        include_details: bool,
    ) -> Result<WatchlistPage, WatchlistError> {
        let (rows, total) = WatchlistItem::list(&self.pool, user_id, filter, limit + 1).await?;
        let (rows, has_more) = split_page(rows, limit);
        let next_cursor = if has_more {
            rows.last().map(|w| w.created_at)
        } else {
            None
        };

        let names = if include_details {
            self.entity_names(&rows).await?
        } else {
            HashMap::new()
        };
        let watchlist = rows
            .into_iter()
            .map(|watch| {
                let (en, ar) = names
                    .get(&(watch.entity_type, watch.entity_id))
                    .cloned()
                    .unzip();
                WatchEntry {
                    watch,
                    entity_name_en: en,
                    entity_name_ar: ar,
                }
            })
            .collect();

        Ok(WatchlistPage {
            watchlist,
            next_cursor,
            has_more,
            total,
        })
    }

    async fn entity_names(
        &self,
        rows: &[WatchlistItem],
    ) -> Result<HashMap<(WatchableEntityType, Uuid), (String, String)>, sqlx::Error> {
        let mut by_type: HashMap<WatchableEntityType, Vec<Uuid>> = HashMap::new();
        for row in rows {
            by_type.entry(row.entity_type).or_default().push(row.entity_id);
        }
        let batches = try_join_all(by_type.iter().map(|(kind, ids)| async move {
            WatchlistItem::entity_names(&self.pool, *kind, ids)
                .await
                .map(|names| (*kind, names))
        }))
        .await?;

        Ok(batches
            .into_iter()
            .flat_map(|(kind, names)| {
                names
                    .into_iter()
                    .map(move |(id, en, ar)| ((kind, id), (en, ar)))
            })
            .collect())
    }

    pub async fn summary(&self, user_id: Uuid) -> Result<WatchSummary, WatchlistError> {
        let (summary, (total, active)) = futures::try_join!(
            WatchlistItem::summary(&self.pool, user_id),
            WatchlistItem::totals(&self.pool, user_id),
        )?;
        Ok(WatchSummary {
            summary,
            totals: WatchTotals { total, active },
        })
    }

    pub async fn templates(
        &self,
        user_id: Uuid,
        role: &str,
    ) -> Result<Vec<WatchlistTemplate>, WatchlistError> {
        Ok(WatchlistTemplate::list_for_user(&self.pool, user_id, role).await?)
    }

    pub async fn check(
        &self,
        user_id: Uuid,
        entity_type: WatchableEntityType,
        entity_id: Uuid,
    ) -> Result<WatchCheck, WatchlistError> {
        let watch = WatchlistItem::find_for_entity(&self.pool, user_id, entity_type, entity_id).await?;
        Ok(WatchCheck {
            is_watched: watch.is_some(),
            watch,
        })
    }

    pub async fn events(
        &self,
        user_id: Uuid,
        watch_id: Option<Uuid>,
        cursor: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<WatchEventsPage, WatchlistError> {
        if let Some(watch_id) = watch_id {
            let watch = WatchlistItem::find_by_id(&self.pool, watch_id)
                .await?
                .filter(|w| w.user_id == user_id);
            if watch.is_none() {
                return Err(WatchlistError::NotFound);
            }
        }
        let rows =
            WatchlistEvent::list_for_user(&self.pool, user_id, watch_id, cursor, limit + 1).await?;
        let (events, has_more) = split_page(rows, limit);
        let next_cursor = if has_more {
            events.last().map(|e| e.created_at)
        } else {
            None
        };
        Ok(WatchEventsPage {
            events,
            next_cursor,
            has_more,
        })
    }

    pub async fn add(&self, user_id: Uuid, data: &NewWatch) -> Result<Uuid, WatchlistError> {
        validate_reminder_days(data.deadline_reminder_days.as_deref())?;
        let watch = WatchlistItem::create(&self.pool, user_id, data, None)
            .await?
            .ok_or(WatchlistError::AlreadyWatched)?;
        info!(
            watch_id = %watch.id,
            entity_type = %watch.entity_type,
            entity_id = %watch.entity_id,
            "Entity added to watchlist"
        );
        Ok(watch.id)
    }

    /// Add several entities at once; entities already watched are skipped.
    pub async fn bulk_add(&self, user_id: Uuid, items: &[NewWatch]) -> Result<usize, WatchlistError> {
        validate_batch_size(items.len(), "items")?;
        for item in items {
            validate_reminder_days(item.deadline_reminder_days.as_deref())?;
        }

        let mut tx = self.pool.begin().await?;
        let mut added = 0;
        for item in items {
            if WatchlistItem::create(&mut *tx, user_id, item, None)
                .await?
                .is_some()
            {
                added += 1;
            }
        }
        tx.commit().await?;
        info!(user_id = %user_id, requested = items.len(), added, "Bulk watchlist add");
        Ok(added)
    }

    pub async fn bulk_remove(&self, user_id: Uuid, watch_ids: &[Uuid]) -> Result<u64, WatchlistError> {
        validate_batch_size(watch_ids.len(), "watch_ids")?;
        Ok(WatchlistItem::delete_many(&self.pool, watch_ids, user_id).await?)
    }

    pub async fn apply_template(
        &self,
        user_id: Uuid,
        template_id: Uuid,
        auto_sync: bool,
    ) -> Result<usize, WatchlistError> {
        let template = WatchlistTemplate::find_by_id(&self.pool, template_id, user_id)
            .await?
            .ok_or(WatchlistError::TemplateNotFound)?;

        let mut tx = self.pool.begin().await?;
        let items = WatchlistTemplate::items(&mut *tx, template.id).await?;
        let mut added = 0;
        for item in &items {
            let watch = NewWatch {
                entity_type: item.entity_type,
                entity_id: item.entity_id,
                priority: Some(template.default_priority),
                notes: None,
                notify_on_modification: None,
                notify_on_relationship_change: None,
                notify_on_deadline: None,
                deadline_reminder_days: None,
            };
            if WatchlistItem::create(&mut *tx, user_id, &watch, Some(template.id))
                .await?
                .is_some()
            {
                added += 1;
            }
        }
        WatchlistTemplate::record_applied(&mut *tx, template.id, user_id, auto_sync).await?;
        tx.commit().await?;

        info!(
            template_id = %template.id,
            user_id = %user_id,
            template_items = items.len(),
            added,
            "Watchlist template applied"
        );
        Ok(added)
    }

    pub async fn toggle_active(&self, user_id: Uuid, watch_id: Uuid) -> Result<bool, WatchlistError> {
        WatchlistItem::toggle_active(&self.pool, watch_id, user_id)
            .await?
            .ok_or(WatchlistError::NotFound)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        watch_id: Uuid,
        data: &UpdateWatch,
    ) -> Result<WatchlistItem, WatchlistError> {
        validate_reminder_days(data.deadline_reminder_days.as_deref())?;
        WatchlistItem::update(&self.pool, watch_id, user_id, data)
            .await?
            .ok_or(WatchlistError::NotFound)
    }

    pub async fn remove(&self, user_id: Uuid, watch_id: Uuid) -> Result<(), WatchlistError> {
        match WatchlistItem::delete(&self.pool, watch_id, user_id).await? {
            0 => Err(WatchlistError::NotFound),
            _ => Ok(()),
        }
    }

    pub async fn remove_entity(
        &self,
        user_id: Uuid,
        entity_type: WatchableEntityType,
        entity_id: Uuid,
    ) -> Result<(), WatchlistError> {
        match WatchlistItem::delete_by_entity(&self.pool, user_id, entity_type, entity_id).await? {
            0 => Err(WatchlistError::NotFound),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reminder_days_range() {
        assert!(validate_reminder_days(None).is_ok());
        assert!(validate_reminder_days(Some(&[7, 3, 1])).is_ok());
        assert_eq!(
            validate_reminder_days(Some(&[0])).unwrap_err().field,
            "deadline_reminder_days"
        );
        assert!(validate_reminder_days(Some(&[400])).is_err());
    }

    #[test]
    fn test_batch_size_bounds() {
        assert!(validate_batch_size(0, "items").is_err());
        assert!(validate_batch_size(1, "items").is_ok());
        assert!(validate_batch_size(MAX_BULK_ITEMS + 1, "watch_ids").is_err());
    }

    #[test]
    fn test_split_page() {
        let (rows, more) = split_page(vec![1, 2, 3], 2);
        assert_eq!(rows, vec![1, 2]);
        assert!(more);
        let (rows, more) = split_page(vec![1, 2], 2);
        assert_eq!(rows.len(), 2);
        assert!(!more);
    }
}
