use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Type};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::priority::Priority;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, EnumIter,
)]
#[sqlx(type_name = "work_item_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WorkItemType {
    Dossier,
    Ticket,
    Position,
    Task,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "assignment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Assignment {
    pub id: Uuid,
    pub work_item_id: Uuid,
    pub work_item_type: WorkItemType,
    pub assignee_id: Option<Uuid>,
    pub status: AssignmentStatus,
    pub priority: Priority,
    pub assigned_at: DateTime<Utc>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub const ASSIGNMENT_COLUMNS: &str = "id, work_item_id, work_item_type, assignee_id, status, priority, \
    assigned_at, sla_deadline, created_at";

/// Title and status of the thing an assignment points at.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct WorkItemSummary {
    pub id: Uuid,
    pub title: String,
    pub title_ar: Option<String>,
    pub status: String,
}

impl WorkItemSummary {
    pub async fn find_batch(
        pool: &PgPool,
        item_type: WorkItemType,
        ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = match item_type {
            WorkItemType::Task => {
                "SELECT id, title, NULL::text AS title_ar, status FROM tasks WHERE id = ANY($1)"
            }
            WorkItemType::Dossier => {
                "SELECT id, name_en AS title, name_ar AS title_ar, status::text AS status \
                 FROM dossiers WHERE id = ANY($1)"
            }
            WorkItemType::Position => {
                "SELECT id, title_en AS title, title_ar, status FROM positions WHERE id = ANY($1)"
            }
            WorkItemType::Ticket => {
                "SELECT id, ticket_number || ' ' || title AS title, NULL::text AS title_ar, status \
                 FROM intake_tickets WHERE id = ANY($1)"
            }
        };
        sqlx::query_as::<_, WorkItemSummary>(sql)
            .bind(ids)
            .fetch_all(pool)
            .await
    }
}
