//! Assignments still waiting for action, with aging buckets and per-user
//! saved filters.

use std::{collections::HashMap, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use db::models::{
    assignment::{ASSIGNMENT_COLUMNS, Assignment, AssignmentStatus, WorkItemSummary, WorkItemType},
    priority::Priority,
    user::UserSummary,
    user_preference::UserPreference,
};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::debug;
use ts_rs::TS;
use utils::{query::QueryParams, response::total_pages};
use uuid::Uuid;

use super::validation::{ValidationError, page_offset};

pub const PREFERENCES_KEY: &str = "waiting_queue_filters";
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Error)]
pub enum WaitingQueueError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display)]
pub enum AgingBucket {
    #[serde(rename = "0-2")]
    #[strum(serialize = "0-2")]
    ZeroToTwo,
    #[serde(rename = "3-6")]
    #[strum(serialize = "3-6")]
    ThreeToSix,
    #[serde(rename = "7+", alias = "7")]
    #[strum(to_string = "7+", serialize = "7")]
    SevenPlus,
}

impl AgingBucket {
    /// Inclusive `(lower, upper)` bounds on `assigned_at` for this bucket.
    pub fn bounds(self, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match self {
            AgingBucket::ZeroToTwo => (Some(now - Duration::days(2)), None),
            AgingBucket::ThreeToSix => {
                (Some(now - Duration::days(6)), Some(now - Duration::days(3)))
            }
            AgingBucket::SevenPlus => (None, Some(now - Duration::days(7))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueueSort {
    AssignedAtAsc,
    #[default]
    AssignedAtDesc,
    PriorityAsc,
    PriorityDesc,
}

impl QueueSort {
    fn order_clause(self) -> &'static str {
        match self {
            QueueSort::AssignedAtAsc => " ORDER BY assigned_at ASC",
            QueueSort::AssignedAtDesc => " ORDER BY assigned_at DESC",
            QueueSort::PriorityAsc => " ORDER BY priority ASC, assigned_at DESC",
            QueueSort::PriorityDesc => " ORDER BY priority DESC, assigned_at DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitingQueueQuery {
    pub priorities: Vec<Priority>,
    pub aging: Vec<AgingBucket>,
    pub types: Vec<WorkItemType>,
    pub assignee: Option<Uuid>,
    pub statuses: Vec<AssignmentStatus>,
    pub sort_by: QueueSort,
    pub page: i64,
    pub page_size: i64,
}

impl Default for WaitingQueueQuery {
    fn default() -> Self {
        Self {
            priorities: Vec::new(),
            aging: Vec::new(),
            types: Vec::new(),
            assignee: None,
            statuses: vec![AssignmentStatus::Pending, AssignmentStatus::Assigned],
            sort_by: QueueSort::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn parse_all<T: FromStr>(
    params: &QueryParams,
    key: &str,
    allowed: &str,
) -> Result<Vec<T>, ValidationError> {
    params
        .get_all(key)
        .iter()
        .map(|raw| {
            raw.parse::<T>().map_err(|_| {
                ValidationError::new(
                    key,
                    format!("Invalid {key} value '{raw}', expected one of: {allowed}"),
                    format!("قيمة {key} غير صالحة '{raw}'، القيم المسموحة: {allowed}"),
                )
            })
        })
        .collect()
}

impl WaitingQueueQuery {
    pub fn from_params(params: &QueryParams) -> Result<Self, ValidationError> {
        let mut query = Self {
            priorities: parse_all(params, "priority", "low, medium, high, urgent")?,
            aging: parse_all(params, "aging", "0-2, 3-6, 7+")?,
            types: parse_all(params, "type", "dossier, ticket, position, task")?,
            ..Self::default()
        };

        let statuses: Vec<AssignmentStatus> = parse_all(params, "status", "pending, assigned")?;
        if statuses
            .iter()
            .any(|s| !matches!(s, AssignmentStatus::Pending | AssignmentStatus::Assigned))
        {
            return Err(ValidationError::new(
                "status",
                "Status must be pending or assigned",
                "يجب أن تكون الحالة pending أو assigned",
            ));
        }
        if !statuses.is_empty() {
            query.statuses = statuses;
        }

        query.assignee = params.parse_as::<Uuid>("assignee").map_err(|raw| {
            ValidationError::new(
                "assignee",
                format!("Invalid assignee id '{raw}'"),
                format!("معرف المكلف غير صالح '{raw}'"),
            )
        })?;

        if let Some(sort) = params.get("sort_by") {
            query.sort_by = sort.parse().map_err(|_| {
                ValidationError::new(
                    "sort_by",
                    "sort_by must be one of assigned_at_asc, assigned_at_desc, priority_asc, priority_desc",
                    "قيمة الترتيب غير صالحة",
                )
            })?;
        }

        match params.parse_as::<i64>("page") {
            Ok(Some(page)) if page >= 1 => query.page = page,
            Ok(None) => {}
            _ => {
                return Err(ValidationError::new(
                    "page",
                    "Page must be a positive integer",
                    "يجب أن يكون رقم الصفحة عدداً صحيحاً موجباً",
                ));
            }
        }

        match params.parse_as::<i64>("page_size") {
            Ok(Some(size)) if (1..=MAX_PAGE_SIZE).contains(&size) => query.page_size = size,
            Ok(None) => {}
            _ => {
                return Err(ValidationError::new(
                    "page_size",
                    format!("Page size must be between 1 and {MAX_PAGE_SIZE}"),
                    format!("يجب أن يكون حجم الصفحة بين 1 و {MAX_PAGE_SIZE}"),
                ));
            }
        }
        page_offset(query.page, query.page_size)?;

        Ok(query)
    }

    fn push_predicates(&self, builder: &mut QueryBuilder<'_, Postgres>, now: DateTime<Utc>) {
        builder
            .push(" WHERE status = ANY(")
            .push_bind(self.statuses.clone())
            .push(")");
        if !self.priorities.is_empty() {
            builder
                .push(" AND priority = ANY(")
                .push_bind(self.priorities.clone())
                .push(")");
        }
        if !self.types.is_empty() {
            builder
                .push(" AND work_item_type = ANY(")
                .push_bind(self.types.clone())
                .push(")");
        }
        if let Some(assignee) = self.assignee {
            builder.push(" AND assignee_id = ").push_bind(assignee);
        }
        if !self.aging.is_empty() {
            builder.push(" AND (");
            for (i, bucket) in self.aging.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder.push("(TRUE");
                let (lower, upper) = bucket.bounds(now);
                if let Some(lower) = lower {
                    builder.push(" AND assigned_at >= ").push_bind(lower);
                }
                if let Some(upper) = upper {
                    builder.push(" AND assigned_at <= ").push_bind(upper);
                }
                builder.push(")");
            }
            builder.push(")");
        }
    }
}

/// Whole days between `assigned_at` and `now`, rounded down.
pub fn days_waiting(assigned_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - assigned_at).num_days().max(0)
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct WaitingQueueItem {
    #[serde(flatten)]
    #[ts(flatten)]
    pub assignment: Assignment,
    pub days_waiting: i64,
    pub assignee_name: String,
    pub work_item: Option<WorkItemSummary>,
}

#[derive(Debug, Clone, Copy, Serialize, TS)]
pub struct QueuePagination {
    pub page: i64,
    pub page_size: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct WaitingQueuePage {
    pub data: Vec<WaitingQueueItem>,
    pub pagination: QueuePagination,
}

#[derive(FromRow)]
struct CountedAssignment {
    #[sqlx(flatten)]
    row: Assignment,
    total_count: i64,
}

pub struct WaitingQueueService {
    pool: PgPool,
}

impl WaitingQueueService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, query: &WaitingQueueQuery) -> Result<WaitingQueuePage, WaitingQueueError> {
        let offset = page_offset(query.page, query.page_size)?;
        let now = Utc::now();
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ASSIGNMENT_COLUMNS}, COUNT(*) OVER () AS total_count FROM assignments"
        ));
        query.push_predicates(&mut builder, now);
        builder
            .push(query.sort_by.order_clause())
            .push(" LIMIT ")
            .push_bind(query.page_size)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder
            .build_query_as::<CountedAssignment>()
            .fetch_all(&self.pool)
            .await?;
        let total_count = rows.first().map(|r| r.total_count).unwrap_or(0);
        let assignments: Vec<Assignment> = rows.into_iter().map(|r| r.row).collect();
        debug!(
            returned = assignments.len(),
            total_count,
            page = query.page,
            "Waiting queue page fetched"
        );

        let data = self.enrich(assignments, now).await?;
        Ok(WaitingQueuePage {
            data,
            pagination: QueuePagination {
                page: query.page,
                page_size: query.page_size,
                total_count,
                total_pages: total_pages(total_count, query.page_size),
            },
        })
    }

    async fn enrich(
        &self,
        assignments: Vec<Assignment>,
        now: DateTime<Utc>,
    ) -> Result<Vec<WaitingQueueItem>, sqlx::Error> {
        let mut assignee_ids: Vec<Uuid> = assignments.iter().filter_map(|a| a.assignee_id).collect();
        assignee_ids.sort_unstable();
        assignee_ids.dedup();

        let mut by_type: HashMap<WorkItemType, Vec<Uuid>> = HashMap::new();
        for a in &assignments {
            by_type.entry(a.work_item_type).or_default().push(a.work_item_id);
        }

        let (users, batches) = futures::try_join!(
            UserSummary::find_by_ids(&self.pool, &assignee_ids),
            try_join_all(
                by_type
                    .iter()
                    .map(|(kind, ids)| WorkItemSummary::find_batch(&self.pool, *kind, ids)),
            ),
        )?;

        let names: HashMap<Uuid, String> = users
            .into_iter()
            .map(|u| (u.id, u.display_name().to_string()))
            .collect();
        let items: HashMap<Uuid, WorkItemSummary> = batches
            .into_iter()
            .flatten()
            .map(|item| (item.id, item))
            .collect();

        Ok(assignments
            .into_iter()
            .map(|assignment| WaitingQueueItem {
                days_waiting: days_waiting(assignment.assigned_at, now),
                assignee_name: assignment
                    .assignee_id
                    .and_then(|id| names.get(&id).cloned())
                    .unwrap_or_else(|| "Unassigned".to_string()),
                work_item: items.get(&assignment.work_item_id).cloned(),
                assignment,
            })
            .collect())
    }

    pub async fn preferences(&self, user_id: Uuid) -> Result<Option<Value>, WaitingQueueError> {
        Ok(UserPreference::find(&self.pool, user_id, PREFERENCES_KEY)
            .await?
            .map(|p| p.preference_value))
    }

    pub async fn save_preferences(
        &self,
        user_id: Uuid,
        filters: &Value,
    ) -> Result<Value, WaitingQueueError> {
        if !filters.is_object() {
            return Err(ValidationError::new(
                "filters",
                "Filter preferences must be a JSON object",
                "يجب أن تكون تفضيلات التصفية كائن JSON",
            )
            .into());
        }
        let saved = UserPreference::upsert(&self.pool, user_id, PREFERENCES_KEY, filters).await?;
        Ok(saved.preference_value)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_defaults_when_no_params() {
        let q = WaitingQueueQuery::from_params(&QueryParams::parse(None)).unwrap();
        assert_eq!(q, WaitingQueueQuery::default());
        assert_eq!(
            q.statuses,
            vec![AssignmentStatus::Pending, AssignmentStatus::Assigned]
        );
    }

    #[test]
    fn test_repeated_filters_parse() {
        let params = QueryParams::parse(Some(
            "priority=high&priority=urgent&aging=0-2&aging=7&type=ticket&sort_by=priority_desc&page=3&page_size=25",
        ));
        let q = WaitingQueueQuery::from_params(&params).unwrap();
        assert_eq!(q.priorities, vec![Priority::High, Priority::Urgent]);
        assert_eq!(q.aging, vec![AgingBucket::ZeroToTwo, AgingBucket::SevenPlus]);
        assert_eq!(q.types, vec![WorkItemType::Ticket]);
        assert_eq!(q.sort_by, QueueSort::PriorityDesc);
        assert_eq!((q.page, q.page_size), (3, 25));
    }

    #[test]
    fn test_invalid_values_name_the_field() {
        let cases = [
            ("priority=critical", "priority"),
            ("aging=8-10", "aging"),
            ("type=memo", "type"),
            ("status=completed", "status"),
            ("assignee=not-a-uuid", "assignee"),
            ("page=0", "page"),
            ("page=9223372036854775807", "page"),
            ("page_size=101", "page_size"),
            ("sort_by=title", "sort_by"),
        ];
        for (raw, field) in cases {
            let err = WaitingQueueQuery::from_params(&QueryParams::parse(Some(raw))).unwrap_err();
            assert_eq!(err.field, field, "{raw}");
        }
    }

    #[test]
    fn test_aging_bucket_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let (lower, upper) = AgingBucket::ThreeToSix.bounds(now);
        assert_eq!(lower, Some(Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap()));
        assert_eq!(upper, Some(Utc.with_ymd_and_hms(2024, 5, 7, 12, 0, 0).unwrap()));
        assert_eq!(AgingBucket::SevenPlus.bounds(now).0, None);
        assert_eq!(AgingBucket::ZeroToTwo.bounds(now).1, None);
        assert_eq!(AgingBucket::SevenPlus.to_string(), "7+");
    }

    #[test]
    fn test_days_waiting_floors() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let assigned = Utc.with_ymd_and_hms(2024, 5, 7, 18, 0, 0).unwrap();
        assert_eq!(days_waiting(assigned, now), 2);
        assert_eq!(days_waiting(now, now), 0);
    }

    #[test]
    fn test_predicates_or_aging_buckets() {
        let q = WaitingQueueQuery {
            aging: vec![AgingBucket::ZeroToTwo, AgingBucket::SevenPlus],
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM assignments");
        q.push_predicates(&mut builder, Utc::now());
        let sql = builder.sql();
        assert!(sql.contains("status = ANY($1)"));
        assert!(sql.contains("((TRUE AND assigned_at >= $2) OR (TRUE AND assigned_at <= $3))"));
    }
}
