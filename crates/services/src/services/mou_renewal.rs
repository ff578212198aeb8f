//! MoU renewal lifecycle: initiation, status transitions, completion and
//! the expiry alert jobs.

use chrono::{Months, NaiveDate, Utc};
use db::models::{
    mou::{ExpiringMou, Mou, MouVersion, MouWorkflowState},
    mou_alert::{AlertFilter, AlertType, MouExpirationAlert},
    mou_negotiation::{CreateNegotiation, MouNegotiation},
    mou_renewal::{
        MouRenewal, MouRenewalWithMou, NewRenewal, RenewalCompletion, RenewalStatus,
        RenewalStatusChange,
    },
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::validation::{ValidationError, page_offset, required, required_text};

pub const DEFAULT_RENEWAL_PERIOD_MONTHS: i32 = 12;

#[derive(Debug, Error)]
pub enum MouRenewalError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("mou not found")]
    MouNotFound,
    #[error("renewal not found")]
    RenewalNotFound,
    #[error("alert not found")]
    AlertNotFound,
    #[error("mou is {0}, only active mous can be renewed")]
    MouNotActive(MouWorkflowState),
    #[error("mou already has an open renewal {0}")]
    RenewalAlreadyOpen(Uuid),
    #[error("cannot transition renewal from {from} to {to}")]
    InvalidTransition {
        from: RenewalStatus,
        to: RenewalStatus,
        allowed: &'static [RenewalStatus],
    },
    #[error("renewal must be signed before completion, it is {0}")]
    NotSigned(RenewalStatus),
}

/// Statuses reachable from `from`. Terminal statuses have none; `expired` is
/// reserved for the auto-expire job and never appears here.
pub fn allowed_transitions(from: RenewalStatus) -> &'static [RenewalStatus] {
    use RenewalStatus::*;
    match from {
        Pending => &[Initiated],
        Initiated => &[Negotiation, Declined],
        Negotiation => &[Approved, Declined],
        Approved => &[Signed, Declined],
        Signed => &[Completed],
        Completed | Declined | Expired => &[],
    }
}

pub fn can_transition(from: RenewalStatus, to: RenewalStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

pub fn is_open(status: RenewalStatus) -> bool {
    !matches!(
        status,
        RenewalStatus::Completed | RenewalStatus::Declined | RenewalStatus::Expired
    )
}

/// Expiry date proposed when the caller does not supply one.
pub fn default_proposed_expiry(
    current_expiry: Option<NaiveDate>,
    period_months: i32,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let months = Months::new(u32::try_from(period_months).ok()?);
    current_expiry.unwrap_or(today).checked_add_months(months)
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct InitiateRenewal {
    pub mou_id: Option<Uuid>,
    pub proposed_expiry_date: Option<NaiveDate>,
    pub renewal_period_months: Option<i32>,
    pub notes_en: Option<String>,
    pub notes_ar: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UpdateRenewalStatus {
    pub renewal_id: Option<Uuid>,
    pub new_status: Option<RenewalStatus>,
    pub notes_en: Option<String>,
    pub notes_ar: Option<String>,
    pub decline_reason_en: Option<String>,
    pub decline_reason_ar: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CompleteRenewal {
    pub renewal_id: Option<Uuid>,
    pub new_mou_id: Option<Uuid>,
    pub terms_changed: Option<bool>,
    pub terms_change_summary_en: Option<String>,
    pub terms_change_summary_ar: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct AlertRun {
    /// Pending alerts marked sent.
    pub processed: u64,
    /// Threshold alerts newly recorded.
    pub scheduled: u64,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ExpiryRun {
    pub expired: usize,
    pub expired_mou_ids: Vec<Uuid>,
    pub expired_renewal_ids: Vec<Uuid>,
}

pub struct MouRenewalService {
    pool: PgPool,
}

impl MouRenewalService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        mou_id: Option<Uuid>,
        status: Option<RenewalStatus>,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<MouRenewalWithMou>, i64), MouRenewalError> {
        let offset = page_offset(page, limit)?;
        Ok(MouRenewal::list(&self.pool, mou_id, status, limit, offset).await?)
    }

    pub async fn expiring(
        &self,
        days_ahead: i32,
        include_expired: bool,
    ) -> Result<Vec<ExpiringMou>, MouRenewalError> {
        Ok(Mou::find_expiring(&self.pool, days_ahead, include_expired).await?)
    }

    pub async fn alerts(
        &self,
        filter: &AlertFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<MouExpirationAlert>, i64), MouRenewalError> {
        let offset = page_offset(page, limit)?;
        Ok(MouExpirationAlert::list(&self.pool, filter, limit, offset).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<MouRenewalWithMou, MouRenewalError> {
        MouRenewal::find_with_mou(&self.pool, id)
            .await?
            .ok_or(MouRenewalError::RenewalNotFound)
    }

    pub async fn negotiations(&self, renewal_id: Uuid) -> Result<Vec<MouNegotiation>, MouRenewalError> {
        Ok(MouNegotiation::find_by_renewal(&self.pool, renewal_id).await?)
    }

    pub async fn version_chain(&self, mou_id: Uuid) -> Result<Vec<MouVersion>, MouRenewalError> {
        let chain = Mou::version_chain(&self.pool, mou_id).await?;
        if chain.is_empty() {
            return Err(MouRenewalError::MouNotFound);
        }
        Ok(chain)
    }

    pub async fn initiate(
        &self,
        data: InitiateRenewal,
        user_id: Uuid,
    ) -> Result<MouRenewal, MouRenewalError> {
        let mou_id = required(data.mou_id, "mou_id")?;
        let period = data
            .renewal_period_months
            .unwrap_or(DEFAULT_RENEWAL_PERIOD_MONTHS);
        if period <= 0 {
            return Err(ValidationError::new(
                "renewal_period_months",
                "Renewal period must be a positive number of months",
                "يجب أن تكون مدة التجديد عددًا موجبًا من الأشهر",
            )
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let mou = Mou::find_by_id(&mut *tx, mou_id)
            .await?
            .ok_or(MouRenewalError::MouNotFound)?;
        if mou.workflow_state != MouWorkflowState::Active {
            return Err(MouRenewalError::MouNotActive(mou.workflow_state));
        }
        if let Some(open) = MouRenewal::find_open_for_mou(&mut *tx, mou_id).await? {
            return Err(MouRenewalError::RenewalAlreadyOpen(open.id));
        }

        let proposed = data.proposed_expiry_date.or_else(|| {
            default_proposed_expiry(mou.expiry_date, period, Utc::now().date_naive())
        });

        let renewal = MouRenewal::create(
            &mut *tx,
            &NewRenewal {
                original_mou_id: mou_id,
                current_expiry_date: mou.expiry_date,
                proposed_expiry_date: proposed,
                renewal_period_months: period,
                notes_en: data.notes_en,
                notes_ar: data.notes_ar,
                initiated_by: user_id,
            },
        )
        .await?;

        MouExpirationAlert::create(
            &mut *tx,
            mou_id,
            Some(renewal.id),
            AlertType::RenewalInitiated,
            &format!("Renewal initiated for MoU {}", mou.reference_number),
            &format!("تم بدء تجديد مذكرة التفاهم {}", mou.reference_number),
        )
        .await?;

        tx.commit().await?;

        info!(
            renewal_id = %renewal.id,
            mou_id = %mou_id,
            user_id = %user_id,
            "MoU renewal initiated"
        );
        Ok(renewal)
    }

    pub async fn update_status(
        &self,
        data: UpdateRenewalStatus,
    ) -> Result<MouRenewal, MouRenewalError> {
        let renewal_id = required(data.renewal_id, "renewal_id")?;
        let new_status = required(data.new_status, "new_status")?;

        let mut tx = self.pool.begin().await?;

        let current = MouRenewal::find_by_id(&mut *tx, renewal_id)
            .await?
            .ok_or(MouRenewalError::RenewalNotFound)?;

        if !can_transition(current.renewal_status, new_status) {
            return Err(MouRenewalError::InvalidTransition {
                from: current.renewal_status,
                to: new_status,
                allowed: allowed_transitions(current.renewal_status),
            });
        }

        let updated = MouRenewal::update_status(
            &mut *tx,
            renewal_id,
            new_status,
            &RenewalStatusChange {
                notes_en: data.notes_en,
                notes_ar: data.notes_ar,
                decline_reason_en: data.decline_reason_en,
                decline_reason_ar: data.decline_reason_ar,
            },
        )
        .await?;

        if new_status == RenewalStatus::Approved {
            MouExpirationAlert::create(
                &mut *tx,
                updated.original_mou_id,
                Some(updated.id),
                AlertType::RenewalApproved,
                "MoU renewal approved",
                "تمت الموافقة على تجديد مذكرة التفاهم",
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            renewal_id = %renewal_id,
            from = %current.renewal_status,
            to = %new_status,
            "MoU renewal status changed"
        );
        Ok(updated)
    }

    pub async fn complete(&self, data: CompleteRenewal) -> Result<MouRenewal, MouRenewalError> {
        let renewal_id = required(data.renewal_id, "renewal_id")?;
        let new_mou_id = required(data.new_mou_id, "new_mou_id")?;

        let mut tx = self.pool.begin().await?;

        let renewal = MouRenewal::find_by_id(&mut *tx, renewal_id)
            .await?
            .ok_or(MouRenewalError::RenewalNotFound)?;
        if renewal.renewal_status != RenewalStatus::Signed {
            return Err(MouRenewalError::NotSigned(renewal.renewal_status));
        }
        if Mou::find_by_id(&mut *tx, new_mou_id).await?.is_none() {
            return Err(MouRenewalError::MouNotFound);
        }

        let completed = MouRenewal::mark_completed(
            &mut *tx,
            renewal_id,
            &RenewalCompletion {
                renewed_mou_id: new_mou_id,
                terms_changed: data.terms_changed.unwrap_or(false),
                terms_change_summary_en: data.terms_change_summary_en,
                terms_change_summary_ar: data.terms_change_summary_ar,
            },
        )
        .await?;

        Mou::set_previous_version(&mut *tx, new_mou_id, renewal.original_mou_id).await?;
        Mou::set_workflow_state(&mut *tx, renewal.original_mou_id, MouWorkflowState::Renewed)
            .await?;
        MouExpirationAlert::create(
            &mut *tx,
            renewal.original_mou_id,
            Some(renewal_id),
            AlertType::RenewalCompleted,
            "MoU renewal completed",
            "اكتمل تجديد مذكرة التفاهم",
        )
        .await?;

        tx.commit().await?;

        info!(
            renewal_id = %renewal_id,
            original_mou_id = %renewal.original_mou_id,
            new_mou_id = %new_mou_id,
            "MoU renewal completed"
        );
        Ok(completed)
    }

    pub async fn record_negotiation(
        &self,
        data: CreateNegotiation,
        user_id: Uuid,
    ) -> Result<MouNegotiation, MouRenewalError> {
        let renewal_id = required(data.renewal_id, "renewal_id")?;
        let summary_en = required_text(data.summary_en.as_deref(), "summary_en")?;
        let summary_ar = required_text(data.summary_ar.as_deref(), "summary_ar")?;

        if MouRenewal::find_by_id(&self.pool, renewal_id).await?.is_none() {
            return Err(MouRenewalError::RenewalNotFound);
        }

        let negotiation =
            MouNegotiation::create(&self.pool, renewal_id, &summary_en, &summary_ar, &data, user_id)
                .await?;
        info!(
            renewal_id = %renewal_id,
            negotiation_id = %negotiation.id,
            outcome = %negotiation.outcome,
            "Negotiation recorded"
        );
        Ok(negotiation)
    }

    pub async fn acknowledge_alert(
        &self,
        alert_id: Option<Uuid>,
        user_id: Uuid,
    ) -> Result<MouExpirationAlert, MouRenewalError> {
        let alert_id = required(alert_id, "alert_id")?;
        MouExpirationAlert::acknowledge(&self.pool, alert_id, user_id)
            .await?
            .ok_or(MouRenewalError::AlertNotFound)
    }

    pub async fn dismiss_alert(&self, alert_id: Uuid) -> Result<MouExpirationAlert, MouRenewalError> {
        MouExpirationAlert::dismiss(&self.pool, alert_id)
            .await?
            .ok_or(MouRenewalError::AlertNotFound)
    }

    /// Record threshold alerts that became due and mark pending alerts sent.
    pub async fn process_alerts(&self) -> Result<AlertRun, MouRenewalError> {
        let mut tx = self.pool.begin().await?;
        let scheduled = MouExpirationAlert::schedule_expiration_alerts(&mut *tx).await?;
        let processed = MouExpirationAlert::mark_due_sent(&mut *tx).await?;
        tx.commit().await?;

        info!(scheduled, processed, "Expiration alerts processed");
        Ok(AlertRun {
            processed,
            scheduled,
        })
    }

    /// Expire overdue active MoUs together with their open renewals.
    pub async fn auto_expire(&self) -> Result<ExpiryRun, MouRenewalError> {
        let mut tx = self.pool.begin().await?;

        let mou_ids = Mou::expire_overdue(&mut *tx).await?;
        let renewals = if mou_ids.is_empty() {
            Vec::new()
        } else {
            MouRenewal::expire_open_for_mous(&mut *tx, &mou_ids).await?
        };

        for mou_id in &mou_ids {
            let renewal_id = renewals
                .iter()
                .find(|(_, m)| m == mou_id)
                .map(|(r, _)| *r);
            MouExpirationAlert::create(
                &mut *tx,
                *mou_id,
                renewal_id,
                AlertType::Expired,
                "MoU has expired",
                "انتهت صلاحية مذكرة التفاهم",
            )
            .await?;
        }

        tx.commit().await?;

        if !mou_ids.is_empty() {
            warn!(
                expired = mou_ids.len(),
                renewals = renewals.len(),
                "MoUs auto-expired"
            );
        }
        Ok(ExpiryRun {
            expired: mou_ids.len(),
            expired_mou_ids: mou_ids,
            expired_renewal_ids: renewals.into_iter().map(|(r, _)| r).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;
    use strum::IntoEnumIterator;

    use super::*;

    fn lazy_service() -> MouRenewalService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/diplomatic_test")
            .unwrap();
        MouRenewalService::new(pool)
    }

    #[tokio::test]
    async fn test_unaddressable_page_is_rejected_before_query() {
        let service = lazy_service();
        let err = service.list(None, None, i64::MAX, 20).await.unwrap_err();
        assert!(matches!(err, MouRenewalError::Validation(ref e) if e.field == "page"));

        let err = service
            .alerts(&AlertFilter::default(), i64::MAX, 20)
            .await
            .unwrap_err();
        assert!(matches!(err, MouRenewalError::Validation(ref e) if e.field == "page"));
    }

    #[test]
    fn test_declined_cannot_transition() {
        for to in RenewalStatus::iter() {
            assert!(!can_transition(RenewalStatus::Declined, to), "declined -> {to}");
        }
    }

    #[test]
    fn test_terminal_statuses_have_no_moves() {
        for status in [
            RenewalStatus::Completed,
            RenewalStatus::Declined,
            RenewalStatus::Expired,
        ] {
            assert!(allowed_transitions(status).is_empty());
            assert!(!is_open(status));
        }
    }

    #[test]
    fn test_happy_path_is_allowed() {
        use RenewalStatus::*;
        let path = [Pending, Initiated, Negotiation, Approved, Signed, Completed];
        for pair in path.windows(2) {
            assert!(can_transition(pair[0], pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(!can_transition(Initiated, Approved));
        assert!(!can_transition(Signed, Declined));
    }

    #[test]
    fn test_clients_cannot_request_expired() {
        for from in RenewalStatus::iter() {
            assert!(!can_transition(from, RenewalStatus::Expired));
        }
    }

    #[test]
    fn test_default_proposed_expiry() {
        let expiry = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(
            default_proposed_expiry(Some(expiry), 12, today),
            NaiveDate::from_ymd_opt(2026, 1, 31)
        );
        assert_eq!(
            default_proposed_expiry(Some(expiry), 1, today),
            NaiveDate::from_ymd_opt(2025, 2, 28)
        );
        assert_eq!(
            default_proposed_expiry(None, 6, today),
            NaiveDate::from_ymd_opt(2024, 12, 1)
        );
        assert_eq!(default_proposed_expiry(Some(expiry), -1, today), None);
    }
}
