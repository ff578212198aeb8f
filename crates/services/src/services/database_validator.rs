//! Startup check that migrations ran and the core tables exist.

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

/// Tables every feature relies on.
pub const CORE_TABLES: &[&str] = &[
    "users",
    "dossiers",
    "mous",
    "mou_renewals",
    "mou_expiration_alerts",
    "entity_comments",
    "user_watchlist",
    "persons",
    "events",
    "meeting_agendas",
    "assignments",
];

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct DatabaseValidator {
    pool: PgPool,
}

impl DatabaseValidator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn validate(&self) -> Result<ValidationResult, DatabaseValidationError> {
        let migrations_table_exists = self.table_exists("_sqlx_migrations").await?;

        if !migrations_table_exists {
            warn!("Database not initialized - _sqlx_migrations table does not exist");
            return Ok(ValidationResult {
                is_initialized: false,
                migrations_applied: 0,
                latest_migration: None,
                missing_tables: CORE_TABLES.iter().map(|t| t.to_string()).collect(),
            });
        }

        let migrations_applied =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success")
                .fetch_one(&self.pool)
                .await?;

        let latest_migration = sqlx::query_scalar::<_, String>(
            "SELECT description FROM _sqlx_migrations WHERE success ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let missing_tables = self.missing_tables(CORE_TABLES).await?;

        let result = ValidationResult {
            is_initialized: true,
            migrations_applied: migrations_applied as usize,
            latest_migration,
            missing_tables,
        };

        if result.is_ok() {
            info!(
                migrations_applied = result.migrations_applied,
                latest = ?result.latest_migration,
                "Database validation complete"
            );
        } else {
            warn!(missing = ?result.missing_tables, "{}", result.summary());
        }
        Ok(result)
    }

    pub async fn missing_tables(&self, required: &[&str]) -> Result<Vec<String>, DatabaseValidationError> {
        let present = sqlx::query_scalar::<_, String>(
            r#"SELECT table_name::text FROM information_schema.tables
               WHERE table_schema = current_schema() AND table_name = ANY($1)"#,
        )
        .bind(required)
        .fetch_all(&self.pool)
        .await?;

        Ok(required
            .iter()
            .filter(|t| !present.iter().any(|p| p == *t))
            .map(|t| t.to_string())
            .collect())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DatabaseValidationError> {
        Ok(sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (
                   SELECT 1 FROM information_schema.tables
                   WHERE table_schema = current_schema() AND table_name = $1
               )"#,
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_initialized: bool,
    pub migrations_applied: usize,
    pub latest_migration: Option<String>,
    pub missing_tables: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.is_initialized && self.missing_tables.is_empty()
    }

    pub fn summary(&self) -> String {
        if !self.is_initialized {
            "Database not initialized - migrations need to be run".to_string()
        } else if !self.missing_tables.is_empty() {
            format!(
                "Database is missing tables: {}",
                self.missing_tables.join(", ")
            )
        } else {
            format!("Database OK - {} migrations applied", self.migrations_applied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_reports_missing_tables() {
        let result = ValidationResult {
            is_initialized: true,
            migrations_applied: 10,
            latest_migration: Some("ai summaries".into()),
            missing_tables: vec!["events".into()],
        };
        assert!(!result.is_ok());
        assert_eq!(result.summary(), "Database is missing tables: events");

        let ok = ValidationResult {
            missing_tables: vec![],
            ..result
        };
        assert!(ok.is_ok());
        assert_eq!(ok.summary(), "Database OK - 10 migrations applied");
    }
}
