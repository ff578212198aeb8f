use std::time::Duration;

use sqlx::{PgPool, migrate::MigrateError, postgres::PgPoolOptions};
use tracing::info;

pub mod models;

#[derive(Clone)]
pub struct DBService {
    pub pool: PgPool,
}

impl DBService {
    /// Build a pool that connects on first use.
    pub fn new_lazy(database_url: &str, max_connections: u32) -> Result<DBService, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy(database_url)?;
        Ok(DBService { pool })
    }

    pub async fn migrate(&self) -> Result<(), MigrateError> {
        let migrator = sqlx::migrate!("./migrations");
        migrator.run(&self.pool).await?;
        info!(count = migrator.iter().count(), "Database migrations applied");
        Ok(())
    }
}
