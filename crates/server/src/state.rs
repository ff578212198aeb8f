//! Shared application state handed to every handler.

use std::sync::Arc;

use db::DBService;
use secrecy::{ExposeSecret, SecretString};
use services::services::llm_client::JsonCompletion;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    db: DBService,
    jwt_secret: Arc<SecretString>,
    llm: Option<Arc<dyn JsonCompletion>>,
    llm_model: Option<String>,
}

impl AppState {
    pub fn new(
        db: DBService,
        jwt_secret: SecretString,
        llm: Option<Arc<dyn JsonCompletion>>,
        llm_model: Option<String>,
    ) -> Self {
        Self {
            db,
            jwt_secret: Arc::new(jwt_secret),
            llm,
            llm_model,
        }
    }

    pub fn pool(&self) -> PgPool {
        self.db.pool.clone()
    }

    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.expose_secret().as_bytes()
    }

    pub fn llm(&self) -> Option<Arc<dyn JsonCompletion>> {
        self.llm.clone()
    }

    pub fn llm_model(&self) -> Option<String> {
        self.llm_model.clone()
    }
}
