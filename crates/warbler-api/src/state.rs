use std::sync::Arc;

use tera::Tera;
use tracing::error;

use warbler_db::Database;

use crate::error::AppError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub templates: Tera,
    /// Mark the session cookie `Secure`. Off for plain-http development.
    pub secure_cookies: bool,
}

impl AppStateInner {
    pub fn new(db: Database, secure_cookies: bool) -> anyhow::Result<AppState> {
        Ok(Arc::new(Self {
            db,
            templates: crate::render::load_templates()?,
            secure_cookies,
        }))
    }
}

/// Run blocking DB work (and password hashing) off the async runtime.
pub async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            AppError::Join(e)
        })?
        .map_err(AppError::from)
}
