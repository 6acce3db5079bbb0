use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use parley_db::{Database, StoreError};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Deadline for one blocking store call, measured from the handler.
    pub store_timeout: Duration,
}

/// Run a blocking store call off the async runtime, bounded by the store
/// deadline. On timeout the call keeps running to completion in the
/// background; it is never retried from here.
pub async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let inner = state.clone();
    let task = tokio::task::spawn_blocking(move || f(&inner.db));

    match tokio::time::timeout(state.store_timeout, task).await {
        Err(_) => Err(ApiError::Timeout(state.store_timeout)),
        Ok(Err(e)) => {
            error!("spawn_blocking join error: {}", e);
            Err(ApiError::Internal("store task failed".to_string()))
        }
        Ok(Ok(result)) => result.map_err(ApiError::from),
    }
}
