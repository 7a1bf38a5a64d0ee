//! Memoized payment-client registry.
//!
//! The processor SDK must never be instantiated twice for the same
//! publishable key within a session. The registry hands every caller the
//! same shared cell per key; concurrent first callers await one
//! initialization.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tracing::debug;

/// Keyed, initialize-once registry of shared payment clients.
#[derive(Debug, Default)]
pub struct PaymentClientRegistry<C> {
    cells: Mutex<HashMap<String, Arc<OnceCell<Arc<C>>>>>,
}

impl<C> PaymentClientRegistry<C> {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Get the client for a publishable key, running `init` at most once
    /// per key for the life of the registry.
    pub async fn get_or_init<F, Fut>(&self, key: &str, init: F) -> Arc<C>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = C>,
    {
        let cell = {
            let mut cells = match self.cells.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(cells.entry(key.to_owned()).or_default())
        };

        Arc::clone(
            cell.get_or_init(|| async {
                debug!(key, "initializing payment client");
                Arc::new(init().await)
            })
            .await,
        )
    }
}
