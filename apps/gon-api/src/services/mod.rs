//! # Service Layer
//!
//! One service per workflow family. Each write workflow is a single SQLite
//! transaction, run under [`TxPolicy`]:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tokio::time::timeout(request_timeout)                                  │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │ attempt 1: begin → reads → writes → commit                         │ │
//! │  │            └─ SQLITE_BUSY → Conflict → tx dropped (rollback)       │ │
//! │  │ attempt 2: begin → re-reads (fresh stock) → ...                    │ │
//! │  │ ...                                                                │ │
//! │  │ attempt conflict_retries + 1 fails → Conflict (409)                │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! │  expiry → the in-flight transaction is dropped → Unexpected (500)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Business-rule failures are never retried. Read models are assembled from
//! the pool after commit.

pub mod payments;
pub mod returns;
pub mod sales;
pub mod stock;

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};

pub use payments::PaymentService;
pub use returns::ReturnService;
pub use sales::SaleService;
pub use stock::StockService;

/// Timeout and retry budget for one workflow invocation.
#[derive(Debug, Clone, Copy)]
pub struct TxPolicy {
    pub timeout: Duration,
    pub conflict_retries: u32,
}

impl Default for TxPolicy {
    fn default() -> Self {
        TxPolicy {
            timeout: Duration::from_secs(10),
            conflict_retries: 5,
        }
    }
}

impl TxPolicy {
    /// Runs `attempt` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent. Each call to `attempt` must open its own
    /// transaction.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let retries = self.conflict_retries;
        let work = async move {
            let mut tries: u32 = 0;
            loop {
                match attempt().await {
                    Err(err) if err.is_retryable() && tries < retries => {
                        tries += 1;
                        let backoff = Duration::from_millis(5 * (1 << tries.min(6)));
                        debug!(operation, tries, ?backoff, "Lock contention, retrying transaction");
                        tokio::time::sleep(backoff).await;
                    }
                    Err(err) => {
                        if err.is_retryable() {
                            warn!(operation, tries, "Giving up after repeated lock contention");
                        }
                        return Err(err);
                    }
                    Ok(value) => return Ok(value),
                }
            }
        };

        tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| ServiceError::Unexpected(format!("{} timed out after {:?}", operation, self.timeout)))?
    }
}
