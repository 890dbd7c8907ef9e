//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap external calls with a deadline
//! - Turn an elapsed deadline into a [`ControlError::Timeout`]
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{ControlError, ControlResult};

/// Run `fut` under `limit`, mapping an elapsed deadline to `ControlError::Timeout`.
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> ControlResult<T>
where
    F: Future<Output = ControlResult<T>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            let millis = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(operation = %operation, millis = millis, "External call timed out");
            Err(ControlError::Timeout {
                operation: operation.to_string(),
                millis,
            })
        }
    }
}
