//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::{AgentError, Result};

/// Wrap a model call with a deadline; expiry surfaces as `ModelUnavailable`.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::ModelUnavailable(format!(
            "model call timed out after {}ms",
            duration.as_millis()
        ))),
    }
}
