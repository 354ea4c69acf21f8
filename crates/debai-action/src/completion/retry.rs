//! Timeout and retry wrapper for completion services.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

use crate::completion::{CompletionService, Routing, RoutingRequest};
use crate::error::CompletionError;
use crate::types::ToolDeclaration;

const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Bounds every call to the inner service by `timeout` and retries
/// transport failures up to `max_retries` times. Malformed output is
/// returned immediately.
pub struct RetryingCompletion {
    inner: Arc<dyn CompletionService>,
    timeout: Duration,
    max_retries: u32,
}

impl RetryingCompletion {
    pub fn new(inner: Arc<dyn CompletionService>, timeout: Duration, max_retries: u32) -> Self {
        Self {
            inner,
            timeout,
            max_retries,
        }
    }

    async fn call<T, F, Fut>(&self, op: &str, mut f: F) -> Result<T, CompletionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CompletionError>>,
    {
        let mut attempt = 0;
        loop {
            let err = match tokio::time::timeout(self.timeout, f()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !e.is_retryable() => return Err(e),
                Ok(Err(e)) => e,
                Err(_) => CompletionError::Timeout(self.timeout),
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            attempt += 1;
            warn!(
                service = self.inner.name(),
                op,
                attempt,
                error = %err,
                "Completion call failed, retrying"
            );
            tokio::time::sleep(RETRY_BACKOFF * attempt).await;
        }
    }
}

#[async_trait]
impl CompletionService for RetryingCompletion {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn select_tool(&self, request: &RoutingRequest<'_>) -> Result<Routing, CompletionError> {
        self.call("select_tool", || self.inner.select_tool(request))
            .await
    }

    async fn extract(
        &self,
        text: &str,
        decl: &ToolDeclaration,
    ) -> Result<Map<String, Value>, CompletionError> {
        self.call("extract", || self.inner.extract(text, decl)).await
    }
}
