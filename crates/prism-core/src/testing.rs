//! Test helpers shared by the library and the binary crate.
//!
//! `ScriptedProvider` stands in for a real vendor: each call to `generate()`
//! invokes a response function with the call index and request, so tests can
//! script different results per attempt, add latency, and observe how many
//! calls were in flight at once.

use crate::error::LlmError;
use crate::llm::{LlmProvider, LlmRequest, LlmResponse};
use crate::store::Database;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

type ResponseFn = dyn Fn(u32, &LlmRequest) -> Result<LlmResponse, LlmError> + Send + Sync;

/// A configurable in-process provider.
pub struct ScriptedProvider {
    name: String,
    response_fn: Box<ResponseFn>,
    call_count: Arc<AtomicU32>,
    delay: Option<Duration>,
    /// (in_flight, max_concurrent)
    in_flight: Option<(Arc<AtomicU32>, Arc<AtomicU32>)>,
}

impl ScriptedProvider {
    pub fn new<F>(name: &str, response_fn: F) -> Self
    where
        F: Fn(u32, &LlmRequest) -> Result<LlmResponse, LlmError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            response_fn: Box::new(response_fn),
            call_count: Arc::new(AtomicU32::new(0)),
            delay: None,
            in_flight: None,
        }
    }

    /// A canned successful response.
    pub fn response(text: &str) -> LlmResponse {
        LlmResponse {
            text: text.to_string(),
            model: "mock-v1".to_string(),
            tokens_used: Some(42),
            latency_ms: 10,
        }
    }

    /// Always answers `text`.
    pub fn success(name: &str, text: &str) -> Self {
        let text = text.to_string();
        Self::new(name, move |_, _| Ok(Self::response(&text)))
    }

    /// Answers with the prompt it was sent.
    pub fn echo(name: &str) -> Self {
        Self::new(name, |_, request| Ok(Self::response(&request.prompt)))
    }

    /// Always fails with `error`.
    pub fn failing(name: &str, error: LlmError) -> Self {
        Self::new(name, move |_, _| Err(error.clone()))
    }

    /// First call fails with `error`, later calls answer `text`.
    pub fn fail_then_succeed(name: &str, error: LlmError, text: &str) -> Self {
        let text = text.to_string();
        Self::new(name, move |idx, _| {
            if idx == 0 {
                Err(error.clone())
            } else {
                Ok(Self::response(&text))
            }
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Track concurrent calls in `in_flight`, recording the peak in `max_concurrent`.
    pub fn with_concurrency_gauge(
        mut self,
        in_flight: Arc<AtomicU32>,
        max_concurrent: Arc<AtomicU32>,
    ) -> Self {
        self.in_flight = Some((in_flight, max_concurrent));
        self
    }

    /// Shared handle to the call counter (clone before moving the provider).
    pub fn call_count_handle(&self) -> Arc<AtomicU32> {
        self.call_count.clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some((ref in_flight, ref max_concurrent)) = self.in_flight {
            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_concurrent.fetch_max(current, Ordering::SeqCst);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = (self.response_fn)(idx, request);
        if let Some((ref in_flight, _)) = self.in_flight {
            in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        result
    }
}

/// A migrated in-memory database.
///
/// Uses a single connection: every `sqlite::memory:` connection is a
/// separate database.
pub async fn memory_database() -> Arc<Database> {
    let db = Database::in_memory()
        .await
        .unwrap_or_else(|e| panic!("failed to open in-memory database: {e}"));
    db.run_migrations()
        .await
        .unwrap_or_else(|e| panic!("failed to migrate in-memory database: {e}"));
    Arc::new(db)
}
