//! Fan-out of task prompts to every configured provider.
//!
//! Each `(task, provider)` pair runs as its own tokio task, bounded by a
//! semaphore. Results are collected into a map keyed by task name, then by
//! provider key. A failing provider produces a failure entry for its slot
//! and never aborts the rest of the batch.

use super::handler::ProviderHandler;
use super::provider::LlmRequest;
use super::retry::FailureKind;
use crate::config::ResponseFormat;
use crate::parse;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// One rendered task prompt to send to every provider.
#[derive(Debug, Clone)]
pub struct PromptJob {
    pub task: String,
    pub output_format: ResponseFormat,
    pub request: LlmRequest,
}

/// What one provider returned for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderOutcome {
    Success {
        text: String,
        /// Parsed output for JSON tasks (`"NA"` when unparseable)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parsed: Option<serde_json::Value>,
        model: String,
        latency_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tokens_used: Option<u32>,
        attempts: u32,
    },
    Failure {
        kind: FailureKind,
        error: String,
        attempts: u32,
    },
}

impl ProviderOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProviderOutcome::Success { .. })
    }

    /// Generated text, if the call succeeded.
    pub fn text(&self) -> Option<&str> {
        match self {
            ProviderOutcome::Success { text, .. } => Some(text),
            ProviderOutcome::Failure { .. } => None,
        }
    }
}

/// Results keyed by task name, then provider key.
pub type FanOutResults = BTreeMap<String, BTreeMap<String, ProviderOutcome>>;

/// Count `(succeeded, failed)` outcomes across all tasks.
pub fn summarize(results: &FanOutResults) -> (usize, usize) {
    results
        .values()
        .flat_map(|providers| providers.values())
        .fold((0, 0), |(ok, failed), outcome| {
            if outcome.is_success() {
                (ok + 1, failed)
            } else {
                (ok, failed + 1)
            }
        })
}

/// Dispatches prompts to all handlers with bounded concurrency.
pub struct FanOut {
    handlers: Vec<Arc<ProviderHandler>>,
    max_concurrent: usize,
}

impl FanOut {
    pub fn new(handlers: Vec<ProviderHandler>, max_concurrent: usize) -> Self {
        Self {
            handlers: handlers.into_iter().map(Arc::new).collect(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn handlers(&self) -> &[Arc<ProviderHandler>] {
        &self.handlers
    }

    /// Keys results will be reported under, in configuration order.
    pub fn provider_keys(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.key().to_string()).collect()
    }

    /// Send every job to every handler and collect all outcomes.
    pub async fn run(&self, jobs: Vec<PromptJob>) -> FanOutResults {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(jobs.len() * self.handlers.len());

        'dispatch: for job in jobs.into_iter().map(Arc::new) {
            for handler in &self.handlers {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("Fan-out semaphore closed unexpectedly, stopping dispatch");
                        break 'dispatch;
                    }
                };

                let key = handler.key().to_string();
                let handler = handler.clone();
                let job_ref = job.clone();
                let handle = tokio::spawn(async move {
                    let outcome = call_provider(&handler, &job_ref).await;
                    drop(permit); // Release concurrency permit before returning
                    outcome
                });

                handles.push((job.task.clone(), key, handle));
            }
        }

        let mut results = FanOutResults::new();
        for (task, key, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Fan-out task for {task}/{key} panicked: {e}");
                    ProviderOutcome::Failure {
                        kind: FailureKind::Internal,
                        error: format!("task panicked: {e}"),
                        attempts: 0,
                    }
                }
            };
            results.entry(task).or_default().insert(key, outcome);
        }

        let (succeeded, failed) = summarize(&results);
        if failed > 0 {
            tracing::warn!("Fan-out: {succeeded} succeeded, {failed} failed");
        } else {
            tracing::debug!("Fan-out: {succeeded} succeeded");
        }
        results
    }
}

async fn call_provider(handler: &ProviderHandler, job: &PromptJob) -> ProviderOutcome {
    match handler.invoke(&job.request).await {
        Ok(invocation) => {
            let response = invocation.response;
            let parsed = match job.output_format {
                ResponseFormat::Json => {
                    let value = parse::extract_json(&response.text);
                    if parse::is_sentinel(&value) {
                        tracing::warn!(
                            "{} returned unparseable JSON for task {}",
                            handler.key(),
                            job.task
                        );
                    }
                    Some(value)
                }
                ResponseFormat::Text => None,
            };
            ProviderOutcome::Success {
                text: response.text,
                parsed,
                model: response.model,
                latency_ms: response.latency_ms,
                tokens_used: response.tokens_used,
                attempts: invocation.attempts,
            }
        }
        Err(failure) => ProviderOutcome::Failure {
            kind: failure.kind(),
            error: failure.error.to_string(),
            attempts: failure.attempts,
        },
    }
}
