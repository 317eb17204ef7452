//! Result types produced by enrichment and evaluation runs.

use crate::evaluation::Judgements;
use crate::llm::{summarize, FanOutResults};
use serde::{Deserialize, Serialize};

/// Everything the providers returned for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResponse {
    /// Item id, or title when the item has no id
    pub item_key: String,
    /// Outcomes keyed by task, then provider
    pub results: FanOutResults,
}

impl EnrichmentResponse {
    /// `(succeeded, failed)` provider calls for this item.
    pub fn counts(&self) -> (usize, usize) {
        summarize(&self.results)
    }
}

/// Judge verdicts for one item's outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub item_key: String,
    pub judgements: Judgements,
}

/// Statistics for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunStats {
    /// Items sent to the providers
    pub items: usize,

    /// Items that could not be prompted (template or task errors)
    pub skipped: usize,

    /// Provider calls that returned output
    pub succeeded: usize,

    /// Provider calls that failed after retries
    pub failed: usize,

    /// Items processed per second
    pub items_per_second: f64,

    /// Total wall time in seconds
    pub total_seconds: f64,
}

impl RunStats {
    /// Add one item's provider counts.
    pub fn record(&mut self, response: &EnrichmentResponse) {
        let (ok, failed) = response.counts();
        self.items += 1;
        self.succeeded += ok;
        self.failed += failed;
    }

    /// Set timing fields from the elapsed wall time.
    pub fn finish(&mut self, elapsed: std::time::Duration) {
        self.total_seconds = elapsed.as_secs_f64();
        self.items_per_second = if self.total_seconds > 0.0 {
            self.items as f64 / self.total_seconds
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FailureKind, ProviderOutcome};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn response() -> EnrichmentResponse {
        let mut providers = BTreeMap::new();
        providers.insert(
            "openai/gpt-4o-mini".to_string(),
            ProviderOutcome::Success {
                text: "Breezy Linen Shirt".into(),
                parsed: None,
                model: "gpt-4o-mini".into(),
                latency_ms: 800,
                tokens_used: Some(31),
                attempts: 1,
            },
        );
        providers.insert(
            "gemini/gemini-1.5-flash".to_string(),
            ProviderOutcome::Failure {
                kind: FailureKind::RateLimited,
                error: "gemini HTTP 429: quota".into(),
                attempts: 1,
            },
        );
        EnrichmentResponse {
            item_key: "sku-1".into(),
            results: BTreeMap::from([("title_enhancement".to_string(), providers)]),
        }
    }

    #[test]
    fn test_response_shape() {
        let json = serde_json::to_value(response()).unwrap();
        let outcome = &json["results"]["title_enhancement"]["openai/gpt-4o-mini"];
        assert_eq!(outcome["status"], "success");
        assert_eq!(outcome["tokens_used"], 31);
        assert_eq!(
            json["results"]["title_enhancement"]["gemini/gemini-1.5-flash"]["kind"],
            "rate_limited"
        );
    }

    #[test]
    fn test_response_deserializes_from_jsonl_line() {
        let line = serde_json::to_string(&response()).unwrap();
        let parsed: EnrichmentResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, response());
    }

    #[test]
    fn test_run_stats() {
        let mut stats = RunStats::default();
        stats.record(&response());
        stats.record(&response());
        stats.finish(Duration::from_secs(4));
        assert_eq!((stats.items, stats.succeeded, stats.failed), (2, 2, 2));
        assert!((stats.items_per_second - 0.5).abs() < 1e-9);
    }
}
