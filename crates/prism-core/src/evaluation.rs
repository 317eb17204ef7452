//! Output evaluation: LLM-as-judge scoring and human feedback.
//!
//! A [`Judge`] renders a judging prompt for one generated output and asks a
//! dedicated provider for a score. Human ratings arrive as
//! [`FeedbackRecord`]s. Both end up as evaluation rows in the store.

use crate::config::ProviderSpec;
use crate::error::{EvaluationError, PrismError, Result};
use crate::llm::{FanOutResults, LlmRequest, ProviderHandler, ProviderOutcome};
use crate::parse;
use crate::store::{
    DatabasePool, EvaluationRepository, EvaluationResult, EvaluationSource, NewEvaluation,
    ProviderRepository, TaskRepository,
};
use crate::styling::StylingGuides;
use crate::template::{ItemContext, PromptTemplate};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The judge's verdict on one output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    /// `None` when the judge's answer held no recognisable score
    pub score: Option<f64>,
    pub reasoning: String,
    /// Unparsed judge response
    pub raw: String,
    /// Key of the provider that judged
    pub judge: String,
}

/// Judgements keyed by task, then by the provider that produced the output.
pub type Judgements = BTreeMap<String, BTreeMap<String, Judgement>>;

/// Scores outputs with a dedicated provider.
pub struct Judge {
    handler: ProviderHandler,
    template: PromptTemplate,
    guides: Arc<StylingGuides>,
}

impl Judge {
    pub fn new(
        handler: ProviderHandler,
        template: PromptTemplate,
        guides: Arc<StylingGuides>,
    ) -> Self {
        Self {
            handler,
            template,
            guides,
        }
    }

    /// Key of the judging provider.
    pub fn key(&self) -> &str {
        self.handler.key()
    }

    /// Score `output` produced for `task` on `item`.
    ///
    /// The prompt context is the item context plus `task` and `output`.
    pub async fn judge(
        &self,
        task: &str,
        item: &ItemContext,
        output: &str,
    ) -> std::result::Result<Judgement, EvaluationError> {
        let mut context = item.to_context(&self.guides);
        if let Value::Object(map) = &mut context {
            map.insert("task".to_string(), Value::String(task.to_string()));
            map.insert("output".to_string(), Value::String(output.to_string()));
        }
        let prompt = self.template.render(&context)?;

        let invocation = self
            .handler
            .invoke(&LlmRequest::new(prompt))
            .await
            .map_err(|failure| EvaluationError::JudgeFailed {
                error: failure.error,
                attempts: failure.attempts,
            })?;

        let text = invocation.response.text;
        let score = parse::extract_score(&text);
        if score.is_none() {
            tracing::warn!("Judge {} gave no score for task {task}", self.key());
        }
        Ok(Judgement {
            score,
            reasoning: parse::extract_reasoning(&text),
            raw: text,
            judge: self.key().to_string(),
        })
    }

    /// Judge every successful outcome in `results`, at most
    /// `max_concurrent` at a time. Failed judge calls are logged and left
    /// out.
    pub async fn judge_all(
        &self,
        results: &FanOutResults,
        item: &ItemContext,
        max_concurrent: usize,
    ) -> Judgements {
        let pending: Vec<(&str, &str, &str)> = results
            .iter()
            .flat_map(|(task, providers)| {
                providers.iter().filter_map(move |(key, outcome)| {
                    outcome
                        .text()
                        .map(|text| (task.as_str(), key.as_str(), text))
                })
            })
            .collect();

        let verdicts: Vec<_> = stream::iter(pending)
            .map(|(task, key, text)| async move {
                (task, key, self.judge(task, item, text).await)
            })
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await;

        let mut judgements = Judgements::new();
        for (task, key, verdict) in verdicts {
            match verdict {
                Ok(judgement) => {
                    judgements
                        .entry(task.to_string())
                        .or_default()
                        .insert(key.to_string(), judgement);
                }
                Err(e) => tracing::warn!("Judging {task}/{key} failed: {e}"),
            }
        }
        judgements
    }
}

/// Persist one judgement as a `judge` evaluation row.
pub async fn record_judgement(
    pool: &DatabasePool,
    task_id: i64,
    provider_id: Option<i64>,
    item_key: &str,
    output: &str,
    judgement: &Judgement,
) -> Result<EvaluationResult> {
    let row = EvaluationRepository::record(
        pool,
        &NewEvaluation {
            task_id,
            provider_id,
            item_key: item_key.to_string(),
            output: output.to_string(),
            score: judgement.score,
            reasoning: judgement.reasoning.clone(),
            source: EvaluationSource::Judge,
            evaluator: judgement.judge.clone(),
        },
    )
    .await?;
    Ok(row)
}

/// Outputs of `results` that were judged, with their judgement.
pub fn judged_outputs<'a>(
    results: &'a FanOutResults,
    judgements: &'a Judgements,
) -> impl Iterator<Item = (&'a str, &'a str, &'a str, &'a Judgement)> {
    judgements.iter().flat_map(move |(task, by_provider)| {
        by_provider.iter().filter_map(move |(key, judgement)| {
            match results.get(task).and_then(|p| p.get(key)) {
                Some(ProviderOutcome::Success { text, .. }) => {
                    Some((task.as_str(), key.as_str(), text.as_str(), judgement))
                }
                _ => None,
            }
        })
    })
}

/// A human rating of one output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub task: String,
    pub item_key: String,
    pub output: String,
    /// Result key of the provider that produced the output: a configured
    /// label or `name/model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Pins the provider row when several temperatures share `name/model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub score: f64,
    #[serde(default)]
    pub comment: String,
    #[serde(default = "default_evaluator")]
    pub evaluator: String,
}

fn default_evaluator() -> String {
    "anonymous".to_string()
}

impl FeedbackRecord {
    /// Persist as a `human` evaluation row.
    ///
    /// The task must exist. The provider key is matched against `configured`
    /// first, so labels resolve to their spec. An explicit `temperature`
    /// selects that exact row. A key that matches no stored provider, or a
    /// bare `name/model` shared by several temperatures, is recorded without
    /// a provider link.
    pub async fn save(
        &self,
        pool: &DatabasePool,
        configured: &[ProviderSpec],
    ) -> Result<EvaluationResult> {
        let task = TaskRepository::find_by_name(pool, &self.task)
            .await?
            .ok_or_else(|| PrismError::UnknownTask(self.task.clone()))?;

        let provider_id = self.resolve_provider(pool, configured).await?;
        if self.provider.is_some() && provider_id.is_none() {
            tracing::debug!("Feedback provider {:?} not linked", self.provider);
        }

        let row = EvaluationRepository::record(
            pool,
            &NewEvaluation {
                task_id: task.id,
                provider_id,
                item_key: self.item_key.clone(),
                output: self.output.clone(),
                score: Some(self.score),
                reasoning: self.comment.clone(),
                source: EvaluationSource::Human,
                evaluator: self.evaluator.clone(),
            },
        )
        .await?;
        Ok(row)
    }

    async fn resolve_provider(
        &self,
        pool: &DatabasePool,
        configured: &[ProviderSpec],
    ) -> Result<Option<i64>> {
        let Some(key) = self.provider.as_deref() else {
            return Ok(None);
        };
        let spec = configured.iter().find(|spec| spec.key() == key);
        let (name, model) = match (spec, key.split_once('/')) {
            (Some(spec), _) => (spec.name.as_str(), spec.model.as_str()),
            (None, Some(pair)) => pair,
            (None, None) => return Ok(None),
        };

        let provider = match (self.temperature, spec) {
            (Some(temperature), _) => {
                ProviderRepository::find_by_natural_key(pool, name, model, temperature).await?
            }
            (None, Some(spec)) => {
                Some(ProviderRepository::upsert(pool, name, model, spec.temperature).await?)
            }
            (None, None) => {
                let mut rows = ProviderRepository::list_by_name_and_model(pool, name, model).await?;
                if rows.len() > 1 {
                    tracing::warn!(
                        "Feedback provider {key} matches {} temperatures; pass one to link it",
                        rows.len()
                    );
                    return Ok(None);
                }
                rows.pop()
            }
        };
        Ok(provider.map(|p| p.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderSpec, TaskDefinition, DEFAULT_JUDGE_TEMPLATE};
    use crate::error::LlmError;
    use crate::llm::{FailureKind, RetryPolicy};
    use crate::testing::{memory_database, ScriptedProvider};

    fn judge(provider: ScriptedProvider) -> Judge {
        let handler = ProviderHandler::new(
            Box::new(provider),
            ProviderSpec::new("openai", "gpt-4o", 0.0),
            RetryPolicy {
                max_retries: 0,
                base_delay_ms: 1,
                timeout_ms: 5000,
            },
        );
        let template = PromptTemplate::new("judge", DEFAULT_JUDGE_TEMPLATE).unwrap();
        Judge::new(
            handler,
            template,
            Arc::new(StylingGuides::from_rows([("shirt", "Lead with fabric.")])),
        )
    }

    fn item() -> ItemContext {
        ItemContext {
            item_title: "linen shirt".into(),
            item_product_type: "shirt".into(),
            ..Default::default()
        }
    }

    fn success(text: &str) -> ProviderOutcome {
        ProviderOutcome::Success {
            text: text.into(),
            parsed: None,
            model: "m".into(),
            latency_ms: 1,
            tokens_used: None,
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn test_judge_parses_score_and_reasoning() {
        let judge = judge(ScriptedProvider::success(
            "openai",
            r#"{"score": 8, "reasoning": "Clear and on-brand."}"#,
        ));
        let judgement = judge
            .judge("title_enhancement", &item(), "Breezy Linen Shirt")
            .await
            .unwrap();
        assert_eq!(judgement.score, Some(8.0));
        assert_eq!(judgement.reasoning, "Clear and on-brand.");
        assert_eq!(judgement.judge, "openai/gpt-4o");
    }

    #[tokio::test]
    async fn test_judge_prompt_includes_output_and_guide() {
        let judge = judge(ScriptedProvider::echo("openai"));
        let judgement = judge
            .judge("title_enhancement", &item(), "Breezy Linen Shirt")
            .await
            .unwrap();
        assert!(judgement.raw.contains("Breezy Linen Shirt"));
        assert!(judgement.raw.contains("Lead with fabric."));
        assert!(judgement.raw.contains("title_enhancement"));
    }

    #[tokio::test]
    async fn test_judge_failure() {
        let judge = judge(ScriptedProvider::failing(
            "openai",
            LlmError::Http {
                provider: "openai".into(),
                status: 401,
                message: "bad key".into(),
            },
        ));
        let err = judge.judge("t", &item(), "x").await.unwrap_err();
        match err {
            EvaluationError::JudgeFailed { error, attempts } => {
                assert_eq!(attempts, 1);
                assert_eq!(crate::llm::retry::classify(&error), FailureKind::Auth);
            }
            other => panic!("expected JudgeFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_judge_all_skips_failed_outcomes() {
        let judge = judge(ScriptedProvider::success("openai", "Score: 7"));
        let mut results = FanOutResults::new();
        let titles = results.entry("title_enhancement".to_string()).or_default();
        titles.insert("openai/gpt-4o-mini".into(), success("A"));
        titles.insert("gemini/gemini-1.5-flash".into(), success("B"));
        titles.insert(
            "runpod/mistral".into(),
            ProviderOutcome::Failure {
                kind: FailureKind::Timeout,
                error: "Timeout after 10ms".into(),
                attempts: 3,
            },
        );

        let judgements = judge.judge_all(&results, &item(), 2).await;
        let titles = &judgements["title_enhancement"];
        assert_eq!(titles.len(), 2);
        assert_eq!(titles["openai/gpt-4o-mini"].score, Some(7.0));
        assert!(!titles.contains_key("runpod/mistral"));

        let outputs: Vec<_> = judged_outputs(&results, &judgements)
            .map(|(_, key, text, _)| (key, text))
            .collect();
        assert_eq!(
            outputs,
            vec![("gemini/gemini-1.5-flash", "B"), ("openai/gpt-4o-mini", "A")]
        );
    }

    #[tokio::test]
    async fn test_feedback_saved_as_human() {
        let db = memory_database().await;
        TaskRepository::create(db.pool(), &TaskDefinition::new("title_enhancement", "x"))
            .await
            .unwrap();
        let provider = ProviderRepository::create(db.pool(), "openai", "gpt-4o-mini", 0.2)
            .await
            .unwrap();

        let feedback = FeedbackRecord {
            task: "title_enhancement".into(),
            item_key: "sku-1".into(),
            output: "Breezy Linen Shirt".into(),
            provider: Some("openai/gpt-4o-mini".into()),
            temperature: None,
            score: 9.0,
            comment: "Great".into(),
            evaluator: "reviewer".into(),
        };
        let row = feedback.save(db.pool(), &[]).await.unwrap();
        assert_eq!(row.source, "human");
        assert_eq!(row.provider_id, Some(provider.id));
        assert_eq!(row.reasoning, "Great");
    }

    fn rating(provider: &str, temperature: Option<f64>) -> FeedbackRecord {
        FeedbackRecord {
            task: "title_enhancement".into(),
            item_key: "sku-1".into(),
            output: "Breezy Linen Shirt".into(),
            provider: Some(provider.into()),
            temperature,
            score: 7.0,
            comment: String::new(),
            evaluator: "reviewer".into(),
        }
    }

    #[tokio::test]
    async fn test_feedback_label_links_configured_provider() {
        let db = memory_database().await;
        TaskRepository::create(db.pool(), &TaskDefinition::new("title_enhancement", "x"))
            .await
            .unwrap();
        let cold = ProviderRepository::create(db.pool(), "openai", "gpt-4o", 0.0)
            .await
            .unwrap();
        let hot = ProviderRepository::create(db.pool(), "openai", "gpt-4o", 1.0)
            .await
            .unwrap();
        let mut hot_spec = ProviderSpec::new("openai", "gpt-4o", 1.0);
        hot_spec.label = Some("openai-hot".into());
        let configured = vec![ProviderSpec::new("openai", "gpt-4o", 0.0), hot_spec];

        let row = rating("openai-hot", None)
            .save(db.pool(), &configured)
            .await
            .unwrap();
        assert_eq!(row.provider_id, Some(hot.id));

        let row = rating("openai/gpt-4o", None)
            .save(db.pool(), &configured)
            .await
            .unwrap();
        assert_eq!(row.provider_id, Some(cold.id));
    }

    #[tokio::test]
    async fn test_feedback_temperature_disambiguates() {
        let db = memory_database().await;
        TaskRepository::create(db.pool(), &TaskDefinition::new("title_enhancement", "x"))
            .await
            .unwrap();
        ProviderRepository::create(db.pool(), "openai", "gpt-4o", 0.0)
            .await
            .unwrap();
        let hot = ProviderRepository::create(db.pool(), "openai", "gpt-4o", 1.0)
            .await
            .unwrap();

        let row = rating("openai/gpt-4o", None)
            .save(db.pool(), &[])
            .await
            .unwrap();
        assert_eq!(row.provider_id, None);

        let row = rating("openai/gpt-4o", Some(1.0))
            .save(db.pool(), &[])
            .await
            .unwrap();
        assert_eq!(row.provider_id, Some(hot.id));
    }

    #[tokio::test]
    async fn test_feedback_unknown_task() {
        let db = memory_database().await;
        let feedback: FeedbackRecord = serde_json::from_value(serde_json::json!({
            "task": "nope",
            "item_key": "sku-1",
            "output": "x",
            "score": 3.0
        }))
        .unwrap();
        assert_eq!(feedback.evaluator, "anonymous");
        let err = feedback.save(db.pool(), &[]).await.unwrap_err();
        assert!(matches!(err, PrismError::UnknownTask(ref t) if t == "nope"));
    }

    #[tokio::test]
    async fn test_record_judgement() {
        let db = memory_database().await;
        let task = TaskRepository::create(db.pool(), &TaskDefinition::new("t", "x"))
            .await
            .unwrap();
        let judgement = Judgement {
            score: Some(6.5),
            reasoning: "fine".into(),
            raw: "{}".into(),
            judge: "openai/gpt-4o".into(),
        };
        let row = record_judgement(db.pool(), task.id, None, "sku-1", "out", &judgement)
            .await
            .unwrap();
        assert_eq!(row.source, "judge");
        assert_eq!(row.evaluator, "openai/gpt-4o");
        assert_eq!(row.score, Some(6.5));
    }
}
