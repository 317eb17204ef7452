//! Prism Core - multi-provider LLM enrichment for product listings.
//!
//! Prism renders one prompt per enrichment task from a listing's fields,
//! sends it to every configured provider at once, and collects the answers
//! keyed by task and provider. Outputs can then be scored by an LLM judge
//! or by people, with scores kept in SQLite.
//!
//! # Architecture
//!
//! ```text
//! Item → Context (+ styling guide) → Templates → FanOut (N providers) → Results
//!                                                           ↓
//!                                              Judge / feedback → Store
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use prism_core::{Config, ItemContext, Prism, StylingGuides};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> prism_core::Result<()> {
//!     let config = Config::load()?;
//!     let prism = Prism::new(config, Arc::new(StylingGuides::new()))?;
//!
//!     let item = ItemContext { item_title: "linen shirt".into(), ..Default::default() };
//!     let response = prism.enrich_item(&item, None).await?;
//!     println!("{}", serde_json::to_string_pretty(&response)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod csv_io;
pub mod error;
pub mod evaluation;
pub mod llm;
pub mod output;
pub mod parse;
pub mod store;
pub mod styling;
pub mod template;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use config::{Config, ProviderSpec, ResponseFormat, TaskDefinition, TaskKind};
pub use error::{
    ConfigError, EvaluationError, LlmError, PrismError, Result, StoreError, TemplateError,
};
pub use evaluation::{FeedbackRecord, Judge, Judgement, Judgements};
pub use llm::{FailureKind, FanOut, FanOutResults, ProviderHandler, ProviderOutcome, RetryPolicy};
pub use output::{OutputFormat, OutputWriter};
pub use store::Database;
pub use styling::StylingGuides;
pub use template::{ItemContext, PromptTemplate};
pub use types::{EnrichmentResponse, EvaluationReport, RunStats};

use llm::{LlmRequest, PromptJob};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use store::{DatabasePool, ProviderRepository, TaskRepository};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A task ready to render.
struct PreparedTask {
    definition: TaskDefinition,
    template: PromptTemplate,
}

/// Public description of a configured task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
    pub kind: TaskKind,
    pub output_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub placeholders: Vec<String>,
}

/// Prism engine - the main entry point for enrichment.
pub struct Prism {
    config: Config,
    guides: Arc<StylingGuides>,
    tasks: BTreeMap<String, PreparedTask>,
    fanout: FanOut,
    judge: Option<Judge>,
}

impl Prism {
    /// Build providers, templates and the optional judge from `config`.
    ///
    /// Providers that can't be constructed (missing key, unknown name) are
    /// logged and skipped. Invalid task templates are an error.
    pub fn new(config: Config, guides: Arc<StylingGuides>) -> Result<Self> {
        let policy = RetryPolicy::from(&config.retry);
        let mut handlers = Vec::with_capacity(config.providers.len());
        for spec in &config.providers {
            match ProviderHandler::from_spec(spec, &config.credentials, policy.clone()) {
                Ok(handler) => handlers.push(handler),
                Err(e) => tracing::warn!("Skipping provider {}: {e}", spec.key()),
            }
        }
        if handlers.is_empty() {
            tracing::warn!("No providers available; enrichment will return empty results");
        }

        let judge = match &config.evaluation.judge {
            Some(spec) => match ProviderHandler::from_spec(spec, &config.credentials, policy) {
                Ok(handler) => {
                    let template = PromptTemplate::new("judge", &config.evaluation.template)?;
                    Some(Judge::new(handler, template, guides.clone()))
                }
                Err(e) => {
                    tracing::warn!("Judge {} unavailable: {e}", spec.key());
                    None
                }
            },
            None => None,
        };

        Self::from_parts(config, guides, handlers, judge)
    }

    /// Assemble from already-built handlers and judge.
    pub fn from_parts(
        config: Config,
        guides: Arc<StylingGuides>,
        handlers: Vec<ProviderHandler>,
        judge: Option<Judge>,
    ) -> Result<Self> {
        tracing::debug!(
            "Initializing Prism v{} with {} provider(s)",
            VERSION,
            handlers.len()
        );
        let tasks = prepare_tasks(&config.tasks)?;
        let fanout = FanOut::new(handlers, config.fanout.max_concurrent);
        Ok(Self {
            config,
            guides,
            tasks,
            fanout,
            judge,
        })
    }

    /// Replace the task set, e.g. with definitions loaded from the store.
    pub fn with_tasks(mut self, definitions: Vec<TaskDefinition>) -> Result<Self> {
        self.tasks = prepare_tasks(&definitions)?;
        self.config.tasks = definitions;
        Ok(self)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn guides(&self) -> &Arc<StylingGuides> {
        &self.guides
    }

    pub fn judge(&self) -> Option<&Judge> {
        self.judge.as_ref()
    }

    /// Result keys of the active providers.
    pub fn provider_keys(&self) -> Vec<String> {
        self.fanout.provider_keys()
    }

    /// Specs of the active providers, in fan-out order.
    pub fn provider_specs(&self) -> Vec<ProviderSpec> {
        self.fanout
            .handlers()
            .iter()
            .map(|h| h.spec().clone())
            .collect()
    }

    /// Enrichment tasks with the placeholders their templates use.
    pub fn tasks(&self) -> Vec<TaskInfo> {
        self.tasks
            .values()
            .map(|task| TaskInfo {
                name: task.definition.name.clone(),
                kind: task.definition.kind,
                output_format: task.definition.output_format,
                description: task.definition.description.clone(),
                placeholders: task.template.placeholders().to_vec(),
            })
            .collect()
    }

    /// Run the selected tasks (all when `task_filter` is `None` or empty)
    /// for one item across every provider.
    pub async fn enrich_item(
        &self,
        item: &ItemContext,
        task_filter: Option<&[String]>,
    ) -> Result<EnrichmentResponse> {
        let selected: Vec<&PreparedTask> = match task_filter {
            Some(names) if !names.is_empty() => names
                .iter()
                .map(|name| {
                    self.tasks
                        .get(name)
                        .ok_or_else(|| PrismError::UnknownTask(name.clone()))
                })
                .collect::<Result<_>>()?,
            _ => self.tasks.values().collect(),
        };

        let context = item.to_context(&self.guides);
        let mut jobs = Vec::with_capacity(selected.len());
        for task in selected {
            let prompt = task.template.render(&context)?;
            jobs.push(PromptJob {
                task: task.definition.name.clone(),
                output_format: task.definition.output_format,
                request: LlmRequest::new(prompt).with_system(task.definition.system.clone()),
            });
        }

        let item_key = item.item_key();
        tracing::debug!("Enriching {item_key}: {} task(s)", jobs.len());
        let results = self.fanout.run(jobs).await;
        Ok(EnrichmentResponse { item_key, results })
    }

    /// Judge every successful output of `response`.
    pub async fn evaluate(
        &self,
        item: &ItemContext,
        response: &EnrichmentResponse,
    ) -> std::result::Result<EvaluationReport, EvaluationError> {
        let judge = self.judge.as_ref().ok_or(EvaluationError::NoJudge)?;
        let judgements = judge
            .judge_all(
                &response.results,
                item,
                self.config.evaluation.max_concurrent,
            )
            .await;
        Ok(EvaluationReport {
            item_key: response.item_key.clone(),
            judgements,
        })
    }

    /// Persist judgements as evaluation rows, registering tasks and
    /// providers as needed. Returns the number of rows written.
    pub async fn save_judgements(
        &self,
        pool: &DatabasePool,
        response: &EnrichmentResponse,
        judgements: &Judgements,
    ) -> Result<usize> {
        let specs: BTreeMap<&str, &ProviderSpec> = self
            .fanout
            .handlers()
            .iter()
            .map(|h| (h.key(), h.spec()))
            .collect();

        let mut written = 0;
        for (task, key, output, judgement) in
            evaluation::judged_outputs(&response.results, judgements)
        {
            let task_row = match self.config.task(task) {
                Some(definition) => TaskRepository::upsert(pool, definition).await?,
                None => TaskRepository::find_by_name(pool, task)
                    .await?
                    .ok_or_else(|| PrismError::UnknownTask(task.to_string()))?,
            };
            let provider_id = match specs.get(key) {
                Some(spec) => Some(
                    ProviderRepository::upsert(pool, &spec.name, &spec.model, spec.temperature)
                        .await?
                        .id,
                ),
                None => None,
            };
            evaluation::record_judgement(
                pool,
                task_row.id,
                provider_id,
                &response.item_key,
                output,
                judgement,
            )
            .await?;
            written += 1;
        }
        Ok(written)
    }
}

fn prepare_tasks(definitions: &[TaskDefinition]) -> Result<BTreeMap<String, PreparedTask>> {
    let mut tasks = BTreeMap::new();
    for definition in definitions {
        if definition.kind != TaskKind::Enrichment {
            continue;
        }
        let template = PromptTemplate::new(&definition.name, &definition.template)?;
        tasks.insert(
            definition.name.clone(),
            PreparedTask {
                definition: definition.clone(),
                template,
            },
        );
    }
    Ok(tasks)
}
