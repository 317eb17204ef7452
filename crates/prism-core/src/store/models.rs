//! Row types for the persistence layer.
//!
//! Timestamps are RFC 3339 strings; SQLite has no native datetime type.

use crate::config::{ResponseFormat, TaskDefinition, TaskKind};
use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A provider/model/temperature combination results are attributed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub model: String,
    pub temperature: f64,
    pub created_at: String,
}

impl Provider {
    /// `name/model`, matching the default result key of a provider spec.
    pub fn key(&self) -> String {
        format!("{}/{}", self.name, self.model)
    }
}

/// A named enrichment or evaluation task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub name: String,
    /// `enrichment` or `evaluation`
    pub kind: String,
    /// `text` or `json`
    pub output_format: String,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub created_at: String,
}

impl Task {
    /// Combine with a template body into a runnable definition.
    pub fn to_definition(&self, template: &str) -> StoreResult<TaskDefinition> {
        let kind = TaskKind::parse(&self.kind)
            .ok_or_else(|| StoreError::Invalid(format!("task kind '{}'", self.kind)))?;
        let output_format = ResponseFormat::parse(&self.output_format).ok_or_else(|| {
            StoreError::Invalid(format!("task output format '{}'", self.output_format))
        })?;
        Ok(TaskDefinition {
            name: self.name.clone(),
            kind,
            output_format,
            template: template.to_string(),
            system: self.system_prompt.clone(),
            description: self.description.clone(),
        })
    }
}

/// One version of a task's prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Template {
    pub id: i64,
    pub task_id: i64,
    pub version: i64,
    pub body: String,
    pub created_at: String,
}

/// A variable referenced by a stored template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Placeholder {
    pub id: i64,
    pub template_id: i64,
    pub name: String,
}

/// One version of the guide for a product type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StylingGuide {
    pub id: i64,
    pub product_type: String,
    pub version: i64,
    pub guide: String,
    pub created_at: String,
}

/// Who produced an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationSource {
    Judge,
    Human,
}

impl EvaluationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationSource::Judge => "judge",
            EvaluationSource::Human => "human",
        }
    }
}

/// A stored score for one output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EvaluationResult {
    pub id: i64,
    pub task_id: i64,
    pub provider_id: Option<i64>,
    pub item_key: String,
    pub output: String,
    pub score: Option<f64>,
    pub reasoning: String,
    /// `judge` or `human`
    pub source: String,
    pub evaluator: String,
    pub created_at: String,
}

/// Input for [`EvaluationRepository::record`](super::EvaluationRepository::record).
#[derive(Debug, Clone)]
pub struct NewEvaluation {
    pub task_id: i64,
    pub provider_id: Option<i64>,
    pub item_key: String,
    pub output: String,
    pub score: Option<f64>,
    pub reasoning: String,
    pub source: EvaluationSource,
    pub evaluator: String,
}

/// Aggregate scores for one task, provider and source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ScoreSummary {
    pub task: String,
    /// `name/model`, or `None` for outputs not tied to a provider
    pub provider: Option<String>,
    pub temperature: Option<f64>,
    pub source: String,
    pub count: i64,
    /// Mean over scored rows only
    pub mean_score: Option<f64>,
}
