//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// SQLite database holding providers, tasks, templates and evaluations
    pub database_path: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("~/.prism/prism.db"),
        }
    }
}

/// Fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanOutConfig {
    /// Maximum concurrent outbound provider calls
    pub max_concurrent: usize,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self { max_concurrent: 8 }
    }
}

/// Retry settings applied to every provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// Base backoff delay in milliseconds (doubled per retry)
    pub base_delay_ms: u64,

    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            timeout_ms: 60_000,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Where styling guides come from when the database has none.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StylingConfig {
    /// CSV file with `product_type,guide` rows
    pub guides_path: Option<PathBuf>,
}

/// LLM-as-judge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Provider used as the judge; evaluation is disabled when absent
    pub judge: Option<ProviderSpec>,

    /// Judge prompt. Sees `task`, `output` and every item context key.
    pub template: String,

    /// Maximum concurrent judge calls
    pub max_concurrent: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            judge: None,
            template: DEFAULT_JUDGE_TEMPLATE.to_string(),
            max_concurrent: 4,
        }
    }
}

/// Default judge prompt.
pub const DEFAULT_JUDGE_TEMPLATE: &str = "You are reviewing generated e-commerce copy for the task \"{{ task }}\".\n\
Product title: {{ item_title }}\n\
Product type: {{ item_product_type }}\n\
Styling guide: {{ styling_guide }}\n\n\
Generated output:\n{{ output }}\n\n\
Rate the output from 1 (unusable) to 10 (publishable as is). \
Answer with JSON only: {\"score\": <number>, \"reasoning\": \"<one or two sentences>\"}";

/// Provider credentials and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// OpenAI configuration
    pub openai: ApiCredentials,

    /// Google Gemini configuration
    pub gemini: ApiCredentials,

    /// Anthropic configuration
    pub anthropic: ApiCredentials,

    /// RunPod-hosted OpenAI-compatible endpoint
    pub runpod: ApiCredentials,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            openai: ApiCredentials {
                api_key: "${OPENAI_API_KEY}".to_string(),
                endpoint: "https://api.openai.com/v1".to_string(),
            },
            gemini: ApiCredentials {
                api_key: "${GEMINI_API_KEY}".to_string(),
                endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            },
            anthropic: ApiCredentials {
                api_key: "${ANTHROPIC_API_KEY}".to_string(),
                endpoint: "https://api.anthropic.com/v1".to_string(),
            },
            runpod: ApiCredentials {
                api_key: "${RUNPOD_API_KEY}".to_string(),
                endpoint: "https://api.runpod.ai/v2/${RUNPOD_ENDPOINT_ID}/openai/v1".to_string(),
            },
        }
    }
}

/// API key and base URL for one vendor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApiCredentials {
    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Base URL (supports ${ENV_VAR} segments)
    pub endpoint: String,
}

/// One provider/model/temperature tuple to fan out to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Provider identifier ("openai", "gemini", "anthropic", "runpod")
    pub name: String,

    /// Model name (provider-specific)
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Key used in results; defaults to `name/model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn default_temperature() -> f64 {
    0.2
}

fn default_max_tokens() -> u32 {
    1024
}

impl ProviderSpec {
    pub fn new(name: &str, model: &str, temperature: f64) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            temperature,
            max_tokens: default_max_tokens(),
            label: None,
        }
    }

    /// The key this provider's results are stored under.
    pub fn key(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{}/{}", self.name, self.model),
        }
    }
}

/// What a task does with its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Generates listing content
    #[default]
    Enrichment,
    /// Scores existing content
    Evaluation,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Enrichment => "enrichment",
            TaskKind::Evaluation => "evaluation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "enrichment" => Some(Self::Enrichment),
            "evaluation" => Some(Self::Evaluation),
            _ => None,
        }
    }
}

/// Expected shape of a task's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Free text
    #[default]
    Text,
    /// A JSON object, parsed best-effort
    Json,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::Text => "text",
            ResponseFormat::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// A named task with its prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Task name (e.g. "title_enhancement")
    pub name: String,

    #[serde(default)]
    pub kind: TaskKind,

    #[serde(default)]
    pub output_format: ResponseFormat,

    /// minijinja template body
    pub template: String,

    /// Optional system prompt sent alongside the rendered template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TaskDefinition {
    pub fn new(name: &str, template: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: TaskKind::Enrichment,
            output_format: ResponseFormat::Text,
            template: template.to_string(),
            system: None,
            description: None,
        }
    }

    pub fn with_output_format(mut self, format: ResponseFormat) -> Self {
        self.output_format = format;
        self
    }
}

const COPYWRITER_SYSTEM: &str =
    "You are an experienced e-commerce copywriter. Follow the styling guide exactly.";

pub(crate) fn default_providers() -> Vec<ProviderSpec> {
    vec![
        ProviderSpec::new("openai", "gpt-4o-mini", 0.2),
        ProviderSpec::new("gemini", "gemini-1.5-flash", 0.2),
    ]
}

pub(crate) fn default_tasks() -> Vec<TaskDefinition> {
    vec![
        TaskDefinition {
            system: Some(COPYWRITER_SYSTEM.to_string()),
            description: Some("Rewrite the product title".to_string()),
            ..TaskDefinition::new(
                "title_enhancement",
                "Rewrite this product title so it is clear, specific and search friendly.\n\
                 Styling guide: {{ styling_guide }}\n\
                 Product type: {{ item_product_type }}\n\
                 Current title: {{ item_title }}\n\
                 Description: {{ short_description }}\n\
                 Return only the new title.",
            )
        },
        TaskDefinition {
            system: Some(COPYWRITER_SYSTEM.to_string()),
            description: Some("Rewrite the long description".to_string()),
            ..TaskDefinition::new(
                "description_enhancement",
                "Write an improved product description.\n\
                 Styling guide: {{ styling_guide }}\n\
                 Title: {{ item_title }}\n\
                 Short description: {{ short_description }}\n\
                 Current description: {{ long_description }}\n\
                 Return only the description.",
            )
        },
        TaskDefinition {
            description: Some("Extract structured attributes".to_string()),
            ..TaskDefinition::new(
                "attribute_extraction",
                "Extract the product attributes (color, material, size, brand, style) \
                 for this {{ item_product_type }}.\n\
                 Title: {{ item_title }}\n\
                 Description: {{ long_description }}\n\
                 Answer with a single JSON object. Use \"NA\" for unknown values.",
            )
            .with_output_format(ResponseFormat::Json)
        },
    ]
}
