//! Prompt templates.
//!
//! Templates are Jinja-style strings rendered with `minijinja`. The
//! placeholders a template needs are read from its syntax tree, so a
//! missing value is reported by name before rendering starts.

mod context;

pub use context::ItemContext;

use crate::error::TemplateError;
use minijinja::{Environment, UndefinedBehavior};
use serde_json::Value;
use std::collections::BTreeSet;

/// Names minijinja provides globally; never reported as placeholders.
const BUILTIN_GLOBALS: &[&str] = &["range", "dict", "namespace", "debug", "loop", "self"];

/// A parsed prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: String,
    body: String,
    placeholders: Vec<String>,
}

impl PromptTemplate {
    /// Parse `body`, failing on syntax errors.
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Result<Self, TemplateError> {
        let name = name.into();
        let body = body.into();

        let placeholders: BTreeSet<String> = {
            let env = Environment::new();
            let template = env
                .template_from_named_str(&name, &body)
                .map_err(|e| TemplateError::Syntax {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            template
                .undeclared_variables(false)
                .into_iter()
                .filter(|var| !BUILTIN_GLOBALS.contains(&var.as_str()))
                .collect()
        };

        Ok(Self {
            placeholders: placeholders.into_iter().collect(),
            name,
            body,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Top-level variables the template reads, sorted.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Placeholders with no value in `context`.
    pub fn missing_placeholders(&self, context: &Value) -> Vec<String> {
        let keys = context.as_object();
        self.placeholders
            .iter()
            .filter(|p| !keys.is_some_and(|map| map.contains_key(p.as_str())))
            .cloned()
            .collect()
    }

    /// Render against a JSON object context.
    pub fn render(&self, context: &Value) -> Result<String, TemplateError> {
        let missing = self.missing_placeholders(context);
        if !missing.is_empty() {
            return Err(TemplateError::MissingPlaceholders {
                name: self.name.clone(),
                missing,
            });
        }

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        let render_err = |e: minijinja::Error| TemplateError::Render {
            name: self.name.clone(),
            message: e.to_string(),
        };
        env.template_from_named_str(&self.name, &self.body)
            .map_err(render_err)?
            .render(context)
            .map_err(render_err)
    }
}
