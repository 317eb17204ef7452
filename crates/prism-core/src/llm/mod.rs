//! Provider integrations and the fan-out engine.
//!
//! Each vendor implements [`LlmProvider`]. A [`ProviderHandler`] wraps one
//! configured provider with its temperature, timeout and retry policy, and
//! [`FanOut`] sends each task prompt to every handler concurrently.

pub(crate) mod anthropic;
pub mod fanout;
pub(crate) mod gemini;
pub mod handler;
pub(crate) mod openai;
pub mod provider;
pub mod retry;
pub(crate) mod runpod;

pub use fanout::{summarize, FanOut, FanOutResults, PromptJob, ProviderOutcome};
pub use handler::{Invocation, InvocationFailure, ProviderHandler, RetryPolicy};
pub use provider::{LlmProvider, LlmProviderFactory, LlmRequest, LlmResponse};
pub use retry::FailureKind;
