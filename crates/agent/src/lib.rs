//! Language-model integration for the voice-note assistant.
//!
//! This crate is the only place that talks to the chat backend:
//! - `llm` - the `ChatClient` seam and the Ollama implementation behind it
//! - `classifier` - transcript -> intent classification with the fallback
//!   policy for malformed or low-confidence model output
//! - `summarize` - fixed-prompt news summarization
//!
//! # Safety Principle
//!
//! The model is strictly a translator. It proposes an intent and parameters;
//! whether and how that intent is executed is decided deterministically by
//! the flow engine. Unreliable model output degrades to the catch-all note
//! intent, never to an error.

pub mod classifier;
pub mod llm;
pub mod summarize;

pub use classifier::{Classification, IntentClassifier};
pub use llm::{ChatClient, ChatMessage, LlmError, OllamaChatClient};
pub use summarize::Summarizer;
