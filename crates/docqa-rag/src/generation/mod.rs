//! Prompt construction for answer generation

mod prompt;

pub use prompt::{ContextWindow, PromptBuilder, SYSTEM_PROMPT};
