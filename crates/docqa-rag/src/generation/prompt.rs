//! Prompt templates for answer generation

/// Instructions given to every backend
pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant that answers questions based on the provided document context.
Use only the information from the context to answer questions. If the context doesn't contain
enough information to answer the question, say so clearly. Be concise and accurate.";

/// Context text plus how many excerpts went into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    pub text: String,
    /// Leading excerpts that made it into `text`, the last possibly truncated
    pub used: usize,
}

/// Prompt builder for document questions
pub struct PromptBuilder;

impl PromptBuilder {
    fn excerpt_header(index: usize) -> String {
        format!("[Document Excerpt {}]:\n", index + 1)
    }

    /// Concatenate excerpts nearest-first, bounded by `max_chars` characters.
    ///
    /// The excerpt that crosses the bound is cut on a char boundary and the
    /// rest are left out. The first excerpt is always present.
    pub fn build_context(excerpts: &[&str], max_chars: usize) -> ContextWindow {
        const SEPARATOR: &str = "\n\n";

        let mut text = String::new();
        let mut len = 0usize;
        let mut used = 0usize;

        for (i, excerpt) in excerpts.iter().enumerate() {
            let header = Self::excerpt_header(i);
            let overhead = header.chars().count() + if i > 0 { SEPARATOR.len() } else { 0 };
            let remaining = max_chars.saturating_sub(len);

            if i > 0 && remaining <= overhead {
                break;
            }

            let budget = remaining.saturating_sub(overhead);
            let excerpt_len = excerpt.chars().count();

            if i > 0 {
                text.push_str(SEPARATOR);
            }
            text.push_str(&header);
            used += 1;

            if excerpt_len <= budget {
                text.push_str(excerpt);
                len += overhead + excerpt_len;
            } else {
                text.extend(excerpt.chars().take(budget));
                tracing::debug!(
                    "Context bound of {} chars reached at excerpt {}, truncated to {} chars",
                    max_chars,
                    i + 1,
                    budget
                );
                break;
            }
        }

        ContextWindow { text, used }
    }

    /// User turn for chat backends
    pub fn build_user_prompt(question: &str, context: &str) -> String {
        format!(
            "Context from documents:\n{context}\n\nQuestion: {question}\n\nPlease provide an answer based on the context above."
        )
    }

    /// Single prompt for completion backends
    pub fn build_prompt(question: &str, context: &str) -> String {
        format!(
            "{}\n\n{}",
            SYSTEM_PROMPT,
            Self::build_user_prompt(question, context)
        )
    }
}
