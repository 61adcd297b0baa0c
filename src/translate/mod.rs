// Translation module
// Natural language question + retrieved schema -> one SQLite statement


use std::sync::Arc;
use tracing::{debug, info};

use crate::llm::LanguageModel;
use crate::{AskDbError, Result};

pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Opening fences, longest first so `sqlite` wins over `sql`
const OPENING_FENCES: [&str; 4] = ["```sqlite", "```sql", "```SQL", "```"];
const CLOSING_FENCE: &str = "```";

/// Strips markdown code fences from model output.
///
/// Only the delimiters in a fixed table are recognised. Text around the SQL
/// (explanations, follow-up prose) is left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct FenceParser;

impl FenceParser {
    #[inline]
    pub fn strip<'a>(&self, raw: &'a str) -> &'a str {
        let mut text = raw.trim();
        loop {
            let before = text.len();

            if let Some(rest) = OPENING_FENCES
                .iter()
                .find_map(|fence| text.strip_prefix(fence))
            {
                text = rest.trim();
            }
            if let Some(rest) = text.strip_suffix(CLOSING_FENCE) {
                text = rest.trim();
            }

            if text.len() == before {
                return text;
            }
        }
    }
}

/// Remove code fences and surrounding whitespace from a model completion
#[inline]
pub fn strip_code_fences(raw: &str) -> String {
    FenceParser.strip(raw).to_string()
}

/// Prompt asking for a single SQLite statement. The schema block is left out
/// when there is no context.
#[inline]
pub fn build_prompt(question: &str, schema_context: &str) -> String {
    let schema_block = if schema_context.trim().is_empty() {
        String::new()
    } else {
        format!("Relevant database schema:\n{}\n\n", schema_context.trim_end())
    };

    format!(
        "You are a SQL assistant. Convert the following natural language request into an SQLite query.\n\
         Use only the tables and columns that exist in the schema.\n\
         Only return the SQL query, nothing else.\n\n\
         {}User request: {}\n\
         SQL:",
        schema_block, question
    )
}

/// Turns questions into SQL through a [`LanguageModel`]
#[derive(Clone)]
pub struct Translator {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    parser: FenceParser,
}

impl Translator {
    #[inline]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            temperature: DEFAULT_TEMPERATURE,
            parser: FenceParser,
        }
    }

    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[inline]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Translate `question` given the retrieved `schema_context`.
    ///
    /// The model is called exactly once. Its output is fence-stripped but not
    /// validated; invalid SQL surfaces when it is executed.
    #[inline]
    pub async fn translate(&self, question: &str, schema_context: &str) -> Result<String> {
        let prompt = build_prompt(question, schema_context);
        debug!("Translation prompt is {} characters", prompt.len());

        let model = Arc::clone(&self.model);
        let temperature = self.temperature;
        let raw = tokio::task::spawn_blocking(move || model.complete(&prompt, temperature))
            .await
            .map_err(|e| AskDbError::Translation {
                message: format!("Translation task failed: {}", e),
                retryable: false,
            })??;

        let sql = self.parser.strip(&raw).to_string();
        info!("Translated question into SQL: {}", sql);
        Ok(sql)
    }
}

impl std::fmt::Debug for Translator {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator")
            .field("model", &self.model.model_name())
            .field("temperature", &self.temperature)
            .finish()
    }
}
