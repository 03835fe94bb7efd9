#[cfg(test)]
mod tests;

use crate::config::ConfigError;

pub const QUESTION_PLACEHOLDER: &str = "{question}";
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Arabic instruction prompt: analyse the documents, then answer the question
pub const DEFAULT_PROMPT_TEMPLATE: &str = "حلل الوثائق التالية و افهمها جيدا ثم اجب عن السؤال التالي:\n\nالسؤال: {question}\n\nالوثائق المتاحة: {context}\n\nالإجابة:";

/// A prompt with `{question}` and `{context}` slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Fails unless both placeholders appear in `template`
    #[inline]
    pub fn new(template: impl Into<String>) -> Result<Self, ConfigError> {
        let template = template.into();
        if !template.contains(QUESTION_PLACEHOLDER) || !template.contains(CONTEXT_PLACEHOLDER) {
            return Err(ConfigError::InvalidPromptTemplate);
        }
        Ok(Self { template })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Fill both slots in a single pass
    ///
    /// Placeholder text inside `question` or `context` is inserted literally.
    #[inline]
    pub fn render(&self, question: &str, context: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + question.len() + context.len());
        let mut rest = self.template.as_str();

        loop {
            let next_question = rest.find(QUESTION_PLACEHOLDER);
            let next_context = rest.find(CONTEXT_PLACEHOLDER);

            let (at, placeholder, value) = match (next_question, next_context) {
                (Some(q), Some(c)) if c < q => (c, CONTEXT_PLACEHOLDER, context),
                (Some(q), _) => (q, QUESTION_PLACEHOLDER, question),
                (None, Some(c)) => (c, CONTEXT_PLACEHOLDER, context),
                (None, None) => break,
            };

            let (before, after) = rest.split_at(at);
            out.push_str(before);
            out.push_str(value);
            rest = after.get(placeholder.len()..).unwrap_or_default();
        }

        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    #[inline]
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}
