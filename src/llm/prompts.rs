//! Form completion and question answering prompts

use crate::llm::{ChatBackend, Completion, SamplingParams};

/// Sampling for the fill pass
pub const FILL_PARAMS: SamplingParams = SamplingParams {
    temperature: 0.3,
    max_tokens: 1500,
};

/// Sampling for question answering
pub const ANSWER_PARAMS: SamplingParams = SamplingParams {
    temperature: 0.4,
    max_tokens: 600,
};

pub const FORM_START: &str = "--- FORM START ---";
pub const FORM_END: &str = "--- FORM END ---";

pub fn fill_prompt(document_text: &str) -> String {
    format!(
        "\nYou are an expert form assistant. The scanned form text below has missing values like 'N/A', 'nan', or '---'.\n\
         Please fill missing values realistically and preserve the original layout.\n\
         \n\
         {FORM_START}\n\
         {document_text}\n\
         {FORM_END}\n"
    )
}

pub fn answer_prompt(filled_text: &str, question: &str) -> String {
    format!(
        "\nYou are reading an AI-filled scanned form.\n\
         \n\
         Form Content:\n\
         {filled_text}\n\
         \n\
         Answer the following question:\n\
         {question}\n"
    )
}

/// Ask the model to replace placeholder values in OCR'd form text
pub async fn fill_missing_fields(backend: &dyn ChatBackend, document_text: &str) -> Completion {
    backend
        .complete(&fill_prompt(document_text), FILL_PARAMS)
        .await
}

/// Ask the model a free-form question about the filled form
pub async fn answer_question(
    backend: &dyn ChatBackend,
    filled_text: &str,
    question: &str,
) -> Completion {
    backend
        .complete(&answer_prompt(filled_text, question), ANSWER_PARAMS)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, SamplingParams)>>,
    }

    #[async_trait]
    impl ChatBackend for Recorder {
        async fn complete(&self, prompt: &str, params: SamplingParams) -> Completion {
            self.calls.lock().push((prompt.to_string(), params));
            Completion::Text("ok".to_string())
        }
    }

    #[test]
    fn test_fill_prompt_wraps_text_in_markers() {
        let prompt = fill_prompt("Name: N/A\nDate: ---");
        let start = prompt.find(FORM_START).unwrap();
        let body = prompt.find("Name: N/A\nDate: ---").unwrap();
        let end = prompt.find(FORM_END).unwrap();
        assert!(start < body && body < end);
        for token in ["'N/A'", "'nan'", "'---'"] {
            assert!(prompt.contains(token), "missing {}", token);
        }
        assert!(prompt.contains("preserve the original layout"));
    }

    #[test]
    fn test_answer_prompt_puts_question_last() {
        let prompt = answer_prompt("Name: Jane", "What is the name?");
        let context = prompt.find("Form Content:\nName: Jane").unwrap();
        let question = prompt
            .find("Answer the following question:\nWhat is the name?")
            .unwrap();
        assert!(context < question);
    }

    #[tokio::test]
    async fn test_fill_uses_fill_sampling() {
        let backend = Recorder::default();
        let result = fill_missing_fields(&backend, "Date: ---").await;
        assert_eq!(result, Completion::Text("ok".to_string()));

        let calls = backend.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, FILL_PARAMS);
        assert!(calls[0].0.contains("Date: ---"));
    }

    #[tokio::test]
    async fn test_answer_uses_answer_sampling() {
        let backend = Recorder::default();
        answer_question(&backend, "Name: Jane", "Who?").await;

        let calls = backend.calls.lock();
        assert_eq!(calls[0].1.temperature, 0.4);
        assert_eq!(calls[0].1.max_tokens, 600);
        assert!(calls[0].0.ends_with("Who?\n"));
    }
}
