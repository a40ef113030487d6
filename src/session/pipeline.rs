//! Session transitions: upload → fill → ask, plus on-demand PDF download
//!
//! Each user action is one handler taking the session state by reference.
//! Nothing here clears state; a new document means a new session.

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::llm::{answer_question, fill_missing_fields, ChatBackend, HttpChatClient};
use crate::ocr::{TesseractEngine, TextExtractor};
use crate::pdf::{render_filled_pdf, PdfiumRasterizer};
use crate::session::{QaEntry, SessionState};
use chrono::Utc;
use std::sync::Arc;

/// Result of an upload transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// OCR ran during this call (false when the session already had text)
    pub ocr_performed: bool,
    /// Extraction error to show the user; the document text is empty when set
    pub error: Option<String>,
}

/// The external services a session drives
#[derive(Clone)]
pub struct Pipeline {
    extractor: TextExtractor,
    llm: Arc<dyn ChatBackend>,
}

impl Pipeline {
    pub fn new(extractor: TextExtractor, llm: Arc<dyn ChatBackend>) -> Self {
        Self { extractor, llm }
    }

    /// Wire up PDFium, Tesseract and the HTTP chat client from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let rasterizer =
            PdfiumRasterizer::new(config.ocr.dpi, config.ocr.pdfium_library_path.clone());
        let engine = TesseractEngine::from_config(&config.ocr);
        let llm = HttpChatClient::new(&config.llm)?;

        tracing::info!(model = llm.model(), endpoint = %config.llm.endpoint, "LLM client ready");

        Ok(Self::new(
            TextExtractor::new(Arc::new(rasterizer), Arc::new(engine)),
            Arc::new(llm),
        ))
    }

    /// Run OCR on the uploaded PDF unless this session already has document text.
    ///
    /// Extraction failures are reported in the outcome, never as `Err`; the
    /// session keeps an empty document so the user can upload again.
    pub async fn handle_upload(&self, state: &mut SessionState, data: Vec<u8>) -> UploadOutcome {
        if state.has_document() {
            tracing::debug!(session = state.id(), "document already extracted, skipping OCR");
            return UploadOutcome {
                ocr_performed: false,
                error: None,
            };
        }

        match self.extractor.extract(data).await {
            Ok(text) => {
                tracing::info!(session = state.id(), chars = text.len(), "OCR complete");
                state.document_text = text;
                state.last_extraction_error = None;
                UploadOutcome {
                    ocr_performed: true,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(session = state.id(), error = %e, "PDF processing failed");
                let message = format!("❌ PDF processing error: {}", e.client_message());
                state.document_text.clear();
                state.last_extraction_error = Some(message.clone());
                UploadOutcome {
                    ocr_performed: true,
                    error: Some(message),
                }
            }
        }
    }

    /// Ask the LLM to fill placeholder values; the result (or error string) becomes the filled text
    pub async fn handle_fill<'s>(&self, state: &'s mut SessionState) -> Result<&'s str> {
        if !state.has_document() {
            return Err(Error::MissingDocumentText);
        }

        let completion = fill_missing_fields(self.llm.as_ref(), state.document_text()).await;
        state.filled_is_error = completion.is_error();
        if state.filled_is_error {
            tracing::warn!(session = state.id(), "fill returned an error string");
        }
        state.filled_text = completion.into_text();

        Ok(state.filled_text())
    }

    /// Answer a question about the filled text and append it to the history
    pub async fn handle_ask<'s>(
        &self,
        state: &'s mut SessionState,
        question: &str,
    ) -> Result<&'s QaEntry> {
        if !state.is_filled() {
            return Err(Error::MissingFilledText);
        }
        if question.trim().is_empty() {
            return Err(Error::EmptyQuestion);
        }

        let completion = answer_question(self.llm.as_ref(), state.filled_text(), question).await;
        let is_error = completion.is_error();
        let entry = QaEntry {
            question: question.to_string(),
            answer: completion.into_text(),
            is_error,
            asked_at: Utc::now(),
        };

        tracing::debug!(
            session = state.id(),
            history_len = state.history().len() + 1,
            is_error,
            "question answered"
        );
        Ok(state.push_answer(entry))
    }

    /// Render the filled text as a downloadable PDF on the blocking pool
    pub async fn handle_download(&self, state: &SessionState) -> Result<Vec<u8>> {
        if !state.is_filled() {
            return Err(Error::MissingFilledText);
        }

        let text = state.filled_text().to_string();
        tokio::task::spawn_blocking(move || render_filled_pdf(&text))
            .await
            .map_err(|e| Error::TaskJoin {
                reason: e.to_string(),
            })?
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}
