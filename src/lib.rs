//! PDF Auto-Fill Server Library
//!
//! This crate provides MCP tools for completing scanned PDF forms:
//! - `upload_form`: OCR a scanned PDF into a session
//! - `fill_missing_fields`: Replace placeholder values using an LLM
//! - `ask_question`: Answer questions about the filled form
//! - `download_filled_pdf`: Render the filled text as a PDF
//! - `get_session`: Inspect a session's text and Q&A history

pub mod config;
pub mod error;
pub mod llm;
pub mod ocr;
pub mod pdf;
pub mod server;
pub mod session;
pub mod source;

pub use config::{AppConfig, LlmConfig, OcrConfig, ServerConfig};
pub use error::{Error, Result};
pub use server::{
    run_server, run_server_with_config, AskQuestionParams, AskQuestionResult, AutofillServer,
    DownloadParams, DownloadResult, FillResult, PdfSource, SessionParams, SessionSummary,
    UploadFormParams, UploadFormResult,
};
pub use session::{Pipeline, SessionState, SessionStore};
