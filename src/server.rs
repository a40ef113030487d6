//! MCP Server implementation using rmcp

use crate::config::{AppConfig, ServerConfig};
use crate::pdf::{FILLED_PDF_FILE_NAME, FILLED_PDF_MIME_TYPE};
use crate::session::{Pipeline, QaEntry, SessionHandle, SessionState, SessionStore};
use crate::source::{resolve_base64, resolve_path, UploadedPdf};
use anyhow::Result;
use base64::Engine;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// PDF source specification
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the scanned PDF form
        path: String,
    },
    /// Base64 encoded PDF data
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
}

impl<'de> serde::Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let Some(obj) = value.as_object() else {
            return Err(serde::de::Error::custom(
                "Invalid source: expected an object with \"path\" or \"base64\"",
            ));
        };

        let string_field = |key: &str| -> std::result::Result<Option<String>, D::Error> {
            match obj.get(key) {
                None => Ok(None),
                Some(v) => v.as_str().map(|s| Some(s.to_string())).ok_or_else(|| {
                    serde::de::Error::custom(format!("\"{}\" must be a string", key))
                }),
            }
        };

        if let Some(path) = string_field("path")? {
            return Ok(PdfSource::Path { path });
        }
        if let Some(base64) = string_field("base64")? {
            return Ok(PdfSource::Base64 { base64 });
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(serde::de::Error::custom(format!(
            "Invalid source: expected an object with \"path\" or \"base64\", but got keys: {:?}",
            keys
        )))
    }
}

/// PDF auto-fill MCP server
#[derive(Clone)]
pub struct AutofillServer {
    sessions: Arc<SessionStore>,
    pipeline: Arc<Pipeline>,
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<ServerConfig>,
}

// ============================================================================
// Request/Response types for upload_form
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UploadFormParams {
    /// Scanned PDF form to OCR
    pub source: PdfSource,
    /// Existing session to upload into; a new session is created when omitted
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct UploadFormResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// OCR text for the whole document (pages separated by newlines)
    pub document_text: String,
    /// False when the session already had text and OCR was skipped
    pub ocr_performed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for fill_missing_fields
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SessionParams {
    /// Session id returned by upload_form
    pub session_id: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct FillResult {
    pub session_id: String,
    /// LLM-completed form text, or the error string that replaced it
    pub filled_text: String,
    /// True when filled_text is an error string from the LLM call
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for ask_question
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AskQuestionParams {
    /// Session id returned by upload_form
    pub session_id: String,
    /// Free-form question about the filled form
    pub question: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AskQuestionResult {
    pub session_id: String,
    pub question: String,
    pub answer: String,
    /// True when answer is an error string from the LLM call
    pub is_error: bool,
    /// Number of questions answered in this session so far
    pub history_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for download_filled_pdf
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DownloadParams {
    /// Session id returned by upload_form
    pub session_id: String,
    /// Write the PDF to this path instead of returning it inline
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct DownloadResult {
    pub session_id: String,
    pub file_name: String,
    pub mime_type: String,
    /// PDF size in bytes
    pub size: usize,
    /// Base64 encoded PDF (when no output_path was given)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for get_session
// ============================================================================

#[derive(Debug, Serialize, JsonSchema)]
pub struct QaRecord {
    pub question: String,
    pub answer: String,
    pub is_error: bool,
    /// When the question was asked (RFC 3339)
    pub asked_at: String,
}

impl From<&QaEntry> for QaRecord {
    fn from(entry: &QaEntry) -> Self {
        Self {
            question: entry.question.clone(),
            answer: entry.answer.clone(),
            is_error: entry.is_error,
            asked_at: entry.asked_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SessionSummary {
    pub session_id: String,
    /// Session creation time (RFC 3339)
    pub created_at: String,
    pub document_text: String,
    pub filled_text: String,
    pub filled_is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_extraction_error: Option<String>,
    /// Questions and answers, most recent first
    pub qa_history: Vec<QaRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionSummary {
    fn from_state(state: &SessionState) -> Self {
        Self {
            session_id: state.id().to_string(),
            created_at: state.created_at().to_rfc3339(),
            document_text: state.document_text().to_string(),
            filled_text: state.filled_text().to_string(),
            filled_is_error: state.filled_is_error(),
            last_extraction_error: state.last_extraction_error().map(str::to_string),
            qa_history: state.history_newest_first().map(QaRecord::from).collect(),
            error: None,
        }
    }
}

fn to_json<T: Serialize>(result: &T) -> String {
    serde_json::to_string_pretty(result).unwrap_or_default()
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl AutofillServer {
    /// Create a server around an already-wired pipeline
    pub fn with_pipeline(pipeline: Pipeline, config: ServerConfig) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new(config.max_sessions)),
            pipeline: Arc::new(pipeline),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Create a server with PDFium, Tesseract and the HTTP LLM client from configuration
    pub fn from_config(config: AppConfig) -> crate::error::Result<Self> {
        let pipeline = Pipeline::from_config(&config)?;
        Ok(Self::with_pipeline(pipeline, config.server))
    }

    /// OCR a scanned PDF form into a session
    #[tool(
        description = "Upload a scanned PDF form and extract its text with OCR. Returns a session_id used by the other tools.

Source format: {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}. Passing an existing session_id that already has text skips OCR."
    )]
    async fn upload_form(&self, Parameters(params): Parameters<UploadFormParams>) -> String {
        let result = self.process_upload(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "upload_form failed");
            UploadFormResult {
                session_id: params.session_id.clone(),
                document_text: String::new(),
                ocr_performed: false,
                error: Some(e.client_message()),
            }
        });
        to_json(&result)
    }

    /// Fill placeholder values in the OCR text using the LLM
    #[tool(
        description = "Ask the LLM to replace missing values ('N/A', 'nan', '---') in the session's OCR text with realistic values, preserving layout. Re-running overwrites the previous result."
    )]
    async fn fill_missing_fields(&self, Parameters(params): Parameters<SessionParams>) -> String {
        let result = self.process_fill(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "fill_missing_fields failed");
            FillResult {
                session_id: params.session_id.clone(),
                filled_text: String::new(),
                is_error: true,
                error: Some(e.client_message()),
            }
        });
        to_json(&result)
    }

    /// Answer a question about the filled form
    #[tool(
        description = "Ask a free-form question about the AI-filled form. The question and answer are appended to the session's Q&A history."
    )]
    async fn ask_question(&self, Parameters(params): Parameters<AskQuestionParams>) -> String {
        let result = self.process_ask(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ask_question failed");
            AskQuestionResult {
                session_id: params.session_id.clone(),
                question: params.question.clone(),
                answer: String::new(),
                is_error: true,
                history_len: 0,
                error: Some(e.client_message()),
            }
        });
        to_json(&result)
    }

    /// Render the filled form as a PDF
    #[tool(
        description = "Render the AI-filled text as a PDF (AI_Filled_Form.pdf). Returns base64 data, or writes to output_path when given."
    )]
    async fn download_filled_pdf(&self, Parameters(params): Parameters<DownloadParams>) -> String {
        let result = self.process_download(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "download_filled_pdf failed");
            DownloadResult {
                session_id: params.session_id.clone(),
                file_name: FILLED_PDF_FILE_NAME.to_string(),
                mime_type: FILLED_PDF_MIME_TYPE.to_string(),
                size: 0,
                data_base64: None,
                output_path: None,
                error: Some(e.client_message()),
            }
        });
        to_json(&result)
    }

    /// Show everything a session holds
    #[tool(
        description = "Get a session's OCR text, filled text and Q&A history (most recent first)."
    )]
    async fn get_session(&self, Parameters(params): Parameters<SessionParams>) -> String {
        let result = self.process_get_session(&params).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "get_session failed");
            SessionSummary {
                session_id: params.session_id.clone(),
                created_at: String::new(),
                document_text: String::new(),
                filled_text: String::new(),
                filled_is_error: false,
                last_extraction_error: None,
                qa_history: Vec::new(),
                error: Some(e.client_message()),
            }
        });
        to_json(&result)
    }
}

impl AutofillServer {
    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn resolve_source(&self, source: &PdfSource) -> crate::error::Result<UploadedPdf> {
        let max_bytes = self.config.max_upload_bytes;
        match source {
            PdfSource::Path { path } => {
                let path = self.validate_path_access(path)?;
                resolve_path(path, max_bytes)
            }
            PdfSource::Base64 { base64 } => resolve_base64(base64, max_bytes),
        }
    }

    fn is_allowed(&self, canonical: &Path) -> bool {
        self.config.resource_dirs.iter().any(|dir| {
            std::fs::canonicalize(dir)
                .map(|cd| canonical.starts_with(cd))
                .unwrap_or(false)
        })
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let denied = || crate::error::Error::PathAccessDenied {
            path: path.to_string(),
        };
        let canonical = std::fs::canonicalize(path).map_err(|_| denied())?;

        if self.is_allowed(&canonical) {
            Ok(canonical)
        } else {
            Err(denied())
        }
    }

    /// Validate that an output path is within allowed resource directories.
    /// Canonicalizes the parent directory since the output file may not exist yet.
    fn validate_output_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let denied = || crate::error::Error::PathAccessDenied {
            path: path.to_string(),
        };
        let target = Path::new(path);
        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let file_name = target.file_name().ok_or_else(denied)?;
        let canonical = std::fs::canonicalize(parent)
            .map_err(|_| denied())?
            .join(file_name);

        if self.is_allowed(&canonical) {
            Ok(canonical)
        } else {
            Err(denied())
        }
    }

    fn session(&self, id: &str) -> crate::error::Result<SessionHandle> {
        self.sessions.get(id)
    }

    pub async fn process_upload(
        &self,
        params: &UploadFormParams,
    ) -> crate::error::Result<UploadFormResult> {
        let (session_id, handle) = match &params.session_id {
            Some(id) => (id.clone(), self.session(id)?),
            None => {
                // Reject unreadable sources before a session is allocated
                let uploaded = self.resolve_source(&params.source)?;
                let (id, handle) = self.sessions.create();
                tracing::info!(session = %id, source = %uploaded.source_name, "session created");

                let mut state = handle.lock().await;
                let outcome = self.pipeline.handle_upload(&mut state, uploaded.data).await;
                return Ok(UploadFormResult {
                    session_id: Some(id),
                    document_text: state.document_text().to_string(),
                    ocr_performed: outcome.ocr_performed,
                    error: outcome.error,
                });
            }
        };

        let mut state = handle.lock().await;
        let outcome = if state.has_document() {
            // Same guard as the pipeline; avoids reading the source at all
            self.pipeline.handle_upload(&mut state, Vec::new()).await
        } else {
            let uploaded = self.resolve_source(&params.source)?;
            self.pipeline.handle_upload(&mut state, uploaded.data).await
        };

        Ok(UploadFormResult {
            session_id: Some(session_id),
            document_text: state.document_text().to_string(),
            ocr_performed: outcome.ocr_performed,
            error: outcome.error,
        })
    }

    pub async fn process_fill(&self, params: &SessionParams) -> crate::error::Result<FillResult> {
        let handle = self.session(&params.session_id)?;
        let mut state = handle.lock().await;
        self.pipeline.handle_fill(&mut state).await?;

        Ok(FillResult {
            session_id: params.session_id.clone(),
            filled_text: state.filled_text().to_string(),
            is_error: state.filled_is_error(),
            error: None,
        })
    }

    pub async fn process_ask(
        &self,
        params: &AskQuestionParams,
    ) -> crate::error::Result<AskQuestionResult> {
        let handle = self.session(&params.session_id)?;
        let mut state = handle.lock().await;
        let entry = self
            .pipeline
            .handle_ask(&mut state, &params.question)
            .await?
            .clone();

        Ok(AskQuestionResult {
            session_id: params.session_id.clone(),
            question: entry.question,
            answer: entry.answer,
            is_error: entry.is_error,
            history_len: state.history().len(),
            error: None,
        })
    }

    pub async fn process_download(
        &self,
        params: &DownloadParams,
    ) -> crate::error::Result<DownloadResult> {
        let handle = self.session(&params.session_id)?;
        let pdf = {
            let state = handle.lock().await;
            self.pipeline.handle_download(&state).await?
        };

        let size = pdf.len();
        let (data_base64, output_path) = match &params.output_path {
            Some(path) => {
                let target = self.validate_output_path_access(path)?;
                if let Some(parent) = target.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                std::fs::write(&target, &pdf)?;
                tracing::info!(session = %params.session_id, bytes = size, "filled PDF written");
                (None, Some(path.clone()))
            }
            None => (
                Some(base64::engine::general_purpose::STANDARD.encode(&pdf)),
                None,
            ),
        };

        Ok(DownloadResult {
            session_id: params.session_id.clone(),
            file_name: FILLED_PDF_FILE_NAME.to_string(),
            mime_type: FILLED_PDF_MIME_TYPE.to_string(),
            size,
            data_base64,
            output_path,
            error: None,
        })
    }

    pub async fn process_get_session(
        &self,
        params: &SessionParams,
    ) -> crate::error::Result<SessionSummary> {
        let handle = self.session(&params.session_id)?;
        let state = handle.lock().await;
        Ok(SessionSummary::from_state(&state))
    }
}

impl std::fmt::Debug for AutofillServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutofillServer")
            .field("sessions", &self.sessions)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[tool_handler]
impl ServerHandler for AutofillServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF auto-fill server: upload_form OCRs a scanned PDF form into a session, \
                 fill_missing_fields completes placeholder values with an LLM, \
                 download_filled_pdf renders the result, and ask_question answers questions \
                 about the filled form."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with configuration read from the environment
pub async fn run_server() -> Result<()> {
    run_server_with_config(AppConfig::from_env()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: AppConfig) -> Result<()> {
    let server = AutofillServer::from_config(config)?;

    tracing::info!("PDF auto-fill server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
