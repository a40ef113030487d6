//! Server configuration
//!
//! Only the LLM credential and model override come from the environment.
//! Everything else is plain struct defaults that embedders can override.

use std::collections::HashMap;
use std::time::Duration;

/// Environment variable holding the bearer token for the chat-completion API
pub const API_KEY_VAR: &str = "GROQ_API_KEY";
/// Environment variable overriding the model identifier
pub const MODEL_VAR: &str = "GROQ_MODEL";

/// Default chat-completion endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
/// Default model identifier
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";

/// Remote LLM settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat-completion endpoint URL
    pub endpoint: String,
    /// Bearer token; an empty key is sent as-is and rejected by the remote side
    pub api_key: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Upper bound for a single request/response round trip
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// OCR pipeline settings
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Path to the tesseract binary (default: "tesseract", relies on PATH)
    pub tesseract_path: String,
    /// Tesseract language code
    pub language: String,
    /// Rasterization resolution for scanned pages
    pub dpi: u16,
    /// Per-page OCR timeout
    pub page_timeout: Duration,
    /// Directory containing the PDFium shared library, if not installed system-wide
    pub pdfium_library_path: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: "tesseract".to_string(),
            language: "eng".to_string(),
            dpi: 200,
            page_timeout: Duration::from_secs(120),
            pdfium_library_path: None,
        }
    }
}

/// Security and resource configuration for the MCP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories that path sources and output paths must live in (empty: no restriction)
    pub resource_dirs: Vec<String>,
    /// Maximum accepted PDF size in bytes (default: 50MB)
    pub max_upload_bytes: u64,
    /// Maximum number of live sessions before LRU eviction (default: 100)
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            max_upload_bytes: 50 * 1024 * 1024, // 50MB
            max_sessions: 100,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub ocr: OcrConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Build the configuration from a provided variable map (useful for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let mut config = Self::default();

        match vars.get(API_KEY_VAR) {
            Some(key) if !key.is_empty() => config.llm.api_key = key.clone(),
            _ => tracing::warn!(
                var = API_KEY_VAR,
                "API key not set; LLM requests will be rejected by the remote service"
            ),
        }

        if let Some(model) = vars.get(MODEL_VAR).filter(|m| !m.is_empty()) {
            config.llm.model = model.clone();
        }

        config
    }
}
