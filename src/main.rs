//! PDF Auto-Fill Server - Entry point
//!
//! An MCP server that OCRs scanned PDF forms and completes them with an LLM.

use pdf_autofill_server::run_server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the MCP stdio transport
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_autofill_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting PDF auto-fill server");

    run_server().await
}
