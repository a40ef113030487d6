//! Tesseract CLI engine
//!
//! Each page image is written as PNG to a temporary directory and handed to
//! `tesseract <image> stdout -l <lang>`. A run that outlives the page timeout
//! is dropped, which kills the child process.

use crate::config::OcrConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use image::DynamicImage;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Recognizes the text on a single page image
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

/// OCR engine that shells out to the tesseract binary
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: String,
    language: String,
    timeout: Duration,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<String>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            timeout,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(
            config.tesseract_path.clone(),
            config.language.clone(),
            config.page_timeout,
        )
    }

    /// Check whether the configured binary can be executed
    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn run(&self, image_path: &std::path::Path) -> Result<String> {
        let child = Command::new(&self.binary)
            .arg(image_path.as_os_str())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Ocr {
                reason: format!(
                    "Failed to run tesseract (is it installed? path='{}'): {}",
                    self.binary, e
                ),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                tracing::warn!(seconds = self.timeout.as_secs(), "tesseract timed out, killed");
                return Err(Error::OcrTimeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            return Err(Error::Ocr {
                reason: format!(
                    "tesseract failed (exit code {}): {}",
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let temp_dir = tempfile::tempdir()?;
        let image_path = temp_dir.path().join("page.png");

        // PNG encoding is CPU-bound
        let page = image.clone();
        let target = image_path.clone();
        tokio::task::spawn_blocking(move || {
            page.save_with_format(&target, image::ImageFormat::Png)
        })
        .await
        .map_err(|e| Error::TaskJoin {
            reason: e.to_string(),
        })?
        .map_err(|e| Error::Ocr {
            reason: format!("Failed to write page image: {}", e),
        })?;

        self.run(&image_path).await
    }
}
