//! Error types for the smoke check

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server did not answer after {0} attempts")]
    ServerNotReady(usize),

    #[error("Playwright not found. Install with: npm i playwright && npx playwright install chromium")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Timed out waiting for: {0}")]
    Timeout(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Screenshot missing or empty: {}", .0.display())]
    EmptyScreenshot(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl VerifyError {
    /// A failed check, as opposed to a broken environment.
    pub fn is_check_failure(&self) -> bool {
        matches!(
            self,
            VerifyError::Timeout(_)
                | VerifyError::AssertionFailed(_)
                | VerifyError::EmptyScreenshot(_)
        )
    }
}

pub type VerifyResult<T> = Result<T, VerifyError>;
