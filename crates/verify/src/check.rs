//! The price check: what to load, what to wait for, what to assert.

use std::path::{Path, PathBuf};

use crate::error::{VerifyError, VerifyResult};

/// One step of a browser check
#[derive(Debug, Clone, PartialEq)]
pub enum CheckStep {
    /// Load a page
    Navigate { url: String },

    /// Wait for the first element with this text to become visible,
    /// failing once the timeout elapses
    WaitForText { text: String, timeout_ms: u64 },

    /// Assert the first match of a CSS selector has text containing
    /// the needle; fails immediately when it does not
    AssertTextContains { selector: String, needle: String },

    /// Capture a screenshot, overwriting any existing file
    Screenshot { path: PathBuf, full_page: bool },
}

/// The menu price check.
///
/// Defaults encode the standard smoke run: the local preview server, the
/// first dish on the menu, and the Rupee sign its price must render with.
#[derive(Debug, Clone)]
pub struct PriceCheck {
    pub base_url: String,
    pub page: String,
    pub text: String,
    pub selector: String,
    pub needle: String,
    pub timeout_ms: u64,
    pub screenshot: PathBuf,
}

impl Default for PriceCheck {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            page: "index.html".to_string(),
            text: "Pepper Chicken".to_string(),
            selector: ".menu-item-price".to_string(),
            needle: "₹".to_string(),
            timeout_ms: 10_000,
            screenshot: PathBuf::from("verification/verification.png"),
        }
    }
}

impl PriceCheck {
    /// URL of the page under test
    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.page)
    }

    /// The fixed step sequence: load, wait for the dish name, check the
    /// price glyph, capture evidence.
    pub fn steps(&self) -> Vec<CheckStep> {
        vec![
            CheckStep::Navigate { url: self.url() },
            CheckStep::WaitForText {
                text: self.text.clone(),
                timeout_ms: self.timeout_ms,
            },
            CheckStep::AssertTextContains {
                selector: self.selector.clone(),
                needle: self.needle.clone(),
            },
            CheckStep::Screenshot {
                path: self.screenshot.clone(),
                full_page: true,
            },
        ]
    }
}

/// Confirm the screenshot landed on disk and is not empty.
pub fn verify_screenshot(path: &Path) -> VerifyResult<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(VerifyError::EmptyScreenshot(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_check_matches_the_menu_page() {
        let check = PriceCheck::default();
        assert_eq!(check.url(), "http://localhost:8001/index.html");
        assert_eq!(check.timeout_ms, 10_000);
        assert_eq!(check.needle, "₹");
    }

    #[test]
    fn url_join_tolerates_trailing_slash() {
        let check = PriceCheck {
            base_url: "http://127.0.0.1:9000/".to_string(),
            ..Default::default()
        };
        assert_eq!(check.url(), "http://127.0.0.1:9000/index.html");
    }

    #[test]
    fn steps_follow_the_fixed_sequence() {
        let check = PriceCheck::default();
        let steps = check.steps();
        assert_eq!(steps.len(), 4);

        assert!(matches!(&steps[0], CheckStep::Navigate { url } if url.ends_with("index.html")));
        assert!(matches!(
            &steps[1],
            CheckStep::WaitForText { text, timeout_ms: 10_000 } if text == "Pepper Chicken"
        ));
        assert!(matches!(
            &steps[2],
            CheckStep::AssertTextContains { selector, needle }
                if selector == ".menu-item-price" && needle == "₹"
        ));
        assert!(matches!(
            &steps[3],
            CheckStep::Screenshot { full_page: true, .. }
        ));
    }

    #[test]
    fn screenshot_must_exist_and_be_non_empty() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.png");
        assert!(verify_screenshot(&missing).is_err());

        let empty = dir.path().join("empty.png");
        std::fs::write(&empty, b"").unwrap();
        assert!(verify_screenshot(&empty).is_err());

        let real = dir.path().join("shot.png");
        std::fs::write(&real, b"\x89PNG\r\n").unwrap();
        assert!(verify_screenshot(&real).is_ok());
    }
}
