//! Playwright browser automation
//!
//! Translates a step sequence into a chromium script and executes it with
//! `node`. The generated script reports its outcome as a single JSON line so
//! timeouts, failed assertions, and driver errors stay distinguishable on
//! this side of the process boundary.

use std::process::{Command, Stdio};

use serde::Deserialize;
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::check::CheckStep;
use crate::error::{VerifyError, VerifyResult};

/// Configuration for the browser run
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    /// Viewport dimensions
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Run without a visible window
    pub headless: bool,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1280,
            viewport_height: 720,
            headless: true,
        }
    }
}

/// Playwright browser handle
pub struct PlaywrightHandle {
    config: PlaywrightConfig,
}

/// Result line printed by the generated script
#[derive(Debug, Deserialize)]
struct ScriptOutcome {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl PlaywrightHandle {
    /// Create a new handle, verifying Playwright is available.
    pub fn new(config: PlaywrightConfig) -> VerifyResult<Self> {
        Self::check_installed()?;
        Ok(Self { config })
    }

    /// Check that Playwright is reachable through npx.
    pub fn check_installed() -> VerifyResult<()> {
        let status = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(s) if s.success() => Ok(()),
            _ => Err(VerifyError::PlaywrightNotFound),
        }
    }

    /// Build the chromium script for a step sequence.
    ///
    /// All steps run inside one try block; the browser is closed in the
    /// finally, so a timeout or failed assertion still releases it.
    pub fn build_script(&self, steps: &[CheckStep]) -> String {
        let mut script = String::new();

        script.push_str(&format!(
            r#"const {{ chromium }} = require('playwright');

(async () => {{
  const browser = await chromium.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();

  try {{
"#,
            headless = self.config.headless,
            width = self.config.viewport_width,
            height = self.config.viewport_height,
        ));

        for (i, step) in steps.iter().enumerate() {
            script.push_str(&format!("\n    // Step {}: {}\n", i + 1, step_name(step)));
            script.push_str(&step_to_js(step, i));
            script.push('\n');
        }

        script.push_str(
            r#"
    console.log(JSON.stringify({ success: true }));
  } catch (error) {
    console.error(JSON.stringify({ success: false, error: error.message, name: error.name }));
    process.exitCode = 1;
  } finally {
    await browser.close();
  }
})();
"#,
        );

        script
    }

    /// Run a step sequence to completion.
    pub async fn run(&self, steps: &[CheckStep]) -> VerifyResult<()> {
        let script = self.build_script(steps);

        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("check.js");
        std::fs::write(&script_path, &script)?;

        debug!("Running Playwright script: {}", script_path.display());

        // The script lives in a temp dir, so require('playwright') must be
        // pointed back at the invoking project's node_modules.
        let node_path = std::env::current_dir()?.join("node_modules");

        let output = TokioCommand::new("node")
            .arg(&script_path)
            .env("NODE_PATH", node_path)
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_failure(&stderr))
    }
}

fn step_name(step: &CheckStep) -> String {
    match step {
        CheckStep::Navigate { url } => format!("navigate:{}", url),
        CheckStep::WaitForText { text, .. } => format!("wait-for-text:{}", text),
        CheckStep::AssertTextContains { selector, .. } => format!("assert:{}", selector),
        CheckStep::Screenshot { path, .. } => format!("screenshot:{}", path.display()),
    }
}

fn step_to_js(step: &CheckStep, index: usize) -> String {
    match step {
        CheckStep::Navigate { url } => {
            format!("    await page.goto('{}');", js_escape(url))
        }
        CheckStep::WaitForText { text, timeout_ms } => {
            format!(
                "    await page.getByText('{}').first().waitFor({{ state: 'visible', timeout: {} }});",
                js_escape(text),
                timeout_ms
            )
        }
        CheckStep::AssertTextContains { selector, needle } => {
            format!(
                r#"    const text_{index} = await page.locator('{sel}').first().textContent();
    if (text_{index} === null || !text_{index}.includes('{needle}')) {{
      throw new Error('assertion failed: first {sel} text ' + JSON.stringify(text_{index}) + ' does not contain {needle}');
    }}"#,
                index = index,
                sel = js_escape(selector),
                needle = js_escape(needle),
            )
        }
        CheckStep::Screenshot { path, full_page } => {
            format!(
                "    await page.screenshot({{ path: '{}', fullPage: {} }});",
                js_escape(&path.to_string_lossy()),
                full_page
            )
        }
    }
}

/// Escape a string for inclusion in a single-quoted JS literal.
fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Map the script's JSON error line to a typed failure.
fn classify_failure(stderr: &str) -> VerifyError {
    for line in stderr.lines().rev() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        let Ok(outcome) = serde_json::from_str::<ScriptOutcome>(line) else {
            continue;
        };
        if outcome.success {
            continue;
        }
        let message = outcome.error.unwrap_or_else(|| "unknown error".to_string());
        return match outcome.name.as_deref() {
            Some("TimeoutError") => VerifyError::Timeout(message),
            _ if message.starts_with("assertion failed") => VerifyError::AssertionFailed(message),
            _ => VerifyError::Playwright(message),
        };
    }

    VerifyError::Playwright(stderr.trim().to_string())
}
