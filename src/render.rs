//! Headless-browser page rendering for dynamically loaded tables.
//!
//! The stocking tables on lake detail pages are filled in by script after
//! load, so a plain HTTP GET sees only a loading placeholder. This module
//! renders such pages through headless Chromium, driven by a Playwright
//! script run in a `node` subprocess.
//!
//! # Isolation
//!
//! Every [`BrowserRenderer::render`] call launches its own subprocess and
//! browser, and teardown is process exit. A unit of work therefore never
//! shares rendering state with a concurrent one, and the context is
//! released even when navigation or the wait fails.

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::utils::truncate_for_log;

/// Renders a URL to its post-JavaScript HTML.
pub trait PageRenderer: Send + Sync {
    fn render(&self, url: &str) -> impl Future<Output = Result<String, RenderError>> + Send;
}

/// Why a render failed. All variants are transient for retry purposes.
#[derive(Debug)]
pub enum RenderError {
    /// The subprocess or browser could not be started.
    Launch(String),
    /// Navigation failed or the server answered with an error status.
    Navigation(String),
    /// The page loaded but the readiness selector never appeared.
    WaitTimeout(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Launch(msg) => write!(f, "browser launch failed: {msg}"),
            RenderError::Navigation(msg) => write!(f, "navigation failed: {msg}"),
            RenderError::WaitTimeout(msg) => write!(f, "render wait timed out: {msg}"),
        }
    }
}

impl Error for RenderError {}

/// Playwright script run via `node -e`. Arguments: url, readiness
/// selector, per-operation timeout in ms. Prints the rendered HTML on
/// stdout; exit code 2 marks navigation failures, 3 wait timeouts.
const RENDER_SCRIPT: &str = r#"
const { chromium } = require('playwright');
(async () => {
  const [url, selector, timeoutMs] = process.argv.slice(1);
  const browser = await chromium.launch({ headless: true });
  try {
    const page = await browser.newPage();
    const response = await page.goto(url, { timeout: Number(timeoutMs) });
    if (response && response.status() >= 400) {
      console.error('navigation: HTTP status ' + response.status());
      process.exit(2);
    }
    await page.waitForSelector(selector, { timeout: Number(timeoutMs) });
    process.stdout.write(await page.content());
  } catch (err) {
    if (err.name === 'TimeoutError') {
      console.error('wait: ' + err.message);
      process.exit(3);
    }
    console.error('navigation: ' + err.message);
    process.exit(2);
  } finally {
    await browser.close();
  }
})();
"#;

/// Extra wall-clock allowance for subprocess and browser startup, on top
/// of the navigation and wait budgets.
const LAUNCH_GRACE: Duration = Duration::from_secs(15);

/// [`PageRenderer`] backed by headless Chromium, one subprocess per call.
#[derive(Debug, Clone)]
pub struct BrowserRenderer {
    /// Budget for each of navigation and the readiness wait.
    timeout: Duration,
    /// CSS selector whose appearance marks the page as rendered.
    wait_selector: String,
}

impl BrowserRenderer {
    pub fn new(timeout: Duration, wait_selector: impl Into<String>) -> Self {
        Self {
            timeout,
            wait_selector: wait_selector.into(),
        }
    }
}

impl PageRenderer for BrowserRenderer {
    #[instrument(level = "debug", skip(self), fields(%url))]
    async fn render(&self, url: &str) -> Result<String, RenderError> {
        let budget = self.timeout.saturating_mul(2) + LAUNCH_GRACE;

        let mut command = Command::new("node");
        command
            .arg("-e")
            .arg(RENDER_SCRIPT)
            .arg(url)
            .arg(&self.wait_selector)
            .arg(self.timeout.as_millis().to_string())
            .kill_on_drop(true);

        let output = timeout(budget, command.output())
            .await
            .map_err(|_| RenderError::WaitTimeout(format!("render subprocess exceeded {budget:?}")))?
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        if output.status.success() {
            let html = String::from_utf8_lossy(&output.stdout).into_owned();
            debug!(bytes = html.len(), "Rendered page");
            return Ok(html);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_failure(output.status.code(), stderr.trim()))
    }
}

/// Map the script's exit code and stderr to a typed failure.
fn classify_failure(code: Option<i32>, stderr: &str) -> RenderError {
    let detail = truncate_for_log(stderr, 300);
    match code {
        Some(2) => RenderError::Navigation(detail),
        Some(3) => RenderError::WaitTimeout(detail),
        _ => RenderError::Launch(detail),
    }
}
