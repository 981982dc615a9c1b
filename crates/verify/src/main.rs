//! Smoke-check entry point.
//!
//! With no flags this performs the standard run against a preview server
//! already listening on port 8001. Exit code 0 on success, 1 when the page
//! fails the check, 2 when the environment is broken (no server, no
//! Playwright).

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use menucheck_verify::check::{verify_screenshot, PriceCheck};
use menucheck_verify::{
    PlaywrightConfig, PlaywrightHandle, ServerHandle, SpawnConfig, VerifyResult,
};

#[derive(Parser, Debug)]
#[command(name = "menucheck-verify")]
#[command(about = "Headless-browser smoke check for the menu site")]
struct Args {
    /// Base URL of the running preview server
    #[arg(long, default_value = "http://localhost:8001")]
    base_url: String,

    /// Page to load, relative to the base URL
    #[arg(long, default_value = "index.html")]
    page: String,

    /// Text that must become visible on the page
    #[arg(long, default_value = "Pepper Chicken")]
    text: String,

    /// Selector whose first match is price-checked
    #[arg(long, default_value = ".menu-item-price")]
    selector: String,

    /// Substring the price text must contain
    #[arg(long, default_value = "₹")]
    needle: String,

    /// How long to wait for the text, in milliseconds
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,

    /// Where to write the screenshot
    #[arg(long, default_value = "verification/verification.png")]
    screenshot: PathBuf,

    /// Spawn the preview server first instead of expecting one
    #[arg(long)]
    with_server: bool,

    /// Directory to serve when spawning the server
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Path to the server binary used with --with-server
    #[arg(long, default_value = "target/debug/menucheck-server")]
    server_binary: PathBuf,

    /// Run the browser with a visible window
    #[arg(long)]
    headed: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    match rt.block_on(run(args)) {
        Ok(()) => {}
        Err(e) if e.is_check_failure() => {
            eprintln!("check failed: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn run(args: Args) -> VerifyResult<()> {
    let mut server: Option<ServerHandle> = None;
    let mut base_url = args.base_url.clone();

    if args.with_server {
        let handle = ServerHandle::spawn(SpawnConfig {
            binary_path: args.server_binary.clone(),
            root_dir: args.root.clone(),
            port: None,
            startup_timeout: Duration::from_secs(10),
        })
        .await?;
        base_url = handle.base_url().to_string();
        server = Some(handle);
    }

    let check = PriceCheck {
        base_url,
        page: args.page,
        text: args.text,
        selector: args.selector,
        needle: args.needle,
        timeout_ms: args.timeout_ms,
        screenshot: args.screenshot,
    };

    if let Some(parent) = check.screenshot.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let playwright = PlaywrightHandle::new(PlaywrightConfig {
        headless: !args.headed,
        ..Default::default()
    })?;
    playwright.run(&check.steps()).await?;

    verify_screenshot(&check.screenshot)?;
    info!(
        "menu page verified, screenshot at {}",
        check.screenshot.display()
    );

    drop(server);
    Ok(())
}
