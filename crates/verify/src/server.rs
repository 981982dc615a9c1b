//! Spawning the preview server for self-contained runs

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use crate::error::{VerifyError, VerifyResult};

/// Handle to a running preview server process
pub struct ServerHandle {
    child: Child,
    pub base_url: String,
    pub port: u16,
}

/// Configuration for spawning the preview server
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Path to the menucheck-server binary
    pub binary_path: PathBuf,

    /// Directory to serve
    pub root_dir: PathBuf,

    /// Port to listen on (None = find a free port)
    pub port: Option<u16>,

    /// Timeout for server startup
    pub startup_timeout: Duration,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("target/debug/menucheck-server"),
            root_dir: PathBuf::from("."),
            port: None,
            startup_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerHandle {
    /// Spawn the preview server and wait until it answers.
    pub async fn spawn(config: SpawnConfig) -> VerifyResult<Self> {
        let port = config.port.unwrap_or_else(find_free_port);
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Spawning preview server on port {}", port);

        let mut cmd = Command::new(&config.binary_path);
        cmd.env("MENUCHECK_ADDR", format!("127.0.0.1:{}", port))
            .env("MENUCHECK_ROOT", &config.root_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = cmd.spawn().map_err(|e| {
            VerifyError::ServerStartup(format!(
                "Failed to spawn {}: {}",
                config.binary_path.display(),
                e
            ))
        })?;

        let handle = ServerHandle {
            child,
            base_url,
            port,
        };

        handle.wait_for_ready(config.startup_timeout).await?;

        info!("Preview server answering at {}", handle.base_url);
        Ok(handle)
    }

    /// Poll until the server responds over HTTP. Any response counts; the
    /// served tree may legitimately 404 the probe path.
    async fn wait_for_ready(&self, timeout: Duration) -> VerifyResult<()> {
        let probe = format!("{}/", self.base_url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;
            if client.get(&probe).send().await.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }

        Err(VerifyError::ServerNotReady(attempts))
    }

    /// Base URL the server is listening on
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the server.
    pub fn stop(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(100));
            }
        }

        // Force kill if still running
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Find a free port to use
fn find_free_port() -> u16 {
    use std::net::TcpListener;

    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to find free port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}
