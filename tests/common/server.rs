//! Test server management.
//!
//! Spawns and manages relayd instances for integration testing.

use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::Duration;
use tokio::time::sleep;

/// A test server instance.
pub struct TestServer {
    child: Child,
    port: u16,
    data_dir: PathBuf,
    keep_data: bool,
}

impl TestServer {
    /// Spawn a new test server with a fresh data directory.
    pub async fn spawn(port: u16) -> anyhow::Result<Self> {
        let data_dir = std::env::temp_dir().join(format!("relayd-test-{}", port));
        let _ = std::fs::remove_dir_all(&data_dir);
        std::fs::create_dir_all(&data_dir)?;
        Self::spawn_in(port, data_dir, "redb").await
    }

    /// Spawn a test server whose offline store lives in `data_dir`.
    pub async fn spawn_in(port: u16, data_dir: PathBuf, backend: &str) -> anyhow::Result<Self> {
        let store = match backend {
            "json" => "offline.json",
            _ => "offline.redb",
        };
        let config_path = data_dir.join("relayd.toml");
        let config_content = format!(
            r#"
[server]
name = "test.relay"
workers = 2
metrics_port = 0

[listen]
address = "127.0.0.1:{}"

[offline]
backend = "{}"
path = "{}"

[limits]
outbound_queue = 64
"#,
            port,
            backend,
            data_dir.join(store).display()
        );

        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_relayd"))
            .arg(&config_path)
            .spawn()?;

        let server = Self {
            child,
            port,
            data_dir,
            keep_data: false,
        };

        // Wait for server to start listening
        server.wait_until_ready().await?;

        Ok(server)
    }

    /// Wait until the server is accepting connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..30 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 3 seconds")
    }

    /// Get the server address.
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    #[allow(dead_code)]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Create a new test client connected to this server.
    pub async fn connect(&self) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(&self.address()).await
    }

    /// Stop the server but keep its data directory for a restart.
    #[allow(dead_code)]
    pub fn stop(mut self) -> PathBuf {
        self.keep_data = true;
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.data_dir.clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Kill the server process
        let _ = self.child.kill();
        let _ = self.child.wait();

        if !self.keep_data {
            let _ = std::fs::remove_dir_all(&self.data_dir);
        }
    }
}
