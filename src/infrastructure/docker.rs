use anyhow::{anyhow, Context, Result};
use log;
use std::process::Command;
use std::time::Duration;

const HEALTH_CHECK_ATTEMPTS: u32 = 10;

/// A local Qdrant container this process may start for the Qdrant backend.
#[derive(Debug, Clone)]
pub struct QdrantContainer {
    pub name: String,
    pub http_port: u16,
    pub grpc_port: u16,
}

impl QdrantContainer {
    fn health_endpoint(&self) -> String {
        format!("http://localhost:{}/collections", self.http_port)
    }

    fn run_args(&self) -> Vec<String> {
        vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "-p".to_string(),
            format!("{0}:6333", self.http_port),
            "-p".to_string(),
            format!("{0}:6334", self.grpc_port),
            "qdrant/qdrant".to_string(),
        ]
    }
}

/// Makes sure the container is running and healthy, starting it if needed.
pub async fn ensure_qdrant_via_docker(container: QdrantContainer) -> Result<()> {
    tokio::task::spawn_blocking(move || ensure_qdrant_sync(&container))
        .await
        .context("Docker bootstrap task panicked")?
}

fn ensure_qdrant_sync(container: &QdrantContainer) -> Result<()> {
    Command::new("docker")
        .arg("--version")
        .output()
        .context("Docker is not installed or not runnable")?;

    log::info!("Checking for Qdrant container: {}", container.name);
    let ps = Command::new("docker")
        .args([
            "ps",
            "-a",
            "--filter",
            &format!("name={}", container.name),
            "--format",
            "{{.Status}}",
        ])
        .output()
        .context("Failed to execute docker ps")?;
    if !ps.status.success() {
        return Err(anyhow!(
            "Failed to check container status: {}",
            String::from_utf8_lossy(&ps.stderr)
        ));
    }

    let status = String::from_utf8_lossy(&ps.stdout);
    if status.contains("Up") {
        log::info!("Qdrant container '{}' is already running.", container.name);
    } else if !status.trim().is_empty() {
        log::info!("Qdrant container '{}' exists but is stopped. Starting it...", container.name);
        run_docker(&["start".to_string(), container.name.clone()])?;
    } else {
        log::info!("Qdrant container '{}' not found. Creating it...", container.name);
        run_docker(&container.run_args())?;
    }

    wait_until_healthy(&container.health_endpoint())
}

fn run_docker(args: &[String]) -> Result<()> {
    let output = Command::new("docker")
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute docker {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "docker {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(())
}

fn wait_until_healthy(endpoint: &str) -> Result<()> {
    for attempt in 1..=HEALTH_CHECK_ATTEMPTS {
        match ureq::get(endpoint).timeout(Duration::from_secs(2)).call() {
            Ok(resp) if resp.status() == 200 => {
                log::info!("Qdrant is up at {}", endpoint);
                return Ok(());
            }
            Ok(resp) => log::warn!(
                "Qdrant health check returned {} (attempt {}/{})",
                resp.status(),
                attempt,
                HEALTH_CHECK_ATTEMPTS
            ),
            Err(e) => log::warn!(
                "Qdrant health check failed: {} (attempt {}/{})",
                e,
                attempt,
                HEALTH_CHECK_ATTEMPTS
            ),
        }
        std::thread::sleep(Duration::from_secs(3));
    }
    Err(anyhow!("Qdrant did not become healthy at {}", endpoint))
}
