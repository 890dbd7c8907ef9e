//! Container control through the `docker` CLI.

use async_trait::async_trait;
use tokio::process::Command;

use crate::effects::ContainerControl;
use crate::error::{ControlError, ControlResult};

/// Restarts and inspects containers by shelling out to the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerControl for DockerCli {
    async fn restart(&self, name: &str) -> ControlResult<()> {
        let output = Command::new(&self.binary)
            .arg("restart")
            .arg(name)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ControlError::external(format!("restart {}", name), e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ControlError::external(
                format!("restart {}", name),
                format!("docker exited with {}: {}", output.status, stderr.trim()),
            ))
        }
    }

    async fn is_running(&self, name: &str) -> bool {
        let output = Command::new(&self.binary)
            .args(["inspect", "--format", "{{.State.Running}}", name])
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).trim() == "true"
            }
            Ok(_) => false,
            Err(e) => {
                tracing::debug!(container = %name, error = %e, "Container inspection failed");
                false
            }
        }
    }
}

/// Used when container control is switched off: restarts succeed without
/// doing anything and nothing reports as running.
#[derive(Debug, Clone, Default)]
pub struct DisabledContainerControl;

#[async_trait]
impl ContainerControl for DisabledContainerControl {
    async fn restart(&self, name: &str) -> ControlResult<()> {
        tracing::debug!(container = %name, "Container control disabled, skipping restart");
        Ok(())
    }

    async fn is_running(&self, _name: &str) -> bool {
        false
    }
}
