//! The scraper's HTTP reload endpoint.

use async_trait::async_trait;

use crate::effects::ReloadSignal;
use crate::error::{ControlError, ControlResult};

const TARGET: &str = "prometheus reload";

/// Sends `POST /-/reload` to the metrics scraper.
#[derive(Debug, Clone)]
pub struct HttpReloadSignal {
    client: reqwest::Client,
    url: String,
}

impl HttpReloadSignal {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReloadSignal for HttpReloadSignal {
    async fn reload(&self) -> ControlResult<()> {
        let response = self
            .client
            .post(&self.url)
            .send()
            .await
            .map_err(|e| ControlError::external(TARGET, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ControlError::external(
                TARGET,
                format!("prometheus reload failed: {}", status.as_u16()),
            ))
        }
    }
}
