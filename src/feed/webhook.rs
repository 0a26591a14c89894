use super::types::AnalysisRequest;
use super::AnalysisSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Posts analysis requests to one workflow webhook URL.
pub struct WebhookSource {
    client: Client,
    url: String,
}

impl WebhookSource {
    pub fn new(url: impl Into<String>, request_timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms))
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AnalysisSource for WebhookSource {
    async fn fetch_analysis(&self, request: &AnalysisRequest) -> Result<String> {
        tracing::info!(sport = %request.sport, teams = %request.teams, "requesting analysis");

        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("webhook request to {} failed", self.url))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(sport = %request.sport, "webhook 429 rate limited");
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("webhook {} ({}): {}", request.sport, status, body);
        }

        let body = resp.text().await.context("failed to read webhook response")?;
        tracing::debug!(bytes = body.len(), "webhook response received");
        Ok(body)
    }
}
