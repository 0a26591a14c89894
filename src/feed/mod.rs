pub mod cache;
pub mod recent;
pub mod types;
pub mod webhook;

use anyhow::Result;
use async_trait::async_trait;
use types::AnalysisRequest;

/// Anything that can answer an analysis request with a raw response body.
#[async_trait]
pub trait AnalysisSource: Send + Sync {
    async fn fetch_analysis(&self, request: &AnalysisRequest) -> Result<String>;
}
