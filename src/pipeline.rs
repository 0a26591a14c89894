use crate::extract::{AnalysisRecord, Extractor};
use crate::feed::cache::KeyValueStore;
use crate::feed::recent::AnalysisFeed;
use crate::feed::types::AnalysisRequest;
use crate::feed::AnalysisSource;
use anyhow::{Context, Result};

/// Request an analysis, extract it and publish the record to the feed.
///
/// Teams and sport missing from the response are taken from the request.
pub async fn fetch_and_publish<S: KeyValueStore>(
    source: &dyn AnalysisSource,
    feed: &mut AnalysisFeed<S>,
    extractor: &Extractor,
    request: &AnalysisRequest,
) -> Result<AnalysisRecord> {
    let body = source
        .fetch_analysis(request)
        .await
        .with_context(|| format!("analysis request for {} failed", request.sport))?;
    if body.trim().is_empty() {
        anyhow::bail!("webhook returned an empty response for {}", request.sport);
    }

    let mut analysis = extractor.extract(&body);
    if analysis.teams.is_empty() {
        if let Some(matchup) = request.matchup() {
            analysis.teams = matchup.to_string();
        }
    }
    if analysis.sport.is_empty() {
        analysis.sport = request.sport.clone();
    }
    if analysis.persona.is_none() && !request.persona.is_empty() {
        analysis.persona = Some(request.persona.clone());
    }

    if let Some(correction) = &analysis.correction {
        tracing::warn!(sport = %analysis.sport, note = %correction.note, "corrected favorite/underdog labels");
    }

    let record = AnalysisRecord::new(analysis);
    feed.publish(record.clone())?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::cache::MemoryStore;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl AnalysisSource for Canned {
        async fn fetch_analysis(&self, _request: &AnalysisRequest) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_fills_request_fields() {
        let mut feed = AnalysisFeed::open(MemoryStore::new(), 10).unwrap();
        let request = AnalysisRequest::new(vec!["NBA".into()], "Lakers, Warriors", "bobby_vegas");
        let record = fetch_and_publish(&Canned("Pick: Under 228.5"), &mut feed, &Extractor::default(), &request)
            .await
            .unwrap();
        assert_eq!(record.analysis.teams, "Lakers vs Warriors");
        assert_eq!(record.analysis.sport, "NBA");
        assert_eq!(record.analysis.persona.as_deref(), Some("bobby_vegas"));
        assert_eq!(record.analysis.recommendation.as_deref(), Some("Under 228.5"));
        assert_eq!(feed.recent().latest().unwrap().id, record.id);
    }

    #[tokio::test]
    async fn test_general_request_leaves_teams_empty() {
        let mut feed = AnalysisFeed::open(MemoryStore::new(), 10).unwrap();
        let request = AnalysisRequest::new(vec!["NFL".into()], "", "bobby_vegas");
        let record = fetch_and_publish(&Canned("nothing labeled"), &mut feed, &Extractor::default(), &request)
            .await
            .unwrap();
        assert_eq!(record.analysis.teams, "");
    }

    #[tokio::test]
    async fn test_empty_body_is_error() {
        let mut feed = AnalysisFeed::open(MemoryStore::new(), 10).unwrap();
        let request = AnalysisRequest::new(vec!["NBA".into()], "", "bobby_vegas");
        let result = fetch_and_publish(&Canned("  \n"), &mut feed, &Extractor::default(), &request).await;
        assert!(result.is_err());
        assert!(feed.recent().is_empty());
    }
}
