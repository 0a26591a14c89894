// End-to-end: webhook -> extractor -> cache -> feed subscribers

#[cfg(test)]
mod tests {
    use webhook_picks::extract::{Confidence, Extractor};
    use webhook_picks::feed::cache::{FileStore, KeyValueStore, ANALYSES_KEY};
    use webhook_picks::feed::recent::AnalysisFeed;
    use webhook_picks::feed::types::AnalysisRequest;
    use webhook_picks::feed::webhook::WebhookSource;
    use webhook_picks::picks::SavePickData;
    use webhook_picks::pipeline::fetch_and_publish;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const N8N_BODY: &str = r###"[{"output":"## Cowboys vs Eagles\n\n**Favorite:** Cowboys (+130)\n**Underdog:** Eagles (-150)\n\nSharp money is on the Eagles as a live underdog.\n\n**Bobby's Pick:** Eagles ML\n**Confidence:** 72%","sport":"NFL"}]"###;

    async fn mock_webhook(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_fetch_publish_and_watch() {
        let server = mock_webhook(N8N_BODY).await;
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.json");

        // A second process watching the same cache file
        let mut watcher = AnalysisFeed::open(FileStore::open(&cache).unwrap(), 10).unwrap();
        let mut watch_rx = watcher.subscribe();

        let mut feed = AnalysisFeed::open(FileStore::open(&cache).unwrap(), 10).unwrap();
        let mut rx = feed.subscribe();
        let source = WebhookSource::new(server.uri(), 5000).unwrap();
        let request = AnalysisRequest::new(vec!["NFL".into()], "Cowboys, Eagles", "bobby_vegas");

        let record = fetch_and_publish(&source, &mut feed, &Extractor::default(), &request)
            .await
            .unwrap();

        let a = &record.analysis;
        assert_eq!(a.teams, "Cowboys vs Eagles");
        assert_eq!(a.sport, "NFL");
        assert_eq!(a.favorite.as_ref().unwrap().team, "Eagles");
        assert!(a.correction_applied());
        assert!(a.reasoning_text.contains("**Favorite:** Eagles (-150)"));
        assert!(a.reasoning_text.contains("Eagles as a live favorite"));
        assert_eq!(a.recommendation.as_deref(), Some("Eagles ML"));
        assert_eq!(a.confidence, Confidence::High);

        assert_eq!(rx.try_recv().unwrap().id, record.id);

        let stored = FileStore::open(&cache).unwrap().get(ANALYSES_KEY).unwrap().unwrap();
        assert_eq!(stored[0]["id"], record.id.as_str());

        assert_eq!(watcher.refresh().unwrap(), 1);
        assert_eq!(watch_rx.try_recv().unwrap().id, record.id);

        let draft = SavePickData::from_record(&record);
        assert_eq!(draft.sport.as_deref(), Some("NFL"));
        assert_eq!(draft.pick.as_deref(), Some("Eagles ML"));
    }

    #[tokio::test]
    async fn test_webhook_error_publishes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let mut feed = AnalysisFeed::open(FileStore::open(dir.path().join("c.json")).unwrap(), 10).unwrap();
        let source = WebhookSource::new(server.uri(), 5000).unwrap();
        let request = AnalysisRequest::new(vec!["NBA".into()], "", "bobby_vegas");

        let err = fetch_and_publish(&source, &mut feed, &Extractor::default(), &request)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("502"));
        assert!(feed.recent().is_empty());
    }

    #[tokio::test]
    async fn test_cache_survives_restart_capped() {
        let server = mock_webhook("Pick: Over 44.5").await;
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.json");
        let source = WebhookSource::new(server.uri(), 5000).unwrap();
        let request = AnalysisRequest::new(vec!["NFL".into()], "Bills vs Jets", "bobby_vegas");

        {
            let mut feed = AnalysisFeed::open(FileStore::open(&cache).unwrap(), 10).unwrap();
            for _ in 0..12 {
                fetch_and_publish(&source, &mut feed, &Extractor::default(), &request)
                    .await
                    .unwrap();
            }
        }

        let reopened = AnalysisFeed::open(FileStore::open(&cache).unwrap(), 10).unwrap();
        assert_eq!(reopened.recent().len(), 10);
        assert!(reopened.recent().iter().all(|r| r.analysis.teams == "Bills vs Jets"));
    }
}
