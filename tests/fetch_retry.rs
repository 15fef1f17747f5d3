// Fetcher retry, pacing and proxy behavior against a local HTTP server

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use gridiron_data::config::FetchConfig;
    use gridiron_data::feed::fetcher::Fetcher;
    use gridiron_data::feed::identity;
    use gridiron_data::feed::pacing::Pacer;
    use gridiron_data::feed::proxy::{LivenessProbe, ProxyPool};
    use gridiron_data::feed::types::{EgressPoint, FetchError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><body><table id="games"><tbody></tbody></table></body></html>"#;

    fn fetch_config(max_retries: u32) -> FetchConfig {
        FetchConfig {
            max_retries,
            request_timeout_ms: 2000,
            retry_backoff_ms: 0,
            concurrency: 1,
        }
    }

    fn fetcher(max_retries: u32) -> Fetcher {
        Fetcher::new(&fetch_config(max_retries), Arc::new(Pacer::new(Duration::ZERO, 4)), None).unwrap()
    }

    /// Answers every probe the same way and counts them.
    struct FixedProbe {
        alive: bool,
        probes: AtomicUsize,
    }

    impl FixedProbe {
        fn new(alive: bool) -> Arc<Self> {
            Arc::new(Self {
                alive,
                probes: AtomicUsize::new(0),
            })
        }

        fn probes(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LivenessProbe for FixedProbe {
        async fn is_alive(&self, _point: &EgressPoint) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.alive
        }
    }

    /// A local port with nothing listening on it.
    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn pool(addrs: &[String], probe: Arc<FixedProbe>) -> Arc<ProxyPool> {
        let points = addrs.iter().filter_map(|a| EgressPoint::parse(a)).collect();
        Arc::new(ProxyPool::new(points, probe))
    }

    #[tokio::test]
    async fn test_persistent_500_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/teams/kan/2023.htm"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let url = format!("{}/teams/kan/2023.htm", server.uri());
        let err = fetcher(3).fetch(&url).await.unwrap_err();
        match err {
            FetchError::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 4);
                assert!(matches!(*last, FetchError::Status { status: 500, .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/teams/det/2023.htm", server.uri());
        let doc = fetcher(3).fetch(&url).await.unwrap();
        assert_eq!(doc.url(), url);
    }

    #[tokio::test]
    async fn test_blank_body_is_a_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("   \n"))
            .expect(2)
            .mount(&server)
            .await;

        let url = format!("{}/blank", server.uri());
        let err = fetcher(1).fetch(&url).await.unwrap_err();
        match err {
            FetchError::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, FetchError::Parse { .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let err = fetcher(0).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(err.url(), url);
    }

    #[tokio::test]
    async fn test_every_attempt_carries_a_pool_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let url = format!("{}/teams/sea/2023/gamelog.htm", server.uri());
        let _ = fetcher(2).fetch(&url).await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
        for req in requests {
            let ua = req.headers.get("user-agent").unwrap().to_str().unwrap();
            assert!(identity::identities().contains(&ua), "unexpected user agent {ua}");
        }
    }

    #[tokio::test]
    async fn test_proxied_attempts_skip_the_pacer() {
        // an hour per step: any paced attempt would trip the timeout below
        let step = Duration::from_secs(3600);
        let pacer = Arc::new(Pacer::new(step, 4));
        let probe = FixedProbe::new(true);
        let proxies = pool(&[format!("127.0.0.1:{}", closed_port())], probe.clone());
        let fetcher = Fetcher::new(&fetch_config(1), pacer.clone(), Some(proxies)).unwrap();

        let url = "http://stats.test/teams/kan/2023.htm";
        let err = tokio::time::timeout(Duration::from_secs(30), fetcher.fetch(url))
            .await
            .expect("proxied fetch waited on the pacer")
            .unwrap_err();
        match err {
            FetchError::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, FetchError::Transport { .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(probe.probes(), 2);

        // the host's schedule is still at its first step
        let release = pacer.reserve("stats.test").await;
        assert!(release.saturating_duration_since(tokio::time::Instant::now()) <= step);
    }

    #[tokio::test]
    async fn test_dead_pool_falls_back_to_paced_direct_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let step = Duration::from_millis(200);
        let probe = FixedProbe::new(false);
        let proxies = pool(&["10.0.0.1:8080".to_string(), "10.0.0.2:8080".to_string()], probe.clone());
        let fetcher = Fetcher::new(&fetch_config(0), Arc::new(Pacer::new(step, 4)), Some(proxies)).unwrap();

        let url = format!("{}/teams/buf/2023.htm", server.uri());
        let started = std::time::Instant::now();
        let doc = fetcher.fetch(&url).await.unwrap();
        assert_eq!(doc.url(), url);
        assert!(started.elapsed() >= step, "direct request was not paced");
        // one full rotation, each candidate probed once
        assert_eq!(probe.probes(), 2);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried_as_transport_failure() {
        let url = format!("http://127.0.0.1:{}/teams/nwe/2023.htm", closed_port());
        let err = fetcher(2).fetch(&url).await.unwrap_err();
        match err {
            FetchError::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, FetchError::Transport { .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }
}
