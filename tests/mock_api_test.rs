// Adapter behavior against a stubbed HTTP service: watcher deduplication
// across poll ticks, the Dependency-Track overwrite policy, and the
// create-once-per-project guarantee of both remote consumers.

use sbommv::transfer::record::SbomRecord;

fn cdx_record(path: &str) -> SbomRecord {
    SbomRecord::new(
        br#"{"bomFormat":"CycloneDX","specVersion":"1.5","version":1}"#.to_vec(),
        path,
        "sigstore/cosign",
        "latest",
    )
}

mod watcher_tests {
    use super::cdx_record;
    use httpmock::prelude::*;
    use sbommv::adapters::github::{GithubConfig, GithubMethod, GithubProducer};
    use sbommv::adapters::watcher::cache::WatcherCache;
    use sbommv::adapters::watcher::WatcherProducer;
    use sbommv::ports::Producer;
    use sbommv::transfer::context::{ProcessingMode, TransferContext};
    use std::time::Duration;

    /// A second tick against an unchanged upstream emits nothing and never
    /// re-enters acquisition: the release endpoint keeps being polled, but
    /// assets are listed and downloaded exactly once.
    #[tokio::test]
    async fn test_unchanged_release_emits_nothing_on_later_ticks() {
        let server = MockServer::start_async().await;

        let releases = server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/sigstore/cosign/releases");
                then.status(200).json_body(serde_json::json!([{
                    "id": 1001,
                    "tag_name": "v1.0.0",
                    "published_at": "2024-03-01T10:00:00Z"
                }]));
            })
            .await;
        let assets = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/repos/sigstore/cosign/releases/1001/assets");
                then.status(200).json_body(serde_json::json!([{
                    "name": "cosign.cdx.json",
                    "browser_download_url": server.url("/dl/cosign.cdx.json"),
                    "size": 64
                }]));
            })
            .await;
        let download = server
            .mock_async(|when, then| {
                when.method(GET).path("/dl/cosign.cdx.json");
                then.status(200)
                    .body(cdx_record("cosign.cdx.json").data);
            })
            .await;

        let producer = GithubProducer::new(GithubConfig {
            url: format!("http://{}/sigstore/cosign", server.address()),
            method: GithubMethod::Release,
            branch: None,
            include_repos: vec![],
            exclude_repos: vec![],
            token: None,
            mode: ProcessingMode::Sequential,
        })
        .unwrap();

        let cache_dir = tempfile::tempdir().unwrap();
        let cache = WatcherCache::load(cache_dir.path().join("cache.json"));
        let watcher = WatcherProducer::new(producer, cache, "folder", Duration::from_millis(100));

        let ctx = TransferContext::new("github", "folder");
        let mut stream = watcher.fetch(&ctx).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("first tick should deliver the asset")
            .expect("stream ended prematurely");
        assert_eq!(first.path, "cosign.cdx.json");

        // Leave the loop running across several more ticks; upstream is
        // unchanged, so nothing further may arrive.
        let second = tokio::time::timeout(Duration::from_millis(1500), stream.next()).await;
        assert!(second.is_err(), "unchanged release must not re-deliver");

        assert!(releases.hits_async().await >= 2, "polling should continue");
        assert_eq!(assets.hits_async().await, 1);
        assert_eq!(download.hits_async().await, 1);

        ctx.cancel.cancel();
    }
}

mod dtrack_tests {
    use super::cdx_record;
    use httpmock::prelude::*;
    use sbommv::adapters::dtrack::{DtrackConfig, DtrackConsumer};
    use sbommv::ports::Consumer;
    use sbommv::transfer::context::{ProcessingMode, TransferContext};
    use sbommv::transfer::stream::SbomStream;

    // Registers the two endpoints the pre-run health check probes.
    async fn stub_health(server: &MockServer) {
        for path in ["/health", "/api/version"] {
            server
                .mock_async(|when, then| {
                    when.method(GET).path(path);
                    then.status(200);
                })
                .await;
        }
    }

    fn consumer(server: &MockServer, overwrite: bool, mode: ProcessingMode) -> DtrackConsumer {
        DtrackConsumer::new(DtrackConfig {
            url: server.base_url(),
            api_key: Some("odt_key".to_string()),
            project_name: Some("guardian".to_string()),
            project_version: "latest".to_string(),
            overwrite,
            mode,
        })
        .unwrap()
    }

    /// Without overwrite, a project that already carries a BOM is skipped,
    /// and the skip still counts as a success.
    #[tokio::test]
    async fn test_existing_bom_skipped_without_overwrite() {
        let server = MockServer::start_async().await;
        stub_health(&server).await;
        let lookup = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/project");
                then.status(200).json_body(serde_json::json!({
                    "uuid": "u-1",
                    "lastBomImport": 1_700_000_000_000u64
                }));
            })
            .await;
        let bom = server
            .mock_async(|when, then| {
                when.method(PUT).path("/api/v1/bom");
                then.status(200);
            })
            .await;

        let consumer = consumer(&server, false, ProcessingMode::Sequential);
        let ctx = TransferContext::new("folder", "dtrack");
        let stream = SbomStream::from_records(vec![cdx_record("bom.json")]);

        let summary = consumer.upload(&ctx, stream).await.unwrap();
        assert_eq!(summary.success, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(lookup.hits_async().await, 1);
        assert_eq!(bom.hits_async().await, 0, "skip must not upload");
    }

    /// With overwrite, the existing BOM does not stop the upload.
    #[tokio::test]
    async fn test_existing_bom_replaced_with_overwrite() {
        let server = MockServer::start_async().await;
        stub_health(&server).await;
        let _lookup = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/project");
                then.status(200).json_body(serde_json::json!({
                    "uuid": "u-1",
                    "lastBomImport": 1_700_000_000_000u64
                }));
            })
            .await;
        let bom = server
            .mock_async(|when, then| {
                when.method(PUT).path("/api/v1/bom");
                then.status(200);
            })
            .await;

        let consumer = consumer(&server, true, ProcessingMode::Sequential);
        let ctx = TransferContext::new("folder", "dtrack");
        let stream = SbomStream::from_records(vec![cdx_record("bom.json")]);

        let summary = consumer.upload(&ctx, stream).await.unwrap();
        assert_eq!(summary.success, 1);
        assert_eq!(bom.hits_async().await, 1);
    }

    /// Parallel workers racing the same project label create it exactly once.
    #[tokio::test]
    async fn test_parallel_upload_creates_project_once() {
        let server = MockServer::start_async().await;
        stub_health(&server).await;
        let lookup = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/project");
                then.status(404);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/api/v1/project");
                then.status(201);
            })
            .await;
        let bom = server
            .mock_async(|when, then| {
                when.method(PUT).path("/api/v1/bom");
                then.status(200);
            })
            .await;

        let consumer = consumer(&server, true, ProcessingMode::Parallel);
        let ctx = TransferContext::new("folder", "dtrack");
        let records = (0..6).map(|i| cdx_record(&format!("bom-{i}.json"))).collect();

        let summary = consumer
            .upload(&ctx, SbomStream::from_records(records))
            .await
            .unwrap();
        assert_eq!(summary.success, 6);
        assert_eq!(summary.failed, 0);
        assert_eq!(lookup.hits_async().await, 1);
        assert_eq!(create.hits_async().await, 1, "one create per label per run");
        assert_eq!(bom.hits_async().await, 6);
    }
}

mod interlynk_tests {
    use super::cdx_record;
    use httpmock::prelude::*;
    use sbommv::adapters::interlynk::{InterlynkConfig, InterlynkConsumer};
    use sbommv::ports::Consumer;
    use sbommv::transfer::context::TransferContext;
    use sbommv::transfer::stream::SbomStream;

    /// One project group create per label per run, however many SBOMs land
    /// in it.
    #[tokio::test]
    async fn test_repeated_label_creates_project_group_once() {
        let server = MockServer::start_async().await;
        let _healthz = server
            .mock_async(|when, then| {
                when.method(GET).path("/healthz");
                then.status(200);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("projectGroupCreate");
                then.status(200).json_body(serde_json::json!({
                    "data": {
                        "projectGroupCreate": {
                            "projectGroup": {"id": "pg-1", "name": "guardian-latest"},
                            "errors": []
                        }
                    }
                }));
            })
            .await;
        let upload = server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("uploadSbom");
                then.status(200).json_body(serde_json::json!({
                    "data": {"sbomUpload": {"errors": []}}
                }));
            })
            .await;

        let consumer = InterlynkConsumer::new(InterlynkConfig {
            url: server.base_url(),
            token: Some("lynk_test".to_string()),
            project_name: Some("guardian".to_string()),
            project_env: None,
        })
        .unwrap();
        let ctx = TransferContext::new("folder", "interlynk");
        let records = (0..3).map(|i| cdx_record(&format!("bom-{i}.json"))).collect();

        let summary = consumer
            .upload(&ctx, SbomStream::from_records(records))
            .await
            .unwrap();
        assert_eq!(summary.success, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(create.hits_async().await, 1);
        assert_eq!(upload.hits_async().await, 3);
    }
}
