/// Integration tests for the transfer pipeline, driven through the library
/// API rather than the CLI.
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use sbommv::config::{InputConfig, OutputConfig, RunConfig};
use sbommv::prelude::*;
use sbommv::transfer::engine::TransferEngine;

use std::path::{Path, PathBuf};
use std::time::Duration;

fn pretty_cdx(name: &str, version: &str) -> Vec<u8> {
    let doc = json!({
        "bomFormat": "CycloneDX",
        "specVersion": "1.5",
        "serialNumber": "urn:uuid:3e671687-395b-41f5-a30f-a58921a69b79",
        "version": 1,
        "metadata": {
            "component": { "type": "application", "name": name, "version": version }
        },
        "components": []
    });
    serde_json::to_vec_pretty(&doc).unwrap()
}

fn folder_run(input: &Path, output: &Path) -> RunConfig {
    RunConfig {
        input: InputConfig::Folder(FolderInputConfig {
            path: input.to_path_buf(),
            recursive: true,
            mode: ProcessingMode::Sequential,
        }),
        output: OutputConfig::Folder(FolderOutputConfig {
            path: output.to_path_buf(),
            mode: ProcessingMode::Sequential,
        }),
        mode: ProcessingMode::Sequential,
        daemon: false,
        poll_interval: Duration::from_secs(60),
        cache_path: PathBuf::from(".sbommv/cache.json"),
        dry_run: false,
    }
}

mod round_trip_tests {
    use super::*;

    /// Writing through the folder consumer and reading back through the
    /// folder producer preserves bytes and path.
    #[tokio::test]
    async fn test_directory_round_trip_preserves_bytes_and_path() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let third = tempfile::tempdir().unwrap();

        let original = pretty_cdx("guardian", "v0.4.0");
        std::fs::write(first.path().join("guardian.cdx.json"), &original).unwrap();

        let summary = TransferEngine::new(folder_run(first.path(), second.path()))
            .run(CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.success, 1);

        // The consumer groups by namespace (the primary component name).
        let written = second.path().join("guardian").join("guardian.cdx.json");
        assert!(written.is_file());

        let summary = TransferEngine::new(folder_run(second.path(), third.path()))
            .run(CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.success, 1);

        let round_tripped =
            std::fs::read(third.path().join("guardian").join("guardian.cdx.json")).unwrap();
        assert_eq!(round_tripped, original);
    }

    /// Already-pretty CycloneDX passes through the converter unchanged.
    #[tokio::test]
    async fn test_pretty_input_is_byte_identical_after_transfer() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();

        let original = pretty_cdx("relay", "v1.1.0");
        std::fs::write(input.path().join("relay.cdx.json"), &original).unwrap();

        TransferEngine::new(folder_run(input.path(), output.path()))
            .run(CancellationToken::new())
            .await
            .unwrap();

        let written = std::fs::read(output.path().join("relay").join("relay.cdx.json")).unwrap();
        assert_eq!(written, original);
    }
}

mod converter_tests {
    use super::*;
    use sbommv::convert::convert_record;

    fn spdx_fixture() -> Vec<u8> {
        std::fs::read(
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/rekor.spdx.json"),
        )
        .unwrap()
    }

    /// Applying the converter twice yields the first application's bytes.
    #[test]
    fn test_converter_is_idempotent() {
        let record = SbomRecord::new(spdx_fixture(), "rekor.spdx.json", "sigstore/rekor", "v1.3.5");
        let first = convert_record(record).unwrap();
        let again = SbomRecord::new(
            first.record.data.clone(),
            first.record.path.clone(),
            "sigstore/rekor",
            "v1.3.5",
        );
        let second = convert_record(again).unwrap();
        assert_eq!(second.record.data, first.record.data);
    }

    /// SPDX input becomes well-formed CycloneDX with the described package as
    /// the primary component.
    #[test]
    fn test_spdx_to_cyclonedx_output_shape() {
        let record = SbomRecord::new(spdx_fixture(), "rekor.spdx.json", "sigstore/rekor", "v1.3.5");
        let outcome = convert_record(record).unwrap();
        assert_eq!(outcome.record.path, "rekor.spdxtocdx.json");

        let doc: Value = serde_json::from_slice(&outcome.record.data).unwrap();
        assert_eq!(doc["bomFormat"], "CycloneDX");
        assert_eq!(doc["version"], 1);
        assert!(doc["serialNumber"]
            .as_str()
            .unwrap()
            .starts_with("urn:uuid:"));
        assert_eq!(doc["metadata"]["component"]["name"], "rekor");
        assert_eq!(doc["metadata"]["component"]["version"], "v1.3.5");

        // The non-described package lands in components with its declared
        // license, NOASSERTION filtered out.
        let components = doc["components"].as_array().unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0]["name"], "github.com/spf13/cobra");
    }
}

mod cache_tests {
    use sbommv::adapters::watcher::cache::{CacheScope, RepoState, WatcherCache};

    fn scope() -> CacheScope {
        CacheScope {
            consumer: "folder".to_string(),
            producer: "github".to_string(),
            method: "release".to_string(),
        }
    }

    /// Save then reload restores repo state and delivery marks.
    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = WatcherCache::load(&path);
        let state = RepoState {
            published_at: "2024-04-02T09:00:00+00:00".to_string(),
            release_id: "1001".to_string(),
        };
        cache.set_repo_state(&scope(), "cosign", state.clone());
        cache.mark_delivered(&scope(), "cosign:1001:cosign.spdx.json");
        cache.save().unwrap();

        let reloaded = WatcherCache::load(&path);
        assert_eq!(reloaded.repo_state(&scope(), "cosign"), Some(state));
        assert!(reloaded.is_delivered(&scope(), "cosign:1001:cosign.spdx.json"));
        assert!(!reloaded.is_delivered(&scope(), "cosign:1002:cosign.spdx.json"));
    }

    /// A corrupt cache file forces re-delivery rather than an error.
    #[test]
    fn test_corrupt_cache_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let cache = WatcherCache::load(&path);
        assert!(cache.repo_state(&scope(), "cosign").is_none());
    }
}

mod project_identity_tests {
    use sbommv::project::resolve_project;
    use sbommv::transfer::record::SbomRecord;

    /// A configured name and version pin the label exactly.
    #[test]
    fn test_configured_name_and_version_win() {
        let record = SbomRecord::new(b"{}".to_vec(), "bom.json", "sigstore/cosign", "v2.2.0");
        let identity = resolve_project(Some("test-project"), Some("v1.0.1"), false, &record);
        assert_eq!(identity.label(), "test-project-v1.0.1");
    }

    /// Without configuration, a non-folder producer contributes its
    /// namespace and record version.
    #[test]
    fn test_namespace_fallback_for_remote_producer() {
        let record = SbomRecord::new(b"{}".to_vec(), "bom.json", "sigstore/cosign", "v2.2.0");
        let identity = resolve_project(None, None, false, &record);
        assert_eq!(identity.label(), "sigstore/cosign-v2.2.0");
    }
}
