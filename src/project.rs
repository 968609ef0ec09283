//! Project-identity resolution: derives the `(name, version)` pair that the
//! upload consumers use to address their target.

use crate::formats;
use crate::transfer::record::SbomRecord;

/// The `(name, version)` pair addressing an upload target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdentity {
    pub name: String,
    pub version: String,
}

impl ProjectIdentity {
    /// The literal label consumers use, `<name>-<version>`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// Derives the project identity for a record.
///
/// Precedence, for a given record and configuration, is deterministic:
/// 1. A configured name wins; the configured version defaults to `latest`.
/// 2. For non-folder producers with a non-empty record namespace, the
///    namespace and record version are used (`unknown` when absent).
/// 3. Otherwise the primary component extracted from the record bytes, and as
///    a last resort the record path's file stem, both versioned `latest`.
pub fn resolve_project(
    configured_name: Option<&str>,
    configured_version: Option<&str>,
    source_is_folder: bool,
    record: &SbomRecord,
) -> ProjectIdentity {
    if let Some(name) = configured_name.filter(|name| !name.is_empty()) {
        let version = configured_version
            .filter(|version| !version.is_empty())
            .unwrap_or("latest");
        return ProjectIdentity {
            name: name.to_string(),
            version: version.to_string(),
        };
    }

    if !source_is_folder && !record.namespace.is_empty() {
        let version = if record.version.is_empty() {
            "unknown"
        } else {
            record.version.as_str()
        };
        return ProjectIdentity {
            name: record.namespace.clone(),
            version: version.to_string(),
        };
    }

    if let Some(primary) = formats::primary_component(&record.data) {
        return ProjectIdentity {
            name: primary.name,
            version: primary.version.unwrap_or_else(|| "latest".to_string()),
        };
    }

    ProjectIdentity {
        name: formats::file_stem(&record.path).to_string(),
        version: "latest".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cdx_record() -> SbomRecord {
        let doc = json!({
            "bomFormat": "CycloneDX",
            "specVersion": "1.5",
            "metadata": {"component": {"type": "application", "name": "cosign", "version": "v2.2.0"}}
        });
        SbomRecord::new(serde_json::to_vec(&doc).unwrap(), "cosign.cdx.json", "", "")
    }

    #[test]
    fn test_configured_name_wins() {
        let record = cdx_record();
        let identity = resolve_project(Some("test-project"), Some("v1.0.1"), false, &record);
        assert_eq!(identity.name, "test-project");
        assert_eq!(identity.version, "v1.0.1");
        assert_eq!(identity.label(), "test-project-v1.0.1");
    }

    #[test]
    fn test_configured_name_defaults_version_to_latest() {
        let record = cdx_record();
        let identity = resolve_project(Some("test-project"), None, false, &record);
        assert_eq!(identity.version, "latest");
        let identity = resolve_project(Some("test-project"), Some(""), false, &record);
        assert_eq!(identity.version, "latest");
    }

    #[test]
    fn test_namespace_used_for_non_folder_producer() {
        let record = SbomRecord::new(b"{}".to_vec(), "bom.json", "owner/repo", "v1.2.3");
        let identity = resolve_project(None, None, false, &record);
        assert_eq!(identity.name, "owner/repo");
        assert_eq!(identity.version, "v1.2.3");
    }

    #[test]
    fn test_namespace_with_missing_version_is_unknown() {
        let record = SbomRecord::new(b"{}".to_vec(), "bom.json", "owner/repo", "");
        let identity = resolve_project(None, None, false, &record);
        assert_eq!(identity.version, "unknown");
    }

    #[test]
    fn test_folder_producer_extracts_primary_component() {
        let mut record = cdx_record();
        record.namespace = "ignored".to_string();
        let identity = resolve_project(None, None, true, &record);
        assert_eq!(identity.name, "cosign");
        assert_eq!(identity.version, "v2.2.0");
    }

    #[test]
    fn test_folder_producer_falls_back_to_file_stem() {
        let record = SbomRecord::new(b"{}".to_vec(), "fixtures/my-app.sbom.json", "", "");
        let identity = resolve_project(None, None, true, &record);
        assert_eq!(identity.name, "my-app.sbom");
        assert_eq!(identity.version, "latest");
    }
}
