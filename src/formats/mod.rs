//! SBOM format heuristics: file-name filtering, content sniffing,
//! primary-component extraction and minified-JSON normalization.

use serde_json::Value;

/// Case-insensitive substrings that mark a file name as SBOM-like.
const NAME_MARKERS: &[&str] = &[".spdx.", ".sbom", "bom.", "cyclonedx", "spdx", ".cdx."];

/// Extensions an SBOM artifact is allowed to carry.
const SBOM_EXTENSIONS: &[&str] = &[".sbom", ".json", ".xml", ".yaml", ".yml", ".txt"];

/// SBOM dialects the pipeline can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbomDialect {
    CycloneDxJson,
    SpdxJson,
    CycloneDxXml,
    SpdxXml,
    SpdxTagValue,
}

impl SbomDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SbomDialect::CycloneDxJson => "cyclonedx-json",
            SbomDialect::SpdxJson => "spdx-json",
            SbomDialect::CycloneDxXml => "cyclonedx-xml",
            SbomDialect::SpdxXml => "spdx-xml",
            SbomDialect::SpdxTagValue => "spdx-tag-value",
        }
    }
}

/// Name heuristic used by producers to pre-filter candidate files.
///
/// A name qualifies when it contains one of the SBOM markers and ends with a
/// recognized extension, both checks case-insensitive.
pub fn looks_like_sbom_name(name: &str) -> bool {
    let lowered = name.to_lowercase();
    let marker = NAME_MARKERS.iter().any(|m| lowered.contains(m));
    let extension = SBOM_EXTENSIONS.iter().any(|e| lowered.ends_with(e));
    marker && extension
}

/// Content sniff used to confirm a candidate before emission.
///
/// JSON documents are classified by their top-level discriminator key;
/// XML and SPDX tag-value fall back to cheap marker scans.
pub fn sniff_dialect(data: &[u8]) -> Option<SbomDialect> {
    if let Ok(value) = serde_json::from_slice::<Value>(data) {
        let object = value.as_object()?;
        if object.contains_key("bomFormat") {
            return Some(SbomDialect::CycloneDxJson);
        }
        if object.contains_key("spdxVersion") {
            return Some(SbomDialect::SpdxJson);
        }
        return None;
    }

    let head = String::from_utf8_lossy(&data[..data.len().min(4096)]);
    let trimmed = head.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with("<?xml") || trimmed.starts_with('<') {
        if head.contains("<bom") && head.contains("cyclonedx") {
            return Some(SbomDialect::CycloneDxXml);
        }
        if head.contains("spdx") {
            return Some(SbomDialect::SpdxXml);
        }
        return None;
    }
    if head.contains("SPDXVersion:") {
        return Some(SbomDialect::SpdxTagValue);
    }
    None
}

/// The single component an SBOM document is "about".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryComponent {
    pub name: String,
    pub version: Option<String>,
}

/// Extracts the primary component from CycloneDX or SPDX JSON bytes.
///
/// CycloneDX: `metadata.component.{name,version}`. SPDX: follow the
/// `DESCRIBES` relationship from `SPDXRef-DOCUMENT` to the described package
/// and return its `name`/`versionInfo`. Returns `None` when neither path
/// yields a name; callers fall back to file-name-derived names.
pub fn primary_component(data: &[u8]) -> Option<PrimaryComponent> {
    let value: Value = serde_json::from_slice(data).ok()?;

    if value.get("bomFormat").is_some() {
        let component = value.get("metadata")?.get("component")?;
        let name = component.get("name")?.as_str()?.to_string();
        let version = component
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string);
        return Some(PrimaryComponent { name, version });
    }

    if value.get("spdxVersion").is_some() {
        return spdx_described_package(&value);
    }

    None
}

fn spdx_described_package(doc: &Value) -> Option<PrimaryComponent> {
    let relationships = doc.get("relationships")?.as_array()?;
    let described_id = relationships.iter().find_map(|rel| {
        let element = rel.get("spdxElementId")?.as_str()?;
        let kind = rel.get("relationshipType")?.as_str()?;
        if element == "SPDXRef-DOCUMENT" && kind == "DESCRIBES" {
            rel.get("relatedSpdxElement")?.as_str().map(str::to_string)
        } else {
            None
        }
    })?;

    let packages = doc.get("packages")?.as_array()?;
    packages.iter().find_map(|package| {
        let id = package.get("SPDXID")?.as_str()?;
        if id != described_id {
            return None;
        }
        let name = package.get("name")?.as_str()?.to_string();
        let version = package
            .get("versionInfo")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(PrimaryComponent { name, version })
    })
}

/// Re-serializes minified JSON with two-space indentation.
///
/// Returns `Some(pretty)` when the input needed rewriting, `None` when it is
/// already pretty (or is not JSON at all). serde_json preserves object key
/// order, so byte comparison is a sound "already formatted" test and the
/// rewrite is idempotent.
pub fn pretty_normalize(data: &[u8]) -> Option<Vec<u8>> {
    let value: Value = serde_json::from_slice(data).ok()?;
    let pretty = serde_json::to_vec_pretty(&value).ok()?;
    if pretty == data {
        None
    } else {
        Some(pretty)
    }
}

/// File name without directories or the final extension; used as the last
/// fallback when deriving a project name.
pub fn file_stem(path: &str) -> &str {
    let base = path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(path);
    match base.rfind('.') {
        Some(0) | None => base,
        Some(idx) => &base[..idx],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CDX: &str = r#"{
  "bomFormat": "CycloneDX",
  "specVersion": "1.5",
  "metadata": {
    "component": {
      "type": "application",
      "name": "cosign",
      "version": "v2.2.0"
    }
  },
  "components": []
}"#;

    const SPDX: &str = r#"{
  "spdxVersion": "SPDX-2.3",
  "SPDXID": "SPDXRef-DOCUMENT",
  "name": "fulcio",
  "packages": [
    {
      "SPDXID": "SPDXRef-Package-fulcio",
      "name": "fulcio",
      "versionInfo": "v1.4.0"
    },
    {
      "SPDXID": "SPDXRef-Package-dep",
      "name": "some-dep"
    }
  ],
  "relationships": [
    {
      "spdxElementId": "SPDXRef-DOCUMENT",
      "relationshipType": "DESCRIBES",
      "relatedSpdxElement": "SPDXRef-Package-fulcio"
    }
  ]
}"#;

    #[test]
    fn test_name_heuristic_accepts_known_patterns() {
        assert!(looks_like_sbom_name("app.spdx.json"));
        assert!(looks_like_sbom_name("bom.xml"));
        assert!(looks_like_sbom_name("My-CycloneDX-export.json"));
        assert!(looks_like_sbom_name("release.cdx.json"));
        assert!(looks_like_sbom_name("thing.sbom"));
    }

    #[test]
    fn test_name_heuristic_rejects_marker_without_extension() {
        assert!(!looks_like_sbom_name("cyclonedx-report.pdf"));
        assert!(!looks_like_sbom_name("spdx"));
    }

    #[test]
    fn test_name_heuristic_rejects_extension_without_marker() {
        assert!(!looks_like_sbom_name("config.json"));
        assert!(!looks_like_sbom_name("notes.txt"));
    }

    #[test]
    fn test_sniff_cyclonedx_json() {
        assert_eq!(
            sniff_dialect(CDX.as_bytes()),
            Some(SbomDialect::CycloneDxJson)
        );
    }

    #[test]
    fn test_sniff_spdx_json() {
        assert_eq!(sniff_dialect(SPDX.as_bytes()), Some(SbomDialect::SpdxJson));
    }

    #[test]
    fn test_sniff_rejects_plain_json() {
        assert_eq!(sniff_dialect(br#"{"hello": "world"}"#), None);
    }

    #[test]
    fn test_sniff_spdx_tag_value() {
        let doc = b"SPDXVersion: SPDX-2.3\nDataLicense: CC0-1.0\n";
        assert_eq!(sniff_dialect(doc), Some(SbomDialect::SpdxTagValue));
    }

    #[test]
    fn test_sniff_cyclonedx_xml() {
        let doc = br#"<?xml version="1.0"?><bom xmlns="http://cyclonedx.org/schema/bom/1.5"></bom>"#;
        assert_eq!(sniff_dialect(doc), Some(SbomDialect::CycloneDxXml));
    }

    #[test]
    fn test_primary_component_cyclonedx() {
        let primary = primary_component(CDX.as_bytes()).unwrap();
        assert_eq!(primary.name, "cosign");
        assert_eq!(primary.version.as_deref(), Some("v2.2.0"));
    }

    #[test]
    fn test_primary_component_spdx_follows_describes() {
        let primary = primary_component(SPDX.as_bytes()).unwrap();
        assert_eq!(primary.name, "fulcio");
        assert_eq!(primary.version.as_deref(), Some("v1.4.0"));
    }

    #[test]
    fn test_primary_component_missing_relationship() {
        let doc = r#"{"spdxVersion": "SPDX-2.3", "packages": []}"#;
        assert!(primary_component(doc.as_bytes()).is_none());
    }

    #[test]
    fn test_pretty_normalize_minified_input() {
        let minified = br#"{"bomFormat":"CycloneDX","version":1}"#;
        let pretty = pretty_normalize(minified).unwrap();
        let text = String::from_utf8(pretty.clone()).unwrap();
        assert!(text.contains("  \"bomFormat\""));
        // Idempotence: a second pass sees already-pretty bytes.
        assert!(pretty_normalize(&pretty).is_none());
    }

    #[test]
    fn test_pretty_normalize_ignores_non_json() {
        assert!(pretty_normalize(b"SPDXVersion: SPDX-2.3").is_none());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("dir/app.spdx.json"), "app.spdx");
        assert_eq!(file_stem("bom.json"), "bom");
        assert_eq!(file_stem("noext"), "noext");
    }
}
