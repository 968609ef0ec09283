use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// CycloneDX 1.5 JSON document, limited to the fields the converter emits.
#[derive(Debug, Serialize)]
pub struct Bom {
    #[serde(rename = "bomFormat")]
    pub bom_format: String,
    #[serde(rename = "specVersion")]
    pub spec_version: String,
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
    pub version: u32,
    pub metadata: Metadata,
    pub components: Vec<Component>,
}

#[derive(Debug, Serialize)]
pub struct Metadata {
    pub timestamp: String,
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<Component>,
}

#[derive(Debug, Serialize)]
pub struct Tool {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct Component {
    #[serde(rename = "type")]
    pub component_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub licenses: Option<Vec<License>>,
}

#[derive(Debug, Serialize, Clone)]
pub struct License {
    pub license: LicenseContent,
}

#[derive(Debug, Serialize, Clone)]
pub struct LicenseContent {
    pub name: String,
}

impl Bom {
    /// Builds an empty document with a fresh serial and version 1; the
    /// converter fills metadata.component and components afterwards.
    pub fn new(serial_number: String) -> Self {
        Self {
            bom_format: "CycloneDX".to_string(),
            spec_version: "1.5".to_string(),
            serial_number,
            version: 1,
            metadata: Metadata {
                timestamp: Utc::now().to_rfc3339(),
                tools: vec![Tool {
                    name: "sbommv".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                }],
                component: None,
            },
            components: Vec::new(),
        }
    }
}

/// Returns true when `serial` matches `urn:uuid:<uuid-v4-rfc4122>` exactly.
pub fn is_valid_serial(serial: &str) -> bool {
    let Some(raw) = serial.strip_prefix("urn:uuid:") else {
        return false;
    };
    match Uuid::parse_str(raw) {
        Ok(uuid) => {
            uuid.get_version_num() == 4 && uuid.get_variant() == uuid::Variant::RFC4122
        }
        Err(_) => false,
    }
}

/// Keeps a candidate serial when it already matches the required pattern,
/// otherwise mints a fresh one.
pub fn ensure_serial(candidate: Option<&str>) -> String {
    match candidate {
        Some(serial) if is_valid_serial(serial) => serial.to_string(),
        _ => format!("urn:uuid:{}", Uuid::new_v4()),
    }
}
