use anyhow::{bail, Context};
use serde_json::Value;

use crate::convert::cyclonedx::{
    ensure_serial, Bom, Component, License, LicenseContent,
};
use crate::shared::Result;

const NOASSERTION: &str = "NOASSERTION";

/// Removes `licenseInfoInFiles` arrays whose sole element is `NOASSERTION`.
///
/// Workaround for a lossy upstream: those arrays carry no information and
/// trip strict license validation during conversion.
pub fn strip_noassertion_file_licenses(doc: &mut Value) {
    let Some(files) = doc.get_mut("files").and_then(Value::as_array_mut) else {
        return;
    };
    for file in files {
        let Some(object) = file.as_object_mut() else {
            continue;
        };
        let sole_noassertion = object
            .get("licenseInfoInFiles")
            .and_then(Value::as_array)
            .map(|entries| entries.len() == 1 && entries[0] == NOASSERTION)
            .unwrap_or(false);
        if sole_noassertion {
            object.remove("licenseInfoInFiles");
        }
    }
}

/// Converts a parsed SPDX JSON document into a CycloneDX document.
///
/// The package targeted by the `DESCRIBES` relationship becomes
/// `metadata.component`; every other package becomes a component. License and
/// purl data come along when present and meaningful.
pub fn spdx_to_cyclonedx(doc: &Value) -> Result<Bom> {
    let packages = doc
        .get("packages")
        .and_then(Value::as_array)
        .context("SPDX document has no packages array")?;
    if packages.is_empty() {
        bail!("SPDX document has an empty packages array");
    }

    let described_id = described_element(doc);
    let serial = ensure_serial(
        doc.get("documentNamespace")
            .and_then(Value::as_str),
    );
    let mut bom = Bom::new(serial);

    for package in packages {
        let Some(name) = package.get("name").and_then(Value::as_str) else {
            continue;
        };
        let id = package.get("SPDXID").and_then(Value::as_str);
        let is_primary = described_id.is_some() && id == described_id.as_deref();
        let component = Component {
            component_type: if is_primary { "application" } else { "library" }.to_string(),
            name: name.to_string(),
            version: package
                .get("versionInfo")
                .and_then(Value::as_str)
                .map(str::to_string),
            purl: package_purl(package),
            licenses: package_licenses(package),
        };
        if is_primary {
            bom.metadata.component = Some(component);
        } else {
            bom.components.push(component);
        }
    }

    if bom.metadata.component.is_none() && bom.components.is_empty() {
        bail!("SPDX document yielded no usable packages");
    }
    Ok(bom)
}

fn described_element(doc: &Value) -> Option<String> {
    let relationships = doc.get("relationships")?.as_array()?;
    relationships.iter().find_map(|rel| {
        let element = rel.get("spdxElementId")?.as_str()?;
        let kind = rel.get("relationshipType")?.as_str()?;
        if element == "SPDXRef-DOCUMENT" && kind == "DESCRIBES" {
            rel.get("relatedSpdxElement")?.as_str().map(str::to_string)
        } else {
            None
        }
    })
}

fn package_purl(package: &Value) -> Option<String> {
    let refs = package.get("externalRefs")?.as_array()?;
    refs.iter().find_map(|external| {
        let kind = external.get("referenceType")?.as_str()?;
        if kind == "purl" {
            external
                .get("referenceLocator")?
                .as_str()
                .map(str::to_string)
        } else {
            None
        }
    })
}

fn package_licenses(package: &Value) -> Option<Vec<License>> {
    let expression = package
        .get("licenseConcluded")
        .and_then(Value::as_str)
        .filter(|license| *license != NOASSERTION && !license.is_empty())
        .or_else(|| {
            package
                .get("licenseDeclared")
                .and_then(Value::as_str)
                .filter(|license| *license != NOASSERTION && !license.is_empty())
        })?;
    Some(vec![License {
        license: LicenseContent {
            name: expression.to_string(),
        },
    }])
}
