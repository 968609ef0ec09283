//! Converter stage: an iterator adapter that detects each record's dialect,
//! converts SPDX JSON to CycloneDX JSON, enriches the result and normalizes
//! whitespace before handing the record downstream.

pub mod cyclonedx;
pub mod spdx;

use anyhow::{bail, Context};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::formats::{self, SbomDialect};
use crate::shared::Result;
use crate::transfer::context::TransferContext;
use crate::transfer::record::SbomRecord;
use crate::transfer::stream::SbomStream;

/// Outcome of converting a single record.
pub struct ConvertOutcome {
    pub record: SbomRecord,
    /// True when the record's JSON was minified and got pretty-rewritten.
    pub normalized: bool,
}

/// Converts one record to the target dialect (CycloneDX JSON).
///
/// Records already in the target dialect pass through, minus the minified-JSON
/// normalization. SPDX JSON goes through the full pipeline: NOASSERTION
/// stripping, conversion, serial/version enrichment, serialization, and a
/// `spdx` -> `spdxtocdx` rewrite of the path so converted artifacts stay
/// distinguishable downstream. Everything else is a conversion error.
pub fn convert_record(record: SbomRecord) -> Result<ConvertOutcome> {
    let dialect = formats::sniff_dialect(&record.data)
        .with_context(|| format!("unrecognized SBOM content in {}", record.path))?;

    match dialect {
        SbomDialect::CycloneDxJson => {
            let mut record = record;
            let normalized = match formats::pretty_normalize(&record.data) {
                Some(pretty) => {
                    record.data = pretty;
                    true
                }
                None => false,
            };
            Ok(ConvertOutcome { record, normalized })
        }
        SbomDialect::SpdxJson => {
            let mut doc: Value = serde_json::from_slice(&record.data)
                .with_context(|| format!("failed to parse SPDX JSON in {}", record.path))?;
            spdx::strip_noassertion_file_licenses(&mut doc);
            let bom = spdx::spdx_to_cyclonedx(&doc)?;
            let serialized = serde_json::to_vec_pretty(&bom)?;

            let mut record = record;
            record.data = serialized;
            if let Some(idx) = record.path.find("spdx") {
                record
                    .path
                    .replace_range(idx..idx + "spdx".len(), "spdxtocdx");
            }
            debug!(path = %record.path, "converted SPDX record to CycloneDX");
            Ok(ConvertOutcome {
                record,
                normalized: false,
            })
        }
        other => bail!(
            "conversion from {} to CycloneDX JSON is not supported",
            other.as_str()
        ),
    }
}

/// The converter stage itself.
///
/// Wraps a producer stream; records are converted one at a time and forwarded
/// over a capacity-1 channel, so memory stays bounded by a single in-flight
/// record. Conversion failures are logged and the record is dropped.
pub struct ConverterStage;

impl ConverterStage {
    pub fn attach(ctx: &TransferContext, mut input: SbomStream) -> SbomStream {
        let (tx, output) = SbomStream::channel(1);
        let cancel = ctx.cancel.clone();

        tokio::spawn(async move {
            let mut seen: u64 = 0;
            let mut normalized: u64 = 0;
            loop {
                let record = tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = input.next() => match next {
                        Some(record) => record,
                        None => break,
                    },
                };
                seen += 1;
                let path = record.path.clone();
                match convert_record(record) {
                    Ok(outcome) => {
                        if outcome.normalized {
                            normalized += 1;
                        }
                        let sent = tokio::select! {
                            _ = cancel.cancelled() => false,
                            sent = tx.send(outcome.record) => sent.is_ok(),
                        };
                        if !sent {
                            break;
                        }
                    }
                    Err(error) => {
                        warn!(path = %path, error = %error, "dropping record: conversion failed");
                    }
                }
            }
            info!(seen, normalized, "converter stage finished");
        });

        output
    }
}
