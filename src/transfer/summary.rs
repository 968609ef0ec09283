use serde::Serialize;
use std::fmt;

/// End-of-run accounting: records seen, delivered and failed.
///
/// Parallel upload workers each fold their own partial summary and the
/// consumer merges them at the end, so no shared counter is needed outside
/// the worker loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    pub sboms: u64,
    pub success: u64,
    pub failed: u64,
}

impl TransferSummary {
    pub fn record_success(&mut self) {
        self.sboms += 1;
        self.success += 1;
    }

    pub fn record_failure(&mut self) {
        self.sboms += 1;
        self.failed += 1;
    }

    pub fn merge(&mut self, other: TransferSummary) {
        self.sboms += other.sboms;
        self.success += other.success;
        self.failed += other.failed;
    }
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{\"sboms\": {}, \"success\": {}, \"failed\": {}}}",
            self.sboms, self.success, self.failed
        )
    }
}
