/// A single SBOM document travelling through the pipeline.
///
/// Records are created by producers, transformed (data replaced, path
/// possibly rewritten) by the converter stage, and consumed exactly once by
/// the consumer adapter. `data` is never empty for a record yielded by a
/// producer; the other fields are free-form hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbomRecord {
    /// The SBOM document bytes.
    pub data: Vec<u8>,
    /// Logical name used when writing to disk or addressing an object store.
    /// May be empty for in-memory-only artifacts.
    pub path: String,
    /// Producer-provided grouping hint, typically `owner/repo` or a
    /// primary-component name.
    pub namespace: String,
    /// Release tag, `latest`, or a release identifier.
    pub version: String,
    /// Branch the SBOM was generated from, when known.
    pub branch: Option<String>,
}

impl SbomRecord {
    pub fn new(
        data: Vec<u8>,
        path: impl Into<String>,
        namespace: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            data,
            path: path.into(),
            namespace: namespace.into(),
            version: version.into(),
            branch: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}
