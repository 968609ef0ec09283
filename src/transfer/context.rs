use tokio_util::sync::CancellationToken;

/// Execution strategy for an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    #[default]
    Sequential,
    Parallel,
}

impl std::str::FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(ProcessingMode::Sequential),
            "parallel" => Ok(ProcessingMode::Parallel),
            _ => Err(format!(
                "Invalid processing mode: {}. Please specify 'sequential' or 'parallel'",
                s
            )),
        }
    }
}

/// Carries the cancellation signal and transfer-wide metadata across all
/// producer, converter and consumer calls.
///
/// Every network request, file operation, channel op and sleep observes
/// `cancel`; a cancelled context tears the whole pipeline down and the engine
/// returns cancellation as the run error.
#[derive(Debug, Clone)]
pub struct TransferContext {
    pub cancel: CancellationToken,
    /// Tag of the selected producer (e.g. `github`, `folder`).
    pub source: String,
    /// Tag of the selected consumer (e.g. `dtrack`, `folder`).
    pub destination: String,
    pub dry_run: bool,
    pub mode: ProcessingMode,
}

impl TransferContext {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            cancel: CancellationToken::new(),
            source: source.into(),
            destination: destination.into(),
            dry_run: false,
            mode: ProcessingMode::Sequential,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
