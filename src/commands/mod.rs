pub mod cleanup;
pub mod status;
pub mod upload;

use std::process::ExitCode;

/// How a run ended, when it did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// Every drive refused a copy; the rest of the selection was left for later
    DrivesExhausted,
    /// Finished, but at least one mapped root could not be scanned
    ScanErrors,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::DrivesExhausted => 2,
            Self::ScanErrors => 3,
        }
    }
}

impl From<RunStatus> for ExitCode {
    fn from(status: RunStatus) -> Self {
        ExitCode::from(status.exit_code())
    }
}
