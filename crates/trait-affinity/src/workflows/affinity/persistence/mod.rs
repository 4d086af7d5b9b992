//! Session snapshots and the exported report document.

mod report;
mod snapshot;
mod store;

pub use report::{
    export_report, ExportedReport, FullReport, ImportedReport, ReportHeader, ReportRating,
    SummaryReport, TraitSummary,
};
pub use snapshot::{SavedRating, SessionSnapshot};
pub use store::{
    resume_session, JsonFileSessionStore, MemorySessionStore, ResumeOutcome, SessionStore,
};

use super::ratings::RatingError;
use super::session::SessionError;
use super::strategy::StrategyLoadError;
use std::path::PathBuf;

/// Version stamped into snapshots and reports.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document is corrupt: {0}")]
    Corrupt(String),
    #[error("nothing to export: no characters have been rated")]
    EmptyReport,
    #[error(transparent)]
    Strategy(#[from] StrategyLoadError),
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl PersistenceError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt(reason.into())
    }

    /// True when the stored document itself is unusable. Strategy and I/O
    /// failures are environmental and leave the document intact.
    pub fn is_corrupt_document(&self) -> bool {
        matches!(
            self,
            Self::Corrupt(_)
                | Self::Json(_)
                | Self::Rating(_)
                | Self::Session(SessionError::Rating(_))
        )
    }
}
