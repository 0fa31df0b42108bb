//! Scan orchestration: walks tenant → subscription → resource group → policy,
//! maps each policy and overlays stored notes. Also the note write path.

pub mod error;
pub mod notes;
pub mod overlay;
pub mod scanner;

#[cfg(test)]
mod fakes;

pub use error::{SaveNoteError, ScanError};
pub use notes::NotesService;
pub use overlay::NotesOverlay;
pub use scanner::{IssueKind, ScanIssue, ScanReport, ScanRequest, ScanStatus, Scanner};
pub use tokio_util::sync::CancellationToken;
