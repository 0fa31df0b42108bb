use thiserror::Error;
use waflens_arm::ArmError;
use waflens_core::ValidationError;
use waflens_store::StoreError;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{0} is required")]
    MissingInput(&'static str),

    #[error(transparent)]
    Arm(#[from] ArmError),

    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum SaveNoteError {
    #[error("invalid note request: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to store note: {0}")]
    Store(#[from] StoreError),

    #[error("note save cancelled before it was written")]
    Cancelled,
}
