use std::path::PathBuf;
use thiserror::Error;

/// Structural failures that abort one file's processing cycle.
///
/// Everything else the base error taxonomy names is a signal, not an error:
/// unsupported formats skip the file, per-segment recognition failures and
/// filename-validation rejections collapse into the no-match verdict, and
/// upload failures or missing upload credentials surface as an upload
/// outcome so the file stays eligible for a later retry.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("conversion failed for {path}: {reason}")]
    ConversionFailure { path: PathBuf, reason: String },
    #[error("tag write failed for {path}: {reason}")]
    TagWriteFailure { path: PathBuf, reason: String },
    #[error("move failed from {from} to {to}: {reason}")]
    MoveFailure {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },
}
