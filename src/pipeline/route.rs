use crate::error::PipelineError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;
use unicode_normalization::UnicodeNormalization;

/// Fold a filename to a plain-ASCII form: NFKD-decompose, drop anything
/// outside ASCII, and replace spaces with underscores.
pub fn sanitize_filename(name: &str) -> String {
    name.nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == ' ' { '_' } else { c })
        .collect()
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(_) => Ok(()),
        Err(rename_err) => {
            if matches!(
                rename_err.kind(),
                ErrorKind::CrossesDevices | ErrorKind::PermissionDenied
            ) {
                fs::copy(from, to)?;
                fs::remove_file(from)?;
                Ok(())
            } else {
                Err(rename_err)
            }
        }
    }
}

/// Move a finished file to its terminal directory. Recognized files land in
/// the processed directory under a sanitized name; unrecognized files keep
/// their original name in the unrecognized directory. Either destination is
/// created on first use.
pub fn route(
    file: &Path,
    recognized: bool,
    processed_dir: &Path,
    unrecognized_dir: &Path,
) -> Result<PathBuf, PipelineError> {
    let basename = file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string();

    let (dest_dir, dest_name) = if recognized {
        (processed_dir, sanitize_filename(&basename))
    } else {
        (unrecognized_dir, basename)
    };

    let dest = dest_dir.join(dest_name);
    let fail = |reason: String| PipelineError::MoveFailure {
        from: file.to_path_buf(),
        to: dest.clone(),
        reason,
    };

    fs::create_dir_all(dest_dir)
        .map_err(|err| fail(format!("failed to create {}: {err}", dest_dir.display())))?;
    move_file(file, &dest).map_err(|err| fail(err.to_string()))?;

    info!(from = %file.display(), to = %dest.display(), "moved file");
    Ok(dest)
}
