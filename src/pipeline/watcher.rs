use crate::ffmpeg::gateway::Codec;
use crate::pipeline::config::load_config;
use crate::pipeline::journal;
use crate::pipeline::notify::Notifier;
use crate::pipeline::paths::{AircheckPaths, resolve_paths};
use crate::pipeline::recognize::{HttpRecognizer, Recognizer};
use crate::pipeline::upload::{UploadLedger, UploadOutcome, attempt_upload};
use crate::pipeline::{FileOutcome, process_file};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone, Default)]
pub struct WatchCycleOutcome {
    pub scanned: usize,
    pub recognized: usize,
    pub unrecognized: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pending_uploads_attempted: usize,
    pub pending_uploads_completed: usize,
    pub poll_interval_secs: u64,
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Re-attempt upload for anything still sitting in the processed directory.
/// Files land here recognized-and-tagged; only the transfer is outstanding.
fn retry_pending_uploads(
    paths: &AircheckPaths,
    cfg: &crate::pipeline::config::AircheckConfig,
    notifier: &Notifier,
    outcome: &mut WatchCycleOutcome,
) -> Result<()> {
    let pending = list_files(&paths.processed_dir)?;
    if pending.is_empty() {
        info!("no processed files pending upload");
        return Ok(());
    }

    let ledger = UploadLedger::new(&paths.upload_ledger_file);
    for file in pending {
        info!(file = %file.display(), "found processed file pending upload");
        outcome.pending_uploads_attempted += 1;
        match attempt_upload(&cfg.upload, &ledger, &file, notifier) {
            UploadOutcome::Uploaded | UploadOutcome::AlreadyUploaded => {
                outcome.pending_uploads_completed += 1;
            }
            UploadOutcome::SkippedNoCredentials => break,
            UploadOutcome::Failed(_) => {
                error!(file = %file.display(), "upload retry failed, file remains in processed folder");
            }
        }
    }
    Ok(())
}

/// One watch cycle: process every file in the intake folder, or — when the
/// intake is empty — sweep the processed folder for uploads that failed on
/// an earlier cycle.
pub fn run_once() -> Result<WatchCycleOutcome> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let codec = Codec::resolve()?;
    let recognizer = HttpRecognizer::from_config(&cfg.recognizer)?;
    let notifier = Notifier::new(cfg.notify.webhook_url.clone());

    fs::create_dir_all(&paths.intake_dir)
        .with_context(|| format!("failed to create {}", paths.intake_dir.display()))?;
    fs::create_dir_all(&paths.processed_dir)
        .with_context(|| format!("failed to create {}", paths.processed_dir.display()))?;

    let mut outcome = WatchCycleOutcome {
        poll_interval_secs: cfg.watcher.poll_interval_secs,
        ..WatchCycleOutcome::default()
    };

    let files = list_files(&paths.intake_dir)?;
    outcome.scanned = files.len();
    info!(count = files.len(), dir = %paths.intake_dir.display(), "scanned intake folder");

    if files.is_empty() {
        retry_pending_uploads(&paths, &cfg, &notifier, &mut outcome)?;
        return Ok(outcome);
    }

    for file in files {
        notifier.send(&format!(
            "Processing file: {}",
            file.file_name().map(|s| s.to_string_lossy()).unwrap_or_default()
        ));

        let recognizer_ref: Option<&dyn Recognizer> =
            recognizer.as_ref().map(|r| r as &dyn Recognizer);
        match process_file(&paths, &cfg, &codec, recognizer_ref, &notifier, &file) {
            Ok(FileOutcome::SkippedUnsupported) => outcome.skipped += 1,
            Ok(done @ FileOutcome::Processed { .. }) => {
                if done.recognized() {
                    outcome.recognized += 1;
                } else {
                    outcome.unrecognized += 1;
                }
            }
            // A structural failure in one file's cycle never unwinds the
            // cycle for the others.
            Err(err) => {
                outcome.failed += 1;
                error!(file = %file.display(), "processing failed: {err}");
                let _ = journal::append_event(
                    &paths,
                    "process",
                    "failed",
                    &format!("{}: {err}", file.display()),
                );
            }
        }
    }

    Ok(outcome)
}

pub fn run_daemon() -> Result<()> {
    let cfg = load_config()?;
    let notifier = Notifier::new(cfg.notify.webhook_url.clone());
    info!("starting music watchdog");
    notifier.send("Music watchdog is running");

    loop {
        let cycle = run_once()?;
        info!(
            poll_interval_secs = cycle.poll_interval_secs,
            "cycle complete, sleeping"
        );
        thread::sleep(Duration::from_secs(cycle.poll_interval_secs));
    }
}
