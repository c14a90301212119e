use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::commands::CommandReport;
use crate::pipeline::config::load_config;
use crate::pipeline::paths::resolve_paths;

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .count()
}

fn count_lines(file: &Path) -> usize {
    fs::read_to_string(file)
        .map(|raw| raw.lines().filter(|l| !l.trim().is_empty()).count())
        .unwrap_or(0)
}

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("status");
    let paths = resolve_paths()?;
    let cfg = load_config()?;

    report.detail(format!("home={}", paths.aircheck_home.display()));
    report.detail(format!(
        "intake={} files={}",
        paths.intake_dir.display(),
        count_files(&paths.intake_dir)
    ));
    report.detail(format!(
        "processed={} files={}",
        paths.processed_dir.display(),
        count_files(&paths.processed_dir)
    ));
    report.detail(format!(
        "unrecognized={} files={}",
        paths.unrecognized_dir.display(),
        count_files(&paths.unrecognized_dir)
    ));
    report.detail(format!(
        "song_log={} entries={}",
        paths.song_log_file.display(),
        count_lines(&paths.song_log_file)
    ));
    report.detail(format!(
        "upload_ledger={}",
        paths.upload_ledger_file.display()
    ));
    report.detail(format!(
        "segment.duration_ms={} stride={} start_offset_ms={}",
        cfg.segment.duration_ms, cfg.segment.stride, cfg.segment.start_offset_ms
    ));
    report.detail(format!(
        "validation.enabled={} thresholds={}/{}",
        cfg.validation.enabled, cfg.validation.artist_threshold, cfg.validation.title_threshold
    ));
    report.detail(format!(
        "recognizer.configured={}",
        cfg.recognizer.endpoint.is_some()
    ));
    report.detail(format!(
        "upload.configured={}",
        cfg.upload.credentials().is_some()
    ));
    report.detail(format!(
        "notify.configured={}",
        cfg.notify.webhook_url.is_some()
    ));

    Ok(report)
}
