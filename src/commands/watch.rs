use anyhow::Result;

use crate::commands::CommandReport;
use crate::pipeline::watcher;

#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub once: bool,
    pub daemon: bool,
}

pub fn run(opts: &WatchOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("watch");

    if opts.once && opts.daemon {
        report.issue("invalid flags: use only one of --once or --daemon");
        return Ok(report);
    }

    if opts.daemon {
        report.detail("starting watcher in daemon mode");
        watcher::run_daemon()?;
        return Ok(report);
    }

    let cycle = watcher::run_once()?;
    report.detail("watch cycle completed");
    report.detail(format!("scanned={}", cycle.scanned));
    report.detail(format!("recognized={}", cycle.recognized));
    report.detail(format!("unrecognized={}", cycle.unrecognized));
    report.detail(format!("skipped={}", cycle.skipped));
    report.detail(format!("failed={}", cycle.failed));
    report.detail(format!(
        "pending_uploads.attempted={}",
        cycle.pending_uploads_attempted
    ));
    report.detail(format!(
        "pending_uploads.completed={}",
        cycle.pending_uploads_completed
    ));
    report.detail(format!("poll_interval_secs={}", cycle.poll_interval_secs));

    if cycle.failed > 0 {
        report.issue(format!("{} file(s) failed this cycle", cycle.failed));
    }

    Ok(report)
}
