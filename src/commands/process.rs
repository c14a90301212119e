use anyhow::Result;
use std::path::Path;

use crate::commands::CommandReport;
use crate::ffmpeg::gateway::Codec;
use crate::pipeline::config::load_config;
use crate::pipeline::notify::Notifier;
use crate::pipeline::paths::resolve_paths;
use crate::pipeline::recognize::{HttpRecognizer, Recognizer};
use crate::pipeline::{FileOutcome, process_file};

pub fn run(file: &Path) -> Result<CommandReport> {
    let mut report = CommandReport::new("process");

    if !file.is_file() {
        report.issue(format!("not a file: {}", file.display()));
        return Ok(report);
    }

    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let codec = Codec::resolve()?;
    let recognizer = HttpRecognizer::from_config(&cfg.recognizer)?;
    let notifier = Notifier::new(cfg.notify.webhook_url.clone());

    let recognizer_ref: Option<&dyn Recognizer> =
        recognizer.as_ref().map(|r| r as &dyn Recognizer);
    match process_file(&paths, &cfg, &codec, recognizer_ref, &notifier, file)? {
        FileOutcome::SkippedUnsupported => {
            report.detail(format!("skipped unsupported format: {}", file.display()));
        }
        FileOutcome::Processed {
            final_path,
            track,
            upload,
        } => {
            match track {
                Some(track) => {
                    report.detail(format!("recognized={} - {}", track.artist, track.title));
                }
                None => report.detail("recognized=no".to_string()),
            }
            report.detail(format!("final_path={}", final_path.display()));
            if let Some(upload) = upload {
                report.detail(format!("upload={upload:?}"));
            }
        }
    }

    Ok(report)
}
