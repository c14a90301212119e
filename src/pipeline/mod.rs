pub mod config;
pub mod journal;
pub mod notify;
pub mod paths;
pub mod recognize;
pub mod route;
pub mod segment;
pub mod song_log;
pub mod tag;
pub mod upload;
pub mod validate;
pub mod watcher;

use crate::error::PipelineError;
use crate::ffmpeg::gateway::Codec;
use crate::pipeline::config::AircheckConfig;
use crate::pipeline::notify::Notifier;
use crate::pipeline::paths::AircheckPaths;
use crate::pipeline::recognize::{RecognitionVerdict, Recognizer, TrackMatch, run_attempts};
use crate::pipeline::segment::SegmentPlan;
use crate::pipeline::song_log::SongSignature;
use crate::pipeline::upload::{UploadLedger, UploadOutcome, attempt_upload};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Terminal result of one file's processing cycle.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    /// Extension outside the supported set; the file was left untouched.
    SkippedUnsupported,
    /// The file went through the full pipeline and reached a terminal
    /// directory.
    Processed {
        final_path: PathBuf,
        track: Option<TrackMatch>,
        upload: Option<UploadOutcome>,
    },
}

impl FileOutcome {
    pub fn recognized(&self) -> bool {
        matches!(
            self,
            FileOutcome::Processed { track: Some(_), .. }
        )
    }
}

fn is_supported(extension: &str) -> bool {
    matches!(extension.to_ascii_lowercase().as_str(), "mp3" | "m4a")
}

fn needs_conversion(extension: &str) -> bool {
    extension.eq_ignore_ascii_case("m4a")
}

fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}

fn basename(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string()
}

/// Drive one raw recording through the whole pipeline: format gate,
/// container conversion, segmentation, the recognition attempt loop,
/// optional filename validation, tagging, dedup record, terminal move, and
/// the guarded upload.
pub fn process_file(
    paths: &AircheckPaths,
    cfg: &AircheckConfig,
    codec: &Codec,
    recognizer: Option<&dyn Recognizer>,
    notifier: &Notifier,
    file: &Path,
) -> Result<FileOutcome, PipelineError> {
    let extension = file_extension(file);
    if !is_supported(&extension) {
        info!(file = %file.display(), "ignoring unsupported file format");
        return Ok(FileOutcome::SkippedUnsupported);
    }

    // Container conversion happens before anything else; from here on the
    // working name is the converted basename.
    let working = if needs_conversion(&extension) {
        info!(file = %file.display(), "converting m4a capture to mp3");
        let converted = codec
            .convert_to_mp3(file)
            .map_err(|err| PipelineError::ConversionFailure {
                path: file.to_path_buf(),
                reason: format!("{err:#}"),
            })?;
        fs::remove_file(file).map_err(|err| PipelineError::ConversionFailure {
            path: file.to_path_buf(),
            reason: format!("failed to remove original after conversion: {err}"),
        })?;
        converted
    } else {
        file.to_path_buf()
    };

    let verdict = recognize_file(paths, cfg, codec, recognizer, &working)?;

    let verdict = match verdict {
        RecognitionVerdict::Matched(track)
            if cfg.validation.enabled
                && !validate::filename_matches(
                    &track.artist,
                    &track.title,
                    &basename(&working),
                    &cfg.validation,
                ) =>
        {
            info!(
                file = %working.display(),
                artist = %track.artist,
                title = %track.title,
                "recognized track rejected by filename validation"
            );
            RecognitionVerdict::NoMatch
        }
        other => other,
    };

    match verdict {
        RecognitionVerdict::Matched(track) => {
            tag::apply_track_metadata(
                &working,
                &track.title,
                &track.artist,
                track.cover_art.as_deref(),
                Duration::from_secs(cfg.recognizer.cover_timeout_secs),
            )
            .map_err(|err| PipelineError::TagWriteFailure {
                path: working.clone(),
                reason: format!("{err:#}"),
            })?;

            let signature = SongSignature::new(track.artist.clone(), track.title.clone());
            match song_log::seen_or_record(&paths.song_log_file, &signature) {
                Ok(outcome) if outcome.was_new => info!(song = %signature, "new song discovered"),
                Ok(_) => info!(song = %signature, "duplicate song"),
                // Informational only; a ledger hiccup never blocks the move.
                Err(err) => warn!(song = %signature, "song log update failed: {err:#}"),
            }

            let final_path = route::route(
                &working,
                true,
                &paths.processed_dir,
                &paths.unrecognized_dir,
            )?;
            let _ = journal::append_event(
                paths,
                "process",
                "recognized",
                &format!("{} -> {}", signature, final_path.display()),
            );

            let ledger = UploadLedger::new(&paths.upload_ledger_file);
            let upload = attempt_upload(&cfg.upload, &ledger, &final_path, notifier);
            if let UploadOutcome::Failed(reason) = &upload {
                let _ = journal::append_event(paths, "upload", "failed", reason);
            }

            Ok(FileOutcome::Processed {
                final_path,
                track: Some(track),
                upload: Some(upload),
            })
        }
        RecognitionVerdict::NoMatch => {
            let final_path = route::route(
                &working,
                false,
                &paths.processed_dir,
                &paths.unrecognized_dir,
            )?;
            info!(file = %final_path.display(), "no track recognized, filed as unrecognized");
            notifier.send(&format!(
                "File {} was not recognized. Moved to unrecognized folder.",
                basename(&final_path)
            ));
            let _ = journal::append_event(
                paths,
                "process",
                "unrecognized",
                &final_path.display().to_string(),
            );

            Ok(FileOutcome::Processed {
                final_path,
                track: None,
                upload: None,
            })
        }
    }
}

/// Segment the recording and run the attempt loop inside a uniquely named,
/// self-cleaning scratch directory.
fn recognize_file(
    paths: &AircheckPaths,
    cfg: &AircheckConfig,
    codec: &Codec,
    recognizer: Option<&dyn Recognizer>,
    working: &Path,
) -> Result<RecognitionVerdict, PipelineError> {
    let Some(recognizer) = recognizer else {
        warn!("recognizer endpoint not configured, treating file as unrecognized");
        return Ok(RecognitionVerdict::NoMatch);
    };

    let total_duration_ms =
        codec
            .probe_duration_ms(working)
            .map_err(|err| PipelineError::ConversionFailure {
                path: working.to_path_buf(),
                reason: format!("{err:#}"),
            })?;
    let plan = SegmentPlan::new(
        total_duration_ms,
        cfg.segment.duration_ms,
        cfg.segment.stride,
        cfg.segment.start_offset_ms,
    );
    info!(
        file = %working.display(),
        total_duration_ms,
        segments = plan.planned_len(),
        "planned recognition segments"
    );

    fs::create_dir_all(&paths.work_dir).map_err(|err| PipelineError::ConversionFailure {
        path: paths.work_dir.clone(),
        reason: format!("failed to create work dir: {err}"),
    })?;
    let stem = working
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("capture");
    // Dropped on every exit path, so no orphaned chunk directory survives a
    // finished cycle.
    let scratch = tempfile::Builder::new()
        .prefix(&format!("{stem}."))
        .tempdir_in(&paths.work_dir)
        .map_err(|err| PipelineError::ConversionFailure {
            path: paths.work_dir.clone(),
            reason: format!("failed to create segment dir: {err}"),
        })?;

    Ok(run_attempts(
        codec,
        recognizer,
        working,
        plan,
        scratch.path(),
        Duration::from_secs(cfg.segment.attempt_delay_secs),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use id3::TagLike;
    use std::cell::RefCell;
    use tempfile::tempdir;

    struct ScriptedRecognizer {
        script: RefCell<Vec<Option<TrackMatch>>>,
        calls: RefCell<usize>,
    }

    impl ScriptedRecognizer {
        fn new(mut script: Vec<Option<TrackMatch>>) -> Self {
            script.reverse();
            Self {
                script: RefCell::new(script),
                calls: RefCell::new(0),
            }
        }
    }

    impl Recognizer for ScriptedRecognizer {
        fn recognize(&self, _segment_path: &Path) -> Result<Option<TrackMatch>> {
            *self.calls.borrow_mut() += 1;
            Ok(self.script.borrow_mut().pop().flatten())
        }
    }

    fn fake_codec(dir: &Path, probe_secs: &str) -> Codec {
        let ffmpeg = dir.join("ffmpeg");
        let ffprobe = dir.join("ffprobe");
        fs::write(
            &ffmpeg,
            "#!/usr/bin/env bash\nfor last in \"$@\"; do :; done\n: > \"$last\"\nexit 0\n",
        )
        .expect("write fake ffmpeg");
        fs::write(&ffprobe, format!("#!/usr/bin/env bash\necho \"{probe_secs}\"\n"))
            .expect("write fake ffprobe");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            for bin in [&ffmpeg, &ffprobe] {
                let mut perms = fs::metadata(bin).expect("metadata").permissions();
                perms.set_mode(0o755);
                fs::set_permissions(bin, perms).expect("chmod");
            }
        }
        Codec::with_binaries(ffmpeg, ffprobe)
    }

    fn test_paths(root: &Path) -> AircheckPaths {
        let home = root.join("aircheck");
        AircheckPaths {
            intake_dir: home.join("to_process"),
            processed_dir: home.join("processed_songs"),
            unrecognized_dir: home.join("to_process/unrecognized"),
            work_dir: home.join("work"),
            logs_dir: home.join("logs"),
            song_log_file: home.join("songs.txt"),
            upload_ledger_file: home.join("uploaded_files.json"),
            aircheck_home: home,
        }
    }

    #[test]
    fn matched_capture_is_tagged_logged_moved_and_offered_for_upload() {
        let tmp = tempdir().expect("tempdir");
        let paths = test_paths(tmp.path());
        fs::create_dir_all(&paths.intake_dir).expect("mkdir intake");
        let capture = paths.intake_dir.join("Daft Punk - One More Time.mp3");
        fs::write(&capture, vec![0u8; 256]).expect("write capture");

        let codec = fake_codec(tmp.path(), "180.0");
        let mut cfg = config::AircheckConfig::default();
        cfg.segment.attempt_delay_secs = 0;
        cfg.validation.enabled = true;

        // 180s at 30s windows, stride 2, offset 45s: samples at 45s, 105s,
        // 165s; the service answers on the second one.
        let recognizer = ScriptedRecognizer::new(vec![
            None,
            Some(TrackMatch {
                title: "One More Time".to_string(),
                artist: "Daft Punk".to_string(),
                cover_art: None,
            }),
        ]);

        let outcome = process_file(
            &paths,
            &cfg,
            &codec,
            Some(&recognizer),
            &Notifier::new(None),
            &capture,
        )
        .expect("process");

        assert_eq!(*recognizer.calls.borrow(), 2);

        let FileOutcome::Processed {
            final_path,
            track,
            upload,
        } = outcome
        else {
            panic!("expected a processed outcome");
        };
        assert_eq!(
            final_path,
            paths.processed_dir.join("Daft_Punk_-_One_More_Time.mp3")
        );
        assert!(final_path.exists());
        assert!(!capture.exists());
        assert_eq!(track.as_ref().map(|t| t.artist.as_str()), Some("Daft Punk"));

        let tag = id3::Tag::read_from_path(&final_path).expect("read tag");
        assert_eq!(tag.title(), Some("One More Time"));
        assert_eq!(tag.artist(), Some("Daft Punk"));

        let log = fs::read_to_string(&paths.song_log_file).expect("song log");
        assert_eq!(log, "Daft Punk - One More Time\n");

        // No SFTP credentials in the test config.
        assert_eq!(upload, Some(UploadOutcome::SkippedNoCredentials));

        // Segment scratch is gone once the cycle finishes.
        let leftovers = fs::read_dir(&paths.work_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn validation_rejection_routes_the_file_as_unrecognized() {
        let tmp = tempdir().expect("tempdir");
        let paths = test_paths(tmp.path());
        fs::create_dir_all(&paths.intake_dir).expect("mkdir intake");
        let capture = paths.intake_dir.join("station ident loop.mp3");
        fs::write(&capture, vec![0u8; 256]).expect("write capture");

        let codec = fake_codec(tmp.path(), "120.0");
        let mut cfg = config::AircheckConfig::default();
        cfg.segment.attempt_delay_secs = 0;
        cfg.segment.start_offset_ms = 0;
        cfg.validation.enabled = true;

        let recognizer = ScriptedRecognizer::new(vec![Some(TrackMatch {
            title: "One More Time".to_string(),
            artist: "Daft Punk".to_string(),
            cover_art: None,
        })]);

        let outcome = process_file(
            &paths,
            &cfg,
            &codec,
            Some(&recognizer),
            &Notifier::new(None),
            &capture,
        )
        .expect("process");

        let FileOutcome::Processed {
            final_path, track, ..
        } = outcome
        else {
            panic!("expected a processed outcome");
        };
        assert!(track.is_none(), "rejected match is a no-match downstream");
        assert_eq!(
            final_path,
            paths.unrecognized_dir.join("station ident loop.mp3")
        );
        assert!(
            !paths.song_log_file.exists(),
            "rejected match never reaches the song log"
        );
    }
}
