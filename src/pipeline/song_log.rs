use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Normalized identity of a discovered song. Two signatures are equal iff
/// their case-folded string forms are equal; fuzzy comparison belongs to the
/// filename validator, never to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongSignature {
    artist: String,
    title: String,
}

impl SongSignature {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }

    /// The line written to the log, `Artist - Title`.
    pub fn display_line(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }

    fn folded(&self) -> String {
        self.display_line().to_lowercase()
    }
}

impl std::fmt::Display for SongSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_line())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SeenOutcome {
    pub was_new: bool,
}

/// Check-then-append against the song log as one atomic step.
///
/// The log is a plain-text, append-only file, one `Artist - Title` line per
/// newly discovered song; it doubles as the human-readable discovery history.
/// An exclusive lock covers the whole read-scan-append sequence so two files
/// being processed at once cannot both append the same new signature.
pub fn seen_or_record(log_path: &Path, signature: &SongSignature) -> Result<SeenOutcome> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut file = fs::OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;
    file.lock_exclusive()
        .with_context(|| format!("failed to lock {}", log_path.display()))?;

    let outcome = check_and_append(&mut file, signature);

    let _ = fs2::FileExt::unlock(&file);
    outcome.with_context(|| format!("failed to update {}", log_path.display()))
}

fn check_and_append(file: &mut fs::File, signature: &SongSignature) -> Result<SeenOutcome> {
    file.seek(SeekFrom::Start(0))?;
    let mut existing = String::new();
    file.read_to_string(&mut existing)?;

    let wanted = signature.folded();
    let seen = existing
        .lines()
        .any(|line| line.trim().to_lowercase() == wanted);
    if seen {
        return Ok(SeenOutcome { was_new: false });
    }

    file.write_all(format!("{}\n", signature.display_line()).as_bytes())?;
    Ok(SeenOutcome { was_new: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_record_is_new_then_duplicate() {
        let tmp = tempdir().expect("tempdir");
        let log = tmp.path().join("songs.txt");
        let signature = SongSignature::new("Daft Punk", "One More Time");

        let first = seen_or_record(&log, &signature).expect("first");
        assert!(first.was_new);
        let second = seen_or_record(&log, &signature).expect("second");
        assert!(!second.was_new);

        let contents = fs::read_to_string(&log).expect("read log");
        let matching = contents
            .lines()
            .filter(|l| *l == "Daft Punk - One More Time")
            .count();
        assert_eq!(matching, 1);
    }

    #[test]
    fn duplicate_detection_is_case_folded() {
        let tmp = tempdir().expect("tempdir");
        let log = tmp.path().join("songs.txt");

        let first = seen_or_record(&log, &SongSignature::new("The Beatles", "Hey Jude"))
            .expect("first");
        assert!(first.was_new);
        let second = seen_or_record(&log, &SongSignature::new("the beatles", "HEY JUDE"))
            .expect("second");
        assert!(!second.was_new);

        let contents = fs::read_to_string(&log).expect("read log");
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn distinct_signatures_each_get_a_line() {
        let tmp = tempdir().expect("tempdir");
        let log = tmp.path().join("songs.txt");

        seen_or_record(&log, &SongSignature::new("Air", "La Femme d'Argent")).expect("first");
        seen_or_record(&log, &SongSignature::new("Air", "Sexy Boy")).expect("second");

        let contents = fs::read_to_string(&log).expect("read log");
        assert_eq!(contents.lines().count(), 2);
    }
}
