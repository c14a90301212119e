use crate::pipeline::config::ValidationConfig;
use strsim::normalized_levenshtein;
use tracing::debug;

fn normalize(raw: &str) -> String {
    let folded: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' { ' ' } else { c })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn file_stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => file_name,
    }
}

/// Cross-check a recognized (artist, title) against the source filename's
/// `ARTIST - TITLE` convention. Recognition services occasionally return a
/// plausible-but-wrong track for noisy segments; when the operator's naming
/// is trustworthy this is a cheap local guard rail.
///
/// A filename without a hyphen separator fails closed.
pub fn filename_matches(
    artist: &str,
    title: &str,
    file_name: &str,
    policy: &ValidationConfig,
) -> bool {
    let stem = file_stem(file_name);
    let Some((file_artist, file_title)) = stem.split_once('-') else {
        debug!(file = file_name, "no artist-title separator in filename");
        return false;
    };

    let artist_ratio = normalized_levenshtein(&normalize(artist), &normalize(file_artist));
    let title_ratio = normalized_levenshtein(&normalize(title), &normalize(file_title));
    debug!(
        file = file_name,
        artist_ratio, title_ratio, "filename similarity"
    );

    artist_ratio >= policy.artist_threshold && title_ratio >= policy.title_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ValidationConfig {
        ValidationConfig {
            enabled: true,
            artist_threshold: 0.7,
            title_threshold: 0.7,
        }
    }

    #[test]
    fn accepts_underscored_lowercase_filename() {
        assert!(filename_matches(
            "The Beatles",
            "Hey Jude",
            "the_beatles - hey_jude.mp3",
            &policy(),
        ));
    }

    #[test]
    fn rejects_unrelated_filename() {
        assert!(!filename_matches(
            "Artist A",
            "Song X",
            "totally_unrelated_name.mp3",
            &policy(),
        ));
    }

    #[test]
    fn fails_closed_without_separator() {
        assert!(!filename_matches(
            "Daft Punk",
            "One More Time",
            "onemoretime.mp3",
            &policy(),
        ));
    }

    #[test]
    fn both_sides_must_clear_their_threshold() {
        // Artist matches exactly, title does not.
        assert!(!filename_matches(
            "Daft Punk",
            "Around The World",
            "daft_punk - one_more_time.mp3",
            &policy(),
        ));
    }
}
