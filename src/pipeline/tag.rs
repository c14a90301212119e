use anyhow::{Context, Result};
use id3::frame::{Picture, PictureType};
use id3::{Tag, TagLike, Version};
use reqwest::blocking::Client;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of probing a file for an embedded tag. Dispatch on this instead
/// of treating "no tag yet" as a failure.
enum ExistingTag {
    Found(Tag),
    Absent,
}

fn read_tag(file: &Path) -> Result<ExistingTag> {
    match Tag::read_from_path(file) {
        Ok(tag) => Ok(ExistingTag::Found(tag)),
        Err(id3::Error {
            kind: id3::ErrorKind::NoTag,
            ..
        }) => Ok(ExistingTag::Absent),
        Err(err) => {
            Err(err).with_context(|| format!("failed to read tag from {}", file.display()))
        }
    }
}

/// Fetch or read the referenced cover art. Failures are downgraded to "no
/// cover": missing artwork never blocks a tag write. A local reference is a
/// temporary artifact and is removed after reading.
fn resolve_cover(cover_ref: &str, fetch_timeout: Duration) -> Option<Vec<u8>> {
    if cover_ref.starts_with("http://") || cover_ref.starts_with("https://") {
        let client = Client::builder().timeout(fetch_timeout).build().ok()?;
        match client.get(cover_ref).send() {
            Ok(response) if response.status().is_success() => {
                response.bytes().ok().map(|b| b.to_vec())
            }
            Ok(response) => {
                warn!(url = cover_ref, status = %response.status(), "cover download rejected");
                None
            }
            Err(err) => {
                warn!(url = cover_ref, "cover download failed: {err}");
                None
            }
        }
    } else {
        let path = Path::new(cover_ref);
        if !path.exists() {
            warn!(path = cover_ref, "cover reference does not exist");
            return None;
        }
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = cover_ref, "failed to read cover: {err}");
                return None;
            }
        };
        if let Err(err) = fs::remove_file(path) {
            warn!(path = cover_ref, "failed to remove cover artifact: {err}");
        }
        Some(bytes)
    }
}

/// Write the recognized metadata onto the original recording.
///
/// Creates a fresh tag when none exists, otherwise overwrites only title,
/// artist, and the front cover, leaving every other frame in place.
/// Re-applying the same values is a no-op on the resulting tag state.
pub fn apply_track_metadata(
    file: &Path,
    title: &str,
    artist: &str,
    cover_ref: Option<&str>,
    cover_fetch_timeout: Duration,
) -> Result<()> {
    let cover_data = cover_ref.and_then(|cover| resolve_cover(cover, cover_fetch_timeout));

    let mut tag = match read_tag(file)? {
        ExistingTag::Found(tag) => {
            debug!(file = %file.display(), "updating existing tag");
            tag
        }
        ExistingTag::Absent => {
            debug!(file = %file.display(), "no existing tag, creating one");
            Tag::new()
        }
    };

    tag.set_title(title);
    tag.set_artist(artist);
    if let Some(data) = cover_data {
        tag.remove_picture_by_type(PictureType::CoverFront);
        tag.add_frame(Picture {
            mime_type: "image/jpeg".to_string(),
            picture_type: PictureType::CoverFront,
            description: "Cover".to_string(),
            data,
        });
    }

    tag.write_to_path(file, Version::Id3v23)
        .with_context(|| format!("failed to write tag to {}", file.display()))?;
    Ok(())
}
