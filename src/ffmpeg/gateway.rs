use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Handle on the external ffmpeg/ffprobe binaries. Segment planning stays in
/// the pipeline; everything that actually touches audio bytes goes through
/// here, so the extraction strategy can change without touching planning.
#[derive(Debug, Clone)]
pub struct Codec {
    ffmpeg_bin: PathBuf,
    ffprobe_bin: PathBuf,
}

fn resolve_bin(var: &str, name: &str) -> Result<PathBuf> {
    if let Ok(custom) = env::var(var) {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            let path = PathBuf::from(trimmed);
            if !path.is_file() {
                anyhow::bail!("{var} does not point to a file: {}", path.display());
            }
            return Ok(path);
        }
    }
    which::which(name).with_context(|| format!("{name} not found on PATH (set {var} to override)"))
}

fn run_checked(cmd: &mut Command, what: &str) -> Result<Output> {
    let out = cmd
        .output()
        .with_context(|| format!("failed to spawn {what}"))?;
    if !out.status.success() {
        anyhow::bail!(
            "{what} failed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        );
    }
    Ok(out)
}

fn fmt_secs(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

impl Codec {
    pub fn resolve() -> Result<Self> {
        Ok(Self {
            ffmpeg_bin: resolve_bin("FFMPEG_BIN", "ffmpeg")?,
            ffprobe_bin: resolve_bin("FFPROBE_BIN", "ffprobe")?,
        })
    }

    pub fn with_binaries(ffmpeg_bin: PathBuf, ffprobe_bin: PathBuf) -> Self {
        Self {
            ffmpeg_bin,
            ffprobe_bin,
        }
    }

    /// Container duration in milliseconds, via ffprobe's format section.
    pub fn probe_duration_ms(&self, path: &Path) -> Result<u64> {
        let out = run_checked(
            Command::new(&self.ffprobe_bin).args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ]).arg(path),
            "ffprobe",
        )?;

        let raw = String::from_utf8_lossy(&out.stdout);
        let secs: f64 = raw
            .trim()
            .parse()
            .with_context(|| format!("unparseable ffprobe duration for {}: {raw:?}", path.display()))?;
        Ok((secs * 1000.0).round() as u64)
    }

    /// Cut `[start, start+duration)` out of `src` into `dest` as a lossless
    /// stream copy.
    pub fn extract_segment(
        &self,
        src: &Path,
        start_ms: u64,
        duration_ms: u64,
        dest: &Path,
    ) -> Result<()> {
        run_checked(
            Command::new(&self.ffmpeg_bin)
                .args(["-nostdin", "-v", "error", "-ss", &fmt_secs(start_ms), "-t", &fmt_secs(duration_ms), "-i"])
                .arg(src)
                .args(["-acodec", "copy", "-y"])
                .arg(dest),
            "ffmpeg segment extraction",
        )?;
        Ok(())
    }

    /// Re-encode `src` to an mp3 sibling (same stem, `.mp3` extension) and
    /// return the new path. The caller decides what happens to the original.
    pub fn convert_to_mp3(&self, src: &Path) -> Result<PathBuf> {
        let dest = src.with_extension("mp3");
        run_checked(
            Command::new(&self.ffmpeg_bin)
                .args(["-nostdin", "-v", "error", "-i"])
                .arg(src)
                .args(["-codec:a", "libmp3lame", "-q:a", "2", "-y"])
                .arg(&dest),
            "ffmpeg mp3 conversion",
        )?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::fmt_secs;

    #[test]
    fn fmt_secs_pads_milliseconds() {
        assert_eq!(fmt_secs(45_000), "45.000");
        assert_eq!(fmt_secs(105_250), "105.250");
        assert_eq!(fmt_secs(7), "0.007");
    }
}
