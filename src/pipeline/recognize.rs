use crate::ffmpeg::gateway::Codec;
use crate::pipeline::config::RecognizerConfig;
use crate::pipeline::segment::SegmentPlan;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMatch {
    pub title: String,
    pub artist: String,
    pub cover_art: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionVerdict {
    Matched(TrackMatch),
    NoMatch,
}

/// One call against the recognition service. `Ok(None)` means the service
/// answered but found no track.
pub trait Recognizer {
    fn recognize(&self, segment_path: &Path) -> Result<Option<TrackMatch>>;
}

/// HTTP client for a Shazam-style recognition endpoint: POST the raw segment
/// bytes, get back `{"track": {"title", "subtitle", "images": {"coverart"}}}`
/// on a hit and an empty object otherwise.
pub struct HttpRecognizer {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpRecognizer {
    /// `None` when no endpoint is configured; the pipeline then treats every
    /// file as unrecognized instead of erroring.
    pub fn from_config(cfg: &RecognizerConfig) -> Result<Option<Self>> {
        let Some(endpoint) = cfg.endpoint.clone() else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("failed to build recognizer client")?;
        Ok(Some(Self {
            endpoint,
            api_key: cfg.api_key.clone(),
            client,
        }))
    }

    fn parse_track(body: &Value) -> Option<TrackMatch> {
        let track = body.get("track")?;
        let title = track.get("title").and_then(Value::as_str)?.to_string();
        let artist = track.get("subtitle").and_then(Value::as_str)?.to_string();
        let cover_art = track
            .get("images")
            .and_then(|images| images.get("coverart"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);

        Some(TrackMatch {
            title,
            artist,
            cover_art,
        })
    }
}

impl Recognizer for HttpRecognizer {
    fn recognize(&self, segment_path: &Path) -> Result<Option<TrackMatch>> {
        let bytes = fs::read(segment_path)
            .with_context(|| format!("failed to read {}", segment_path.display()))?;

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "audio/mpeg")
            .body(bytes);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().context("recognition request failed")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("recognition service returned {status}");
        }

        let body: Value = response
            .json()
            .context("invalid JSON from recognition service")?;
        Ok(Self::parse_track(&body))
    }
}

/// Try planned segments in order until the service reports a track.
///
/// First hit wins; remaining segments are never materialized. A collaborator
/// failure (extraction or recognition) counts as no-match for that segment
/// only — one bad segment never sinks the whole file. An empty plan returns
/// `NoMatch` without a single recognizer call.
pub fn run_attempts(
    codec: &Codec,
    recognizer: &dyn Recognizer,
    source: &Path,
    plan: SegmentPlan,
    work_dir: &Path,
    attempt_delay: Duration,
) -> RecognitionVerdict {
    let planned = plan.planned_len();
    debug!(file = %source.display(), planned, "starting recognition attempts");

    for segment in plan {
        thread::sleep(attempt_delay);

        let chunk_path = work_dir.join(format!("chunk_{}.mp3", segment.index));
        if let Err(err) =
            codec.extract_segment(source, segment.start_ms, segment.duration_ms, &chunk_path)
        {
            warn!(
                segment = segment.index,
                "segment extraction failed, skipping: {err:#}"
            );
            continue;
        }

        match recognizer.recognize(&chunk_path) {
            Ok(Some(track)) => {
                info!(
                    segment = segment.index,
                    artist = %track.artist,
                    title = %track.title,
                    "track recognized"
                );
                return RecognitionVerdict::Matched(track);
            }
            Ok(None) => {
                debug!(segment = segment.index, "no track in segment");
            }
            Err(err) => {
                warn!(
                    segment = segment.index,
                    "recognition attempt failed, treating as no match: {err:#}"
                );
            }
        }
    }

    RecognitionVerdict::NoMatch
}
