use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    pub duration_ms: u64,
    pub stride: u64,
    pub start_offset_ms: u64,
    pub attempt_delay_secs: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            duration_ms: 30_000,
            stride: 2,
            start_offset_ms: 45_000,
            attempt_delay_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    pub poll_interval_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub enabled: bool,
    pub artist_threshold: f64,
    pub title_threshold: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            artist_threshold: 0.7,
            title_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub cover_timeout_secs: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: 30,
            cover_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub remote_dir: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 22,
            username: None,
            password: None,
            remote_dir: "/upload".to_string(),
        }
    }
}

/// SFTP credentials with every required field present.
#[derive(Debug, Clone)]
pub struct UploadCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub remote_dir: String,
}

impl UploadConfig {
    /// Returns `None` unless host, username, and password are all set.
    pub fn credentials(&self) -> Option<UploadCredentials> {
        let host = self.host.as_deref()?.trim();
        let username = self.username.as_deref()?.trim();
        let password = self.password.as_deref()?;
        if host.is_empty() || username.is_empty() || password.is_empty() {
            return None;
        }
        Some(UploadCredentials {
            host: host.to_string(),
            port: self.port,
            username: username.to_string(),
            password: password.to_string(),
            remote_dir: self.remote_dir.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AircheckConfig {
    pub segment: SegmentConfig,
    pub watcher: WatcherConfig,
    pub validation: ValidationConfig,
    pub recognizer: RecognizerConfig,
    pub upload: UploadConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialAircheckConfig {
    segment: Option<SegmentConfig>,
    watcher: Option<WatcherConfig>,
    validation: Option<ValidationConfig>,
    recognizer: Option<RecognizerConfig>,
    upload: Option<UploadConfig>,
    notify: Option<NotifyConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u16(var: &str, fallback: u16) -> u16 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u16>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_f64(var: &str, fallback: f64) -> f64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<f64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_opt_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn validate(cfg: &AircheckConfig) -> Result<()> {
    if cfg.segment.duration_ms == 0 {
        return Err(anyhow!("invalid segment duration: must be >= 1 ms"));
    }
    if cfg.segment.stride == 0 {
        return Err(anyhow!("invalid segment stride: must be >= 1"));
    }
    if cfg.watcher.poll_interval_secs == 0 {
        return Err(anyhow!(
            "invalid watcher poll interval: must be >= 1 second"
        ));
    }
    let a = cfg.validation.artist_threshold;
    let t = cfg.validation.title_threshold;
    if !(a > 0.0 && a <= 1.0) {
        return Err(anyhow!("invalid artist threshold: require 0 < ratio <= 1.0"));
    }
    if !(t > 0.0 && t <= 1.0) {
        return Err(anyhow!("invalid title threshold: require 0 < ratio <= 1.0"));
    }
    if cfg.recognizer.timeout_secs == 0 {
        return Err(anyhow!("invalid recognizer timeout: must be >= 1 second"));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("AIRCHECK_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    if let Ok(home) = env::var("AIRCHECK_HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed).join("aircheck.toml"));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join("aircheck").join("aircheck.toml"))
}

fn merge_file_config(base: &mut AircheckConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialAircheckConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse aircheck config {}: {err}", path.display()))?;
    if let Some(segment) = parsed.segment {
        base.segment = segment;
    }
    if let Some(watcher) = parsed.watcher {
        base.watcher = watcher;
    }
    if let Some(validation) = parsed.validation {
        base.validation = validation;
    }
    if let Some(recognizer) = parsed.recognizer {
        base.recognizer = recognizer;
    }
    if let Some(upload) = parsed.upload {
        base.upload = upload;
    }
    if let Some(notify) = parsed.notify {
        base.notify = notify;
    }
    Ok(())
}

pub fn load_config() -> Result<AircheckConfig> {
    let mut cfg = AircheckConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.segment.duration_ms = env_or_u64("AIRCHECK_SEGMENT_DURATION_MS", cfg.segment.duration_ms);
    cfg.segment.stride = env_or_u64("AIRCHECK_SEGMENT_STRIDE", cfg.segment.stride);
    cfg.segment.start_offset_ms =
        env_or_u64("AIRCHECK_SEGMENT_START_OFFSET_MS", cfg.segment.start_offset_ms);
    cfg.segment.attempt_delay_secs =
        env_or_u64("AIRCHECK_ATTEMPT_DELAY_SECS", cfg.segment.attempt_delay_secs);
    cfg.watcher.poll_interval_secs =
        env_or_u64("AIRCHECK_POLL_INTERVAL_SECS", cfg.watcher.poll_interval_secs);
    cfg.validation.enabled = env_or_bool("AIRCHECK_VALIDATE_FILENAME", cfg.validation.enabled);
    cfg.validation.artist_threshold =
        env_or_f64("AIRCHECK_ARTIST_THRESHOLD", cfg.validation.artist_threshold);
    cfg.validation.title_threshold =
        env_or_f64("AIRCHECK_TITLE_THRESHOLD", cfg.validation.title_threshold);
    cfg.recognizer.endpoint =
        env_opt_string("AIRCHECK_RECOGNIZER_URL", cfg.recognizer.endpoint.take());
    cfg.recognizer.api_key =
        env_opt_string("AIRCHECK_RECOGNIZER_API_KEY", cfg.recognizer.api_key.take());
    cfg.recognizer.timeout_secs =
        env_or_u64("AIRCHECK_RECOGNIZER_TIMEOUT_SECS", cfg.recognizer.timeout_secs);
    cfg.recognizer.cover_timeout_secs = env_or_u64(
        "AIRCHECK_COVER_TIMEOUT_SECS",
        cfg.recognizer.cover_timeout_secs,
    );
    cfg.upload.host = env_opt_string("SFTP_HOST", cfg.upload.host.take());
    cfg.upload.port = env_or_u16("SFTP_PORT", cfg.upload.port);
    cfg.upload.username = env_opt_string("SFTP_USERNAME", cfg.upload.username.take());
    cfg.upload.password = env_opt_string("SFTP_PASSWORD", cfg.upload.password.take());
    cfg.upload.remote_dir = env_or_string("SFTP_REMOTE_DIR", &cfg.upload.remote_dir);
    cfg.notify.webhook_url =
        env_opt_string("AIRCHECK_WEBHOOK_URL", cfg.notify.webhook_url.take());

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let cfg = AircheckConfig::default();
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn zero_stride_is_rejected() {
        let mut cfg = AircheckConfig::default();
        cfg.segment.stride = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut cfg = AircheckConfig::default();
        cfg.validation.title_threshold = 1.5;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn credentials_require_every_field() {
        let mut upload = UploadConfig::default();
        assert!(upload.credentials().is_none());

        upload.host = Some("radio.example.net".into());
        upload.username = Some("watchdog".into());
        assert!(upload.credentials().is_none());

        upload.password = Some("secret".into());
        let creds = upload.credentials().expect("complete credentials");
        assert_eq!(creds.port, 22);
        assert_eq!(creds.remote_dir, "/upload");
    }
}
