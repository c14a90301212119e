use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AircheckPaths {
    pub aircheck_home: PathBuf,
    pub intake_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub unrecognized_dir: PathBuf,
    pub work_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub song_log_file: PathBuf,
    pub upload_ledger_file: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<AircheckPaths> {
    let home = required_home_dir()?;
    let aircheck_home = env_or_default_path("AIRCHECK_HOME", home.join("aircheck"));

    let intake_dir = env_or_default_path("AIRCHECK_INTAKE_DIR", aircheck_home.join("to_process"));
    let processed_dir =
        env_or_default_path("AIRCHECK_PROCESSED_DIR", aircheck_home.join("processed_songs"));
    let unrecognized_dir =
        env_or_default_path("AIRCHECK_UNRECOGNIZED_DIR", intake_dir.join("unrecognized"));
    let work_dir = env_or_default_path("AIRCHECK_WORK_DIR", aircheck_home.join("work"));
    let logs_dir = env_or_default_path("AIRCHECK_LOGS_DIR", aircheck_home.join("logs"));
    let song_log_file =
        env_or_default_path("AIRCHECK_SONG_LOG", aircheck_home.join("songs.txt"));
    let upload_ledger_file = env_or_default_path(
        "AIRCHECK_UPLOAD_LEDGER",
        aircheck_home.join("uploaded_files.json"),
    );

    Ok(AircheckPaths {
        aircheck_home,
        intake_dir,
        processed_dir,
        unrecognized_dir,
        work_dir,
        logs_dir,
        song_log_file,
        upload_ledger_file,
    })
}
