use crate::pipeline::config::{UploadConfig, UploadCredentials};
use crate::pipeline::notify::Notifier;
use anyhow::{Context, Result};
use fs2::FileExt;
use ssh2::Session;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{error, info, warn};

/// Persisted set of already-uploaded basenames. Presence of a basename is
/// the sole gate that skips re-upload, whether or not the local copy still
/// exists. A basename is recorded only after the transport confirms the
/// transfer.
#[derive(Debug, Clone)]
pub struct UploadLedger {
    path: PathBuf,
}

impl UploadLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload_ledger".to_string());
        name.push_str(".lock");
        self.path.with_file_name(name)
    }

    /// Take the ledger-wide lock for a read-check-write sequence. The lock
    /// releases when the returned handle drops.
    fn lock(&self) -> Result<fs::File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let lock_path = self.lock_path();
        let lock = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("failed to open {}", lock_path.display()))?;
        lock.lock_exclusive()
            .with_context(|| format!("failed to lock {}", lock_path.display()))?;
        Ok(lock)
    }

    fn load(&self) -> Result<BTreeMap<String, bool>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    fn save(&self, entries: &BTreeMap<String, bool>) -> Result<()> {
        let data = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("failed to create {}", tmp.display()))?;
        file.write_all(format!("{data}\n").as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }

    pub fn contains(&self, basename: &str) -> Result<bool> {
        let _lock = self.lock()?;
        Ok(self.load()?.contains_key(basename))
    }

    pub fn record(&self, basename: &str) -> Result<()> {
        let _lock = self.lock()?;
        let mut entries = self.load()?;
        entries.insert(basename.to_string(), true);
        self.save(&entries)
    }
}

/// Remote side of an upload: one established session.
pub trait Transport {
    fn upload(&mut self, local: &Path, remote_dir: &str) -> Result<()>;
}

/// SFTP session over ssh2. The underlying session closes when the value
/// drops.
pub struct SftpTransport {
    session: Session,
}

impl SftpTransport {
    pub fn connect(creds: &UploadCredentials) -> Result<Self> {
        let tcp = TcpStream::connect((creds.host.as_str(), creds.port)).with_context(|| {
            format!("failed to reach {}:{}", creds.host, creds.port)
        })?;
        let mut session = Session::new().context("failed to create ssh session")?;
        session.set_tcp_stream(tcp);
        session.handshake().context("ssh handshake failed")?;
        session
            .userauth_password(&creds.username, &creds.password)
            .context("ssh authentication failed")?;
        Ok(Self { session })
    }
}

impl Transport for SftpTransport {
    fn upload(&mut self, local: &Path, remote_dir: &str) -> Result<()> {
        let sftp = self.session.sftp().context("failed to open sftp channel")?;
        let remote_dir_path = Path::new(remote_dir);

        // chdir probe: a missing remote directory is created, anything else
        // surfaces on the transfer itself.
        if sftp.opendir(remote_dir_path).is_err() {
            sftp.mkdir(remote_dir_path, 0o755)
                .with_context(|| format!("failed to create remote dir {remote_dir}"))?;
        }

        let basename = local
            .file_name()
            .context("upload source has no basename")?;
        let remote_path = remote_dir_path.join(basename);
        let data =
            fs::read(local).with_context(|| format!("failed to read {}", local.display()))?;
        let mut remote_file = sftp
            .create(&remote_path)
            .with_context(|| format!("failed to create {}", remote_path.display()))?;
        remote_file
            .write_all(&data)
            .with_context(|| format!("failed to write {}", remote_path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    AlreadyUploaded,
    SkippedNoCredentials,
    Failed(String),
}

/// Upload a file exactly once.
///
/// Already-recorded basenames succeed without touching the transport. A
/// fresh transfer runs connect → ensure-dir → put → close → record → delete
/// local, in that order; failure anywhere before the record leaves both the
/// ledger and the local file untouched so a later cycle retries.
pub fn upload_once<T, F>(
    ledger: &UploadLedger,
    file: &Path,
    remote_dir: &str,
    connect: F,
) -> Result<UploadOutcome>
where
    T: Transport,
    F: FnOnce() -> Result<T>,
{
    let basename = file
        .file_name()
        .and_then(|s| s.to_str())
        .context("upload source has no utf-8 basename")?
        .to_string();

    if ledger.contains(&basename)? {
        info!(file = basename, "already uploaded, skipping transfer");
        return Ok(UploadOutcome::AlreadyUploaded);
    }

    let mut transport = connect()?;
    transport.upload(file, remote_dir)?;
    drop(transport);

    ledger.record(&basename)?;
    fs::remove_file(file)
        .with_context(|| format!("failed to remove {} after upload", file.display()))?;
    info!(file = basename, "uploaded and removed local copy");
    Ok(UploadOutcome::Uploaded)
}

static MISSING_CREDENTIALS_LOGGED: Once = Once::new();

/// Upload entry point used by the pipeline and the pending-upload retry
/// sweep. Missing credentials are a configuration gap, not a transfer
/// failure: the step is skipped without touching ledger or file.
pub fn attempt_upload(
    cfg: &UploadConfig,
    ledger: &UploadLedger,
    file: &Path,
    notifier: &Notifier,
) -> UploadOutcome {
    let Some(creds) = cfg.credentials() else {
        MISSING_CREDENTIALS_LOGGED.call_once(|| {
            warn!("sftp credentials not fully set, uploads disabled");
        });
        return UploadOutcome::SkippedNoCredentials;
    };

    let remote_dir = creds.remote_dir.clone();
    match upload_once(ledger, file, &remote_dir, || SftpTransport::connect(&creds)) {
        Ok(UploadOutcome::Uploaded) => {
            notifier.send(&format!(
                "Uploaded and deleted {} from processed files.",
                file.file_name().map(|s| s.to_string_lossy()).unwrap_or_default()
            ));
            UploadOutcome::Uploaded
        }
        Ok(outcome) => outcome,
        Err(err) => {
            error!(file = %file.display(), "upload failed: {err:#}");
            notifier.send(&format!("Upload failed for {}", file.display()));
            UploadOutcome::Failed(format!("{err:#}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct RecordingTransport {
        uploads: Vec<(PathBuf, String)>,
        fail: bool,
    }

    impl Transport for &mut RecordingTransport {
        fn upload(&mut self, local: &Path, remote_dir: &str) -> Result<()> {
            if self.fail {
                anyhow::bail!("simulated transfer failure");
            }
            self.uploads.push((local.to_path_buf(), remote_dir.to_string()));
            Ok(())
        }
    }

    #[test]
    fn upload_records_basename_and_deletes_local_file() {
        let tmp = tempdir().expect("tempdir");
        let ledger = UploadLedger::new(tmp.path().join("uploaded_files.json"));
        let file = tmp.path().join("Daft_Punk_-_One_More_Time.mp3");
        fs::write(&file, b"audio").expect("write file");

        let mut transport = RecordingTransport {
            uploads: Vec::new(),
            fail: false,
        };
        let outcome = upload_once(&ledger, &file, "/upload", || Ok(&mut transport))
            .expect("upload");

        assert_eq!(outcome, UploadOutcome::Uploaded);
        assert_eq!(transport.uploads.len(), 1);
        assert!(!file.exists(), "local copy removed after confirmed upload");
        assert!(
            ledger
                .contains("Daft_Punk_-_One_More_Time.mp3")
                .expect("contains")
        );
    }

    #[test]
    fn second_upload_skips_the_transport_entirely() {
        let tmp = tempdir().expect("tempdir");
        let ledger = UploadLedger::new(tmp.path().join("uploaded_files.json"));
        let file = tmp.path().join("song.mp3");
        fs::write(&file, b"audio").expect("write file");
        ledger.record("song.mp3").expect("seed ledger");

        let outcome = upload_once(&ledger, &file, "/upload", || -> Result<&mut RecordingTransport> {
            panic!("transport must not be contacted for a recorded basename")
        })
        .expect("upload");

        assert_eq!(outcome, UploadOutcome::AlreadyUploaded);
        assert!(file.exists(), "skipped upload leaves the file alone");
    }

    #[test]
    fn failed_transfer_leaves_ledger_and_file_untouched() {
        let tmp = tempdir().expect("tempdir");
        let ledger = UploadLedger::new(tmp.path().join("uploaded_files.json"));
        let file = tmp.path().join("song.mp3");
        fs::write(&file, b"audio").expect("write file");

        let mut transport = RecordingTransport {
            uploads: Vec::new(),
            fail: true,
        };
        let err = upload_once(&ledger, &file, "/upload", || Ok(&mut transport))
            .expect_err("transfer failure should surface");
        assert!(err.to_string().contains("simulated transfer failure"));

        assert!(file.exists(), "file stays for a later retry");
        assert!(!ledger.contains("song.mp3").expect("contains"));
    }

    #[test]
    fn missing_credentials_skip_without_touching_anything() {
        let tmp = tempdir().expect("tempdir");
        let ledger = UploadLedger::new(tmp.path().join("uploaded_files.json"));
        let file = tmp.path().join("song.mp3");
        fs::write(&file, b"audio").expect("write file");

        let outcome = attempt_upload(
            &UploadConfig::default(),
            &ledger,
            &file,
            &Notifier::new(None),
        );

        assert_eq!(outcome, UploadOutcome::SkippedNoCredentials);
        assert!(file.exists());
        assert!(!ledger.contains("song.mp3").expect("contains"));
    }

    #[test]
    fn ledger_survives_reload() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("uploaded_files.json");
        let ledger = UploadLedger::new(&path);
        ledger.record("a.mp3").expect("record a");
        ledger.record("b.mp3").expect("record b");

        let reopened = UploadLedger::new(&path);
        assert!(reopened.contains("a.mp3").expect("contains a"));
        assert!(reopened.contains("b.mp3").expect("contains b"));
        assert!(!reopened.contains("c.mp3").expect("contains c"));
    }
}
