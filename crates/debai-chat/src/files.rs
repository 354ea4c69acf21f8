//! Per-session file storage.
//!
//! Uploads live under `<upload_root>/<session>/` and are attached to
//! email sent from that session; generated documents live under
//! `<output_root>/<session>/`.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use debai_core::config::{expand_home, DocumentsConfig};

use crate::error::ChatError;
use crate::types::{FileKind, SessionFileList, StoredFile};

#[derive(Debug, Clone)]
pub struct SessionFiles {
    upload_root: PathBuf,
    output_root: PathBuf,
    max_upload_bytes: u64,
}

/// Directory name for a session key.
///
/// Lowercase ASCII letters, digits and `-` are kept; every other byte
/// becomes `_XX` in uppercase hex. Distinct keys get distinct names, also
/// on case-insensitive file systems. The empty key maps to `_`.
pub fn session_dir_name(session: &str) -> String {
    if session.is_empty() {
        return "_".to_string();
    }
    let mut name = String::with_capacity(session.len());
    for byte in session.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' {
            name.push(char::from(byte));
        } else {
            name.push_str(&format!("_{:02X}", byte));
        }
    }
    name
}

/// Reject names that are empty or would escape the session directory.
fn checked_file_name(filename: &str) -> Result<&str, ChatError> {
    let name = filename.trim();
    let plain = Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
    if name.is_empty() || !plain || name.starts_with('.') {
        return Err(ChatError::InvalidFile(format!("invalid file name '{}'", filename)));
    }
    Ok(name)
}

async fn file_names(dir: &Path) -> Result<Vec<String>, ChatError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

impl SessionFiles {
    pub fn new(
        upload_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            upload_root: upload_root.into(),
            output_root: output_root.into(),
            max_upload_bytes,
        }
    }

    /// Relative directories in the config resolve against `data_dir`.
    pub fn from_config(config: &DocumentsConfig, data_dir: &Path, max_upload_mb: usize) -> Self {
        let resolve = |dir: &str| {
            let path = expand_home(dir);
            if path.is_absolute() {
                path
            } else {
                data_dir.join(path)
            }
        };
        Self::new(
            resolve(&config.upload_dir),
            resolve(&config.output_dir),
            max_upload_mb as u64 * 1024 * 1024,
        )
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn upload_dir(&self, session: &str) -> PathBuf {
        self.upload_root.join(session_dir_name(session))
    }

    pub fn output_dir(&self, session: &str) -> PathBuf {
        self.output_root.join(session_dir_name(session))
    }

    fn dir(&self, session: &str, kind: FileKind) -> PathBuf {
        match kind {
            FileKind::Uploaded => self.upload_dir(session),
            FileKind::Generated => self.output_dir(session),
        }
    }

    /// Store an upload, replacing any file of the same name.
    pub async fn save_upload(
        &self,
        session: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, ChatError> {
        let name = checked_file_name(filename)?;
        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(ChatError::InvalidFile(format!(
                "file too large (max {} MB)",
                self.max_upload_bytes / (1024 * 1024)
            )));
        }
        let dir = self.upload_dir(session);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        info!(session = %session, file = %name, size = bytes.len(), "File uploaded");
        Ok(StoredFile {
            filename: name.to_string(),
            path,
            size: bytes.len() as u64,
        })
    }

    /// Paths of every upload in the session, sorted by name.
    pub async fn attachments(&self, session: &str) -> Result<Vec<PathBuf>, ChatError> {
        let dir = self.upload_dir(session);
        Ok(file_names(&dir)
            .await?
            .into_iter()
            .map(|name| dir.join(name))
            .collect())
    }

    pub async fn list(&self, session: &str) -> Result<SessionFileList, ChatError> {
        Ok(SessionFileList {
            uploaded: file_names(&self.upload_dir(session)).await?,
            generated: file_names(&self.output_dir(session)).await?,
        })
    }

    pub async fn delete(&self, session: &str, filename: &str, kind: FileKind) -> Result<(), ChatError> {
        let name = checked_file_name(filename)?;
        let path = self.dir(session, kind).join(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(session = %session, file = %name, kind = %kind, "File deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ChatError::FileNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove both session directories. Idempotent.
    pub async fn clear(&self, session: &str) -> Result<(), ChatError> {
        for dir in [self.upload_dir(session), self.output_dir(session)] {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => debug!(dir = %dir.display(), "Session directory removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
