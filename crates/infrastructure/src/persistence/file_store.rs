//! File-backed key-value store.
//!
//! Each key is stored as its own file under a directory:
//!
//! ```text
//! ~/.local/share/passage/
//!   access_token
//!   refresh_token
//!   user
//! ```
//!
//! Writes go to a hidden temporary file that is then renamed over the
//! target, so a crash never leaves a half-written entry behind. On unix
//! the entries are readable by the owner only.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use passage_application::ports::{KeyValueStore, StorageError};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Key-value store with one file per key.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the file path for a key.
    fn entry_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(self.dir.join(key))
        } else {
            Err(StorageError::Unavailable(format!("invalid key: {key:?}")))
        }
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.entry_path(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(StorageError::Serialization(
                format!("{key} is not valid UTF-8"),
            )),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.entry_path(key)?;
        fs::create_dir_all(&self.dir).await?;

        let tmp = self.dir.join(format!(".{key}.tmp"));
        write_private(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        debug!(key, path = %path.display(), "entry written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, "entry removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Writes `value` to `path`, creating it with mode 0600 on unix.
async fn write_private(path: &Path, value: &str) -> Result<(), StorageError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(value.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
