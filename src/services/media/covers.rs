use std::fs;
use std::path::{Path, PathBuf};

use super::error::MediaError;

/// Durable cover art storage, keyed by player id.
///
/// Each player owns exactly one slot; a new blob for the same id overwrites
/// the previous one. Only the content path is handed out, never blob bytes.
#[derive(Debug, Clone)]
pub struct CoverStore {
    dir: PathBuf,
}

impl CoverStore {
    /// Open a cover store rooted at the given directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::InitializationFailed`] if the directory cannot
    /// be created.
    pub fn new(dir: PathBuf) -> Result<Self, MediaError> {
        fs::create_dir_all(&dir).map_err(|e| {
            MediaError::InitializationFailed(format!(
                "cover directory {} unavailable: {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    /// Default store location under the system temp directory.
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("soundring").join("covers")
    }

    /// Directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a cover blob for a player, replacing any previous one.
    ///
    /// Returns the content path to attach to the player record.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::CoverStore`] if the write fails.
    pub fn write(&self, player_id: u32, blob: &[u8]) -> Result<PathBuf, MediaError> {
        let path = self.dir.join(format!("{player_id}.png"));
        fs::write(&path, blob).map_err(|source| MediaError::CoverStore { player_id, source })?;
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn blobs_are_keyed_by_player_and_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CoverStore::new(tmp.path().join("covers")).unwrap();

        let first = store.write(5, b"first").unwrap();
        assert_eq!(first.file_name().unwrap(), "5.png");
        assert_eq!(fs::read(&first).unwrap(), b"first");

        let second = store.write(5, b"second").unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read(&second).unwrap(), b"second");

        let other = store.write(6, b"other").unwrap();
        assert_ne!(first, other);
    }
}
