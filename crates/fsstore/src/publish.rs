//! Atomic publication of object files.
//!
//! Bytes are written to a hidden staging file next to their destination and
//! renamed onto the object link once complete and synced. A reader either
//! sees no file at the link or the whole object, never a prefix of it.
//!
//! Staging files are named `.tmp-<uuid>`. The leading dot keeps them out of
//! listings, and a staging file that is never published is removed on drop.

use std::fs::{self, DirBuilder, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

const STAGING_PREFIX: &str = ".tmp-";

/// True for names the store uses for in-flight writes.
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX)
}

/// Create `dir` and its missing parents with the given mode (unix only).
pub(crate) fn ensure_dir(dir: &Path, mode: u32) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(dir)
}

/// An in-progress object file.
#[derive(Debug)]
pub(crate) struct StagedFile {
    path: PathBuf,
    file: Option<File>,
    bytes_written: u64,
}

impl StagedFile {
    /// Create a fresh staging file inside `dir`, which must exist.
    pub(crate) fn create_in(dir: &Path) -> io::Result<Self> {
        let path = dir.join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4().simple()));
        let file = File::options().write(true).create_new(true).open(&path)?;
        Ok(Self {
            path,
            file: Some(file),
            bytes_written: 0,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub(crate) fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => {
                file.write_all(data)?;
                self.bytes_written += data.len() as u64;
                Ok(())
            }
            None => Err(io::Error::other("staging file already closed")),
        }
    }

    /// Sync and rename onto `link`, replacing whatever is there.
    ///
    /// The link's parent directory must already exist. On failure the
    /// staging file is still removed when `self` drops.
    pub(crate) fn publish(mut self, link: &Path) -> io::Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        fs::rename(&self.path, link)?;
        // Renamed away: nothing left for drop to clean up.
        self.path = PathBuf::new();
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.file.take();
        if !self.path.as_os_str().is_empty() {
            let _ = fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_staging_names() {
        assert!(is_staging_name(".tmp-0123abcd"));
        assert!(!is_staging_name("0123abcd"));
    }

    #[test]
    fn test_publish_moves_file() -> io::Result<()> {
        let dir = TempDir::new()?;
        let mut staged = StagedFile::create_in(dir.path())?;
        staged.write_all(b"Hello, ")?;
        staged.write_all(b"World!")?;
        assert_eq!(staged.bytes_written(), 13);

        let staging_path = staged.path().to_path_buf();
        let link = dir.path().join("final");
        staged.publish(&link)?;

        assert!(!staging_path.exists());
        assert_eq!(fs::read(&link)?, b"Hello, World!");
        Ok(())
    }

    #[test]
    fn test_drop_removes_unpublished() -> io::Result<()> {
        let dir = TempDir::new()?;
        let mut staged = StagedFile::create_in(dir.path())?;
        staged.write_all(b"abandoned")?;
        let staging_path = staged.path().to_path_buf();
        assert!(staging_path.exists());

        drop(staged);
        assert!(!staging_path.exists());
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_failed_publish_cleans_up() -> io::Result<()> {
        let dir = TempDir::new()?;
        let staged = StagedFile::create_in(dir.path())?;
        let missing_parent = dir.path().join("no/such/dir/link");

        assert!(staged.publish(&missing_parent).is_err());
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_publish_replaces_existing() -> io::Result<()> {
        let dir = TempDir::new()?;
        let link = dir.path().join("obj");
        fs::write(&link, b"same")?;

        let mut staged = StagedFile::create_in(dir.path())?;
        staged.write_all(b"same")?;
        staged.publish(&link)?;

        assert_eq!(fs::read(&link)?, b"same");
        Ok(())
    }

    #[test]
    fn test_ensure_dir_nested() -> io::Result<()> {
        let dir = TempDir::new()?;
        let nested = dir.path().join("a/b/c");
        ensure_dir(&nested, 0o755)?;
        assert!(nested.is_dir());
        // Existing directories are fine.
        ensure_dir(&nested, 0o755)?;
        Ok(())
    }
}
