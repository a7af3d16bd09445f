//! Saving processed results on the host.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::images::RemoteId;

/// Host file-save mechanism for downloaded results.
pub trait SaveTarget {
    /// Writes `bytes` under `file_name` and returns where they ended up.
    ///
    /// # Errors
    /// Any I/O error from the host.
    fn save(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Saves into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct DirectoryTarget {
    dir: PathBuf,
}

impl DirectoryTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SaveTarget for DirectoryTarget {
    fn save(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// File name for a downloaded result: `photoprep_<remote id>.jpg`.
///
/// Characters that are not safe in a file name are replaced with `_`.
pub fn download_file_name(remote_id: &RemoteId) -> String {
    let safe: String = remote_id
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("photoprep_{safe}.jpg")
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_download_file_name() {
        assert_eq!(
            download_file_name(&RemoteId::new("img_abc123")),
            "photoprep_img_abc123.jpg"
        );
        assert_eq!(
            download_file_name(&RemoteId::new("../etc/passwd")),
            "photoprep____etc_passwd.jpg"
        );
    }

    #[test]
    fn test_directory_target_creates_dir() {
        let dir = tempdir().unwrap();
        let target = DirectoryTarget::new(dir.path().join("out"));

        let path = target.save("photoprep_x.jpg", b"bytes").unwrap();

        assert_eq!(path, dir.path().join("out").join("photoprep_x.jpg"));
        assert_eq!(fs::read(&path).unwrap(), b"bytes");
    }
}
