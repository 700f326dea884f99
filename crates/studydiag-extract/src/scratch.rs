//! Scratch directory holding a document for an external tool.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

/// A document written to its own temporary directory.
///
/// On drop, the temporary directory is automatically cleaned up.
pub struct ScratchFile {
    dir: TempDir,
    path: PathBuf,
}

impl ScratchFile {
    /// Write `bytes` to `file_name` inside a fresh temporary directory.
    pub fn write(file_name: &str, bytes: &[u8]) -> Result<Self> {
        let dir = TempDir::new().context("failed to create temp directory")?;
        // Only the final path component is used.
        let name = Path::new(file_name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "document".into());
        let path = dir.path().join(name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(Self { dir, path })
    }

    /// Path of the written document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directory containing it.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_cleans_up() {
        let dir;
        {
            let scratch = ScratchFile::write("answers.pdf", b"%PDF-1.7").unwrap();
            dir = scratch.dir().to_path_buf();
            assert_eq!(std::fs::read(scratch.path()).unwrap(), b"%PDF-1.7");
            assert!(scratch.path().ends_with("answers.pdf"));
        }
        assert!(!dir.exists());
    }

    #[test]
    fn strips_directory_components() {
        let scratch = ScratchFile::write("../../etc/passwd", b"x").unwrap();
        assert_eq!(scratch.path().parent().unwrap(), scratch.dir());
        assert!(scratch.path().ends_with("passwd"));
    }
}
