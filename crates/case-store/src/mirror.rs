//! Filesystem `MirrorStore`
//!
//! Writes each asset to `<root>/<case_id>/<file_id>__<file_name>` through a
//! temporary file that is persisted over the target, so readers never see a
//! half-written file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::traits::{MirrorStore, StoreResult};

/// Filesystem mirror of final asset content.
///
/// Layout: `<root>/<case_id>/<file_id>__<file_name>`
pub struct FsMirrorStore {
    root: PathBuf,
}

impl FsMirrorStore {
    /// Create a mirror rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    pub fn path_for(&self, case_id: &str, file_id: &str, file_name: &str) -> PathBuf {
        self.root
            .join(sanitize(case_id))
            .join(format!("{}__{}", sanitize(file_id), sanitize(file_name)))
    }
}

fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "_".to_string(),
        s => s.to_string(),
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> StoreResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Io(std::io::Error::other("mirror path has no parent")))?;
    fs::create_dir_all(dir)?;

    // Write to a temp file in the same directory, then rename over the target.
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl MirrorStore for FsMirrorStore {
    async fn mirror(
        &self,
        case_id: &str,
        file_id: &str,
        file_name: &str,
        content: &str,
    ) -> StoreResult<()> {
        let path = self.path_for(case_id, file_id, file_name);
        let bytes = content.as_bytes().to_vec();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?
    }
}
