use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::fs;
use tracing::warn;

use crate::{error::ConversionResult, util::random::generate_alphanumeric};

/// Scratch directory owned by one conversion. It is removed by `clean_up`,
/// or on drop when the owning future is cancelled first.
#[derive(Debug)]
pub struct TempJobFileProvider {
    job_directory: TempDir,
}

impl TempJobFileProvider {
    pub async fn build(base: &Path, job_id: &str) -> ConversionResult<TempJobFileProvider> {
        fs::create_dir_all(base).await?;
        let job_directory = tempfile::Builder::new().prefix(&format!("{}-", job_id)).tempdir_in(base)?;
        Ok(TempJobFileProvider { job_directory })
    }

    pub fn clean_up(self) {
        let path = self.job_directory.path().to_path_buf();
        if let Err(err) = self.job_directory.close() {
            warn!("Error occured, while deleting temp job files for {}: {}", path.display(), &err)
        }
    }

    pub fn directory(&self) -> &Path {
        self.job_directory.path()
    }

    pub fn get_path(&self) -> PathBuf {
        self.directory().join(generate_alphanumeric(30))
    }

    /// Fresh, empty subdirectory.
    pub async fn create_dir(&self) -> ConversionResult<PathBuf> {
        let dir = self.get_path();
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}
