use std::path::{Path, PathBuf};

use crate::error::FtpError;

/// A local file about to be uploaded.
#[derive(Debug, Clone)]
pub struct FileMetaData {
    pub file_path: PathBuf,
    pub name: String,
    pub size: u64,
}

impl FileMetaData {
    /// Checks that `file_path` names an existing regular file.
    pub async fn from_local_path(file_path: &Path) -> Result<Self, FtpError> {
        let file_meta = tokio::fs::metadata(file_path).await.map_err(|_| {
            FtpError::LocalPrecondition(format!("{} does not exist", file_path.display()))
        })?;
        if !file_meta.is_file() {
            return Err(FtpError::LocalPrecondition(format!(
                "{} is not a regular file",
                file_path.display()
            )));
        }
        let name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                FtpError::LocalPrecondition(format!(
                    "{} has no usable file name",
                    file_path.display()
                ))
            })?
            .to_string();

        Ok(Self {
            file_path: file_path.to_path_buf(),
            name,
            size: file_meta.len(),
        })
    }
}
