use crate::web::error::{ApiError, ApiResult};
use std::path::{Component, Path, PathBuf};

/// Blob storage keyed by opaque relative folder paths under one root.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder paths arrive from clients; anything that could escape the
    /// storage root is rejected before it touches the filesystem.
    pub fn validate_folder(folder: &str) -> ApiResult<()> {
        if folder.is_empty() {
            return Err(ApiError::bad_request("Bad request: empty storage path"));
        }
        let path = Path::new(folder);
        let safe = path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(ApiError::bad_request(format!(
                "Bad request: invalid storage path `{}`",
                folder
            )));
        }
        Ok(())
    }

    pub fn folder_exists(&self, folder: &str) -> bool {
        self.root.join(folder).is_dir()
    }

    pub fn save_file(&self, folder: &str, file_name: &str, data: &[u8]) -> ApiResult<()> {
        Self::validate_folder(folder)?;
        let dir = self.root.join(folder);
        std::fs::create_dir_all(&dir).map_err(ApiError::DirectoryCreate)?;
        std::fs::write(dir.join(file_name), data).map_err(ApiError::FileWrite)?;
        Ok(())
    }

    /// Removes a single file; missing files are not an error.
    pub fn delete_file(&self, folder: &str, file_name: &str) -> ApiResult<()> {
        Self::validate_folder(folder)?;
        let path = self.root.join(folder).join(file_name);
        if path.is_file() {
            std::fs::remove_file(&path).map_err(ApiError::FileWrite)?;
        }
        Ok(())
    }

    pub fn delete_folder(&self, folder: &str) -> ApiResult<()> {
        Self::validate_folder(folder)?;
        std::fs::remove_dir_all(self.root.join(folder)).map_err(|e| {
            ApiError::DirectoryDelete(format!("Failed to delete directory {}: {}", folder, e))
        })
    }
}
