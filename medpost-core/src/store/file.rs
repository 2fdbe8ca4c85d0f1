//! File-backed credential storage.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{CredentialStore, StoreError, StoredCredential};
use crate::token::TokenBundle;

/// Token bundle persisted as an indented UTF-8 JSON file.
///
/// Writes go to a sibling `.tmp` file which is then renamed over the target,
/// so an interrupted write leaves either the old bundle or none at all.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store backed by the file at `path`.
    ///
    /// The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "bearer".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<StoredCredential, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoredCredential::Missing),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        match String::from_utf8(bytes) {
            Ok(raw) => Ok(StoredCredential::decode(&raw)),
            Err(e) => Ok(StoredCredential::Corrupt {
                reason: format!("credential file is not UTF-8: {}", e),
            }),
        }
    }

    async fn save(&self, bundle: &TokenBundle) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let contents = serde_json::to_string_pretty(bundle)?;
        let staging = self.staging_path();
        fs::write(&staging, contents)
            .await
            .map_err(|e| StoreError::io(&staging, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&staging, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| StoreError::io(&staging, e))?;
        }

        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;

        tracing::debug!("Saved token bundle to {}", self.path.display());
        Ok(())
    }

    async fn delete(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!("Deleted token bundle at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Secret;
    use tempfile::TempDir;

    fn test_bundle() -> TokenBundle {
        TokenBundle {
            access_token: Secret::new("access-1"),
            refresh_token: Secret::new("refresh-1"),
            token_type: "Bearer".to_string(),
            expires_at: 1_449_441_560_773,
            scope: vec!["basicProfile".to_string(), "publishPost".to_string()],
        }
    }

    fn test_store() -> (FileCredentialStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(temp_dir.path().join("nested").join("bearer.json"));
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let (store, _temp) = test_store();
        assert_eq!(store.load().await.unwrap(), StoredCredential::Missing);
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let (store, _temp) = test_store();
        let bundle = test_bundle();

        store.save(&bundle).await.unwrap();

        assert_eq!(store.load().await.unwrap(), StoredCredential::Present(bundle));
    }

    #[tokio::test]
    async fn test_saved_file_is_indented_json() {
        let (store, _temp) = test_store();
        store.save(&test_bundle()).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  \"access_token\": \"access-1\""));
        assert!(!store.staging_path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (store, _temp) = test_store();
        store.save(&test_bundle()).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_save_overwrites_wholesale() {
        let (store, _temp) = test_store();
        store.save(&test_bundle()).await.unwrap();

        let mut replacement = test_bundle();
        replacement.access_token = Secret::new("access-2");
        replacement.scope = vec![];
        store.save(&replacement).await.unwrap();

        assert_eq!(
            store.load().await.unwrap(),
            StoredCredential::Present(replacement)
        );
    }

    #[tokio::test]
    async fn test_load_truncated_file_is_corrupt() {
        let (store, _temp) = test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{\"access_token\": \"abc\", \"refr").unwrap();

        assert!(matches!(
            store.load().await.unwrap(),
            StoredCredential::Corrupt { .. }
        ));
    }

    #[tokio::test]
    async fn test_load_non_utf8_file_is_corrupt() {
        let (store, _temp) = test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), [0xff, 0xfe, 0x00]).unwrap();

        assert!(matches!(
            store.load().await.unwrap(),
            StoredCredential::Corrupt { .. }
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _temp) = test_store();
        store.save(&test_bundle()).await.unwrap();

        store.delete().await.unwrap();
        store.delete().await.unwrap();

        assert!(!store.path().exists());
        assert_eq!(store.load().await.unwrap(), StoredCredential::Missing);
    }
}
