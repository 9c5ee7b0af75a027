use super::{validate_key, KeyValueStore};
use crate::error::StorageError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One file per key under a base directory
///
/// Writes go to a temporary sibling and are renamed into place.
#[derive(Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Create a store with the default base directory ("./wallets")
    pub fn new() -> Self {
        Self {
            base_path: PathBuf::from("./wallets"),
        }
    }

    /// Create a store with a custom base directory (for testing)
    pub fn new_with_base_dir(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_path
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{}.bin", key)))
    }

    #[cfg(unix)]
    async fn restrict_permissions(path: &Path) -> Result<(), StorageError> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn restrict_permissions(_path: &Path) -> Result<(), StorageError> {
        Ok(())
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.base_path).await?;

        let tmp_path = path.with_extension("bin.tmp");
        fs::write(&tmp_path, value).await?;
        Self::restrict_permissions(&tmp_path).await?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        log::debug!("Stored '{}' ({} bytes)", key, value.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                log::warn!("Deleted stored record: {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new_with_base_dir(dir.path().join("nested"));

        assert_eq!(store.get("wallet").await.unwrap(), None);
        store.put("wallet", b"first").await.unwrap();
        store.put("wallet", b"second").await.unwrap();
        assert_eq!(store.get("wallet").await.unwrap().as_deref(), Some(&b"second"[..]));
        assert!(!dir.path().join("nested/wallet.bin.tmp").exists());

        store.delete("wallet").await.unwrap();
        assert_eq!(store.get("wallet").await.unwrap(), None);
        // idempotent
        store.delete("wallet").await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_records_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileStore::new_with_base_dir(dir.path().to_path_buf());
        store.put("wallet", b"x").await.unwrap();
        let mode = std::fs::metadata(dir.path().join("wallet.bin"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new_with_base_dir(dir.path().to_path_buf());
        assert!(store.put("../wallet", b"x").await.is_err());
    }
}
