//! Encrypted store file
//!
//! The whole registry is one JSON document, sealed by a keyring and written
//! as a single opaque blob. Saves go to a temporary file in the same
//! directory and are renamed over the store, so a crash mid-write leaves the
//! previous version in place.

use crate::crypto::Keyring;
use crate::error::{RegistryError, Result};
use crate::record::SecretRecord;
use serde::{Deserialize, Serialize};
use std::fs::{self, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Store file format
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    /// Records in creation order
    secrets: Vec<SecretRecord>,
}

/// A store file together with the keyring that seals it
#[derive(Debug)]
pub struct BlobStore {
    path: PathBuf,
    keyring: Keyring,
}

impl BlobStore {
    pub fn new(path: &Path, keyring: Keyring) -> Self {
        Self {
            path: path.to_path_buf(),
            keyring,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read and decrypt every record. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<SecretRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let blob = fs::read(&self.path)?;
        let plaintext = self.keyring.open(&blob)?;

        let file: StoreFile = serde_json::from_slice(&plaintext).map_err(|e| {
            RegistryError::DecryptionFailure(format!("store contents are not valid: {e}"))
        })?;

        Ok(file.secrets)
    }

    /// Encrypt and overwrite the store with `records`
    pub fn save(&self, records: &[SecretRecord]) -> Result<()> {
        let file = StoreFile {
            secrets: records.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| RegistryError::PersistenceFailure(format!("serialize: {e}")))?;
        let blob = self.keyring.seal(&json)?;

        self.write_atomic(&blob).map_err(|e| {
            RegistryError::PersistenceFailure(format!("{}: {e}", self.path.display()))
        })
    }

    fn write_atomic(&self, blob: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, blob)?;
        fs::set_permissions(&tmp, Permissions::from_mode(0o600))?;

        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        refvault_core::paths::sibling(&self.path, ".tmp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_identity, FIXED_SALT};
    use tempfile::tempdir;

    fn record(name: &str, tags: &[&str]) -> SecretRecord {
        SecretRecord::new(name, "test", tags.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let keyring = Keyring::Identity(generate_identity(&dir.path().join("k")).unwrap());
        let store = BlobStore::new(&dir.path().join("secrets.dat"), keyring);

        assert!(!store.exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_preserves_order_and_fields() {
        let dir = tempdir().unwrap();
        let key_path = dir.path().join("secrets.dat.key");
        let store_path = dir.path().join("data").join("secrets.dat");

        let mut records = vec![
            record("zeta", &["prod"]),
            record("alpha", &["dev", "db"]),
        ];
        records[1].access_count = 7;

        let keyring = Keyring::Identity(generate_identity(&key_path).unwrap());
        BlobStore::new(&store_path, keyring).save(&records).unwrap();

        let raw = fs::read(&store_path).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("alpha"));
        assert!(!refvault_core::paths::sibling(&store_path, ".tmp").exists());

        let keyring = Keyring::Identity(crate::crypto::load_identity(&key_path).unwrap());
        let loaded = BlobStore::new(&store_path, keyring).load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "zeta");
        assert_eq!(loaded[1].name, "alpha");
        assert_eq!(loaded[1].tags, vec!["dev", "db"]);
        assert_eq!(loaded[1].access_count, 7);
        assert_eq!(loaded[1].reference, records[1].reference);
    }

    #[test]
    fn test_wrong_key_is_decryption_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.dat");

        BlobStore::new(&path, Keyring::from_passphrase("one", FIXED_SALT))
            .save(&[record("a", &[])])
            .unwrap();

        let result = BlobStore::new(&path, Keyring::from_passphrase("two", FIXED_SALT)).load();
        assert!(matches!(result, Err(RegistryError::DecryptionFailure(_))));
    }

    #[test]
    fn test_garbage_file_is_decryption_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.dat");
        fs::write(&path, b"definitely not a sealed store").unwrap();

        let keyring = Keyring::Identity(generate_identity(&dir.path().join("k")).unwrap());
        let result = BlobStore::new(&path, keyring).load();
        assert!(matches!(result, Err(RegistryError::DecryptionFailure(_))));
    }

    #[test]
    fn test_save_into_unwritable_location_fails() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"a file, not a directory").unwrap();

        let keyring = Keyring::Identity(generate_identity(&dir.path().join("k")).unwrap());
        let store = BlobStore::new(&blocker.join("secrets.dat"), keyring);
        assert!(matches!(
            store.save(&[]),
            Err(RegistryError::PersistenceFailure(_))
        ));
    }
}
