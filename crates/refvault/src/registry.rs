//! Secret registry - named records, references, soft deletes and rotation
//!
//! All state sits behind one mutex. Every operation takes the lock for its
//! whole read-modify-persist sequence, so operations never interleave.
//! Retrieval counts as a write (it bumps the access counter).
//!
//! Every operation appends exactly one audit entry. A failed save rolls the
//! in-memory change back before the error is returned.

use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::crypto::{self, Keyring, FIXED_SALT};
use crate::error::{RegistryError, Result};
use crate::record::{
    generate_reference, RotationEvent, SecretRecord, SecretStatus, SecretSummary, SecretView,
};
use crate::stats::SecretStats;
use crate::store::BlobStore;
use chrono::Utc;
use refvault_core::{LoadPolicy, RegistryConfig, SaltMode};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Handle to one registry store
#[derive(Debug)]
pub struct SecretRegistry {
    inner: Mutex<Inner>,
    path: PathBuf,
    audit_limit: usize,
}

#[derive(Debug)]
struct Inner {
    records: Vec<SecretRecord>,
    store: BlobStore,
    audit: AuditLog,
}

/// How to put a record back if the save fails
enum Undo {
    Remove(usize),
    Restore(usize, SecretRecord),
}

impl SecretRegistry {
    /// Open the registry described by `config`.
    ///
    /// With a master key the store is sealed by a passphrase-derived key.
    /// Without one a generated key file is used, created on first open.
    pub fn open(config: &RegistryConfig, master_key: Option<&str>) -> Result<Self> {
        let keyring = match master_key {
            Some(passphrase) => match config.salt_mode {
                SaltMode::Fixed => Keyring::from_passphrase(passphrase, FIXED_SALT),
                SaltMode::PerStore => Keyring::from_passphrase(passphrase, &open_salt(config)?),
            },
            None => Keyring::Identity(open_identity(config)?),
        };

        let store = BlobStore::new(&config.storage, keyring);
        let audit = match &config.audit.sink {
            Some(sink) => AuditLog::with_sink(sink.clone()),
            None => AuditLog::new(),
        };

        let mut registry = Self::with_store(store, audit, config.load_policy)?;
        registry.audit_limit = config.audit.default_limit;
        Ok(registry)
    }

    /// Build a registry over an existing store and audit log
    pub fn with_store(
        store: BlobStore,
        audit: AuditLog,
        policy: LoadPolicy,
    ) -> Result<Self> {
        let records = match store.load() {
            Ok(records) => records,
            Err(RegistryError::DecryptionFailure(reason)) if policy == LoadPolicy::Degrade => {
                tracing::warn!(
                    store = %store.path().display(),
                    %reason,
                    "could not load existing secrets, starting with an empty registry"
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(
            store = %store.path().display(),
            keyring = store.keyring().kind(),
            records = records.len(),
            "opened registry"
        );

        Ok(Self {
            path: store.path().to_path_buf(),
            inner: Mutex::new(Inner {
                records,
                store,
                audit,
            }),
            audit_limit: crate::DEFAULT_AUDIT_LIMIT,
        })
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new secret and return its reference
    pub fn create(&self, name: &str, description: &str, tags: Vec<String>) -> Result<String> {
        let mut inner = self.lock();

        if name.trim().is_empty() {
            inner.audit.append(AuditAction::Store, name, false);
            return Err(RegistryError::InvalidArgument(
                "Secret name cannot be empty".to_string(),
            ));
        }

        if inner.position(name).is_some() {
            inner.audit.append(AuditAction::Store, name, false);
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }

        let record = SecretRecord::new(name, description, tags);
        let reference = record.reference.clone();
        inner.records.push(record);

        let index = inner.records.len() - 1;
        inner.commit(AuditAction::Store, name, Undo::Remove(index))?;

        tracing::debug!(secret = name, "stored secret");
        Ok(reference)
    }

    /// Fetch a record, counting the access
    pub fn retrieve(&self, name: &str) -> Result<SecretView> {
        let mut inner = self.lock();

        let Some(index) = inner.position(name) else {
            inner.audit.append(AuditAction::Retrieve, name, false);
            return Err(RegistryError::NotFound(name.to_string()));
        };

        let before = inner.records[index].clone();
        let record = &mut inner.records[index];
        record.last_accessed = Some(Utc::now());
        record.access_count += 1;

        inner.commit(AuditAction::Retrieve, name, Undo::Restore(index, before))?;

        tracing::debug!(secret = name, "retrieved secret");
        Ok(inner.records[index].view())
    }

    /// Active records in creation order, optionally only those carrying `tag`
    pub fn list(&self, tag: Option<&str>) -> Vec<SecretSummary> {
        let inner = self.lock();

        inner
            .records
            .iter()
            .filter(|r| r.is_active())
            .filter(|r| tag.map_or(true, |t| r.has_tag(t)))
            .map(SecretRecord::summary)
            .collect()
    }

    /// Replace description and/or tags. Returns false if the name is unknown.
    pub fn update(
        &self,
        name: &str,
        description: Option<&str>,
        tags: Option<Vec<String>>,
    ) -> Result<bool> {
        let mut inner = self.lock();

        let Some(index) = inner.position(name) else {
            inner.audit.append(AuditAction::Update, name, false);
            return Ok(false);
        };

        let before = inner.records[index].clone();
        let record = &mut inner.records[index];
        if let Some(description) = description {
            record.description = description.to_string();
        }
        if let Some(tags) = tags {
            record.tags = tags;
        }
        record.last_modified = Some(Utc::now());

        inner.commit(AuditAction::Update, name, Undo::Restore(index, before))?;

        tracing::debug!(secret = name, "updated secret");
        Ok(true)
    }

    /// Soft delete. Returns false if the name is unknown; deleting an already
    /// deleted record succeeds again and moves `deleted_at`.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut inner = self.lock();

        let Some(index) = inner.position(name) else {
            inner.audit.append(AuditAction::Delete, name, false);
            return Ok(false);
        };

        let before = inner.records[index].clone();
        let record = &mut inner.records[index];
        record.status = SecretStatus::Deleted;
        record.deleted_at = Some(Utc::now());

        inner.commit(AuditAction::Delete, name, Undo::Restore(index, before))?;

        tracing::debug!(secret = name, "deleted secret");
        Ok(true)
    }

    /// Swap in a new reference, keeping the old one in the rotation history.
    /// Returns `None` if the name is unknown.
    pub fn rotate(&self, name: &str) -> Result<Option<String>> {
        let mut inner = self.lock();

        let Some(index) = inner.position(name) else {
            inner.audit.append(AuditAction::Rotate, name, false);
            return Ok(None);
        };

        let before = inner.records[index].clone();
        let now = Utc::now();
        let new_reference = generate_reference();

        let record = &mut inner.records[index];
        let old_reference = std::mem::replace(&mut record.reference, new_reference.clone());
        record.rotation_history.push(RotationEvent {
            old_reference,
            rotated_at: now,
        });
        record.last_rotated = Some(now);

        inner.commit(AuditAction::Rotate, name, Undo::Restore(index, before))?;

        tracing::debug!(secret = name, "rotated secret");
        Ok(Some(new_reference))
    }

    /// Aggregate statistics over active records
    pub fn stats(&self) -> SecretStats {
        let inner = self.lock();
        SecretStats::compute(&inner.records, &inner.audit, Utc::now())
    }

    /// The most recent `limit` audit entries, oldest first
    pub fn audit_log(&self, limit: usize) -> Vec<AuditEntry> {
        self.lock().audit.tail(limit)
    }

    /// Audit tail using the configured default limit
    pub fn recent_audit(&self) -> Vec<AuditEntry> {
        self.audit_log(self.audit_limit)
    }

    /// Number of records of any status
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    fn position(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|r| r.name == name)
    }

    /// Persist the current records and audit the outcome. On failure the
    /// in-memory change is undone.
    fn commit(&mut self, action: AuditAction, name: &str, undo: Undo) -> Result<()> {
        match self.store.save(&self.records) {
            Ok(()) => {
                self.audit.append(action, name, true);
                Ok(())
            }
            Err(e) => {
                match undo {
                    Undo::Remove(index) => {
                        self.records.remove(index);
                    }
                    Undo::Restore(index, record) => self.records[index] = record,
                }
                tracing::warn!(
                    action = action.as_str(),
                    secret = name,
                    error = %e,
                    "save failed, change rolled back"
                );
                self.audit.append(action, name, false);
                Err(e)
            }
        }
    }
}

/// Load the generated key, or create it for a brand new store
fn open_identity(config: &RegistryConfig) -> Result<age::x25519::Identity> {
    let key_path = config.key_path();

    if key_path.exists() {
        return crypto::load_identity(&key_path);
    }

    if config.storage.exists() {
        return Err(RegistryError::KeyMaterial(format!(
            "store {} exists but its key file {} is missing; without it the store cannot be decrypted",
            config.storage.display(),
            key_path.display()
        )));
    }

    crypto::generate_identity(&key_path)
}

/// Load the per-store salt, or create it for a brand new store
fn open_salt(config: &RegistryConfig) -> Result<[u8; crypto::SALT_SIZE]> {
    let salt_path = config.salt_path();

    if !salt_path.exists() && config.storage.exists() {
        return Err(RegistryError::KeyMaterial(format!(
            "store {} exists but its salt file {} is missing; without it the store cannot be decrypted",
            config.storage.display(),
            salt_path.display()
        )));
    }

    crypto::load_or_create_salt(&salt_path)
}
