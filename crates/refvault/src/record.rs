//! Secret records and the views handed out to callers

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix of every reference token
pub const REFERENCE_PREFIX: &str = "secret_ref_";

/// Lifecycle state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretStatus {
    Active,
    Deleted,
}

impl SecretStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretStatus::Active => "active",
            SecretStatus::Deleted => "deleted",
        }
    }
}

/// A reference that was replaced by a rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEvent {
    pub old_reference: String,
    pub rotated_at: DateTime<Utc>,
}

/// Everything the registry knows about one named secret
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub reference: String,
    pub status: SecretStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_rotated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub access_count: u64,
    #[serde(default)]
    pub rotation_history: Vec<RotationEvent>,
}

impl SecretRecord {
    /// A fresh active record with a new reference
    pub fn new(name: &str, description: &str, tags: Vec<String>) -> Self {
        Self {
            id: secret_id(name),
            name: name.to_string(),
            description: description.to_string(),
            tags,
            reference: generate_reference(),
            status: SecretStatus::Active,
            created_at: Utc::now(),
            last_modified: None,
            last_accessed: None,
            last_rotated: None,
            deleted_at: None,
            access_count: 0,
            rotation_history: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SecretStatus::Active
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Stand-in for the value an external vault would resolve the reference to.
    /// Never real secret material.
    pub fn simulated_value(&self) -> String {
        format!("[SECURE_VALUE_FOR_{}]", self.reference)
    }

    pub fn summary(&self) -> SecretSummary {
        SecretSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            created_at: self.created_at,
            last_accessed: self.last_accessed,
            access_count: self.access_count,
        }
    }

    pub fn view(&self) -> SecretView {
        SecretView {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            reference: self.reference.clone(),
            status: self.status,
            created_at: self.created_at,
            last_modified: self.last_modified,
            last_accessed: self.last_accessed,
            last_rotated: self.last_rotated,
            deleted_at: self.deleted_at,
            access_count: self.access_count,
            rotation_history: self.rotation_history.clone(),
            simulated_value: self.simulated_value(),
        }
    }
}

/// Result of a successful retrieval
#[derive(Debug, Clone, Serialize)]
pub struct SecretView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub reference: String,
    pub status: SecretStatus,
    pub created_at: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub last_rotated: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub rotation_history: Vec<RotationEvent>,
    pub simulated_value: String,
}

/// One line of a listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecretSummary {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub access_count: u64,
}

/// Short display fingerprint of a name
pub fn secret_id(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

/// A new random reference token
pub fn generate_reference() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", REFERENCE_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_id_is_stable() {
        let id = secret_id("db_pw");
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, secret_id("db_pw"));
        assert_ne!(id, secret_id("db_pw2"));
    }

    #[test]
    fn test_reference_format() {
        let r1 = generate_reference();
        let r2 = generate_reference();
        assert!(r1.starts_with(REFERENCE_PREFIX));
        // 16 bytes -> 22 unpadded base64 chars
        assert_eq!(r1.len(), REFERENCE_PREFIX.len() + 22);
        assert!(!r1.contains('='));
        assert_ne!(r1, r2);
    }

    #[test]
    fn test_new_record() {
        let record = SecretRecord::new("api_key", "Third-party API key", vec!["api".into()]);
        assert!(record.is_active());
        assert_eq!(record.access_count, 0);
        assert_eq!(record.id, secret_id("api_key"));
        assert!(record.has_tag("api"));
        assert!(!record.has_tag("ap"));
        assert!(record.rotation_history.is_empty());
        assert!(record.last_accessed.is_none());
    }

    #[test]
    fn test_simulated_value_embeds_reference() {
        let record = SecretRecord::new("jwt_secret", "", vec![]);
        let view = record.view();
        assert_eq!(
            view.simulated_value,
            format!("[SECURE_VALUE_FOR_{}]", record.reference)
        );
    }

    #[test]
    fn test_serde_status_lowercase() {
        let json = serde_json::to_string(&SecretStatus::Deleted).unwrap();
        assert_eq!(json, "\"deleted\"");
    }
}
