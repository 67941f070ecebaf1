//! refvault - Metadata registry for secrets
//!
//! "Know where every secret lives without holding any of them."
//!
//! The registry tracks that a named secret exists: its description, tags,
//! access counters and lifecycle timestamps. Instead of a value it hands out
//! an opaque reference that an external vault resolves. References can be
//! rotated, records are only ever soft deleted, and every operation lands in
//! an audit trail.
//!
//! The registry is one encrypted blob on disk, rewritten on every change.
//! Sealed with a passphrase-derived key (PBKDF2 + ChaCha20-Poly1305) or with a
//! generated age identity kept beside the store.

pub mod audit;
pub mod crypto;
pub mod error;
pub mod record;
pub mod registry;
pub mod stats;
pub mod store;

/// Audit entries returned when no limit is configured
pub const DEFAULT_AUDIT_LIMIT: usize = 100;

pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use crypto::Keyring;
pub use error::{RegistryError, Result};
pub use record::{RotationEvent, SecretRecord, SecretStatus, SecretSummary, SecretView};
pub use registry::SecretRegistry;
pub use stats::SecretStats;
pub use store::BlobStore;
