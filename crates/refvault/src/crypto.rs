//! Keyrings - the key material that seals the store blob
//!
//! Two kinds:
//! - Passphrase: PBKDF2-HMAC-SHA256 over the master key, then ChaCha20-Poly1305.
//!   Blob layout is `nonce (12 bytes) || ciphertext`.
//! - Identity: an age X25519 identity generated on first use and kept in a
//!   key file beside the store. Blob is a binary age file.
//!
//! The passphrase salt defaults to a fixed constant. Every store written so far
//! depends on it, so it stays; it also means equal passphrases give equal keys
//! across stores. `SaltMode::PerStore` switches to a random salt file.
//!
//! Losing the identity key file makes the store unrecoverable.

use crate::error::{RegistryError, Result};
use age::secrecy::ExposeSecret;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use std::fs::{self, File, Permissions};
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use zeroize::Zeroizing;

/// Salt used for passphrase derivation unless a per-store salt is configured
pub const FIXED_SALT: &[u8] = b"secret_manager_salt_2024";

/// PBKDF2 iteration count
pub const PBKDF2_ROUNDS: u32 = 100_000;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const SALT_SIZE: usize = 32;

/// Key material for sealing and opening the store
pub enum Keyring {
    /// Key derived from an operator-supplied master key
    Passphrase(Zeroizing<[u8; KEY_SIZE]>),
    /// Generated age identity
    Identity(age::x25519::Identity),
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Keyring").field(&self.kind()).finish()
    }
}

impl Keyring {
    /// Derive a passphrase keyring
    pub fn from_passphrase(passphrase: &str, salt: &[u8]) -> Self {
        Keyring::Passphrase(derive_key(passphrase, salt))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Keyring::Passphrase(_) => "passphrase",
            Keyring::Identity(_) => "identity",
        }
    }

    /// Encrypt a serialized store
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        match self {
            Keyring::Passphrase(key) => {
                let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));

                let mut nonce_bytes = [0u8; NONCE_SIZE];
                rand::thread_rng().fill_bytes(&mut nonce_bytes);
                let nonce = Nonce::from_slice(&nonce_bytes);

                let ciphertext = cipher
                    .encrypt(nonce, plaintext)
                    .map_err(|e| RegistryError::PersistenceFailure(format!("encrypt: {e}")))?;

                let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
                blob.extend_from_slice(&nonce_bytes);
                blob.extend_from_slice(&ciphertext);
                Ok(blob)
            }
            Keyring::Identity(identity) => {
                let recipient = identity.to_public();
                let encryptor = age::Encryptor::with_recipients(vec![Box::new(recipient)])
                    .ok_or_else(|| {
                        RegistryError::PersistenceFailure("no recipient for encryption".into())
                    })?;

                let mut encrypted = vec![];
                let mut writer = encryptor
                    .wrap_output(&mut encrypted)
                    .map_err(|e| RegistryError::PersistenceFailure(format!("encrypt: {e}")))?;

                writer
                    .write_all(plaintext)
                    .map_err(|e| RegistryError::PersistenceFailure(format!("encrypt: {e}")))?;

                writer
                    .finish()
                    .map_err(|e| RegistryError::PersistenceFailure(format!("encrypt: {e}")))?;

                Ok(encrypted)
            }
        }
    }

    /// Decrypt a sealed store
    pub fn open(&self, blob: &[u8]) -> Result<Vec<u8>> {
        match self {
            Keyring::Passphrase(key) => {
                if blob.len() < NONCE_SIZE {
                    return Err(RegistryError::DecryptionFailure(format!(
                        "blob too short: {} bytes",
                        blob.len()
                    )));
                }

                let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
                let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));

                cipher
                    .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
                    .map_err(|_| {
                        RegistryError::DecryptionFailure(
                            "wrong master key or corrupted store".to_string(),
                        )
                    })
            }
            Keyring::Identity(identity) => {
                let decryptor = match age::Decryptor::new(blob)
                    .map_err(|e| RegistryError::DecryptionFailure(e.to_string()))?
                {
                    age::Decryptor::Recipients(d) => d,
                    _ => {
                        return Err(RegistryError::DecryptionFailure(
                            "Unexpected passphrase encryption".to_string(),
                        ))
                    }
                };

                let mut decrypted = vec![];
                let mut reader = decryptor
                    .decrypt(std::iter::once(identity as &dyn age::Identity))
                    .map_err(|e| RegistryError::DecryptionFailure(e.to_string()))?;

                reader
                    .read_to_end(&mut decrypted)
                    .map_err(|e| RegistryError::DecryptionFailure(e.to_string()))?;

                Ok(decrypted)
            }
        }
    }
}

/// PBKDF2-HMAC-SHA256 key derivation
pub fn derive_key(passphrase: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ROUNDS, &mut key[..]);
    key
}

/// Generate an identity and write it to `path` with owner-only permissions
pub fn generate_identity(path: &Path) -> Result<age::x25519::Identity> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let identity = age::x25519::Identity::generate();
    let identity_str = identity.to_string();

    let mut file = File::create(path)?;
    file.write_all(identity_str.expose_secret().as_bytes())?;
    fs::set_permissions(path, Permissions::from_mode(0o600))?;

    tracing::info!(key_file = %path.display(), "generated new store key");
    Ok(identity)
}

/// Load the identity from a key file
pub fn load_identity(path: &Path) -> Result<age::x25519::Identity> {
    let content = fs::read_to_string(path).map_err(|e| {
        RegistryError::KeyMaterial(format!("failed to read key file {}: {e}", path.display()))
    })?;

    content.trim().parse::<age::x25519::Identity>().map_err(|e| {
        RegistryError::KeyMaterial(format!("failed to parse key file {}: {e}", path.display()))
    })
}

/// Read the per-store salt, creating it when absent
pub fn load_or_create_salt(path: &Path) -> Result<[u8; SALT_SIZE]> {
    if path.exists() {
        let content = fs::read_to_string(path)?;
        let bytes = hex::decode(content.trim()).map_err(|e| {
            RegistryError::KeyMaterial(format!("invalid salt file {}: {e}", path.display()))
        })?;
        return bytes.try_into().map_err(|b: Vec<u8>| {
            RegistryError::KeyMaterial(format!(
                "salt file {} holds {} bytes, expected {SALT_SIZE}",
                path.display(),
                b.len()
            ))
        });
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    fs::write(path, hex::encode(salt))?;
    fs::set_permissions(path, Permissions::from_mode(0o600))?;

    tracing::info!(salt_file = %path.display(), "generated per-store salt");
    Ok(salt)
}
