//! Password-sealed key store container.
//!
//! Layout: `"RCKS" || salt (16) || nonce (12) || AES-256-GCM ciphertext`.
//! The AES key is the raw Argon2 hash of the password under the salt.

use crate::*;
use aes_gcm::aead::{generic_array::GenericArray, Aead, NewAead};
use aes_gcm::Aes256Gcm;
use argon2::Config;
use rand::{thread_rng, Rng};

const MAGIC: &[u8; 4] = b"RCKS";
const SALT_LENGTH: usize = 16;
const AES_IV_LENGTH: usize = 12;
const AES_TAG_LENGTH: usize = 16;
const AES_KEY_LENGTH: u32 = 32;

fn derive_key(salt: &[u8], password: &str) -> Result<Vec<u8>, KeyManagementError> {
    let config = Config {
        hash_length: AES_KEY_LENGTH,
        ..Config::default()
    };
    argon2::hash_raw(password.as_bytes(), salt, &config)
        .map_err(|e| KeyManagementError::InvalidKeyStore(format!("key derivation failed: {}", e)))
}

/// Encrypt `plaintext` under `password`
pub fn seal(password: &str, plaintext: &[u8]) -> Result<Vec<u8>, KeyManagementError> {
    let mut salt = [0u8; SALT_LENGTH];
    thread_rng().fill(&mut salt);
    let key = derive_key(&salt, password)?;
    let aead = Aes256Gcm::new(GenericArray::from_slice(&key));

    let mut nonce = [0u8; AES_IV_LENGTH];
    thread_rng().fill(&mut nonce);
    let nonce = GenericArray::from_slice(&nonce);

    let ciphertext = aead
        .encrypt(nonce, plaintext)
        .map_err(|_| KeyManagementError::InvalidKeyStore("encryption failure".to_owned()))?;

    let mut output =
        Vec::with_capacity(MAGIC.len() + SALT_LENGTH + AES_IV_LENGTH + ciphertext.len());
    output.extend_from_slice(MAGIC);
    output.extend_from_slice(&salt);
    output.extend_from_slice(nonce);
    output.extend(ciphertext);

    Ok(output)
}

/// Decrypt a sealed key store.
///
/// A container too short or without the magic is `InvalidKeyStore`. A failed authentication tag
/// is `InvalidPassword`; the cipher cannot tell a wrong password from a modified ciphertext.
pub fn open(password: &str, sealed: &[u8]) -> Result<Vec<u8>, KeyManagementError> {
    let header = MAGIC.len() + SALT_LENGTH + AES_IV_LENGTH;
    if sealed.len() < header + AES_TAG_LENGTH || &sealed[..MAGIC.len()] != MAGIC {
        return Err(KeyManagementError::InvalidKeyStore(
            "not a sealed key store".to_owned(),
        ));
    }
    let salt = &sealed[MAGIC.len()..MAGIC.len() + SALT_LENGTH];
    let nonce = GenericArray::from_slice(&sealed[MAGIC.len() + SALT_LENGTH..header]);
    let encrypted = &sealed[header..];

    let key = derive_key(salt, password)?;
    let aead = Aes256Gcm::new(GenericArray::from_slice(&key));

    aead.decrypt(nonce, encrypted)
        .map_err(|_| KeyManagementError::InvalidPassword)
}
