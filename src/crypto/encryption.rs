//! Symmetric encryption keyed from a shared secret

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use curve25519_dalek::ristretto::RistrettoPoint;
use rand::RngCore;
use zeroize::Zeroize;

use super::hashing::domain_hash;
use crate::errors::{WalletError, WalletResult};

const NONCE_LEN: usize = 12;

/// Symmetric key bound to a shared point and a usage context
pub fn symmetric_key(secret: &RistrettoPoint, context: &str) -> [u8; 32] {
    domain_hash(
        "wallet_handoff.symmetric_key.v1",
        &[secret.compress().as_bytes(), context.as_bytes()],
    )
}

/// Encrypt with a random nonce; output is `nonce || ciphertext`
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> WalletResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| WalletError::Storage(format!("encryption failed: {e}")))?;
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub fn decrypt(key: &[u8; 32], data: &[u8]) -> WalletResult<Vec<u8>> {
    if data.len() < NONCE_LEN {
        return Err(WalletError::invalid_argument(
            "ciphertext",
            "shorter than the nonce",
        ));
    }
    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| WalletError::invalid_argument("ciphertext", "authentication failed"))
}

/// Encrypt `plaintext` for whoever shares `secret`, then wipe the key
pub fn encrypt_for(secret: &RistrettoPoint, context: &str, plaintext: &[u8]) -> WalletResult<Vec<u8>> {
    let mut key = symmetric_key(secret, context);
    let result = encrypt(&key, plaintext);
    key.zeroize();
    result
}

pub fn decrypt_from(secret: &RistrettoPoint, context: &str, data: &[u8]) -> WalletResult<Vec<u8>> {
    let mut key = symmetric_key(secret, context);
    let result = decrypt(&key, data);
    key.zeroize();
    result
}
