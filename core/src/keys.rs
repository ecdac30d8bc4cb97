//! WireGuard key material
//!
//! Keys cross the crate boundary as the base64 strings that appear in config
//! files, exactly as `wg genkey` / `wg pubkey` / `wg genpsk` print them.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};

const KEY_LEN: usize = 32;

/// Source of WireGuard key material
pub trait KeyProvider: Send + Sync {
    /// A fresh base64 private key
    fn generate_private_key(&self) -> Result<String>;

    /// A fresh base64 preshared key
    fn generate_preshared_key(&self) -> Result<String>;

    /// The base64 public key belonging to a base64 private key
    fn public_key_of(&self, private_key: &str) -> Result<String>;
}

/// Native X25519 implementation, no external `wg` binary required
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519KeyProvider;

impl X25519KeyProvider {
    pub fn new() -> Self {
        Self
    }
}

fn decode_key(b64: &str) -> Result<[u8; KEY_LEN]> {
    let bytes = STANDARD
        .decode(b64.trim())
        .map_err(|e| Error::key(format!("invalid base64: {}", e)))?;
    if bytes.len() != KEY_LEN {
        return Err(Error::key(format!(
            "expected {} bytes, got {}",
            KEY_LEN,
            bytes.len()
        )));
    }
    let mut arr = [0u8; KEY_LEN];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

impl KeyProvider for X25519KeyProvider {
    fn generate_private_key(&self) -> Result<String> {
        let secret = StaticSecret::random_from_rng(OsRng);
        Ok(STANDARD.encode(secret.to_bytes()))
    }

    fn generate_preshared_key(&self) -> Result<String> {
        let mut psk = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut psk);
        Ok(STANDARD.encode(psk))
    }

    fn public_key_of(&self, private_key: &str) -> Result<String> {
        let secret = StaticSecret::from(decode_key(private_key)?);
        let public = PublicKey::from(&secret);
        Ok(STANDARD.encode(public.as_bytes()))
    }
}
