use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Default prefix for gateway-issued keys.
pub const DEFAULT_API_KEY_PREFIX: &str = "sk-";

/// Length of the hash prefix kept for display.
pub const KEY_DISPLAY_PREFIX_LEN: usize = 8;

/// Freshly generated key material.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    /// The full key, shown to the caller once
    pub raw: String,
    /// SHA-256 hex digest of `raw`, the only form persisted
    pub hash: String,
}

/// Generate a new API key: `prefix` followed by 32 random bytes in url-safe base64.
pub fn generate_api_key(prefix: &str) -> GeneratedKey {
    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill(&mut random_bytes);

    let raw = format!(
        "{}{}",
        prefix,
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
    );
    let hash = hash_api_key(&raw);

    GeneratedKey { raw, hash }
}

/// Hex-encoded SHA-256 of a credential.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Display prefix stored alongside the hash.
pub fn key_display_prefix(key_hash: &str) -> &str {
    key_hash.get(..KEY_DISPLAY_PREFIX_LEN).unwrap_or(key_hash)
}
