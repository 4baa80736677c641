//! Node signing key loading.

use shared_crypto::{CryptoError, Ed25519KeyPair};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Hex Ed25519 seed; wins over `node.signing_key_file`.
pub const NODE_KEY_SEED_ENV: &str = "SN_NODE_KEY_SEED";

#[derive(Debug, Error)]
pub enum KeyLoadError {
    #[error("No signing key configured: set {NODE_KEY_SEED_ENV} or node.signing_key_file")]
    Missing,

    #[error("Failed to read key file {path}: {source}", path = .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid signing key seed: {0}")]
    Invalid(#[from] CryptoError),
}

/// Resolve the node key from the environment seed or the key file.
pub fn load_signing_key(
    env_seed: Option<String>,
    key_file: Option<&Path>,
) -> Result<Ed25519KeyPair, KeyLoadError> {
    if let Some(seed) = env_seed.filter(|s| !s.trim().is_empty()) {
        return Ok(Ed25519KeyPair::from_hex_seed(seed.trim())?);
    }
    let path = key_file.ok_or(KeyLoadError::Missing)?;
    let seed = std::fs::read_to_string(path).map_err(|source| KeyLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Ed25519KeyPair::from_hex_seed(seed.trim())?)
}
