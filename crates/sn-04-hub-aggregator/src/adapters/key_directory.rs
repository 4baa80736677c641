//! # Static Key Directory
//!
//! Loaded once at startup from a JSON object mapping node ids to hex-encoded
//! Ed25519 public keys:
//!
//! ```json
//! { "sentinel-01": "3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c" }
//! ```

use crate::domain::errors::KeyDirectoryError;
use crate::ports::outbound::KeyDirectory;
use shared_crypto::Ed25519PublicKey;
use shared_types::NodeId;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct StaticKeyDirectory {
    keys: HashMap<NodeId, Ed25519PublicKey>,
}

impl StaticKeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self, KeyDirectoryError> {
        let entries: BTreeMap<String, String> =
            serde_json::from_str(raw).map_err(|e| KeyDirectoryError::Parse(e.to_string()))?;
        let mut directory = Self::new();
        for (node_id, hex_key) in entries {
            let node_id = NodeId::new(node_id);
            let key = Ed25519PublicKey::from_hex(hex_key.trim()).map_err(|source| {
                KeyDirectoryError::InvalidKey {
                    node_id: node_id.clone(),
                    source,
                }
            })?;
            directory.insert(node_id, key);
        }
        Ok(directory)
    }

    pub fn from_file(path: &Path) -> Result<Self, KeyDirectoryError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn insert(&mut self, node_id: NodeId, key: Ed25519PublicKey) {
        self.keys.insert(node_id, key);
    }
}

impl KeyDirectory for StaticKeyDirectory {
    fn public_key(&self, node_id: &NodeId) -> Option<Ed25519PublicKey> {
        self.keys.get(node_id).copied()
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}
