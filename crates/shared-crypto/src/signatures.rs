//! # Ed25519 Proof Signatures
//!
//! Each sensor node holds one long-term Ed25519 identity. The node signs the
//! canonical proof bytes; the hub verifies them against the key registered
//! for that node id.
//!
//! Verification is strict (`verify_strict`): small-order points and
//! non-canonical `S` values are refused, so a proof has exactly one valid
//! signature encoding.

use crate::CryptoError;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use zeroize::Zeroizing;

/// Length of an encoded public key or seed.
pub const KEY_LEN: usize = 32;

/// Length of an encoded signature.
pub const SIGNATURE_LEN: usize = 64;

/// A node's registered verification key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey([u8; KEY_LEN]);

impl Ed25519PublicKey {
    /// Accepts only encodings that decompress to a curve point.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Parse the 64-character hex form used in key directory files.
    pub fn from_hex(value: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(decode_key_hex(value)?)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Lowercase hex, as written to key directory files.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Check `signature` over `message`.
    ///
    /// # Errors
    /// - `InvalidPublicKey` if the stored key no longer decodes
    /// - `SignatureVerificationFailed` for any signature mismatch
    pub fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_LEN]) -> Result<(), CryptoError> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        key.verify_strict(message, &Signature::from_bytes(signature))
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

/// A node's signing identity.
///
/// `SigningKey` wipes its secret on drop; seeds passing through this type
/// are held in `Zeroizing` buffers.
pub struct Ed25519KeyPair {
    secret: SigningKey,
}

impl Ed25519KeyPair {
    /// Fresh identity from the OS RNG.
    pub fn generate() -> Self {
        Self {
            secret: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Identity from a raw 32-byte seed.
    pub fn from_seed(seed: [u8; KEY_LEN]) -> Self {
        let seed = Zeroizing::new(seed);
        Self {
            secret: SigningKey::from_bytes(&seed),
        }
    }

    /// Identity from a hex seed, as provisioned through `SN_NODE_KEY_SEED`
    /// or a key file. Surrounding whitespace is ignored.
    pub fn from_hex_seed(value: &str) -> Result<Self, CryptoError> {
        let seed = Zeroizing::new(decode_key_hex(value.trim())?);
        Ok(Self::from_seed(*seed))
    }

    /// Key the hub registers for this node.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.secret.verifying_key().to_bytes())
    }

    /// Deterministic: the same message always yields the same signature.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.secret.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("public_key", &self.public_key().to_hex())
            .finish_non_exhaustive()
    }
}

fn decode_key_hex(value: &str) -> Result<[u8; KEY_LEN], CryptoError> {
    let bytes = Zeroizing::new(
        hex::decode(value).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?,
    );
    <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| CryptoError::InvalidKeyLength {
        expected: KEY_LEN,
        actual: bytes.len(),
    })
}
