//! Host adapters for the sensor node binary.

pub mod keys;
pub mod noise_source;

pub use keys::{load_signing_key, KeyLoadError, NODE_KEY_SEED_ENV};
pub use noise_source::DeviceNoiseSource;
