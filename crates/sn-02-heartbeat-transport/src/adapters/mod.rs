//! # Adapters

#[cfg(feature = "tor")]
pub mod tor;
