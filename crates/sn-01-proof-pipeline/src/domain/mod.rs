//! # Domain Layer
//!
//! Pure logic with no I/O dependencies.

pub mod errors;
pub mod health;
