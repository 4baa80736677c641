//! # Adapters

pub mod file_sequence;
