//! # Ports Layer
//!
//! - **Inbound (Driving)**: API that the node agent calls
//! - **Outbound (Driven)**: capabilities this subsystem needs

pub mod inbound;
pub mod outbound;
