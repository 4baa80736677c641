//! # Sentinel Fleet Test Suite
//!
//! ```text
//! tests/src/
//! ├── support.rs              # in-process channel into a hub, noise files
//! └── integration/
//!     ├── node_to_hub.rs      # agent → pipeline → transport → hub, in process
//!     ├── fleet_scenarios.rs  # Φ, liveness, quorum seal, restart recovery
//!     └── e2e_loopback.rs     # real binaries' runtimes over loopback TCP
//! benches/
//! └── fleet_benchmarks.rs     # proof production and heartbeat admission
//! ```
//!
//! ```bash
//! cargo test -p sentinel-tests
//! cargo bench -p sentinel-tests
//! ```

pub mod integration;
pub mod support;
