//! # Fleet Integrity Score (Φ)

use crate::domain::entities::NodeLedger;

/// Maps the set of node states to a score in `[0, 1]`.
///
/// Implementations must be monotone in freshness: marking a node stale never
/// raises the score.
pub trait PhiPolicy: Send + Sync {
    fn compute(&self, nodes: &NodeLedger) -> f64;
}

/// `Φ = Σ rolling_score over non-stale nodes / known nodes`.
///
/// An empty fleet scores 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreshnessWeightedPolicy;

impl PhiPolicy for FreshnessWeightedPolicy {
    fn compute(&self, nodes: &NodeLedger) -> f64 {
        if nodes.is_empty() {
            return 1.0;
        }
        let live: f64 = nodes
            .values()
            .filter(|n| !n.stale)
            .map(|n| n.rolling_score.clamp(0.0, 1.0))
            .sum();
        (live / nodes.len() as f64).clamp(0.0, 1.0)
    }
}
