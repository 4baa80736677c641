//! # Anomaly Classification
//!
//! An externally detected "phantom density" in `[0, 1]` is bucketed into a
//! class; the class scales the configured base penalty.
//!
//! | density      | class            | multiplier |
//! |--------------|------------------|------------|
//! | `> 0.9`      | `PureInjection`  | 5.0        |
//! | `> 0.5`      | `MixedInjection` | 2.0        |
//! | `> 0.2`      | `Probing`        | 0.5        |
//! | otherwise    | `Noise`          | 0.1        |

use serde::{Deserialize, Serialize};
use shared_types::UnixMillis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyClass {
    Noise,
    Probing,
    MixedInjection,
    PureInjection,
}

impl AnomalyClass {
    /// Bucket a density. Callers validate the range first.
    #[must_use]
    pub fn classify(density: f64) -> Self {
        if density > 0.9 {
            Self::PureInjection
        } else if density > 0.5 {
            Self::MixedInjection
        } else if density > 0.2 {
            Self::Probing
        } else {
            Self::Noise
        }
    }

    #[must_use]
    pub const fn multiplier(&self) -> f64 {
        match self {
            Self::PureInjection => 5.0,
            Self::MixedInjection => 2.0,
            Self::Probing => 0.5,
            Self::Noise => 0.1,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PureInjection => "pure_injection",
            Self::MixedInjection => "mixed_injection",
            Self::Probing => "probing",
            Self::Noise => "noise",
        }
    }
}

/// A live anomaly mark on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFlag {
    pub class: AnomalyClass,
    pub density: f64,
    pub penalty: f64,
    pub reported_at: UnixMillis,
    pub expires_at: UnixMillis,
}

impl AnomalyFlag {
    #[must_use]
    pub fn new(density: f64, base_penalty: f64, reported_at: UnixMillis, ttl_millis: u64) -> Self {
        let class = AnomalyClass::classify(density);
        Self {
            class,
            density,
            penalty: (base_penalty * class.multiplier()).clamp(0.0, 1.0),
            reported_at,
            expires_at: reported_at.plus(ttl_millis),
        }
    }

    #[must_use]
    pub fn is_active(&self, now: UnixMillis) -> bool {
        now < self.expires_at
    }
}
