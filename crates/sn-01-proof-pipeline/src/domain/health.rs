//! # Entropy Health Screen
//!
//! Cheap sanity checks run on every sample before it is attested. They are
//! not a proof of randomness; they catch a sensor that is stuck, covered or
//! returning a constant frame.

use crate::domain::errors::DigestError;
use std::fmt;

/// Thresholds for the health screen.
#[derive(Debug, Clone, PartialEq)]
pub struct EntropyHealthConfig {
    /// Skip the screen entirely.
    pub enabled: bool,
    /// Minimum Shannon entropy of the byte histogram, in bits per byte (0..=8).
    pub min_shannon_bits_per_byte: f64,
    /// Longest run of one repeated byte value that is still acceptable.
    pub max_repeat_run: usize,
}

impl Default for EntropyHealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_shannon_bits_per_byte: 1.5,
            max_repeat_run: 128,
        }
    }
}

impl EntropyHealthConfig {
    /// Screen disabled, for fixtures that use deliberately simple samples.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Run the screen over a sample.
    pub fn check(&self, sample: &[u8]) -> Result<(), DigestError> {
        if !self.enabled {
            return Ok(());
        }

        let run = longest_repeat_run(sample);
        if run > self.max_repeat_run {
            return Err(DigestError::LowEntropy(HealthViolation::RepeatRun {
                run,
                maximum: self.max_repeat_run,
            }));
        }

        let bits = shannon_bits_per_byte(sample);
        if bits < self.min_shannon_bits_per_byte {
            return Err(DigestError::LowEntropy(HealthViolation::LowShannon {
                measured: bits,
                minimum: self.min_shannon_bits_per_byte,
            }));
        }

        Ok(())
    }
}

/// Which threshold a sample broke.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthViolation {
    LowShannon { measured: f64, minimum: f64 },
    RepeatRun { run: usize, maximum: usize },
}

impl fmt::Display for HealthViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthViolation::LowShannon { measured, minimum } => write!(
                f,
                "shannon entropy {:.3} bits/byte below minimum {:.3}",
                measured, minimum
            ),
            HealthViolation::RepeatRun { run, maximum } => {
                write!(f, "repeated byte run of {} exceeds maximum {}", run, maximum)
            }
        }
    }
}

/// Shannon entropy of the byte histogram, in bits per byte.
#[must_use]
pub fn shannon_bits_per_byte(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0usize; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let len = data.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Length of the longest run of a single repeated byte.
#[must_use]
pub fn longest_repeat_run(data: &[u8]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<u8> = None;
    for &b in data {
        if previous == Some(b) {
            current += 1;
        } else {
            current = 1;
            previous = Some(b);
        }
        longest = longest.max(current);
    }
    longest
}
