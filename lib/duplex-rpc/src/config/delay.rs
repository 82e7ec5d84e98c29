// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Pacing between client attempts.

use std::borrow::Cow;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Upper bound for a fixed delay, in seconds.
pub const MAX_FIXED_DELAY_SECS: f64 = 600.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayMode {
    /// Sleep exactly `fixed_secs` after every attempt.
    #[default]
    Fixed,
    /// Sleep a uniformly sampled duration in `[random_min_secs, random_max_secs]`.
    Random,
}

/// How long the retry loop pauses after each attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_delay_policy"))]
pub struct DelayPolicy {
    #[serde(default)]
    pub mode: DelayMode,

    /// Fixed delay in seconds (default: 1.0, range: 0-600).
    #[serde(default = "default_fixed_secs")]
    pub fixed_secs: f64,

    /// Lower bound of the random delay in seconds (default: 0.5).
    #[serde(default = "default_random_min_secs")]
    pub random_min_secs: f64,

    /// Upper bound of the random delay in seconds (default: 2.0).
    #[serde(default = "default_random_max_secs")]
    pub random_max_secs: f64,
}

impl DelayPolicy {
    pub fn fixed(secs: f64) -> Self {
        Self {
            mode: DelayMode::Fixed,
            fixed_secs: secs,
            ..Default::default()
        }
    }

    pub fn random(min_secs: f64, max_secs: f64) -> Self {
        Self {
            mode: DelayMode::Random,
            random_min_secs: min_secs,
            random_max_secs: max_secs,
            ..Default::default()
        }
    }

    /// Delay to apply after the next attempt. Random delays are drawn fresh per call.
    pub fn next_delay(&self) -> Duration {
        self.sample(&mut rand::rng())
    }

    /// Same as [`DelayPolicy::next_delay`] with a caller-provided generator.
    ///
    /// Bounds that fail validation never panic: a non-finite or inverted random range
    /// collapses to its minimum, and negative or non-finite seconds become zero.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let secs = match self.mode {
            DelayMode::Fixed => self.fixed_secs,
            DelayMode::Random => {
                let (min, max) = (self.random_min_secs, self.random_max_secs);
                if min < max && (max - min).is_finite() {
                    rng.random_range(min..=max)
                } else {
                    min
                }
            }
        };
        Duration::try_from_secs_f64(secs).unwrap_or_default()
    }
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            mode: DelayMode::default(),
            fixed_secs: default_fixed_secs(),
            random_min_secs: default_random_min_secs(),
            random_max_secs: default_random_max_secs(),
        }
    }
}

fn default_fixed_secs() -> f64 {
    1.0
}

fn default_random_min_secs() -> f64 {
    0.5
}

fn default_random_max_secs() -> f64 {
    2.0
}

/// Only the bounds of the active mode are checked.
fn validate_delay_policy(policy: &DelayPolicy) -> Result<(), ValidationError> {
    match policy.mode {
        DelayMode::Fixed => {
            if !(0.0..=MAX_FIXED_DELAY_SECS).contains(&policy.fixed_secs) {
                return Err(validation_error(
                    "fixed_delay_out_of_range",
                    "Fixed delay must be between 0 and 600 seconds.",
                ));
            }
        }
        DelayMode::Random => {
            let (min, max) = (policy.random_min_secs, policy.random_max_secs);
            if !min.is_finite() || !max.is_finite() || min < 0.0 {
                return Err(validation_error(
                    "random_delay_invalid",
                    "Random delay bounds must be finite and non-negative.",
                ));
            }
            if min > max {
                return Err(validation_error(
                    "random_delay_min_exceeds_max",
                    "Random delay minimum cannot be greater than maximum.",
                ));
            }
        }
    }
    Ok(())
}

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_default_policy() {
        let policy = DelayPolicy::default();
        assert_eq!(policy.mode, DelayMode::Fixed);
        assert_eq!(policy.next_delay(), Duration::from_secs(1));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_fixed_delay_is_exact() {
        let policy = DelayPolicy::fixed(2.0);
        for _ in 0..10 {
            assert_eq!(policy.next_delay(), Duration::from_secs(2));
        }
    }

    #[test]
    fn test_random_delay_within_bounds() {
        let policy = DelayPolicy::random(0.5, 2.0);
        let mut rng = StdRng::seed_from_u64(7);
        let min = Duration::from_millis(500);
        let max = Duration::from_secs(2);
        for _ in 0..1_000 {
            let delay = policy.sample(&mut rng);
            assert!(delay >= min && delay <= max, "{delay:?} outside bounds");
        }
    }

    #[test]
    fn test_random_delay_varies() {
        let policy = DelayPolicy::random(0.0, 10.0);
        let mut rng = StdRng::seed_from_u64(42);
        let first = policy.sample(&mut rng);
        assert!((0..20).any(|_| policy.sample(&mut rng) != first));
    }

    #[test]
    fn test_degenerate_random_range() {
        let policy = DelayPolicy::random(1.5, 1.5);
        assert_eq!(policy.next_delay(), Duration::from_millis(1500));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_fixed_delay_bounds() {
        assert!(DelayPolicy::fixed(0.0).validate().is_ok());
        assert!(DelayPolicy::fixed(600.0).validate().is_ok());
        assert!(DelayPolicy::fixed(600.5).validate().is_err());
        assert!(DelayPolicy::fixed(-1.0).validate().is_err());
        assert!(DelayPolicy::fixed(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_random_min_greater_than_max_rejected() {
        assert!(DelayPolicy::random(3.0, 2.0).validate().is_err());
        assert!(DelayPolicy::random(-1.0, 2.0).validate().is_err());
    }

    #[test]
    fn test_unvalidated_bounds_do_not_panic() {
        let mut rng = StdRng::seed_from_u64(1);
        for policy in [
            DelayPolicy::random(0.0, f64::INFINITY),
            DelayPolicy::random(f64::NEG_INFINITY, 1.0),
            DelayPolicy::random(f64::NAN, 1.0),
            DelayPolicy::random(0.5, f64::NAN),
            DelayPolicy::random(-3.0, -1.0),
            DelayPolicy::random(-f64::MAX, f64::MAX),
            DelayPolicy::fixed(f64::INFINITY),
            DelayPolicy::fixed(-1.0),
        ] {
            assert!(policy.validate().is_err(), "{policy:?}");
            let _ = policy.sample(&mut rng);
            let _ = policy.next_delay();
        }

        assert_eq!(
            DelayPolicy::random(0.5, f64::INFINITY).sample(&mut rng),
            Duration::from_millis(500)
        );
        assert_eq!(
            DelayPolicy::random(-3.0, -1.0).sample(&mut rng),
            Duration::ZERO
        );
    }

    #[test]
    fn test_inactive_mode_bounds_not_checked() {
        // random bounds are irrelevant in fixed mode
        let policy = DelayPolicy {
            random_min_secs: 5.0,
            random_max_secs: 1.0,
            ..DelayPolicy::fixed(1.0)
        };
        assert!(policy.validate().is_ok());
    }
}
