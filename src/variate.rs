//! Random durations with a given mean and coefficient of variation.

use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Gamma};
use tracing::warn;

/// Below this a coefficient of variation is treated as zero.
const CV_EPSILON: f64 = f64::EPSILON;

/// Draws nonnegative durations from a moment-matched Gamma distribution.
///
/// For a target mean `m` and coefficient of variation `cv`, the variance is `(cv·m)²`, so
///
/// - shape `k = m² / variance = 1 / cv²`
/// - scale `θ = variance / m = m·cv²`
///
/// giving `E[X] = kθ = m` and `SD[X] = √k·θ = cv·m`. Gamma is supported on the nonnegative reals,
/// so no clipping is needed. When `cv` is zero the mean is returned exactly.
///
/// Each loop should own its own generator. Use [`VariateGenerator::for_stream`] to give several
/// loops independent, reproducible streams from one master seed.
#[derive(Debug, Clone)]
pub struct VariateGenerator {
    /// RNG for reproducibility
    rng: StdRng,
}

impl VariateGenerator {
    /// Create a new generator
    ///
    /// # Arguments
    /// * `seed` - Optional seed for reproducibility
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };

        Self { rng }
    }

    /// Create a generator for one of several independent streams sharing a master seed.
    ///
    /// Without a seed every stream is seeded from the OS.
    pub fn for_stream(seed: Option<u64>, stream: u64) -> Self {
        Self::new(seed.map(|s| mix(s, stream)))
    }

    /// Sample a duration in milliseconds.
    ///
    /// A non-positive or non-finite `mean` yields zero. A negative or non-finite `cv` is treated
    /// as zero.
    pub fn sample(&mut self, mean: f64, cv: f64) -> f64 {
        if !mean.is_finite() || mean <= 0.0 {
            return 0.0;
        }
        if !cv.is_finite() || cv < CV_EPSILON {
            return mean;
        }

        let variance = (cv * mean).powi(2);
        let shape = mean * mean / variance;
        let scale = variance / mean;

        match Gamma::new(shape, scale) {
            Ok(gamma) => {
                let value: f64 = gamma.sample(&mut self.rng);
                if value.is_finite() {
                    value.max(0.0)
                } else {
                    mean
                }
            }
            Err(err) => {
                warn!(mean, cv, error = %err, "Unable to build Gamma distribution, using the mean");
                mean
            }
        }
    }

    /// Sample a duration, as a [`Duration`].
    pub fn sample_duration(&mut self, mean_ms: f64, cv: f64) -> Duration {
        millis_to_duration(self.sample(mean_ms, cv))
    }

    /// Pick an index in `0..len` uniformly.
    pub(crate) fn pick(&mut self, len: usize) -> usize {
        if len == 0 {
            0
        } else {
            self.rng.random_range(0..len)
        }
    }

    /// A uniform value in `[0, 1)`.
    pub(crate) fn unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// Convert fractional milliseconds to a [`Duration`], clamping negatives and non-finite values to
/// zero.
///
/// Values too large for a [`Duration`] saturate at [`Duration::MAX`].
pub fn millis_to_duration(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// SplitMix64 finaliser over the master seed and stream index.
fn mix(seed: u64, stream: u64) -> u64 {
    let mut z = seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
