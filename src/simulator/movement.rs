//! Step math for simulated movement

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Move `fraction` of the way towards the target, where the fraction is the
/// distance travelled this tick over the remaining distance, capped at 1.
///
/// Latitude and longitude are interpolated independently, which is accurate
/// enough at the distances a tick covers.
pub fn advance_towards(
    from: (f64, f64),
    to: (f64, f64),
    remaining_km: f64,
    speed_kmh: f64,
    tick_seconds: f64,
) -> (f64, f64) {
    let travel_km = speed_kmh * tick_seconds / 3600.0;
    let fraction = if remaining_km > 0.0 {
        (travel_km / remaining_km).min(1.0)
    } else {
        1.0
    };
    (
        from.0 + (to.0 - from.0) * fraction,
        from.1 + (to.1 - from.1) * fraction,
    )
}

/// Uniform source of speeds for members that never reported one
pub struct SpeedSampler {
    rng: Mutex<StdRng>,
    min_kmh: f64,
    max_kmh: f64,
}

impl SpeedSampler {
    pub fn new(min_kmh: f64, max_kmh: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
            min_kmh,
            max_kmh,
        }
    }

    /// A degenerate or non-finite range yields `min_kmh` instead of sampling
    pub fn sample(&self) -> f64 {
        let sampleable =
            self.min_kmh.is_finite() && self.max_kmh.is_finite() && self.max_kmh > self.min_kmh;
        if !sampleable {
            return self.min_kmh;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(self.min_kmh..=self.max_kmh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::haversine_km;

    #[test]
    fn test_first_step_of_walk() {
        let from = (9.92, 78.12);
        let to = (9.93, 78.12);
        let d = haversine_km(from.0, from.1, to.0, to.1);

        // 36 km/h for one second is 10 m
        let (lat, lng) = advance_towards(from, to, d, 36.0, 1.0);
        let expected = 0.01 * (0.01 / d);
        assert!((lat - from.0 - expected).abs() < 1e-12);
        assert_eq!(lng, 78.12);
    }

    #[test]
    fn test_step_never_overshoots() {
        let from = (0.0, 0.0);
        let to = (0.0, 0.001);
        let d = haversine_km(from.0, from.1, to.0, to.1);
        assert_eq!(advance_towards(from, to, d, 500.0, 60.0), to);
        assert_eq!(advance_towards(to, to, 0.0, 10.0, 1.0), to);
    }

    #[test]
    fn test_sampler_range_and_seed() {
        let a = SpeedSampler::new(3.0, 23.0, Some(7));
        let b = SpeedSampler::new(3.0, 23.0, Some(7));
        for _ in 0..100 {
            let speed = a.sample();
            assert!((3.0..=23.0).contains(&speed));
            assert_eq!(speed, b.sample());
        }
        assert_eq!(SpeedSampler::new(5.0, 5.0, None).sample(), 5.0);
    }

    #[test]
    fn test_sampler_does_not_panic_on_non_finite_range() {
        assert_eq!(SpeedSampler::new(3.0, f64::INFINITY, Some(1)).sample(), 3.0);
        assert!(SpeedSampler::new(f64::NAN, 23.0, Some(1)).sample().is_nan());
    }
}
