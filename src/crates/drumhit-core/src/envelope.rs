//! Exponential amplitude envelopes

/// Exponential decay stepped once per frame
///
/// Yields `start` on the first frame and reaches `end` after `frames` steps.
/// The iterator never ends; callers take as many gains as they need.
#[derive(Debug, Clone)]
pub struct ExpDecay {
    value: f64,
    factor: f64,
}

impl ExpDecay {
    /// Decay from `start` to `end` across `frames` frames
    pub fn new(start: f64, end: f64, frames: usize) -> Self {
        let factor = if frames == 0 || start <= 0.0 || end <= 0.0 {
            1.0
        } else {
            (end / start).powf(1.0 / frames as f64)
        };
        ExpDecay {
            value: start,
            factor,
        }
    }

    /// `exp(-rate * t)` where `t` runs from 0 to 1 over `frames` frames
    pub fn with_rate(rate: f64, frames: usize) -> Self {
        let factor = if frames == 0 {
            1.0
        } else {
            (-rate / frames as f64).exp()
        };
        ExpDecay { value: 1.0, factor }
    }

    /// Current gain, without advancing
    pub fn gain(&self) -> f64 {
        self.value
    }
}

impl Iterator for ExpDecay {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let gain = self.value;
        self.value *= self.factor;
        Some(gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_reaches_end() {
        let mut env = ExpDecay::new(1.0, 0.01, 1000);
        assert_eq!(env.next(), Some(1.0));
        let last = env.nth(998).unwrap();
        assert!(last > 0.01 && last < 0.0102, "got {}", last);
        assert!((env.gain() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_rate_matches_closed_form() {
        let frames = 441;
        let gains: Vec<f64> = ExpDecay::with_rate(5.0, frames).take(frames).collect();
        let expected = (-5.0f64 * 200.0 / frames as f64).exp();
        assert!((gains[200] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_zero_frames_holds_start() {
        let mut env = ExpDecay::new(0.8, 0.01, 0);
        assert_eq!(env.next(), Some(0.8));
        assert_eq!(env.next(), Some(0.8));
    }
}
