//! One-pole filters used to shape noise

use std::f64::consts::PI;

/// First-order RC high-pass filter
#[derive(Debug, Clone)]
pub struct HighPass {
    alpha: f64,
    prev_in: f64,
    prev_out: f64,
}

impl HighPass {
    pub fn new(cutoff_hz: f64, sample_rate: u32) -> Self {
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        let dt = 1.0 / sample_rate.max(1) as f64;
        HighPass {
            alpha: rc / (rc + dt),
            prev_in: 0.0,
            prev_out: 0.0,
        }
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let out = self.alpha * (self.prev_out + input - self.prev_in);
        self.prev_in = input;
        self.prev_out = out;
        out
    }
}

/// First-order RC low-pass filter
#[derive(Debug, Clone)]
pub struct LowPass {
    alpha: f64,
    prev_out: f64,
}

impl LowPass {
    pub fn new(cutoff_hz: f64, sample_rate: u32) -> Self {
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        let dt = 1.0 / sample_rate.max(1) as f64;
        LowPass {
            alpha: dt / (rc + dt),
            prev_out: 0.0,
        }
    }

    pub fn process(&mut self, input: f64) -> f64 {
        self.prev_out += self.alpha * (input - self.prev_out);
        self.prev_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_pass_blocks_dc() {
        let mut hp = HighPass::new(1000.0, 44100);
        let mut out = 0.0;
        for _ in 0..4410 {
            out = hp.process(1.0);
        }
        assert!(out.abs() < 1e-6, "DC leaked through: {}", out);
    }

    #[test]
    fn test_high_pass_passes_step_edge() {
        let mut hp = HighPass::new(1000.0, 44100);
        let first = hp.process(1.0);
        assert!(first > 0.8);
    }

    #[test]
    fn test_low_pass_settles_on_dc() {
        let mut lp = LowPass::new(200.0, 44100);
        let mut out = 0.0;
        for _ in 0..44100 {
            out = lp.process(0.5);
        }
        assert!((out - 0.5).abs() < 1e-6);
    }
}
