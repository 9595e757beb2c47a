// ============================================================
// Layer 5: Training Schedules
// ============================================================
// Pure functions of a counter owned by the trainer:
//
//   KlSchedule::weight(iteration)        → λ for the KL term
//   WordDropoutSchedule::keep(epoch)     → word keep probability
//   LearningRateSchedule::rate(epoch)    → optimiser step size
//
// Epochs are 1-based, iterations count batches from 0.
//
// KL annealing shapes (t = min(iteration, anneal_till)):
//   none    λ = lambda_val
//   linear  λ = ceiling · t / anneal_till
//   tanh    λ = ceiling · (tanh((t − offset) / width) + 1) / 2
//
// Reference: Bowman et al. (2016) §3.1 KL cost annealing

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnnealType {
    None,
    #[default]
    Linear,
    Tanh,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KlSchedule {
    pub anneal_type: AnnealType,
    /// Constant weight used when `anneal_type` is `None`.
    pub lambda_val:  f64,
    /// Weight reached by the annealed shapes.
    pub ceiling:     f64,
    pub anneal_till: usize,
    pub offset:      f64,
    pub width:       f64,
}

impl KlSchedule {
    pub fn weight(&self, iteration: usize) -> f64 {
        let t = iteration.min(self.anneal_till) as f64;
        match self.anneal_type {
            AnnealType::None => self.lambda_val,
            AnnealType::Linear => {
                if self.anneal_till == 0 {
                    self.ceiling
                } else {
                    self.ceiling * t / self.anneal_till as f64
                }
            }
            AnnealType::Tanh => {
                let width = if self.width > 0.0 { self.width } else { 1.0 };
                self.ceiling * (((t - self.offset) / width).tanh() + 1.0) / 2.0
            }
        }
    }
}

/// Keep probability starts at 1.0 and drops by `step` per epoch down to `floor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordDropoutSchedule {
    pub floor: f64,
    pub step:  f64,
}

impl WordDropoutSchedule {
    pub fn keep(&self, epoch: usize) -> f64 {
        let decayed = 1.0 - self.step * epoch.saturating_sub(1) as f64;
        decayed.max(self.floor).min(1.0)
    }
}

/// Multiplicative per-epoch decay with a floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRateSchedule {
    pub initial: f64,
    pub decay:   f64,
    pub minimum: f64,
}

impl LearningRateSchedule {
    pub fn rate(&self, epoch: usize) -> f64 {
        let exponent = epoch.saturating_sub(1) as i32;
        (self.initial * self.decay.powi(exponent)).max(self.minimum)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn kl(anneal_type: AnnealType) -> KlSchedule {
        KlSchedule {
            anneal_type,
            lambda_val:  0.3,
            ceiling:     1.0,
            anneal_till: 1000,
            offset:      500.0,
            width:       100.0,
        }
    }

    #[test]
    fn test_none_is_constant() {
        let s = kl(AnnealType::None);
        for it in [0, 1, 999, 1000, 50_000] {
            assert_eq!(s.weight(it), 0.3);
        }
    }

    #[test]
    fn test_linear_reaches_ceiling_and_clamps() {
        let s = kl(AnnealType::Linear);
        assert_eq!(s.weight(0), 0.0);
        assert_eq!(s.weight(1000), 1.0);
        assert_eq!(s.weight(5000), 1.0);

        let mut previous = 0.0;
        for it in 0..1200 {
            let w = s.weight(it);
            assert!(w >= previous && w <= 1.0);
            previous = w;
        }
    }

    #[test]
    fn test_tanh_is_bounded_and_monotone() {
        let s = kl(AnnealType::Tanh);
        let mut previous = 0.0;
        for it in 0..2000 {
            let w = s.weight(it);
            assert!((0.0..=1.0).contains(&w));
            assert!(w >= previous);
            previous = w;
        }
        assert!((s.weight(500) - 0.5).abs() < 1e-12);
        assert_eq!(s.weight(1000), s.weight(1500));
    }

    #[test]
    fn test_word_keep_decays_to_floor() {
        let s = WordDropoutSchedule { floor: 0.8, step: 0.05 };
        assert_eq!(s.keep(1), 1.0);
        assert!((s.keep(2) - 0.95).abs() < 1e-12);
        assert!((s.keep(5) - 0.8).abs() < 1e-12);
        assert_eq!(s.keep(20), 0.8);
    }

    #[test]
    fn test_learning_rate_decays_to_minimum() {
        let s = LearningRateSchedule { initial: 1e-3, decay: 0.5, minimum: 2e-4 };
        assert_eq!(s.rate(1), 1e-3);
        assert_eq!(s.rate(2), 5e-4);
        assert_eq!(s.rate(3), 2.5e-4);
        assert_eq!(s.rate(4), 2e-4);
        assert_eq!(s.rate(10), 2e-4);
    }
}
