//! Learning rate schedulers
//!
//! A scheduler is a pure function of its step count; the trainer decides
//! whether a step is an epoch or an optimizer step.

use super::Optimizer;
use std::f32::consts::PI;

pub trait LRScheduler {
    /// Learning rate after `t` scheduler steps
    fn lr_at(&self, t: usize) -> f32;

    /// Scheduler steps taken so far
    fn steps_taken(&self) -> usize;

    /// Jump to `t` steps, as when resuming
    fn set_steps_taken(&mut self, t: usize);

    fn get_lr(&self) -> f32 {
        self.lr_at(self.steps_taken())
    }

    fn step(&mut self) {
        let t = self.steps_taken();
        self.set_steps_taken(t + 1);
    }

    fn apply(&self, optimizer: &mut dyn Optimizer) {
        optimizer.set_lr(self.get_lr());
    }
}

/// Cosine decay from `lr_max` to `lr_min` over `t_max` steps, then flat
///
/// lr_t = lr_min + 0.5 * (lr_max - lr_min) * (1 + cos(π * t / t_max))
pub struct CosineAnnealingLR {
    lr_max: f32,
    lr_min: f32,
    t_max: usize,
    t: usize,
}

impl CosineAnnealingLR {
    pub fn new(lr_max: f32, t_max: usize, lr_min: f32) -> Self {
        Self {
            lr_max,
            lr_min,
            t_max,
            t: 0,
        }
    }
}

impl LRScheduler for CosineAnnealingLR {
    fn lr_at(&self, t: usize) -> f32 {
        if t >= self.t_max {
            return self.lr_min;
        }
        let progress = t as f32 / self.t_max as f32;
        self.lr_min + 0.5 * (self.lr_max - self.lr_min) * (1.0 + (PI * progress).cos())
    }

    fn steps_taken(&self) -> usize {
        self.t
    }

    fn set_steps_taken(&mut self, t: usize) {
        self.t = t;
    }
}

/// Multiply the learning rate by `gamma` every `step_size` steps
pub struct StepLR {
    base_lr: f32,
    step_size: usize,
    gamma: f32,
    t: usize,
}

impl StepLR {
    pub fn new(base_lr: f32, step_size: usize, gamma: f32) -> Self {
        Self {
            base_lr,
            step_size: step_size.max(1),
            gamma,
            t: 0,
        }
    }
}

impl LRScheduler for StepLR {
    fn lr_at(&self, t: usize) -> f32 {
        let decays = i32::try_from(t / self.step_size).unwrap_or(i32::MAX);
        self.base_lr * self.gamma.powi(decays)
    }

    fn steps_taken(&self) -> usize {
        self.t
    }

    fn set_steps_taken(&mut self, t: usize) {
        self.t = t;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_cosine_endpoints_and_midpoint() {
        let scheduler = CosineAnnealingLR::new(1.0, 100, 0.1);
        assert_abs_diff_eq!(scheduler.lr_at(0), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(scheduler.lr_at(50), 0.55, epsilon = 1e-4);
        assert_abs_diff_eq!(scheduler.lr_at(120), 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_never_increases() {
        let scheduler = CosineAnnealingLR::new(1.0, 100, 0.0);
        let lrs: Vec<f32> = (0..=100).map(|t| scheduler.lr_at(t)).collect();
        assert!(lrs.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_step_lr_decays_in_steps() {
        let mut scheduler = StepLR::new(1.0, 2, 0.5);
        let mut lrs = Vec::new();
        for _ in 0..5 {
            lrs.push(scheduler.get_lr());
            scheduler.step();
        }
        assert_eq!(lrs, vec![1.0, 1.0, 0.5, 0.5, 0.25]);
    }

    #[test]
    fn test_jump_matches_stepping() {
        let mut stepped = StepLR::new(0.1, 3, 0.1);
        for _ in 0..7 {
            stepped.step();
        }
        let mut jumped = StepLR::new(0.1, 3, 0.1);
        jumped.set_steps_taken(7);
        assert_eq!(jumped.get_lr(), stepped.get_lr());
    }

    #[test]
    fn test_scheduler_applies_to_optimizer() {
        use crate::optim::SGD;

        let mut optimizer = SGD::new(1.0, 0.0);
        let mut scheduler = CosineAnnealingLR::new(1.0, 10, 0.0);
        scheduler.step();
        scheduler.apply(&mut optimizer);
        assert!(optimizer.lr() < 1.0);
    }
}
