//! Optimizer trait and gradient clipping

use crate::Tensor;

/// Trait for optimization algorithms
///
/// `params` must be passed in the same order on every step; per-parameter
/// state is kept by position. Parameters without a gradient (frozen or
/// unused) are left untouched.
pub trait Optimizer {
    /// Perform a single optimization step
    fn step(&mut self, params: &mut [&mut Tensor]);

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &mut [&mut Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}

/// Rescale gradients so their global L2 norm is at most `max_norm`
///
/// Returns the norm before clipping.
pub fn clip_grad_norm(params: &mut [&mut Tensor], max_norm: f32) -> f32 {
    let total: f32 = params
        .iter()
        .filter_map(|p| p.grad())
        .map(|g| g.mapv(|x| x * x).sum())
        .sum::<f32>()
        .sqrt();

    if total > max_norm && total > 0.0 {
        let scale = max_norm / total;
        for param in params.iter() {
            if let Some(grad) = param.grad() {
                param.set_grad(grad * scale);
            }
        }
    }
    total
}
