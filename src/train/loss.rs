//! Loss functions for training

use crate::autograd::mse;
use crate::Tensor;

/// Trait for loss functions
pub trait LossFn {
    /// One-element loss tensor wired into the predictions' graph
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Tensor;

    fn name(&self) -> &str;
}

/// Mean Squared Error Loss
///
/// L = mean((predictions - targets)²)
///
/// # Example
///
/// ```
/// use relevo::train::{LossFn, MSELoss};
/// use relevo::Tensor;
///
/// let pred = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
/// let target = Tensor::from_vec(vec![1.5, 2.5, 3.5], false);
///
/// let loss = MSELoss.forward(&pred, &target);
/// assert!((loss.data()[0] - 0.25).abs() < 1e-6);
/// ```
pub struct MSELoss;

impl LossFn for MSELoss {
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Tensor {
        mse(predictions, targets)
    }

    fn name(&self) -> &str {
        "MSE"
    }
}
