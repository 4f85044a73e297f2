//! Stochastic Gradient Descent optimizer

use super::Optimizer;
use crate::Tensor;
use ndarray::Array1;

/// SGD optimizer with optional momentum and L2 weight decay
pub struct SGD {
    lr: f32,
    momentum: f32,
    weight_decay: f32,
    velocities: Vec<Option<Array1<f32>>>,
}

impl SGD {
    /// Create a new SGD optimizer
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            weight_decay: 0.0,
            velocities: Vec::new(),
        }
    }

    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &mut [&mut Tensor]) {
        if self.velocities.len() != params.len() {
            self.velocities = vec![None; params.len()];
        }

        for (i, param) in params.iter_mut().enumerate() {
            let Some(mut grad) = param.grad() else {
                continue;
            };
            if self.weight_decay > 0.0 {
                grad = grad + param.data() * self.weight_decay;
            }

            if self.momentum > 0.0 {
                // v = momentum * v - lr * grad
                let velocity = match &self.velocities[i] {
                    Some(v) => v * self.momentum - &grad * self.lr,
                    None => &grad * (-self.lr),
                };
                *param.data_mut() = param.data() + &velocity;
                self.velocities[i] = Some(velocity);
            } else {
                *param.data_mut() = param.data() - &(&grad * self.lr);
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sgd_descends() {
        let mut p = Tensor::from_vec(vec![1.0, -2.0], true);
        p.set_grad(ndarray::arr1(&[1.0, -1.0]));
        let mut opt = SGD::new(0.5, 0.0);
        opt.step(&mut [&mut p]);
        assert_eq!(p.to_vec(), vec![0.5, -1.5]);
    }

    #[test]
    fn test_sgd_skips_parameters_without_gradient() {
        let mut frozen = Tensor::from_vec(vec![1.0], false);
        let mut live = Tensor::from_vec(vec![1.0], true);
        live.set_grad(ndarray::arr1(&[1.0]));

        let mut opt = SGD::new(0.1, 0.9);
        opt.step(&mut [&mut frozen, &mut live]);
        assert_eq!(frozen.to_vec(), vec![1.0]);
        assert!(live.data()[0] < 1.0);
    }
}
