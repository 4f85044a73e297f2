//! Dense layers

use super::module::prefixed;
use super::Module;
use crate::autograd::{add_bias, matmul, relu};
use crate::Tensor;
use rand::rngs::StdRng;
use rand::Rng;

/// Fully connected layer: y = x @ W + b
///
/// The weight is stored row-major as `in_features × out_features`.
pub struct Linear {
    weight: Tensor,
    bias: Tensor,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Uniform init in ±1/sqrt(in_features), bias zero
    pub fn new(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        let bound = 1.0 / (in_features.max(1) as f32).sqrt();
        let weight: Vec<f32> = (0..in_features * out_features)
            .map(|_| rng.gen_range(-bound..=bound))
            .collect();
        Self {
            weight: Tensor::from_vec(weight, true),
            bias: Tensor::zeros(out_features, true),
            in_features,
            out_features,
        }
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }
}

impl Module for Linear {
    fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        vec![
            ("weight".to_string(), &self.weight),
            ("bias".to_string(), &self.bias),
        ]
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        vec![
            ("weight".to_string(), &mut self.weight),
            ("bias".to_string(), &mut self.bias),
        ]
    }

    fn forward(&self, inputs: &Tensor, batch_size: usize) -> Tensor {
        let out = matmul(
            inputs,
            &self.weight,
            batch_size,
            self.in_features,
            self.out_features,
        );
        add_bias(&out, &self.bias, batch_size, self.out_features)
    }
}

/// Stack of [`Linear`] layers, each followed by ReLU
///
/// Layers are named `0`, `1`, ... in order.
pub struct Mlp {
    layers: Vec<Linear>,
}

impl Mlp {
    /// `dims = [in, hidden_1, ..., hidden_n]`
    pub fn new(dims: &[usize], rng: &mut StdRng) -> Self {
        let layers = dims
            .windows(2)
            .map(|pair| Linear::new(pair[0], pair[1], rng))
            .collect();
        Self { layers }
    }

    /// Width of the last layer, or `None` for an empty stack
    pub fn out_features(&self) -> Option<usize> {
        self.layers.last().map(Linear::out_features)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Module for Mlp {
    fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| prefixed(&i.to_string(), layer.named_parameters()))
            .collect()
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        self.layers
            .iter_mut()
            .enumerate()
            .flat_map(|(i, layer)| prefixed(&i.to_string(), layer.named_parameters_mut()))
            .collect()
    }

    fn forward(&self, inputs: &Tensor, batch_size: usize) -> Tensor {
        let mut x = inputs.clone();
        for layer in &self.layers {
            x = relu(&layer.forward(&x, batch_size));
        }
        x
    }
}
