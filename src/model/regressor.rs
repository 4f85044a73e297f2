//! Multi-layer perceptron regressor

use super::architecture::Architecture;
use super::module::TrainingModule;
use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::nn::{prefixed, Linear, Mlp, Module};
use crate::Tensor;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Hyper-parameters of [`MlpRegressor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MlpConfig {
    /// Widths of the hidden ReLU layers
    pub hidden_dims: Vec<usize>,
    /// Weight initialisation seed
    pub seed: u64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_dims: vec![8],
            seed: 0,
        }
    }
}

/// Architecture: ReLU `encoder` followed by a linear `head`, one output per
/// target feature
pub struct MlpRegressor;

impl Architecture for MlpRegressor {
    const NAME: &'static str = "mlp_regressor";

    type Config = MlpConfig;

    type Module = MlpRegressorModule;

    fn instantiate_module(config: Rc<ModelConfig<MlpConfig>>) -> Result<MlpRegressorModule> {
        MlpRegressorModule::new(config)
    }
}

pub struct MlpRegressorModule {
    config: Rc<ModelConfig<MlpConfig>>,
    encoder: Mlp,
    head: Linear,
    in_features: usize,
}

impl MlpRegressorModule {
    pub fn new(config: Rc<ModelConfig<MlpConfig>>) -> Result<Self> {
        let in_features = config.x_features.len();
        let out_features = config.y_features.len();
        if in_features == 0 || out_features == 0 {
            return Err(Error::InvalidParameter(
                "MLP regressor needs at least one input and one target feature".to_string(),
            ));
        }
        let hparams = &config.architecture;
        let mut rng = StdRng::seed_from_u64(hparams.seed);

        let mut dims = vec![in_features];
        dims.extend(&hparams.hidden_dims);
        let encoder = Mlp::new(&dims, &mut rng);
        let head = Linear::new(
            encoder.out_features().unwrap_or(in_features),
            out_features,
            &mut rng,
        );
        Ok(Self {
            config,
            encoder,
            head,
            in_features,
        })
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }
}

impl Module for MlpRegressorModule {
    fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        let mut params = prefixed("encoder", self.encoder.named_parameters());
        params.extend(prefixed("head", self.head.named_parameters()));
        params
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        let mut params = prefixed("encoder", self.encoder.named_parameters_mut());
        params.extend(prefixed("head", self.head.named_parameters_mut()));
        params
    }

    fn forward(&self, inputs: &Tensor, batch_size: usize) -> Tensor {
        let hidden = self.encoder.forward(inputs, batch_size);
        self.head.forward(&hidden, batch_size)
    }
}

impl TrainingModule for MlpRegressorModule {
    type Hparams = MlpConfig;

    fn config(&self) -> &Rc<ModelConfig<MlpConfig>> {
        &self.config
    }

    fn set_config(&mut self, config: Rc<ModelConfig<MlpConfig>>) {
        self.config = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(hidden: Vec<usize>) -> Rc<ModelConfig<MlpConfig>> {
        Rc::new(ModelConfig::new(
            MlpConfig {
                hidden_dims: hidden,
                seed: 3,
            },
            ["a", "b"],
            ["y"],
        ))
    }

    #[test]
    fn test_submodules() {
        let module = MlpRegressorModule::new(config(vec![4, 4])).unwrap();
        let names: Vec<String> = module.named_modules().into_iter().collect();
        assert_eq!(names, vec!["", "encoder", "encoder.0", "encoder.1", "head"]);
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = MlpRegressorModule::new(config(vec![4])).unwrap();
        let b = MlpRegressorModule::new(config(vec![4])).unwrap();
        assert_eq!(a.state_dict(), b.state_dict());
    }

    #[test]
    fn test_forward_shape() {
        let module = MlpRegressorModule::new(config(vec![])).unwrap();
        let out = module.forward(&Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], false), 3);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_no_targets_rejected() {
        let config = Rc::new(ModelConfig::new(MlpConfig::default(), ["a"], Vec::<String>::new()));
        assert!(MlpRegressorModule::new(config).is_err());
    }
}
