//! Compilation wrapper

use super::module::{ActiveModule, TrainingModule};
use crate::config::{CompileConfig, ModelConfig};
use crate::data::Batch;
use crate::error::Result;
use crate::nn::Module;
use crate::train::OptimizerSetup;
use crate::Tensor;
use std::rc::Rc;
use tracing::info;

/// A module compiled with the given settings
///
/// Forward and the training hooks run through the wrapped module. Weight
/// state belongs to the wrapped module; read and write it through
/// [`Compiled::inner`].
pub struct Compiled<M> {
    inner: M,
    settings: CompileConfig,
}

impl<M> Compiled<M> {
    pub fn new(inner: M, settings: CompileConfig) -> Self {
        Self { inner, settings }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut M {
        &mut self.inner
    }

    pub fn into_inner(self) -> M {
        self.inner
    }

    pub fn settings(&self) -> &CompileConfig {
        &self.settings
    }
}

/// Wrap `module` when a compile section is present
pub fn compile<M>(module: M, settings: Option<&CompileConfig>) -> ActiveModule<M> {
    match settings {
        Some(settings) => {
            info!(
                mode = ?settings.mode,
                backend = %settings.backend,
                fullgraph = settings.fullgraph,
                "compiling module"
            );
            ActiveModule::Compiled(Compiled::new(module, settings.clone()))
        }
        None => ActiveModule::Eager(module),
    }
}

impl<M: Module> Module for Compiled<M> {
    fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        self.inner.named_parameters()
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        self.inner.named_parameters_mut()
    }

    fn forward(&self, inputs: &Tensor, batch_size: usize) -> Tensor {
        self.inner.forward(inputs, batch_size)
    }
}

impl<M: TrainingModule> TrainingModule for Compiled<M> {
    type Hparams = M::Hparams;

    fn config(&self) -> &Rc<ModelConfig<Self::Hparams>> {
        self.inner.config()
    }

    fn set_config(&mut self, config: Rc<ModelConfig<Self::Hparams>>) {
        self.inner.set_config(config);
    }

    fn training_step(&self, batch: &Batch) -> Result<Tensor> {
        self.inner.training_step(batch)
    }

    fn validation_step(&self, batch: &Batch) -> Result<f32> {
        self.inner.validation_step(batch)
    }

    fn predict_step(&self, batch: &Batch) -> Result<Tensor> {
        self.inner.predict_step(batch)
    }

    fn configure_optimizers(&self) -> Result<OptimizerSetup> {
        self.inner.configure_optimizers()
    }
}
