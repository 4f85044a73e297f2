//! Training-module adapter and the orchestrator's module slot

use super::compiled::Compiled;
use crate::config::{build_optimizer, build_scheduler, ModelConfig};
use crate::data::{Batch, DataModule};
use crate::error::{Error, Result};
use crate::nn::Module;
use crate::train::{LossFn, MSELoss, OptimizerSetup, ScheduledLR, TrainResult, Trainer};
use crate::Tensor;
use ndarray::Array2;
use std::path::Path;
use std::rc::Rc;

/// A network the trainer can drive
///
/// Carries a shared reference to the configuration it was built from. The
/// orchestrator swaps that reference while a config override is active.
pub trait TrainingModule: Module {
    type Hparams: Clone;

    fn config(&self) -> &Rc<ModelConfig<Self::Hparams>>;

    fn set_config(&mut self, config: Rc<ModelConfig<Self::Hparams>>);

    /// Mean squared error of the batch predictions
    fn training_step(&self, batch: &Batch) -> Result<Tensor> {
        let targets = batch.targets.as_ref().ok_or_else(|| {
            Error::InvalidParameter("training batch has no targets".to_string())
        })?;
        let predictions = self.forward(&batch.inputs, batch.size);
        if predictions.len() != targets.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![targets.len()],
                got: vec![predictions.len()],
            });
        }
        Ok(MSELoss.forward(&predictions, targets))
    }

    fn validation_step(&self, batch: &Batch) -> Result<f32> {
        Ok(self.training_step(batch)?.data()[0])
    }

    /// Row-major `batch × outputs` predictions
    fn predict_step(&self, batch: &Batch) -> Result<Tensor> {
        Ok(self.forward(&batch.inputs, batch.size))
    }

    /// Optimizer and scheduler from the active config sections
    fn configure_optimizers(&self) -> Result<OptimizerSetup> {
        let config = self.config();
        let optimizer = build_optimizer(&config.optimizer)?;
        let scheduler = match &config.scheduler {
            Some(spec) => Some(ScheduledLR {
                scheduler: build_scheduler(spec, optimizer.lr())?,
                interval: spec.interval,
                frequency: spec.frequency,
            }),
            None => None,
        };
        Ok(OptimizerSetup {
            optimizer,
            scheduler,
        })
    }
}

/// An instantiated module, possibly wrapped for compilation
pub enum ActiveModule<M> {
    Eager(M),
    Compiled(Compiled<M>),
}

impl<M: TrainingModule> ActiveModule<M> {
    /// The uncompiled module, which holds the canonical weights
    pub fn original(&self) -> &M {
        match self {
            ActiveModule::Eager(m) => m,
            ActiveModule::Compiled(c) => c.inner(),
        }
    }

    pub fn original_mut(&mut self) -> &mut M {
        match self {
            ActiveModule::Eager(m) => m,
            ActiveModule::Compiled(c) => c.inner_mut(),
        }
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self, ActiveModule::Compiled(_))
    }

    pub fn into_original(self) -> M {
        match self {
            ActiveModule::Eager(m) => m,
            ActiveModule::Compiled(c) => c.into_inner(),
        }
    }

    pub(crate) fn set_config(&mut self, config: Rc<ModelConfig<M::Hparams>>) {
        self.original_mut().set_config(config);
    }

    pub(crate) fn fit(
        &mut self,
        trainer: &mut Trainer,
        datamodule: &DataModule,
        ckpt_path: Option<&Path>,
    ) -> Result<TrainResult> {
        match self {
            ActiveModule::Eager(m) => trainer.fit(m, datamodule, ckpt_path),
            ActiveModule::Compiled(c) => trainer.fit(c, datamodule, ckpt_path),
        }
    }

    pub(crate) fn predict(
        &self,
        trainer: &mut Trainer,
        datamodule: &DataModule,
    ) -> Result<Vec<Array2<f32>>> {
        match self {
            ActiveModule::Eager(m) => trainer.predict(m, datamodule),
            ActiveModule::Compiled(c) => trainer.predict(c, datamodule),
        }
    }
}

/// Module slot of a model
pub enum ModuleState<M> {
    Uninitialized,
    Initialized(ActiveModule<M>),
}

impl<M> Default for ModuleState<M> {
    fn default() -> Self {
        ModuleState::Uninitialized
    }
}

impl<M: TrainingModule> ModuleState<M> {
    pub fn is_initialized(&self) -> bool {
        matches!(self, ModuleState::Initialized(_))
    }

    pub fn get(&self) -> Option<&ActiveModule<M>> {
        match self {
            ModuleState::Initialized(m) => Some(m),
            ModuleState::Uninitialized => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut ActiveModule<M>> {
        match self {
            ModuleState::Initialized(m) => Some(m),
            ModuleState::Uninitialized => None,
        }
    }

    /// The module, or `NotTrained` naming the attempted `action`
    pub fn require(&self, action: &str) -> Result<&ActiveModule<M>> {
        self.get().ok_or_else(|| {
            Error::NotTrained(format!("cannot {action}: the model has no module yet"))
        })
    }
}
