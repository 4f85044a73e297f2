//! Trainer: fit and predict loops

use super::callback::{CallbackAction, CallbackContext, CallbackManager, TrainerCallback};
use super::{MetricsTracker, ProgressCallback};
use crate::autograd::backward;
use crate::config::{SchedulerInterval, TrainerConfig};
use crate::data::DataModule;
use crate::error::{Error, Result};
use crate::io::CheckpointFile;
use crate::model::TrainingModule;
use crate::optim::{clip_grad_norm, LRScheduler, Optimizer};
use ndarray::Array2;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Optimizer and optional scheduler returned by a module
pub struct OptimizerSetup {
    pub optimizer: Box<dyn Optimizer>,
    pub scheduler: Option<ScheduledLR>,
}

/// Scheduler with the cadence it is stepped at
pub struct ScheduledLR {
    pub scheduler: Box<dyn LRScheduler>,
    pub interval: SchedulerInterval,
    /// Step every `frequency` intervals
    pub frequency: usize,
}

impl ScheduledLR {
    fn tick(&mut self, interval: SchedulerInterval, count: usize, optimizer: &mut dyn Optimizer) {
        if self.interval == interval && count % self.frequency.max(1) == 0 {
            self.scheduler.step();
            self.scheduler.apply(optimizer);
        }
    }

    /// Replay the steps taken before `epoch` / `global_step`
    fn fast_forward(&mut self, epoch: usize, global_step: usize, optimizer: &mut dyn Optimizer) {
        let count = match self.interval {
            SchedulerInterval::Epoch => epoch,
            SchedulerInterval::Step => global_step,
        } / self.frequency.max(1);
        self.scheduler.set_steps_taken(count);
        self.scheduler.apply(optimizer);
    }
}

/// Result of a training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainResult {
    /// Epochs completed, including those restored from a checkpoint
    pub final_epoch: usize,
    /// Optimizer steps taken, including restored ones
    pub global_step: usize,
    /// Mean training loss of the last epoch
    pub final_loss: f32,
    pub best_loss: f32,
    /// Last validation loss, if validation ran
    pub val_loss: Option<f32>,
    pub stopped_early: bool,
    pub elapsed_secs: f64,
}

/// Single-process trainer configured from flattened keyword arguments
///
/// # Example
///
/// ```
/// use relevo::config::{ModelConfig, TrainerConfig};
/// use relevo::train::Trainer;
///
/// let config = ModelConfig::new((), ["x"], ["y"]);
/// let trainer = Trainer::from_kwargs(config.pass_to_trainer()).unwrap();
/// assert_eq!(trainer.config(), &TrainerConfig::default());
/// ```
pub struct Trainer {
    config: TrainerConfig,

    /// Metrics tracker
    pub metrics: MetricsTracker,

    callbacks: CallbackManager,

    start_time: Option<Instant>,
}

impl Trainer {
    /// Build from a trainer mapping; unknown keys are rejected
    pub fn from_kwargs(kwargs: Map<String, Value>) -> Result<Self> {
        let config: TrainerConfig = serde_json::from_value(Value::Object(kwargs))
            .map_err(|e| Error::ConfigError(format!("Invalid trainer arguments: {e}")))?;
        Ok(Self::new(config))
    }

    pub fn new(config: TrainerConfig) -> Self {
        let mut callbacks = CallbackManager::new();
        if config.logger {
            callbacks.add(ProgressCallback::new(config.log_every_n_steps));
        }
        callbacks.add_from_config(&config.callbacks);
        Self {
            config,
            metrics: MetricsTracker::new(),
            callbacks,
            start_time: None,
        }
    }

    /// Inference-only trainer: placement settings kept, no logger
    pub fn for_prediction(config: &TrainerConfig) -> Self {
        Self::new(TrainerConfig {
            accelerator: config.accelerator.clone(),
            devices: config.devices.clone(),
            strategy: config.strategy.clone(),
            logger: false,
            ..TrainerConfig::default()
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn add_callback<C: TrainerCallback + 'static>(&mut self, callback: C) {
        self.callbacks.add(callback);
    }

    pub fn callbacks(&self) -> &CallbackManager {
        &self.callbacks
    }

    /// Where `fit` writes its resume checkpoint, if checkpointing is on
    pub fn last_checkpoint_path(&self) -> Option<PathBuf> {
        if !self.config.enable_checkpointing {
            return None;
        }
        self.config
            .default_root_dir
            .as_ref()
            .map(|root| root.join("checkpoints").join("last.ckpt"))
    }

    fn elapsed(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Train `module` on the datamodule's train split
    ///
    /// With `ckpt_path`, weights and progress counters are restored from a
    /// trainer checkpoint first and training continues from the stored
    /// epoch.
    pub fn fit<M: TrainingModule>(
        &mut self,
        module: &mut M,
        datamodule: &DataModule,
        ckpt_path: Option<&Path>,
    ) -> Result<TrainResult> {
        self.start_time = Some(Instant::now());
        let max_epochs = self.config.max_epochs;
        let accum_steps = self.config.accumulate_grad_batches.max(1);

        let mut start_epoch = 0;
        let mut global_step = 0;
        if let Some(path) = ckpt_path {
            let checkpoint = CheckpointFile::load(path)?;
            module.load_state_dict(&checkpoint.to_state_dict()?)?;
            start_epoch = checkpoint.epoch.unwrap_or(0);
            global_step = checkpoint.global_step.unwrap_or(0);
            info!(path = %path.display(), epoch = start_epoch, global_step, "resuming from checkpoint");
        }

        let OptimizerSetup {
            mut optimizer,
            mut scheduler,
        } = module.configure_optimizers()?;
        if let Some(s) = scheduler.as_mut() {
            if start_epoch > 0 || global_step > 0 {
                s.fast_forward(start_epoch, global_step, optimizer.as_mut());
            }
        }

        info!(
            max_epochs,
            start_epoch,
            parameters = module.named_parameters().len(),
            "fit started"
        );

        let mut ctx = CallbackContext {
            epoch: start_epoch,
            max_epochs,
            global_step,
            lr: optimizer.lr(),
            ..CallbackContext::default()
        };
        let mut result = TrainResult {
            final_epoch: start_epoch,
            global_step,
            final_loss: 0.0,
            best_loss: f32::INFINITY,
            val_loss: None,
            stopped_early: false,
            elapsed_secs: 0.0,
        };

        if self.callbacks.on_train_begin(&ctx) == CallbackAction::Stop {
            result.stopped_early = true;
            result.elapsed_secs = self.elapsed();
            return Ok(result);
        }

        'epochs: for epoch in start_epoch..max_epochs {
            if self.max_steps_reached(global_step) {
                break;
            }
            ctx.epoch = epoch;
            ctx.val_loss = None;
            if self.callbacks.on_epoch_begin(&ctx) == CallbackAction::Stop {
                result.stopped_early = true;
                break;
            }

            let batches = datamodule.train_batches(epoch)?;
            let steps_per_epoch = batches.len();
            ctx.steps_per_epoch = steps_per_epoch;
            let mut total_loss = 0.0;
            let mut total_rows = 0;

            for (step, batch) in batches.iter().enumerate() {
                ctx.step = step;
                if step % accum_steps == 0 {
                    optimizer.zero_grad(&mut module.parameters_mut());
                }

                let mut loss = module.training_step(batch)?;
                let loss_val = loss.data()[0];
                backward(&mut loss, None);
                total_loss += loss_val * batch.size as f32;
                total_rows += batch.size;

                let is_accum_boundary = (step + 1) % accum_steps == 0;
                let is_last_batch = step + 1 == steps_per_epoch;
                if is_accum_boundary || is_last_batch {
                    let mut params = module.parameters_mut();
                    if let Some(max_norm) = self.config.gradient_clip_val {
                        clip_grad_norm(&mut params, max_norm);
                    }
                    optimizer.step(&mut params);
                    global_step += 1;
                    if let Some(s) = scheduler.as_mut() {
                        s.tick(SchedulerInterval::Step, global_step, optimizer.as_mut());
                    }
                }
                self.metrics.increment_step();

                ctx.global_step = global_step;
                ctx.loss = loss_val;
                ctx.lr = optimizer.lr();
                ctx.elapsed_secs = self.elapsed();
                if self.callbacks.on_step_end(&ctx) == CallbackAction::Stop {
                    result.stopped_early = true;
                    break 'epochs;
                }
                if self.max_steps_reached(global_step) {
                    break;
                }
            }

            let avg_loss = if total_rows > 0 {
                total_loss / total_rows as f32
            } else {
                0.0
            };
            result.final_loss = avg_loss;
            result.best_loss = result.best_loss.min(avg_loss);
            self.metrics.record_epoch(avg_loss, optimizer.lr());

            let check_every = self.config.check_val_every_n_epoch.max(1);
            if datamodule.has_validation() && (epoch + 1) % check_every == 0 {
                let val_loss = self.validate(module, datamodule)?;
                self.metrics.record_val_loss(val_loss);
                result.val_loss = Some(val_loss);
                ctx.val_loss = Some(val_loss);
            }

            if let Some(s) = scheduler.as_mut() {
                s.tick(SchedulerInterval::Epoch, epoch + 1, optimizer.as_mut());
            }

            result.final_epoch = epoch + 1;
            result.global_step = global_step;
            if let Some(path) = self.last_checkpoint_path() {
                CheckpointFile::from_state_dict(&module.state_dict())
                    .with_progress(epoch + 1, global_step)
                    .save(&path)?;
                debug!(path = %path.display(), epoch = epoch + 1, "checkpoint written");
            }

            ctx.loss = avg_loss;
            ctx.lr = optimizer.lr();
            ctx.elapsed_secs = self.elapsed();
            if self.callbacks.on_epoch_end(&ctx) == CallbackAction::Stop {
                result.stopped_early = true;
                break;
            }
        }

        ctx.epoch = result.final_epoch;
        self.callbacks.on_train_end(&ctx);
        if result.best_loss.is_infinite() {
            result.best_loss = result.final_loss;
        }
        result.elapsed_secs = self.elapsed();
        info!(
            epochs = result.final_epoch,
            global_step = result.global_step,
            loss = result.final_loss,
            "fit finished"
        );
        Ok(result)
    }

    fn max_steps_reached(&self, global_step: usize) -> bool {
        self.config
            .max_steps
            .is_some_and(|max_steps| global_step >= max_steps)
    }

    /// Row-weighted mean loss over every validation source
    pub fn validate<M: TrainingModule>(
        &mut self,
        module: &M,
        datamodule: &DataModule,
    ) -> Result<f32> {
        let mut total = 0.0;
        let mut rows = 0;
        for (source, batches) in datamodule.validation_batches()? {
            for batch in &batches {
                total += module.validation_step(batch)? * batch.size as f32;
                rows += batch.size;
            }
            debug!(source = %source, batches = batches.len(), "validated");
        }
        Ok(if rows > 0 { total / rows as f32 } else { 0.0 })
    }

    /// One `batch × outputs` matrix per prediction batch, in order
    pub fn predict<M: TrainingModule>(
        &mut self,
        module: &M,
        datamodule: &DataModule,
    ) -> Result<Vec<Array2<f32>>> {
        let outputs = module.config().y_features.len();
        datamodule
            .predict_batches()?
            .iter()
            .map(|batch| {
                let predictions = module.predict_step(batch)?;
                Array2::from_shape_vec((batch.size, outputs), predictions.to_vec()).map_err(|_| {
                    Error::ShapeMismatch {
                        expected: vec![batch.size, outputs],
                        got: vec![predictions.len()],
                    }
                })
            })
            .collect()
    }
}
