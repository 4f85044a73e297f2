//! Trainer callbacks
//!
//! Callbacks observe the fit loop at train, epoch and step boundaries and
//! may ask it to stop. The trainer owns a [`CallbackManager`]; callbacks
//! named in the trainer section are attached from config.
//!
//! # Example
//!
//! ```rust
//! use relevo::train::callback::{CallbackAction, CallbackContext, TrainerCallback};
//!
//! struct StopAfterFirstEpoch;
//!
//! impl TrainerCallback for StopAfterFirstEpoch {
//!     fn on_epoch_end(&mut self, _ctx: &CallbackContext) -> CallbackAction {
//!         CallbackAction::Stop
//!     }
//! }
//! ```

use crate::config::CallbackConfig;
use tracing::info;

/// Snapshot of the fit loop handed to every hook
#[derive(Clone, Debug, Default)]
pub struct CallbackContext {
    /// Zero-based epoch
    pub epoch: usize,
    pub max_epochs: usize,
    /// Batch index within the epoch
    pub step: usize,
    pub steps_per_epoch: usize,
    /// Optimizer steps so far, restored ones included
    pub global_step: usize,
    /// Batch loss in step hooks, epoch mean in epoch hooks
    pub loss: f32,
    pub lr: f32,
    /// Set only on epochs that ran validation
    pub val_loss: Option<f32>,
    pub elapsed_secs: f64,
}

/// What the fit loop should do after a hook
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Continue,
    Stop,
}

impl CallbackAction {
    fn is_stop(self) -> bool {
        self == CallbackAction::Stop
    }
}

/// Hooks into the fit loop; every hook defaults to a no-op
pub trait TrainerCallback {
    fn on_train_begin(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    fn on_train_end(&mut self, _ctx: &CallbackContext) {}

    fn on_epoch_begin(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    fn on_epoch_end(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    fn on_step_end(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    fn name(&self) -> &str {
        "TrainerCallback"
    }
}

/// Stop once the monitored loss has gone `patience` epochs without
/// improving on the best value by more than `min_delta`
#[derive(Clone, Debug)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f32,
    best: f32,
    stale_epochs: usize,
    watch_validation: bool,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f32) -> Self {
        Self {
            patience,
            min_delta,
            best: f32::INFINITY,
            stale_epochs: 0,
            watch_validation: false,
        }
    }

    /// Watch validation loss; epochs without validation use the training loss
    pub fn monitor_validation(mut self) -> Self {
        self.watch_validation = true;
        self
    }

    fn observe(&mut self, loss: f32) {
        if loss < self.best - self.min_delta {
            self.best = loss;
            self.stale_epochs = 0;
        } else {
            self.stale_epochs += 1;
        }
    }
}

impl TrainerCallback for EarlyStopping {
    fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        let loss = match ctx.val_loss {
            Some(val) if self.watch_validation => val,
            _ => ctx.loss,
        };
        self.observe(loss);
        if self.stale_epochs < self.patience {
            return CallbackAction::Continue;
        }
        info!(
            epoch = ctx.epoch + 1,
            patience = self.patience,
            best = self.best,
            "early stopping"
        );
        CallbackAction::Stop
    }

    fn name(&self) -> &str {
        "EarlyStopping"
    }
}

/// Logs every epoch, and every `log_every` optimizer steps
#[derive(Clone, Debug)]
pub struct ProgressCallback {
    log_every: usize,
}

impl ProgressCallback {
    pub fn new(log_every: usize) -> Self {
        Self {
            log_every: log_every.max(1),
        }
    }
}

impl Default for ProgressCallback {
    fn default() -> Self {
        Self::new(50)
    }
}

impl TrainerCallback for ProgressCallback {
    fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        info!(
            epoch = ctx.epoch + 1,
            max_epochs = ctx.max_epochs,
            loss = ctx.loss,
            val_loss = ?ctx.val_loss,
            elapsed_secs = ctx.elapsed_secs,
            "epoch finished"
        );
        CallbackAction::Continue
    }

    fn on_step_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        if ctx.global_step > 0 && ctx.global_step % self.log_every == 0 {
            info!(step = ctx.global_step, loss = ctx.loss, lr = ctx.lr, "step");
        }
        CallbackAction::Continue
    }

    fn name(&self) -> &str {
        "ProgressCallback"
    }
}

/// Ordered set of callbacks
///
/// Hooks run in insertion order. Begin and step hooks stop at the first
/// callback asking to stop; `on_epoch_end` always reaches every callback.
#[derive(Default)]
pub struct CallbackManager {
    callbacks: Vec<Box<dyn TrainerCallback>>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<C: TrainerCallback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    /// Attach the callbacks listed in the trainer section
    pub fn add_from_config(&mut self, configs: &[CallbackConfig]) {
        for config in configs {
            let CallbackConfig::EarlyStopping {
                patience,
                min_delta,
                monitor_validation,
            } = config;
            let early = EarlyStopping::new(*patience, *min_delta);
            if *monitor_validation {
                self.add(early.monitor_validation());
            } else {
                self.add(early);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.callbacks.iter().map(|cb| cb.name()).collect()
    }

    fn first_stop(
        &mut self,
        mut hook: impl FnMut(&mut dyn TrainerCallback) -> CallbackAction,
    ) -> CallbackAction {
        if self.callbacks.iter_mut().any(|cb| hook(cb.as_mut()).is_stop()) {
            CallbackAction::Stop
        } else {
            CallbackAction::Continue
        }
    }

    pub fn on_train_begin(&mut self, ctx: &CallbackContext) -> CallbackAction {
        self.first_stop(|cb| cb.on_train_begin(ctx))
    }

    pub fn on_train_end(&mut self, ctx: &CallbackContext) {
        for cb in &mut self.callbacks {
            cb.on_train_end(ctx);
        }
    }

    pub fn on_epoch_begin(&mut self, ctx: &CallbackContext) -> CallbackAction {
        self.first_stop(|cb| cb.on_epoch_begin(ctx))
    }

    pub fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        let mut action = CallbackAction::Continue;
        for cb in &mut self.callbacks {
            if cb.on_epoch_end(ctx).is_stop() {
                action = CallbackAction::Stop;
            }
        }
        action
    }

    pub fn on_step_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        self.first_stop(|cb| cb.on_step_end(ctx))
    }
}
