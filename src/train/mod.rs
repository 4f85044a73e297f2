//! Training loop
//!
//! This module provides the single-process trainer the orchestrator drives:
//! - Loss functions (MSE)
//! - `Trainer` built from flattened trainer keyword arguments
//! - Callbacks (early stopping, progress logging)
//! - Metrics tracking
//! - Resume checkpoints
//!
//! # Example
//!
//! ```no_run
//! use relevo::config::ModelConfig;
//! use relevo::train::Trainer;
//!
//! let config = ModelConfig::new((), ["x"], ["y"]);
//! let mut trainer = Trainer::from_kwargs(config.pass_to_trainer()).unwrap();
//!
//! // trainer.fit(&mut module, &datamodule, None)?;
//! // let predictions = trainer.predict(&module, &datamodule)?;
//! ```

pub mod callback;
mod loss;
mod metrics;
mod trainer;


pub use callback::{
    CallbackAction, CallbackContext, CallbackManager, EarlyStopping, ProgressCallback,
    TrainerCallback,
};
pub use loss::{LossFn, MSELoss};
pub use metrics::MetricsTracker;
pub use trainer::{OptimizerSetup, ScheduledLR, TrainResult, Trainer};
