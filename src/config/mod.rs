//! Declarative model configuration
//!
//! A [`ModelConfig`] holds the architecture hyper-parameters and the
//! datamodule, trainer, optimizer, scheduler, transfer-learning and compile
//! sections. It is loaded from YAML:
//!
//! ```yaml
//! architecture:
//!   hidden_dims: [16]
//! x_features: [a, b]
//! y_features: [target]
//!
//! trainer:
//!   max_epochs: 10
//!
//! optimizer:
//!   name: adam
//!   config:
//!     lr: 1e-3
//!
//! transfer_learning:
//!   pre_trained_model_path: ./pretrained
//!   stages:
//!     - name: head
//!       freeze_modules: [encoder]
//!     - name: full
//!       optimizer:
//!         config: {lr: 1e-4}
//! ```
//!
//! Sections are overridden per call with [`Override`].

mod builder;
mod load;
mod overrides;
mod schema;
mod validate;

#[cfg(test)]
mod property_tests;

pub use builder::{build_optimizer, build_scheduler};
pub use load::{load_config, parse_config};
pub use overrides::{ConfigOverrides, ConfigSection, Override, PredictOverrides, TrainOverrides};
pub use schema::{
    CallbackConfig, CompileConfig, CompileMode, DataModuleConfig, EvalSplitConfig, ModelConfig,
    OptimizerConfig, SchedulerConfig, SchedulerInterval, StageConfig, TrainSplitConfig,
    TrainerConfig, TransferLearningConfig,
};
pub use validate::{validate_config, ValidationError};
