//! Model orchestration
//!
//! [`Model`] ties a configuration to a network and drives it through the
//! trainer:
//! - scoped config overrides ([`Model::override_config`])
//! - single fits or staged transfer learning from a pretrained model
//! - batched prediction into one list per output channel
//! - optional compilation of the module
//! - saving and loading weights
//!
//! Networks plug in through [`Architecture`] and [`TrainingModule`].

mod architecture;
mod compiled;
mod module;
mod orchestrator;
mod persist;
mod regressor;
mod registry;
mod scope;
mod transfer;


pub use architecture::Architecture;
pub use compiled::{compile, Compiled};
pub use module::{ActiveModule, ModuleState, TrainingModule};
pub use orchestrator::{Model, StageReport, TrainData, TrainReport};
pub use persist::{load_from_disk, load_pretrained, save_model};
pub use regressor::{MlpConfig, MlpRegressor, MlpRegressorModule};
pub use registry::PretrainedRegistry;
pub use scope::ConfigOverride;
pub use transfer::{freeze_modules, match_modules};
