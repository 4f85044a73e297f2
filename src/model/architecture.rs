//! Architecture descriptor

use super::module::TrainingModule;
use crate::config::ModelConfig;
use crate::data::DataModule;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::rc::Rc;

/// Ties a hyper-parameter type to the module it builds
///
/// Implemented by marker types; `Model<A>` is generic over it.
pub trait Architecture {
    /// Stored with saved models and checked when loading a pretrained one
    const NAME: &'static str;

    type Config: Clone + Debug + PartialEq + Serialize + DeserializeOwned;

    type Module: TrainingModule<Hparams = Self::Config> + 'static;

    /// Fresh, randomly initialised module for `config`
    fn instantiate_module(config: Rc<ModelConfig<Self::Config>>) -> Result<Self::Module>;

    /// Empty datamodule for `config`; callers attach the datasets
    fn instantiate_datamodule(config: &ModelConfig<Self::Config>) -> DataModule {
        DataModule::new(config)
    }
}
