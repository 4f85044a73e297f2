//! Section overrides
//!
//! An [`Override`] describes how one section of a [`ModelConfig`] changes for
//! the duration of a call. Resolution never mutates its input: it builds a
//! new configuration, or fails without side effects.

use super::schema::{
    CompileConfig, DataModuleConfig, ModelConfig, OptimizerConfig, SchedulerConfig,
    TrainerConfig, TransferLearningConfig,
};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Replacement for one config section
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Override<T> {
    /// Leave the section as it is
    #[default]
    Keep,
    /// Replace the named fields (a JSON object); unnamed fields keep their
    /// current value, or their default when the section is absent
    Partial(Value),
    /// Substitute the whole section
    Replace(T),
    /// Disable (`false`) or enable with defaults (`true`) an optional section
    Flag(bool),
}

impl<T> Override<T> {
    /// Partial override from a JSON object, e.g. `json!({"max_epochs": 3})`
    pub fn fields(fields: Value) -> Self {
        Override::Partial(fields)
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Override::Keep)
    }
}

/// A config section that can be overridden
pub trait ConfigSection: Serialize + DeserializeOwned + Clone {
    /// Section name, used in error messages
    const NAME: &'static str;

    /// Value an optional section takes when enabled with `true`
    fn enabled_default() -> Option<Self> {
        None
    }
}

impl ConfigSection for DataModuleConfig {
    const NAME: &'static str = "datamodule";
}

impl ConfigSection for TrainerConfig {
    const NAME: &'static str = "trainer";
}

impl ConfigSection for OptimizerConfig {
    const NAME: &'static str = "optimizer";
}

impl ConfigSection for SchedulerConfig {
    const NAME: &'static str = "scheduler";
}

impl ConfigSection for TransferLearningConfig {
    const NAME: &'static str = "transfer_learning";
}

impl ConfigSection for CompileConfig {
    const NAME: &'static str = "compile";

    fn enabled_default() -> Option<Self> {
        Some(CompileConfig::default())
    }
}

impl<T: ConfigSection> Override<T> {
    /// Resolve against a section that is always present
    pub fn resolve(&self, current: &T) -> Result<T> {
        match self {
            Override::Keep => Ok(current.clone()),
            Override::Partial(fields) => merge_fields(current, fields),
            Override::Replace(section) => Ok(section.clone()),
            Override::Flag(flag) => Err(Error::ConfigOverride(format!(
                "section '{}' is required and cannot be set to {flag}",
                T::NAME
            ))),
        }
    }

    /// Resolve against an optional section
    pub fn resolve_optional(&self, current: &Option<T>) -> Result<Option<T>> {
        match (self, current) {
            (Override::Keep, _) => Ok(current.clone()),
            (Override::Partial(fields), Some(section)) => merge_fields(section, fields).map(Some),
            (Override::Partial(fields), None) => {
                require_object::<T>(fields)?;
                serde_json::from_value(fields.clone())
                    .map(Some)
                    .map_err(|e| section_error::<T>(e))
            }
            (Override::Replace(section), _) => Ok(Some(section.clone())),
            (Override::Flag(false), _) => Ok(None),
            (Override::Flag(true), _) => T::enabled_default().map(Some).ok_or_else(|| {
                Error::ConfigOverride(format!(
                    "section '{}' has no default and cannot be enabled with true",
                    T::NAME
                ))
            }),
        }
    }
}

fn require_object<T: ConfigSection>(fields: &Value) -> Result<&serde_json::Map<String, Value>> {
    fields.as_object().ok_or_else(|| {
        Error::ConfigOverride(format!(
            "override for '{}' must be a mapping of fields, got {fields}",
            T::NAME
        ))
    })
}

fn section_error<T: ConfigSection>(e: serde_json::Error) -> Error {
    Error::ConfigOverride(format!("invalid override for '{}': {e}", T::NAME))
}

/// Shallow field replacement on an existing section
fn merge_fields<T: ConfigSection>(current: &T, fields: &Value) -> Result<T> {
    let fields = require_object::<T>(fields)?;
    let mut merged = serde_json::to_value(current).map_err(section_error::<T>)?;
    let Some(target) = merged.as_object_mut() else {
        return Err(Error::ConfigOverride(format!(
            "section '{}' is not a structured config",
            T::NAME
        )));
    };
    for (key, value) in fields {
        if !target.contains_key(key) {
            return Err(Error::ConfigOverride(format!(
                "section '{}' has no field '{key}'",
                T::NAME
            )));
        }
        target.insert(key.clone(), value.clone());
    }
    serde_json::from_value(merged).map_err(section_error::<T>)
}

impl<T: Serialize> Serialize for Override<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Override::Keep => serializer.serialize_none(),
            Override::Partial(fields) => fields.serialize(serializer),
            Override::Replace(section) => section.serialize(serializer),
            Override::Flag(flag) => serializer.serialize_bool(*flag),
        }
    }
}

impl<'de, T> Deserialize<'de> for Override<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Override::Keep),
            Value::Bool(flag) => Ok(Override::Flag(flag)),
            fields @ Value::Object(_) => Ok(Override::Partial(fields)),
            other => Err(serde::de::Error::custom(format!(
                "expected null, a bool or a mapping, got {other}"
            ))),
        }
    }
}

/// Per-call overrides for every overridable section
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub datamodule: Override<DataModuleConfig>,
    pub trainer: Override<TrainerConfig>,
    pub optimizer: Override<OptimizerConfig>,
    pub scheduler: Override<SchedulerConfig>,
    pub transfer_learning: Override<TransferLearningConfig>,
    pub compile: Override<CompileConfig>,
}

/// Overrides accepted by training
pub type TrainOverrides = ConfigOverrides;

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn datamodule(mut self, o: Override<DataModuleConfig>) -> Self {
        self.datamodule = o;
        self
    }

    pub fn trainer(mut self, o: Override<TrainerConfig>) -> Self {
        self.trainer = o;
        self
    }

    pub fn optimizer(mut self, o: Override<OptimizerConfig>) -> Self {
        self.optimizer = o;
        self
    }

    pub fn scheduler(mut self, o: Override<SchedulerConfig>) -> Self {
        self.scheduler = o;
        self
    }

    pub fn transfer_learning(mut self, o: Override<TransferLearningConfig>) -> Self {
        self.transfer_learning = o;
        self
    }

    pub fn compile(mut self, o: Override<CompileConfig>) -> Self {
        self.compile = o;
        self
    }

    /// True when every section is `Keep`
    pub fn is_empty(&self) -> bool {
        self.datamodule.is_keep()
            && self.trainer.is_keep()
            && self.optimizer.is_keep()
            && self.scheduler.is_keep()
            && self.transfer_learning.is_keep()
            && self.compile.is_keep()
    }

    /// Build the overridden configuration
    ///
    /// All sections are resolved before anything is returned, so a failure
    /// in any one of them leaves no partial result.
    pub fn apply<A: Clone>(&self, config: &ModelConfig<A>) -> Result<ModelConfig<A>> {
        Ok(ModelConfig {
            architecture: config.architecture.clone(),
            x_features: config.x_features.clone(),
            y_features: config.y_features.clone(),
            datamodule: self.datamodule.resolve(&config.datamodule)?,
            trainer: self.trainer.resolve(&config.trainer)?,
            optimizer: self.optimizer.resolve(&config.optimizer)?,
            scheduler: self.scheduler.resolve_optional(&config.scheduler)?,
            transfer_learning: self
                .transfer_learning
                .resolve_optional(&config.transfer_learning)?,
            compile: self.compile.resolve_optional(&config.compile)?,
        })
    }
}

/// Overrides accepted by prediction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictOverrides {
    pub datamodule: Override<DataModuleConfig>,
    pub trainer: Override<TrainerConfig>,
}

impl PredictOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn datamodule(mut self, o: Override<DataModuleConfig>) -> Self {
        self.datamodule = o;
        self
    }

    pub fn trainer(mut self, o: Override<TrainerConfig>) -> Self {
        self.trainer = o;
        self
    }
}

impl From<PredictOverrides> for ConfigOverrides {
    fn from(o: PredictOverrides) -> Self {
        ConfigOverrides {
            datamodule: o.datamodule,
            trainer: o.trainer,
            ..ConfigOverrides::default()
        }
    }
}
