//! The model orchestrator

use super::architecture::Architecture;
use super::compiled::compile;
use super::module::{ActiveModule, ModuleState};
use super::registry::PretrainedRegistry;
use super::scope::ConfigOverride;
use super::transfer::transfer_learn;
use crate::config::{validate_config, ConfigOverrides, ModelConfig, PredictOverrides, TrainOverrides};
use crate::data::{Dataset, NamedDatasets};
use crate::error::{Error, Result};
use crate::io::ArtifactStore;
use crate::train::{TrainResult, Trainer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;
use tracing::{info, warn};

/// Training data: one dataset, or datasets keyed by source name
///
/// Only the named form can be trained on.
#[derive(Debug, Clone)]
pub enum TrainData {
    Single(Dataset),
    Named(NamedDatasets),
}

impl From<Dataset> for TrainData {
    fn from(ds: Dataset) -> Self {
        TrainData::Single(ds)
    }
}

impl From<NamedDatasets> for TrainData {
    fn from(named: NamedDatasets) -> Self {
        TrainData::Named(named)
    }
}

/// Fit result of one transfer-learning stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub name: String,
    pub result: TrainResult,
}

/// What [`Model::train`] did
#[derive(Debug, Clone, PartialEq)]
pub enum TrainReport {
    /// A single fit
    Fit(TrainResult),
    /// Staged transfer learning, one report per stage in order
    Staged(Vec<StageReport>),
}

impl TrainReport {
    /// Result of the fit that produced the final weights
    pub fn last(&self) -> Option<&TrainResult> {
        match self {
            TrainReport::Fit(result) => Some(result),
            TrainReport::Staged(stages) => stages.last().map(|s| &s.result),
        }
    }
}

/// Trains, predicts and persists one network of architecture `A`
///
/// # Example
///
/// ```no_run
/// use relevo::config::{ModelConfig, PredictOverrides, TrainOverrides};
/// use relevo::data::{Dataset, NamedDatasets};
/// use relevo::model::{MlpConfig, MlpRegressor, Model};
///
/// # fn main() -> relevo::Result<()> {
/// let config = ModelConfig::new(MlpConfig::default(), ["x"], ["y"]);
/// let mut model = Model::<MlpRegressor>::new(config)?;
///
/// let data = Dataset::from_columns([("x", vec![0.0, 1.0]), ("y", vec![1.0, 3.0])])?;
/// let train = NamedDatasets::from([("train".to_string(), data.clone())]);
/// model.train(train, None, TrainOverrides::new(), None)?;
///
/// let predictions = model.predict(&data, PredictOverrides::new())?;
/// assert_eq!(predictions["mlp_regressor::y"].len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct Model<A: Architecture> {
    config: Rc<ModelConfig<A::Config>>,
    tag: Option<String>,
    pub(crate) module: ModuleState<A::Module>,
    artifact_store: Option<Rc<dyn ArtifactStore>>,
    pretrained: PretrainedRegistry,
}

impl<A: Architecture> Model<A> {
    /// Validate `config` and build an untrained model
    pub fn new(config: ModelConfig<A::Config>) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self {
            config: Rc::new(config),
            tag: None,
            module: ModuleState::Uninitialized,
            artifact_store: None,
            pretrained: PretrainedRegistry::new().with::<A>(),
        })
    }

    /// Name used to prefix output channels; defaults to the architecture name
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Store used to fetch pretrained models from repositories
    pub fn with_artifact_store(mut self, store: impl ArtifactStore + 'static) -> Self {
        self.artifact_store = Some(Rc::new(store));
        self
    }

    /// Also accept pretrained models saved as architecture `B`
    ///
    /// Transfer learning only matches weights by submodule name, so the
    /// pretrained side need not share this model's architecture.
    pub fn with_pretrained_architecture<B: Architecture>(mut self) -> Self {
        self.pretrained.register::<B>();
        self
    }

    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(A::NAME)
    }

    pub fn config(&self) -> &ModelConfig<A::Config> {
        &self.config
    }

    pub(crate) fn shared_config(&self) -> &Rc<ModelConfig<A::Config>> {
        &self.config
    }

    /// The active configuration as a JSON value
    pub fn config_dict(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.config.as_ref())?)
    }

    /// `"{tag}::{y_feature}"` for every output channel, in feature order
    pub fn output_names(&self) -> Vec<String> {
        self.config
            .y_features
            .iter()
            .map(|y| format!("{}::{}", self.tag(), y))
            .collect()
    }

    pub fn is_trained(&self) -> bool {
        self.module.is_initialized()
    }

    pub fn module(&self) -> Option<&ActiveModule<A::Module>> {
        self.module.get()
    }

    pub fn module_mut(&mut self) -> Option<&mut ActiveModule<A::Module>> {
        self.module.get_mut()
    }

    /// Take the trained module out of the model
    pub fn into_module(self) -> Option<A::Module> {
        match self.module {
            ModuleState::Initialized(active) => Some(active.into_original()),
            ModuleState::Uninitialized => None,
        }
    }

    pub(crate) fn artifact_store(&self) -> Option<Rc<dyn ArtifactStore>> {
        self.artifact_store.clone()
    }

    pub(crate) fn pretrained_registry(&self) -> &PretrainedRegistry {
        &self.pretrained
    }

    /// Install `config` on the model and on the attached module, if any
    pub(crate) fn assign_config(&mut self, config: Rc<ModelConfig<A::Config>>) {
        if let Some(module) = self.module.get_mut() {
            module.set_config(Rc::clone(&config));
        }
        self.config = config;
    }

    /// Attach `module`, replacing any previous one
    pub(crate) fn attach_module(
        &mut self,
        module: ActiveModule<A::Module>,
    ) -> &mut ActiveModule<A::Module> {
        self.module = ModuleState::Initialized(module);
        match &mut self.module {
            ModuleState::Initialized(module) => module,
            ModuleState::Uninitialized => unreachable!("module was attached above"),
        }
    }

    /// Run with `overrides` applied until the returned guard is dropped
    ///
    /// ```no_run
    /// # use relevo::config::{ConfigOverrides, ModelConfig, Override};
    /// # use relevo::model::{MlpConfig, MlpRegressor, Model};
    /// # fn main() -> relevo::Result<()> {
    /// # let mut model = Model::<MlpRegressor>::new(ModelConfig::new(MlpConfig::default(), ["x"], ["y"]))?;
    /// let overrides = ConfigOverrides::new()
    ///     .trainer(Override::fields(serde_json::json!({"max_epochs": 5})));
    /// {
    ///     let scoped = model.override_config(&overrides)?;
    ///     assert_eq!(scoped.config().trainer.max_epochs, 5);
    /// }
    /// assert_eq!(model.config().trainer.max_epochs, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn override_config(&mut self, overrides: &ConfigOverrides) -> Result<ConfigOverride<'_, A>> {
        ConfigOverride::enter(self, overrides)
    }

    /// Train on named datasets
    ///
    /// With a transfer-learning section in the (overridden) config this runs
    /// the staged fine-tuning, which ignores `ckpt_path`. Otherwise a fresh
    /// module is fitted, resuming from `ckpt_path` when given.
    pub fn train(
        &mut self,
        data: impl Into<TrainData>,
        validation: Option<NamedDatasets>,
        overrides: TrainOverrides,
        ckpt_path: Option<&Path>,
    ) -> Result<TrainReport> {
        let train = match data.into() {
            TrainData::Named(named) => named,
            TrainData::Single(_) => {
                return Err(Error::NotImplemented(
                    "training on a single dataset; pass datasets keyed by source name".to_string(),
                ))
            }
        };
        let validation = validation.unwrap_or_default();

        let mut scope = ConfigOverride::enter(self, &overrides)?;
        let config = Rc::clone(scope.shared_config());

        if config.transfer_learning.is_some() {
            if ckpt_path.is_some() {
                warn!("resume checkpoint is ignored during staged transfer learning");
            }
            return transfer_learn(&mut scope, &train, &validation).map(TrainReport::Staged);
        }

        let datamodule = A::instantiate_datamodule(&config)
            .with_train(train)
            .with_validation(validation);
        let module = A::instantiate_module(Rc::clone(&config))?;
        let active = scope.attach_module(compile(module, config.compile.as_ref()));

        let mut trainer = Trainer::from_kwargs(config.pass_to_trainer())?;
        info!(tag = %A::NAME, "training");
        let result = active.fit(&mut trainer, &datamodule, ckpt_path)?;
        Ok(TrainReport::Fit(result))
    }

    /// One list of predictions per output channel
    ///
    /// An empty dataset yields empty lists without touching the module.
    pub fn predict(
        &mut self,
        data: &Dataset,
        overrides: PredictOverrides,
    ) -> Result<BTreeMap<String, Vec<f32>>> {
        let names = self.output_names();
        if data.is_empty() {
            return Ok(names.into_iter().map(|name| (name, Vec::new())).collect());
        }
        self.module.require("predict")?;

        let scope = ConfigOverride::enter(self, &overrides.into())?;
        let config = Rc::clone(scope.shared_config());
        let datamodule = A::instantiate_datamodule(&config).with_predict(data.clone());
        let mut trainer = Trainer::for_prediction(&config.trainer);

        let batches = scope
            .module
            .require("predict")?
            .predict(&mut trainer, &datamodule)?;

        let mut columns = vec![Vec::with_capacity(data.len()); names.len()];
        for batch in &batches {
            for row in batch.rows() {
                for (column, value) in columns.iter_mut().zip(row.iter()) {
                    column.push(*value);
                }
            }
        }
        info!(rows = data.len(), outputs = names.len(), "predicted");
        Ok(names.into_iter().zip(columns).collect())
    }
}
