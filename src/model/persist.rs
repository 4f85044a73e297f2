//! Saving and loading models
//!
//! A saved model directory holds `module_checkpoint.ckpt` (weights only)
//! and, for whole-model saves, `model_config.json` with the architecture
//! name, tag and configuration.

use super::architecture::Architecture;
use super::module::ActiveModule;
use super::orchestrator::Model;
use super::registry::PretrainedRegistry;
use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::io::{
    resolve_artifact, ArtifactLocator, ArtifactStore, CheckpointFile, MODEL_CONFIG_FILE,
    MODULE_CHECKPOINT_FILE,
};
use crate::nn::Module;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use tracing::info;

#[derive(Serialize, Deserialize)]
struct SavedModel<C> {
    architecture: String,
    tag: Option<String>,
    config: ModelConfig<C>,
}

impl<A: Architecture> Model<A> {
    /// Write the module weights into `dir`
    ///
    /// Weights are read from the uncompiled module.
    pub fn as_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let module = self.module.require("save")?;
        let path = dir.as_ref().join(MODULE_CHECKPOINT_FILE);
        CheckpointFile::from_state_dict(&module.original().state_dict()).save(&path)?;
        info!(path = %path.display(), "module weights saved");
        Ok(())
    }

    /// Build a fresh module from the current config and load weights from `dir`
    pub fn from_dir(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let checkpoint = CheckpointFile::load(dir.as_ref().join(MODULE_CHECKPOINT_FILE))?;
        let mut module = A::instantiate_module(Rc::clone(self.shared_config()))?;
        module.load_state_dict(&checkpoint.to_state_dict()?)?;
        self.attach_module(ActiveModule::Eager(module));
        info!(dir = %dir.as_ref().display(), "module weights loaded");
        Ok(())
    }
}

/// Save the configuration and weights of `model` into `dir`
pub fn save_model<A: Architecture>(model: &Model<A>, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    model.module.require("save")?;
    fs::create_dir_all(dir)?;

    let saved = SavedModel {
        architecture: A::NAME.to_string(),
        tag: Some(model.tag().to_string()),
        config: model.config().clone(),
    };
    fs::write(
        dir.join(MODEL_CONFIG_FILE),
        serde_json::to_string_pretty(&saved)?,
    )?;
    model.as_dir(dir)
}

/// Load a model saved by [`save_model`]
///
/// Fails with `PretrainedModelType` when the directory holds another
/// architecture.
pub fn load_from_disk<A: Architecture>(dir: impl AsRef<Path>) -> Result<Model<A>> {
    let dir = dir.as_ref();
    let value = read_saved(dir)?;
    let found = architecture_of(&value);
    if found != A::NAME {
        return Err(Error::PretrainedModelType {
            expected: A::NAME.to_string(),
            found,
        });
    }

    let saved: SavedModel<A::Config> = serde_json::from_value(value)?;
    let mut model = Model::<A>::new(saved.config)?;
    if let Some(tag) = saved.tag {
        model = model.with_tag(tag);
    }
    model.from_dir(dir)?;
    Ok(model)
}

/// Architecture tag stored in the `model_config.json` of `dir`
///
/// A missing tag reads as the empty string.
pub(crate) fn saved_architecture(dir: &Path) -> Result<String> {
    read_saved(dir).map(|value| architecture_of(&value))
}

fn architecture_of(value: &serde_json::Value) -> String {
    value
        .get("architecture")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn read_saved(dir: &Path) -> Result<serde_json::Value> {
    let path = dir.join(MODEL_CONFIG_FILE);
    let text = fs::read_to_string(&path)
        .map_err(|e| Error::Artifact(format!("cannot read {}: {e}", path.display())))?;
    Ok(serde_json::from_str(&text)?)
}

/// Resolve `locator` and load the module of the model it points at
///
/// The saved architecture may be any entry of `registry`; its tag is
/// returned with the module.
pub fn load_pretrained(
    locator: &ArtifactLocator,
    store: Option<&dyn ArtifactStore>,
    registry: &PretrainedRegistry,
) -> Result<(String, Box<dyn Module>)> {
    let dir = resolve_artifact(locator, store)?;
    let (architecture, module) = registry.load(&dir)?;
    info!(dir = %dir.display(), architecture = %architecture, "pretrained model loaded");
    Ok((architecture, module))
}
