//! Architectures a pretrained model may be loaded as

use super::architecture::Architecture;
use super::persist::{load_from_disk, saved_architecture};
use crate::error::{Error, Result};
use crate::nn::Module;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

type ModuleLoader = fn(&Path) -> Result<Box<dyn Module>>;

/// Loaders for saved models, keyed by [`Architecture::NAME`]
///
/// Transfer learning reads the architecture tag of the pretrained model and
/// loads its module through the matching entry, so a model can start from
/// the weights of any registered architecture. A `Model<A>` registers `A`
/// itself; others are added with `Model::with_pretrained_architecture`.
#[derive(Clone, Default)]
pub struct PretrainedRegistry {
    loaders: BTreeMap<&'static str, ModuleLoader>,
}

impl PretrainedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<B: Architecture>(&mut self) {
        self.loaders.insert(B::NAME, load_module::<B>);
    }

    pub fn with<B: Architecture>(mut self) -> Self {
        self.register::<B>();
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loaders.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.loaders.keys().copied().collect()
    }

    /// Architecture tag and module of the model saved in `dir`
    ///
    /// Fails with `PretrainedModelType` when the tag is missing or not
    /// registered.
    pub fn load(&self, dir: &Path) -> Result<(String, Box<dyn Module>)> {
        let found = saved_architecture(dir)?;
        let Some(loader) = self.loaders.get(found.as_str()) else {
            return Err(Error::PretrainedModelType {
                expected: self.names().join(" | "),
                found,
            });
        };
        Ok((found, loader(dir)?))
    }
}

impl fmt::Debug for PretrainedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.loaders.keys()).finish()
    }
}

fn load_module<B: Architecture>(dir: &Path) -> Result<Box<dyn Module>> {
    let module = load_from_disk::<B>(dir)?
        .into_module()
        .ok_or_else(|| Error::NotTrained(format!("saved {} model has no module", B::NAME)))?;
    Ok(Box::new(module))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, TrainOverrides};
    use crate::data::{Dataset, NamedDatasets};
    use crate::model::{save_model, MlpConfig, MlpRegressor, Model};
    use tempfile::TempDir;

    fn saved_regressor(dir: &Path) -> Model<MlpRegressor> {
        let mut config = ModelConfig::new(MlpConfig::default(), ["x"], ["y"]);
        config.trainer.logger = false;
        let mut model = Model::<MlpRegressor>::new(config).unwrap();
        let ds = Dataset::from_columns([("x", vec![0.0, 1.0]), ("y", vec![1.0, 0.0])]).unwrap();
        model
            .train(
                NamedDatasets::from([("train".to_string(), ds)]),
                None,
                TrainOverrides::new(),
                None,
            )
            .unwrap();
        save_model(&model, dir).unwrap();
        model
    }

    #[test]
    fn test_load_registered_architecture() {
        let dir = TempDir::new().unwrap();
        let saved = saved_regressor(dir.path());

        let registry = PretrainedRegistry::new().with::<MlpRegressor>();
        let (name, module) = registry.load(dir.path()).unwrap();
        assert_eq!(name, "mlp_regressor");
        assert_eq!(
            module.state_dict(),
            saved.module().unwrap().original().state_dict()
        );
    }

    #[test]
    fn test_unregistered_tag_is_rejected() {
        let dir = TempDir::new().unwrap();
        saved_regressor(dir.path());

        match PretrainedRegistry::new().load(dir.path()) {
            Err(Error::PretrainedModelType { expected, found }) => {
                assert_eq!(expected, "");
                assert_eq!(found, "mlp_regressor");
            }
            other => panic!("unexpected result: {:?}", other.map(|(name, _)| name)),
        }
    }
}
