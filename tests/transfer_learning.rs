//! Integration tests for staged transfer learning.

use relevo::config::{ModelConfig, Override, TrainOverrides};
use relevo::data::{Dataset, NamedDatasets};
use relevo::io::{CheckpointFile, LocalMirrorStore};
use relevo::model::{
    save_model, MlpConfig, MlpRegressor, MlpRegressorModule, Model, TrainReport,
};
use relevo::nn::{Module, StateDict};
use relevo::{Architecture, Error, Result};
use serde_json::json;
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

/// Same network as `MlpRegressor`, saved under another name
struct OtherRegressor;

impl Architecture for OtherRegressor {
    const NAME: &'static str = "other_regressor";
    type Config = MlpConfig;
    type Module = MlpRegressorModule;

    fn instantiate_module(config: Rc<ModelConfig<MlpConfig>>) -> Result<MlpRegressorModule> {
        MlpRegressorModule::new(config)
    }
}

fn data() -> NamedDatasets {
    let x: Vec<f32> = (0..12).map(|i| i as f32 / 12.0).collect();
    let y = x.iter().map(|v| 3.0 * v - 1.0).collect();
    let ds = Dataset::from_columns([("x", x), ("y", y)]).unwrap();
    NamedDatasets::from([("main".to_string(), ds)])
}

fn config(seed: u64) -> ModelConfig<MlpConfig> {
    let mut config = ModelConfig::new(
        MlpConfig {
            hidden_dims: vec![6],
            seed,
        },
        ["x"],
        ["y"],
    );
    config.trainer.logger = false;
    config.datamodule.train.batch_size = 4;
    config.optimizer.config.insert("lr".to_string(), json!(0.02));
    config
}

/// Train and save a model with `seed` into `dir`
fn pretrain(dir: &Path, seed: u64) -> Model<MlpRegressor> {
    let mut model = Model::<MlpRegressor>::new(config(seed)).unwrap();
    model.train(data(), None, TrainOverrides::new(), None).unwrap();
    save_model(&model, dir).unwrap();
    model
}

fn state(model: &Model<MlpRegressor>) -> StateDict {
    model.module().unwrap().original().state_dict()
}

fn last_checkpoint(root: &Path) -> StateDict {
    CheckpointFile::load(root.join("checkpoints").join("last.ckpt"))
        .unwrap()
        .to_state_dict()
        .unwrap()
}

fn sub(state: &StateDict, prefix: &str) -> StateDict {
    state
        .iter()
        .filter(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[test]
fn test_two_stages_end_with_second_stage_weights() {
    let pretrained_dir = TempDir::new().unwrap();
    let stage_one = TempDir::new().unwrap();
    let stage_two = TempDir::new().unwrap();
    let pretrained = pretrain(pretrained_dir.path(), 7);

    let mut model = Model::<MlpRegressor>::new(config(1)).unwrap();
    let overrides = TrainOverrides::new().transfer_learning(Override::fields(json!({
        "pre_trained_model_path": pretrained_dir.path(),
        "stages": [
            {
                "name": "head",
                "freeze_modules": ["encoder"],
                "trainer": {"max_epochs": 2, "default_root_dir": stage_one.path()}
            },
            {
                "name": "full",
                "trainer": {"default_root_dir": stage_two.path()},
                "optimizer": {"config": {"lr": 0.01}}
            }
        ]
    })));
    let report = model.train(data(), None, overrides, None).unwrap();

    let TrainReport::Staged(stages) = report else {
        panic!("expected staged training");
    };
    let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["head", "full"]);
    assert_eq!(stages[0].result.final_epoch, 2);
    assert_eq!(stages[1].result.final_epoch, 1);

    let after_one = last_checkpoint(stage_one.path());
    let after_two = last_checkpoint(stage_two.path());
    assert_eq!(state(&model), after_two);
    assert_ne!(state(&model), after_one);

    // encoder frozen in the first stage, starting from the pretrained weights
    assert_eq!(sub(&after_one, "encoder"), sub(&state(&pretrained), "encoder"));
    assert_ne!(sub(&after_one, "head"), sub(&state(&pretrained), "head"));

    assert!(model.config().transfer_learning.is_none());
    assert_eq!(model.config(), &config(1));
}

#[test]
fn test_selective_match_without_stages() {
    let pretrained_dir = TempDir::new().unwrap();
    let pretrained = pretrain(pretrained_dir.path(), 7);

    let mut target = config(1);
    target.transfer_learning = Some(
        serde_json::from_value(json!({
            "pre_trained_model_path": pretrained_dir.path(),
            "modules_to_match": {"encoder": "encoder"}
        }))
        .unwrap(),
    );
    let mut model = Model::<MlpRegressor>::new(target.clone()).unwrap();
    let report = model.train(data(), None, TrainOverrides::new(), None).unwrap();
    assert_eq!(report, TrainReport::Staged(Vec::new()));

    let fresh = MlpRegressor::instantiate_module(Rc::new(target)).unwrap();
    assert_eq!(sub(&state(&model), "encoder"), sub(&state(&pretrained), "encoder"));
    assert_eq!(sub(&state(&model), "head"), sub(&fresh.state_dict(), "head"));
}

#[test]
fn test_unknown_module_names_fail() {
    let pretrained_dir = TempDir::new().unwrap();
    pretrain(pretrained_dir.path(), 7);

    let mut model = Model::<MlpRegressor>::new(config(1)).unwrap();
    let bad_match = TrainOverrides::new().transfer_learning(Override::fields(json!({
        "pre_trained_model_path": pretrained_dir.path(),
        "modules_to_match": {"decoder": "encoder"}
    })));
    let result = model.train(data(), None, bad_match, None);
    assert!(matches!(result, Err(Error::ModuleLookup(_))));

    let bad_freeze = TrainOverrides::new().transfer_learning(Override::fields(json!({
        "pre_trained_model_path": pretrained_dir.path(),
        "stages": [{"name": "only", "freeze_modules": ["encoder", "backbone"]}]
    })));
    let result = model.train(data(), None, bad_freeze, None);
    assert!(matches!(result, Err(Error::ModuleLookup(_))));
    assert_eq!(model.config(), &config(1));
}

/// Train and save an `OtherRegressor` with two hidden layers into `dir`
fn pretrain_other(dir: &Path) -> Model<OtherRegressor> {
    let mut config = config(7);
    config.architecture.hidden_dims = vec![6, 6];
    let mut other = Model::<OtherRegressor>::new(config).unwrap();
    other.train(data(), None, TrainOverrides::new(), None).unwrap();
    save_model(&other, dir).unwrap();
    other
}

#[test]
fn test_unregistered_pretrained_architecture_fails() {
    let pretrained_dir = TempDir::new().unwrap();
    pretrain_other(pretrained_dir.path());

    let mut model = Model::<MlpRegressor>::new(config(1)).unwrap();
    let overrides = TrainOverrides::new().transfer_learning(Override::fields(json!({
        "pre_trained_model_path": pretrained_dir.path()
    })));
    match model.train(data(), None, overrides, None) {
        Err(Error::PretrainedModelType { expected, found }) => {
            assert_eq!(expected, "mlp_regressor");
            assert_eq!(found, "other_regressor");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!model.is_trained());
}

#[test]
fn test_match_across_architectures() {
    let pretrained_dir = TempDir::new().unwrap();
    let other = pretrain_other(pretrained_dir.path());
    let other_state = other.module().unwrap().original().state_dict();

    // encoder.1 of the pretrained model has no counterpart here
    let mut model = Model::<MlpRegressor>::new(config(1))
        .unwrap()
        .with_pretrained_architecture::<OtherRegressor>();
    let whole = TrainOverrides::new().transfer_learning(Override::fields(json!({
        "pre_trained_model_path": pretrained_dir.path()
    })));
    let result = model.train(data(), None, whole, None);
    assert!(matches!(result, Err(Error::ModuleLookup(_))));

    let mapped = TrainOverrides::new().transfer_learning(Override::fields(json!({
        "pre_trained_model_path": pretrained_dir.path(),
        "modules_to_match": {"encoder.0": "encoder.0", "head": "head"}
    })));
    let report = model.train(data(), None, mapped, None).unwrap();
    assert_eq!(report, TrainReport::Staged(Vec::new()));

    assert_eq!(sub(&state(&model), "encoder.0"), sub(&other_state, "encoder.0"));
    assert_eq!(sub(&state(&model), "head"), sub(&other_state, "head"));
    assert_eq!(state(&model).len(), 4);
}

#[test]
fn test_invalid_stage_override_fails() {
    let pretrained_dir = TempDir::new().unwrap();
    pretrain(pretrained_dir.path(), 7);

    let mut model = Model::<MlpRegressor>::new(config(1)).unwrap();
    let overrides = TrainOverrides::new().transfer_learning(Override::fields(json!({
        "pre_trained_model_path": pretrained_dir.path(),
        "stages": [{"name": "empty", "trainer": {"max_epochs": 0}}]
    })));
    let result = model.train(data(), None, overrides, None);
    assert!(matches!(result, Err(Error::Validation(_))));
    assert_eq!(model.config(), &config(1));
}

#[test]
fn test_pretrained_from_repository_mirror() {
    let mirror = TempDir::new().unwrap();
    let store = LocalMirrorStore::new(mirror.path());
    let url = "https://models.example.org/regressors.git";
    let dir = store.revision_dir(url, Some("v2")).join("base");
    let pretrained = pretrain(&dir, 7);

    let mut model = Model::<MlpRegressor>::new(config(1))
        .unwrap()
        .with_artifact_store(store);
    let overrides = TrainOverrides::new().transfer_learning(Override::fields(json!({
        "repo_url": url,
        "rev": "v2",
        "model_path_in_repo": "base"
    })));
    model.train(data(), None, overrides, None).unwrap();
    assert_eq!(state(&model), state(&pretrained));
}
