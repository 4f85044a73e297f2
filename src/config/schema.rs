//! Configuration schema
//!
//! Every section deserializes with defaults for missing fields and rejects
//! unknown ones, so a partially written section is always complete once
//! parsed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Full configuration of one model
///
/// `A` carries the architecture's own hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig<A> {
    pub architecture: A,

    /// Input feature (column) names
    pub x_features: Vec<String>,

    /// Target feature (column) names; one output channel each
    pub y_features: Vec<String>,

    #[serde(default)]
    pub datamodule: DataModuleConfig,

    #[serde(default)]
    pub trainer: TrainerConfig,

    #[serde(default)]
    pub optimizer: OptimizerConfig,

    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,

    #[serde(default)]
    pub transfer_learning: Option<TransferLearningConfig>,

    #[serde(default)]
    pub compile: Option<CompileConfig>,
}

impl<A> ModelConfig<A> {
    /// Config with every section at its default
    pub fn new(
        architecture: A,
        x_features: impl IntoIterator<Item = impl Into<String>>,
        y_features: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            architecture,
            x_features: x_features.into_iter().map(Into::into).collect(),
            y_features: y_features.into_iter().map(Into::into).collect(),
            datamodule: DataModuleConfig::default(),
            trainer: TrainerConfig::default(),
            optimizer: OptimizerConfig::default(),
            scheduler: None,
            transfer_learning: None,
            compile: None,
        }
    }

    /// Flattened trainer keyword arguments
    pub fn pass_to_trainer(&self) -> Map<String, Value> {
        match serde_json::to_value(&self.trainer) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainSplitConfig {
    pub batch_size: usize,
    pub shuffle: bool,
    pub drop_last: bool,
}

impl Default for TrainSplitConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            shuffle: false,
            drop_last: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvalSplitConfig {
    pub batch_size: usize,
}

impl Default for EvalSplitConfig {
    fn default() -> Self {
        Self { batch_size: 1 }
    }
}

/// How datasets are cut into batches
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataModuleConfig {
    pub train: TrainSplitConfig,
    pub validation: EvalSplitConfig,
    pub predict: EvalSplitConfig,
    /// Seed for train-set shuffling
    pub seed: u64,
}

/// Callbacks the trainer attaches from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum CallbackConfig {
    EarlyStopping {
        #[serde(default = "default_patience")]
        patience: usize,
        #[serde(default)]
        min_delta: f32,
        /// Watch the validation loss rather than the training loss
        #[serde(default = "default_true")]
        monitor_validation: bool,
    },
}

fn default_patience() -> usize {
    3
}

fn default_true() -> bool {
    true
}

/// Trainer keyword arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainerConfig {
    pub accelerator: String,
    pub devices: Value,
    pub strategy: String,
    pub max_epochs: usize,
    /// Stop after this many optimizer steps, whatever the epoch
    pub max_steps: Option<usize>,
    pub gradient_clip_val: Option<f32>,
    pub accumulate_grad_batches: usize,
    pub log_every_n_steps: usize,
    pub check_val_every_n_epoch: usize,
    pub enable_checkpointing: bool,
    /// Where trainer checkpoints go; nothing is written when unset
    pub default_root_dir: Option<PathBuf>,
    pub logger: bool,
    pub callbacks: Vec<CallbackConfig>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            accelerator: "auto".to_string(),
            devices: Value::String("auto".to_string()),
            strategy: "auto".to_string(),
            max_epochs: 1,
            max_steps: None,
            gradient_clip_val: None,
            accumulate_grad_batches: 1,
            log_every_n_steps: 50,
            check_val_every_n_epoch: 1,
            enable_checkpointing: true,
            default_root_dir: None,
            logger: true,
            callbacks: Vec::new(),
        }
    }
}

/// Optimizer name plus its keyword arguments (`lr`, `momentum`, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    pub name: String,
    pub config: Map<String, Value>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        let mut config = Map::new();
        config.insert("lr".to_string(), Value::from(1e-3));
        Self {
            name: "adam".to_string(),
            config,
        }
    }
}

impl OptimizerConfig {
    /// Learning rate from the keyword arguments, 1e-3 when absent
    pub fn lr(&self) -> f32 {
        self.config
            .get("lr")
            .and_then(Value::as_f64)
            .unwrap_or(1e-3) as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerInterval {
    #[default]
    Epoch,
    Step,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub name: String,
    pub config: Map<String, Value>,
    pub interval: SchedulerInterval,
    /// Step the scheduler every `frequency` intervals
    pub frequency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "CosineAnnealingLR".to_string(),
            config: Map::new(),
            interval: SchedulerInterval::Epoch,
            frequency: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompileMode {
    #[default]
    Default,
    ReduceOverhead,
    MaxAutotune,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileConfig {
    pub mode: CompileMode,
    pub dynamic: Option<bool>,
    pub fullgraph: bool,
    pub backend: String,
    pub backend_kwargs: Map<String, Value>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            mode: CompileMode::Default,
            dynamic: None,
            fullgraph: false,
            backend: "inductor".to_string(),
            backend_kwargs: Map::new(),
        }
    }
}

/// Where the pretrained model comes from and how it is fine-tuned
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferLearningConfig {
    /// Local directory, or the repository-relative path when `repo_url` is set
    pub pre_trained_model_path: Option<PathBuf>,
    pub repo_url: Option<String>,
    pub rev: Option<String>,
    pub model_path_in_repo: Option<String>,
    /// New submodule name to pretrained submodule name; absent means the
    /// whole state is transferred
    pub modules_to_match: Option<BTreeMap<String, String>>,
    pub stages: Vec<StageConfig>,
}

/// One fine-tuning stage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageConfig {
    pub name: String,
    pub trainer: crate::config::Override<TrainerConfig>,
    pub datamodule: crate::config::Override<DataModuleConfig>,
    pub optimizer: crate::config::Override<OptimizerConfig>,
    pub scheduler: crate::config::Override<SchedulerConfig>,
    /// Submodules whose parameters stay fixed during this stage
    pub freeze_modules: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_fills_defaults() {
        let dm: DataModuleConfig =
            serde_yaml::from_str("train:\n  batch_size: 16\nseed: 3\n").unwrap();
        assert_eq!(dm.train.batch_size, 16);
        assert!(!dm.train.shuffle);
        assert_eq!(dm.validation.batch_size, 1);
        assert_eq!(dm.seed, 3);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<TrainerConfig, _> = serde_yaml::from_str("max_epoch: 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_pass_to_trainer_flattens_section() {
        let config = ModelConfig::new((), ["x"], ["y"]);
        let kwargs = config.pass_to_trainer();
        assert_eq!(kwargs["max_epochs"], serde_json::json!(1));
        assert_eq!(kwargs["accelerator"], serde_json::json!("auto"));
    }

    #[test]
    fn test_compile_mode_names() {
        let c: CompileConfig = serde_json::from_value(serde_json::json!({
            "mode": "reduce-overhead"
        }))
        .unwrap();
        assert_eq!(c.mode, CompileMode::ReduceOverhead);
    }

    #[test]
    fn test_early_stopping_callback_config() {
        let t: TrainerConfig =
            serde_yaml::from_str("callbacks:\n  - name: EarlyStopping\n    patience: 2\n")
                .unwrap();
        assert_eq!(
            t.callbacks,
            vec![CallbackConfig::EarlyStopping {
                patience: 2,
                min_delta: 0.0,
                monitor_validation: true
            }]
        );
    }
}
