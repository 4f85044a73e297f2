//! Configuration validation

use super::schema::ModelConfig;

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid learning rate: {0} (must be > 0.0)")]
    InvalidLearningRate(f32),

    #[error("Invalid {0} batch size: 0 (must be > 0)")]
    InvalidBatchSize(&'static str),

    #[error("Invalid epochs: {0} (must be > 0)")]
    InvalidEpochs(usize),

    #[error("Invalid accumulate_grad_batches: 0 (must be > 0)")]
    InvalidAccumulation,

    #[error("Invalid optimizer: {0} (must be one of: adam, adamw, sgd)")]
    InvalidOptimizer(String),

    #[error("Invalid scheduler: {0} (must be one of: CosineAnnealingLR, StepLR)")]
    InvalidScheduler(String),

    #[error("Invalid gradient clip value: {0} (must be > 0.0)")]
    InvalidGradClip(f32),

    #[error("No target features (y_features is empty)")]
    NoTargets,

    #[error("Transfer learning needs a pre_trained_model_path or a repo_url")]
    MissingPretrainedLocator,
}

pub const OPTIMIZERS: [&str; 3] = ["adam", "adamw", "sgd"];
pub const SCHEDULERS: [&str; 2] = ["CosineAnnealingLR", "StepLR"];

/// Validate a model configuration
///
/// Checks numeric ranges and names only; referenced paths and submodule
/// names are checked when they are used.
pub fn validate_config<A>(config: &ModelConfig<A>) -> Result<(), ValidationError> {
    if config.y_features.is_empty() {
        return Err(ValidationError::NoTargets);
    }

    let dm = &config.datamodule;
    for (split, size) in [
        ("train", dm.train.batch_size),
        ("validation", dm.validation.batch_size),
        ("predict", dm.predict.batch_size),
    ] {
        if size == 0 {
            return Err(ValidationError::InvalidBatchSize(split));
        }
    }

    let trainer = &config.trainer;
    if trainer.max_epochs == 0 {
        return Err(ValidationError::InvalidEpochs(trainer.max_epochs));
    }
    if trainer.accumulate_grad_batches == 0 {
        return Err(ValidationError::InvalidAccumulation);
    }
    if let Some(clip) = trainer.gradient_clip_val {
        if clip <= 0.0 {
            return Err(ValidationError::InvalidGradClip(clip));
        }
    }

    let name = config.optimizer.name.to_lowercase();
    if !OPTIMIZERS.contains(&name.as_str()) {
        return Err(ValidationError::InvalidOptimizer(
            config.optimizer.name.clone(),
        ));
    }
    let lr = config.optimizer.lr();
    if lr <= 0.0 {
        return Err(ValidationError::InvalidLearningRate(lr));
    }

    if let Some(scheduler) = &config.scheduler {
        if !SCHEDULERS.contains(&scheduler.name.as_str()) {
            return Err(ValidationError::InvalidScheduler(scheduler.name.clone()));
        }
    }

    if let Some(tl) = &config.transfer_learning {
        if tl.pre_trained_model_path.is_none() && tl.repo_url.is_none() {
            return Err(ValidationError::MissingPretrainedLocator);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SchedulerConfig, StageConfig, TransferLearningConfig};

    fn valid() -> ModelConfig<()> {
        ModelConfig::new((), ["x"], ["y"])
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_invalid_batch_size() {
        let mut config = valid();
        config.datamodule.predict.batch_size = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::InvalidBatchSize("predict"))
        ));
    }

    #[test]
    fn test_invalid_learning_rate() {
        let mut config = valid();
        config
            .optimizer
            .config
            .insert("lr".to_string(), serde_json::json!(-0.1));
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::InvalidLearningRate(_))
        ));
    }

    #[test]
    fn test_invalid_names() {
        let mut config = valid();
        config.optimizer.name = "lbfgs".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::InvalidOptimizer(_))
        ));

        let mut config = valid();
        config.scheduler = Some(SchedulerConfig {
            name: "OneCycle".to_string(),
            ..SchedulerConfig::default()
        });
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::InvalidScheduler(_))
        ));
    }

    #[test]
    fn test_transfer_learning_checks() {
        let mut config = valid();
        config.transfer_learning = Some(TransferLearningConfig::default());
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::MissingPretrainedLocator)
        ));

        // the empty name is the whole module
        config.transfer_learning = Some(TransferLearningConfig {
            pre_trained_model_path: Some("pretrained".into()),
            stages: vec![StageConfig {
                name: "frozen".to_string(),
                freeze_modules: vec![String::new()],
                ..StageConfig::default()
            }],
            ..TransferLearningConfig::default()
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_no_targets() {
        let config = ModelConfig::new((), ["x"], Vec::<String>::new());
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::NoTargets)
        ));
    }
}
