//! Build optimizers and schedulers from their config sections

use super::schema::{OptimizerConfig, SchedulerConfig};
use crate::error::{Error, Result};
use crate::optim::{Adam, AdamW, CosineAnnealingLR, LRScheduler, Optimizer, StepLR, SGD};
use serde_json::{Map, Value};

fn param(params: &Map<String, Value>, key: &str, default: f32) -> f32 {
    params
        .get(key)
        .and_then(Value::as_f64)
        .map_or(default, |v| v as f32)
}

/// `betas: [b1, b2]`, as in the usual keyword form
fn betas(params: &Map<String, Value>) -> (f32, f32) {
    let pair = params.get("betas").and_then(Value::as_array);
    match pair.map(|b| b.iter().filter_map(Value::as_f64).collect::<Vec<_>>()) {
        Some(b) if b.len() == 2 => (b[0] as f32, b[1] as f32),
        _ => (param(params, "beta1", 0.9), param(params, "beta2", 0.999)),
    }
}

/// Build optimizer from configuration
pub fn build_optimizer(spec: &OptimizerConfig) -> Result<Box<dyn Optimizer>> {
    let params = &spec.config;
    let lr = spec.lr();
    match spec.name.to_lowercase().as_str() {
        "sgd" => {
            let momentum = param(params, "momentum", 0.0);
            let weight_decay = param(params, "weight_decay", 0.0);
            Ok(Box::new(
                SGD::new(lr, momentum).with_weight_decay(weight_decay),
            ))
        }
        "adam" => {
            let (beta1, beta2) = betas(params);
            let eps = param(params, "eps", 1e-8);
            Ok(Box::new(Adam::new(lr, beta1, beta2, eps)))
        }
        "adamw" => {
            let (beta1, beta2) = betas(params);
            let eps = param(params, "eps", 1e-8);
            let weight_decay = param(params, "weight_decay", 0.01);
            Ok(Box::new(AdamW::new(lr, beta1, beta2, eps, weight_decay)))
        }
        name => Err(Error::ConfigError(format!(
            "Unknown optimizer: {}. Supported: sgd, adam, adamw",
            name
        ))),
    }
}

/// Build scheduler from configuration, starting at `base_lr`
pub fn build_scheduler(spec: &SchedulerConfig, base_lr: f32) -> Result<Box<dyn LRScheduler>> {
    let params = &spec.config;
    let count = |key: &str, default: usize| {
        params
            .get(key)
            .and_then(Value::as_u64)
            .map_or(default, |v| v as usize)
    };
    match spec.name.as_str() {
        "CosineAnnealingLR" => {
            let t_max = count("T_max", 10);
            let eta_min = param(params, "eta_min", 0.0);
            Ok(Box::new(CosineAnnealingLR::new(base_lr, t_max, eta_min)))
        }
        "StepLR" => {
            let step_size = count("step_size", 1);
            let gamma = param(params, "gamma", 0.1);
            Ok(Box::new(StepLR::new(base_lr, step_size, gamma)))
        }
        name => Err(Error::ConfigError(format!(
            "Unknown scheduler: {}. Supported: CosineAnnealingLR, StepLR",
            name
        ))),
    }
}
