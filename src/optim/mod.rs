//! Optimizers and learning rate schedulers

mod adam;
mod adamw;
mod optimizer;
mod scheduler;
mod sgd;

pub use adam::Adam;
pub use adamw::AdamW;
pub use optimizer::{clip_grad_norm, Optimizer};
pub use scheduler::{CosineAnnealingLR, LRScheduler, StepLR};
pub use sgd::SGD;
