//! # Relevo: staged training orchestration
//!
//! Relevo drives a small tape-autograd training stack through a model
//! orchestrator with scoped config overrides, staged transfer learning,
//! checkpointing and batched prediction. It also ships a deterministic
//! rotating cross-validation splitter.
//!
//! ## Architecture
//!
//! - **autograd**: Tape-based automatic differentiation
//! - **nn**: Modules, named parameters and state dicts
//! - **optim**: Optimizers (SGD, Adam, AdamW) and LR schedulers
//! - **config**: Declarative YAML configuration and section overrides
//! - **data**: In-memory datasets and batching
//! - **train**: Trainer, callbacks and resume checkpoints
//! - **model**: The orchestrator, transfer learning and persistence
//! - **io**: Checkpoint files and saved-model locations
//! - **splits**: Dataset splitting strategies

pub mod autograd;
pub mod config;
pub mod data;
pub mod io;
pub mod model;
pub mod nn;
pub mod optim;
pub mod splits;
pub mod train;

pub mod error;

// Re-export commonly used types
pub use autograd::{backward, Tensor};
pub use error::{Error, Result};
pub use model::{Architecture, Model, TrainingModule};
