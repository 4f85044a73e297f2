//! Model I/O
//!
//! Checkpoint files and resolution of saved-model locations, either a local
//! directory or a directory inside a versioned repository.

mod artifact;
mod checkpoint;
#[cfg(feature = "hub")]
mod hub;

pub use artifact::{
    resolve_artifact, ArtifactLocator, ArtifactStore, LocalMirrorStore, DEFAULT_REVISION,
};
pub use checkpoint::{CheckpointFile, StoredTensor};
#[cfg(feature = "hub")]
pub use hub::HubStore;

/// Module weights inside a saved model directory
pub const MODULE_CHECKPOINT_FILE: &str = "module_checkpoint.ckpt";

/// Architecture tag and configuration inside a saved model directory
pub const MODEL_CONFIG_FILE: &str = "model_config.json";
