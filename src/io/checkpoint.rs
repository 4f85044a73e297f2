//! Checkpoint files
//!
//! A checkpoint is a JSON object whose `state_dict` maps parameter paths to
//! `{shape, data}`. Trainer checkpoints also record `epoch` and
//! `global_step`; module checkpoints carry the state dict alone.

use crate::error::{Error, Result};
use crate::nn::StateDict;
use crate::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One stored parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointFile {
    pub state_dict: BTreeMap<String, StoredTensor>,

    /// Epochs completed when written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<usize>,

    /// Optimizer steps taken when written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_step: Option<usize>,
}

impl CheckpointFile {
    /// Module checkpoint holding only the weights
    pub fn from_state_dict(state: &StateDict) -> Self {
        let state_dict = state
            .iter()
            .map(|(name, t)| {
                (
                    name.clone(),
                    StoredTensor {
                        shape: vec![t.len()],
                        data: t.to_vec(),
                    },
                )
            })
            .collect();
        Self {
            state_dict,
            epoch: None,
            global_step: None,
        }
    }

    /// Trainer checkpoint with progress counters
    pub fn with_progress(mut self, epoch: usize, global_step: usize) -> Self {
        self.epoch = Some(epoch);
        self.global_step = Some(global_step);
        self
    }

    /// Weights as tensors; the stored shape must match the data length
    pub fn to_state_dict(&self) -> Result<StateDict> {
        self.state_dict
            .iter()
            .map(|(name, stored)| {
                let expected: usize = stored.shape.iter().product();
                if expected != stored.data.len() {
                    return Err(Error::ShapeMismatch {
                        expected: stored.shape.clone(),
                        got: vec![stored.data.len()],
                    });
                }
                Ok((name.clone(), Tensor::from_vec(stored.data.clone(), false)))
            })
            .collect()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string(self)
            .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Artifact(format!("cannot read checkpoint {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state() -> StateDict {
        StateDict::from([
            ("head.bias".to_string(), Tensor::from_vec(vec![0.5], true)),
            (
                "head.weight".to_string(),
                Tensor::from_vec(vec![1.0, -2.0], true),
            ),
        ])
    }

    #[test]
    fn test_module_checkpoint_has_only_state_dict() {
        let json = serde_json::to_value(CheckpointFile::from_state_dict(&state())).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["state_dict"]);
        assert_eq!(json["state_dict"]["head.weight"]["shape"], serde_json::json!([2]));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoints").join("last.ckpt");
        CheckpointFile::from_state_dict(&state())
            .with_progress(3, 12)
            .save(&path)
            .unwrap();

        let loaded = CheckpointFile::load(&path).unwrap();
        assert_eq!(loaded.epoch, Some(3));
        assert_eq!(loaded.global_step, Some(12));
        assert_eq!(loaded.to_state_dict().unwrap(), state());
    }

    #[test]
    fn test_inconsistent_shape_rejected() {
        let mut file = CheckpointFile::from_state_dict(&state());
        if let Some(stored) = file.state_dict.get_mut("head.weight") {
            stored.shape = vec![3];
        }
        assert!(matches!(
            file.to_state_dict(),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
