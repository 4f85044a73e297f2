//! The module trait and state-dict handling

use crate::{Error, Result, Tensor};
use std::collections::{BTreeMap, BTreeSet};

/// Parameter path to tensor
pub type StateDict = BTreeMap<String, Tensor>;

/// A tree of named parameters with a forward pass
pub trait Module {
    /// Parameters keyed by dotted path, in a stable order
    fn named_parameters(&self) -> Vec<(String, &Tensor)>;

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)>;

    /// Forward a row-major `batch_size × in_features` input
    fn forward(&self, inputs: &Tensor, batch_size: usize) -> Tensor;

    /// All submodule names, including `""` for the root
    fn named_modules(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        names.insert(String::new());
        for (path, _) in self.named_parameters() {
            let segments: Vec<&str> = path.split('.').collect();
            for end in 1..segments.len() {
                names.insert(segments[..end].join("."));
            }
        }
        names
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.named_parameters_mut()
            .into_iter()
            .map(|(_, t)| t)
            .collect()
    }

    /// Detached copy of every parameter
    fn state_dict(&self) -> StateDict {
        self.named_parameters()
            .into_iter()
            .map(|(name, t)| (name, t.detach()))
            .collect()
    }

    /// Strict load: key sets must match and every length must agree
    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        self.load_submodule_state_dict("", state)
    }

    /// Detached parameters of one submodule, keys relative to it
    fn submodule_state_dict(&self, name: &str) -> Result<StateDict> {
        if !self.named_modules().contains(name) {
            return Err(Error::ModuleLookup(format!("no submodule named '{name}'")));
        }
        Ok(self
            .named_parameters()
            .into_iter()
            .filter_map(|(path, t)| strip_module_prefix(&path, name).map(|k| (k, t.detach())))
            .collect())
    }

    /// Strict load into one submodule; keys are relative to it
    ///
    /// Validates the whole mapping before copying anything.
    fn load_submodule_state_dict(&mut self, name: &str, state: &StateDict) -> Result<()> {
        let mut targets: BTreeMap<String, &mut Tensor> = self
            .named_parameters_mut()
            .into_iter()
            .filter_map(|(path, t)| strip_module_prefix(&path, name).map(|k| (k, t)))
            .collect();

        let missing: Vec<&String> = targets.keys().filter(|k| !state.contains_key(*k)).collect();
        let unexpected: Vec<&String> = state.keys().filter(|k| !targets.contains_key(*k)).collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(Error::StateMismatch(format!(
                "missing keys {missing:?}, unexpected keys {unexpected:?}"
            )));
        }
        for (key, source) in state {
            let target_len = targets.get(key).map_or(0, |t| t.len());
            if source.len() != target_len {
                return Err(Error::StateMismatch(format!(
                    "size mismatch for '{key}': expected {target_len}, got {}",
                    source.len()
                )));
            }
        }

        for (key, source) in state {
            if let Some(target) = targets.get_mut(key) {
                target.data_mut().assign(source.data());
                target.zero_grad();
            }
        }
        Ok(())
    }

    /// Toggle gradient tracking for every parameter under `name`
    fn requires_grad_(&mut self, name: &str, requires_grad: bool) -> Result<()> {
        if !self.named_modules().contains(name) {
            return Err(Error::ModuleLookup(format!("no submodule named '{name}'")));
        }
        for (path, t) in self.named_parameters_mut() {
            if strip_module_prefix(&path, name).is_some() {
                t.set_requires_grad(requires_grad);
            }
        }
        Ok(())
    }
}

/// Path relative to `module`, or `None` when the path lies outside it
pub(crate) fn strip_module_prefix(path: &str, module: &str) -> Option<String> {
    if module.is_empty() {
        return Some(path.to_string());
    }
    path.strip_prefix(module)
        .and_then(|rest| rest.strip_prefix('.'))
        .map(str::to_string)
}

/// Prefix every path with `prefix.`
pub fn prefixed<T>(prefix: &str, params: Vec<(String, T)>) -> Vec<(String, T)> {
    params
        .into_iter()
        .map(|(name, t)| (format!("{prefix}.{name}"), t))
        .collect()
}
