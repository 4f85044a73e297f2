//! Scoped config override

use super::architecture::Architecture;
use super::orchestrator::Model;
use crate::config::{validate_config, ConfigOverrides, ModelConfig};
use crate::error::Result;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;
use tracing::debug;

/// Guard holding a model under an overridden configuration
///
/// Created by [`Model::override_config`]. While alive, the model and any
/// module attached to it see the overridden config; dropping the guard puts
/// the original config object back on both, including during unwinding.
/// A module attached while the guard is alive also gets the original config
/// back on drop.
pub struct ConfigOverride<'a, A: Architecture> {
    model: &'a mut Model<A>,
    original: Rc<ModelConfig<A::Config>>,
}

impl<'a, A: Architecture> ConfigOverride<'a, A> {
    /// Resolve `overrides` against the active config and install the result
    ///
    /// The resolved config is validated like a new one. Resolution and
    /// validation happen before anything is assigned; on error the model is
    /// untouched.
    pub(crate) fn enter(model: &'a mut Model<A>, overrides: &ConfigOverrides) -> Result<Self> {
        let original = Rc::clone(model.shared_config());
        if !overrides.is_empty() {
            let active = overrides.apply(&original)?;
            validate_config(&active)?;
            model.assign_config(Rc::new(active));
            debug!("config override entered");
        }
        Ok(Self { model, original })
    }

    /// The configuration that will be restored
    pub fn original(&self) -> &ModelConfig<A::Config> {
        &self.original
    }
}

impl<A: Architecture> Deref for ConfigOverride<'_, A> {
    type Target = Model<A>;

    fn deref(&self) -> &Model<A> {
        self.model
    }
}

impl<A: Architecture> DerefMut for ConfigOverride<'_, A> {
    fn deref_mut(&mut self) -> &mut Model<A> {
        self.model
    }
}

impl<A: Architecture> Drop for ConfigOverride<'_, A> {
    fn drop(&mut self) {
        self.model.assign_config(Rc::clone(&self.original));
    }
}
