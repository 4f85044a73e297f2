//! Weight matching, freezing and staged transfer learning

use super::architecture::Architecture;
use super::compiled::compile;
use super::orchestrator::{Model, StageReport};
use super::persist::load_pretrained;
use super::scope::ConfigOverride;
use crate::config::ConfigOverrides;
use crate::data::NamedDatasets;
use crate::error::{Error, Result};
use crate::io::ArtifactLocator;
use crate::nn::Module;
use crate::train::Trainer;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Copy pretrained weights into `module`
///
/// Without a mapping the whole state must match exactly. With one, each
/// `new -> old` entry copies the pretrained submodule `old` into the
/// submodule `new`; every name is checked on both sides first, and a failed
/// load rolls `module` back so nothing is partially applied.
pub fn match_modules<M, P>(
    module: &mut M,
    pretrained: &P,
    modules_to_match: Option<&BTreeMap<String, String>>,
) -> Result<()>
where
    M: Module + ?Sized,
    P: Module + ?Sized,
{
    let Some(mapping) = modules_to_match else {
        module
            .load_state_dict(&pretrained.state_dict())
            .map_err(|e| Error::ModuleLookup(format!("could not load pretrained state: {e}")))?;
        warn!("matched all modules of the pretrained model");
        return Ok(());
    };

    let new_names = module.named_modules();
    let old_names = pretrained.named_modules();
    let missing_new: Vec<&String> = mapping.keys().filter(|n| !new_names.contains(*n)).collect();
    if !missing_new.is_empty() {
        return Err(Error::ModuleLookup(format!(
            "modules {missing_new:?} not found in the new module"
        )));
    }
    let missing_old: Vec<&String> = mapping
        .values()
        .filter(|n| !old_names.contains(*n))
        .collect();
    if !missing_old.is_empty() {
        return Err(Error::ModuleLookup(format!(
            "modules {missing_old:?} not found in the pretrained module"
        )));
    }

    let snapshot = module.state_dict();
    for (new, old) in mapping {
        let state = pretrained.submodule_state_dict(old)?;
        if let Err(e) = module.load_submodule_state_dict(new, &state) {
            module.load_state_dict(&snapshot)?;
            return Err(Error::ModuleLookup(format!(
                "could not load pretrained module '{old}' into '{new}': {e}"
            )));
        }
    }
    for (new, old) in mapping {
        warn!(module = %new, pretrained = %old, "matched module");
    }
    Ok(())
}

/// Stop gradient tracking for every submodule in `names`
///
/// All names are checked before anything is frozen.
pub fn freeze_modules<M: Module + ?Sized>(module: &mut M, names: &[String]) -> Result<()> {
    let available = module.named_modules();
    let missing: Vec<&String> = names.iter().filter(|n| !available.contains(*n)).collect();
    if !missing.is_empty() {
        return Err(Error::ModuleLookup(format!(
            "cannot freeze {missing:?}: no such modules"
        )));
    }
    for name in names {
        module.requires_grad_(name, false)?;
        warn!(module = %name, "froze module");
    }
    Ok(())
}

/// Fine-tune from a pretrained model through the configured stages
///
/// The matched weights seed the first stage; each stage starts from the
/// weights the previous one ended with. With no stages the matched module
/// is attached as is.
pub(crate) fn transfer_learn<A: Architecture>(
    model: &mut Model<A>,
    train: &NamedDatasets,
    validation: &NamedDatasets,
) -> Result<Vec<StageReport>> {
    let config = Rc::clone(model.shared_config());
    let transfer = config.transfer_learning.as_ref().ok_or_else(|| {
        Error::ConfigError("model has no transfer_learning section".to_string())
    })?;

    let locator = ArtifactLocator::from_transfer_config(transfer)?;
    let (architecture, pretrained) = load_pretrained(
        &locator,
        model.artifact_store().as_deref(),
        model.pretrained_registry(),
    )?;
    debug!(architecture = %architecture, target = A::NAME, "matching pretrained weights");

    let mut fresh = A::instantiate_module(Rc::clone(&config))?;
    match_modules(&mut fresh, pretrained.as_ref(), transfer.modules_to_match.as_ref())?;
    let mut checkpoint = fresh.state_dict();
    model.attach_module(compile(fresh, None));

    let mut reports = Vec::with_capacity(transfer.stages.len());
    for (index, stage) in transfer.stages.iter().enumerate() {
        info!(stage = %stage.name, index, "transfer-learning stage");
        let overrides = ConfigOverrides::new()
            .trainer(stage.trainer.clone())
            .datamodule(stage.datamodule.clone())
            .optimizer(stage.optimizer.clone())
            .scheduler(stage.scheduler.clone());
        let mut scope = ConfigOverride::enter(model, &overrides)?;
        let stage_config = Rc::clone(scope.shared_config());

        let datamodule = A::instantiate_datamodule(&stage_config)
            .with_train(train.clone())
            .with_validation(validation.clone());
        let mut module = A::instantiate_module(Rc::clone(&stage_config))?;
        module.load_state_dict(&checkpoint)?;
        freeze_modules(&mut module, &stage.freeze_modules)?;

        let active = scope.attach_module(compile(module, stage_config.compile.as_ref()));
        let mut trainer = Trainer::from_kwargs(stage_config.pass_to_trainer())?;
        let result = active.fit(&mut trainer, &datamodule, None)?;
        checkpoint = active.original().state_dict();

        reports.push(StageReport {
            name: stage.name.clone(),
            result,
        });
    }
    Ok(reports)
}
