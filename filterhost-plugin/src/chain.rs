//! Building an ordered stage list from configuration.
//!
//! The stage list is read from `filters = N` followed by `filter0` ..
//! `filter{N-1}`, each naming a registered plugin. Engines that also accept
//! the single-stage form read `filter = ident` when `filters` is absent.

use std::sync::Arc;

use filterhost_core::{ConfigFile, CoreError, ParamScope};
use tracing::debug;

use crate::api::Plugin;
use crate::error::PluginError;
use crate::registry::PluginRegistry;

/// Key holding the number of stages.
pub const STAGE_COUNT_KEY: &str = "filters";

/// Key naming the only stage in the single-stage form.
pub const SINGLE_STAGE_KEY: &str = "filter";

/// Upper bound on stages reserved up front. The count comes from the config
/// file, so the list grows past this only as stage names are actually read.
const RESERVED_STAGES: usize = 16;

/// One entry of the configured stage list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    /// Position in the chain.
    pub index: usize,
    /// Configuration key that named this stage, also its parameter prefix.
    pub slot_key: String,
    /// Plugin identifier read from `slot_key`.
    pub ident: String,
}

impl StageSpec {
    /// Parameter lookup for this stage: slot prefix first, then the ident.
    pub fn params<'a>(&self, config: &'a ConfigFile) -> ParamScope<'a> {
        ParamScope::new(config, self.slot_key.clone(), self.ident.clone())
    }
}

/// Number of configured stages and whether they use the single-stage form.
fn stage_count(config: &ConfigFile, allow_single: bool) -> Result<(usize, bool), PluginError> {
    match config.get_parsed::<usize>(STAGE_COUNT_KEY)? {
        Some(0) => Err(PluginError::EmptyPipeline),
        Some(count) => Ok((count, false)),
        None if allow_single && config.contains(SINGLE_STAGE_KEY) => Ok((1, true)),
        None => Err(CoreError::MissingKey(STAGE_COUNT_KEY.into()).into()),
    }
}

fn stage_spec(config: &ConfigFile, index: usize, single: bool) -> Result<StageSpec, PluginError> {
    let slot_key = if single {
        SINGLE_STAGE_KEY.to_string()
    } else {
        format!("{SINGLE_STAGE_KEY}{index}")
    };
    let ident = config.require(&slot_key)?.trim().to_string();
    Ok(StageSpec {
        index,
        slot_key,
        ident,
    })
}

/// Read the stage list without resolving it.
pub fn read_stage_list(config: &ConfigFile, allow_single: bool) -> Result<Vec<StageSpec>, PluginError> {
    let (count, single) = stage_count(config, allow_single)?;
    (0..count).map(|i| stage_spec(config, i, single)).collect()
}

/// Build every configured stage in order.
///
/// For each index the stage name is read, resolved against `registry` by
/// exact identifier and handed to `create` together with its descriptor.
/// Stages are created strictly in configuration order and nothing past a
/// failing index is ever created. On any failure the stages already built
/// are dropped in reverse order before the error is returned.
pub fn build_stages<D, S, E, F>(
    config: &ConfigFile,
    allow_single: bool,
    registry: &PluginRegistry<D>,
    mut create: F,
) -> Result<Vec<S>, E>
where
    D: ?Sized + Plugin,
    E: From<PluginError>,
    F: FnMut(&StageSpec, &Arc<D>) -> Result<S, E>,
{
    if registry.is_empty() {
        return Err(PluginError::EmptyRegistry.into());
    }
    let (count, single) = stage_count(config, allow_single)?;

    let mut stages = Vec::with_capacity(count.min(RESERVED_STAGES));
    for index in 0..count {
        let built = stage_spec(config, index, single)
            .and_then(|spec| registry.resolve(&spec.ident).map(|d| (spec, Arc::clone(d))))
            .map_err(E::from)
            .and_then(|(spec, descriptor)| {
                let stage = create(&spec, &descriptor)?;
                debug!(index, ident = %spec.ident, slot = %spec.slot_key, "Stage created");
                Ok(stage)
            });

        match built {
            Ok(stage) => stages.push(stage),
            Err(e) => {
                debug!(failed_at = index, rollback = stages.len(), "Rolling back partial chain");
                while let Some(stage) = stages.pop() {
                    drop(stage);
                }
                return Err(e);
            }
        }
    }
    Ok(stages)
}
