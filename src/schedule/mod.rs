//! Scheduling: attach a launch configuration to every primitive function
//! of a module bound for an accelerator.
//!
//! Precedence: a manual schedule is kept, then a tuning-database record
//! for the same signature and device model, then the fallback (one thread
//! per element, block size rounded up to whole warps and capped by the
//! device model).

pub mod tuning;

pub use tuning::{tune_module, TuningDatabase, TuningRecord};

use crate::config::target::{DeviceModel, Target};
use crate::error::{JitError, Result};
use crate::ir::{IRModule, PrimFunc, Schedule, ScheduleKind};

/// Fallback block size for `numel` output elements.
pub fn fallback_threads(model: &DeviceModel, numel: usize) -> u32 {
    let warp = model.warp_size.max(1) as usize;
    let rounded = numel.max(1).div_ceil(warp) * warp;
    rounded.min(model.max_threads_per_block as usize) as u32
}

pub fn apply_default_schedule(module: IRModule, target: &Target, db: Option<&TuningDatabase>) -> Result<IRModule> {
    let Some(model) = &target.model else {
        return Ok(module);
    };
    let mut module = module;
    for prim in &mut module.prim_funcs {
        prim.schedule = Some(schedule_for(prim, model, db)?);
    }
    Ok(module)
}

fn schedule_for(prim: &PrimFunc, model: &DeviceModel, db: Option<&TuningDatabase>) -> Result<Schedule> {
    let numel = prim.launch_extent()?;
    if let Some(existing) = prim.schedule {
        if existing.kind == ScheduleKind::Manual {
            if existing.threads_per_block > model.max_threads_per_block {
                return Err(JitError::backend(
                    "schedule",
                    format!(
                        "manual schedule of '{}' uses {} threads per block, {} allows {}",
                        prim.name, existing.threads_per_block, model.display_name, model.max_threads_per_block
                    ),
                ));
            }
            return Ok(existing);
        }
    }
    let tuned = db
        .and_then(|db| db.lookup(&prim.signature(), &model.name))
        .filter(|r| r.threads_per_block > 0 && r.threads_per_block <= model.max_threads_per_block);
    Ok(match tuned {
        Some(record) => Schedule::new(ScheduleKind::Tuned, record.threads_per_block, numel),
        None => Schedule::new(ScheduleKind::Fallback, fallback_threads(model, prim.output.numel()), numel),
    })
}

#[cfg(test)]
mod tests;
