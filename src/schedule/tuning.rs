//! Tuning database: measured best block sizes, keyed by kernel signature
//! and device model. Persistence via rkyv archives.

use std::path::Path;
use std::time::Instant;

use rkyv::{Archive, Deserialize, Serialize};

use crate::config::target::DeviceModel;
use crate::error::{JitError, Result};
use crate::ir::{IRModule, PrimFunc, Schedule, ScheduleKind};
use crate::runtime::{Kernel, Launch};
use crate::tensor::{Device, NDArray};

/// Best measured launch configuration of one kernel on one device model.
#[derive(Archive, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[rkyv(derive(Debug))]
pub struct TuningRecord {
    /// `PrimFunc::signature()` of the tuned kernel.
    pub signature: String,
    /// Device model name, e.g. "nvidia/a100".
    pub device: String,
    pub threads_per_block: u32,
    /// Best wall time per launch, in nanoseconds.
    pub measured_ns: u64,
}

#[derive(Archive, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[rkyv(derive(Debug))]
pub struct TuningDatabase {
    records: Vec<TuningRecord>,
}

impl TuningDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a database, or start an empty one if the file does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| JitError::io(path, e))?;
        let mut aligned = rkyv::util::AlignedVec::<16>::new();
        aligned.extend_from_slice(&bytes);
        rkyv::from_bytes::<TuningDatabase, rkyv::rancor::Error>(&aligned).map_err(|e| {
            JitError::backend("tuning", format!("corrupt tuning database '{}': {}", path.display(), e))
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| JitError::backend("tuning", format!("cannot encode tuning database: {}", e)))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| JitError::io(dir, e))?;
        }
        std::fs::write(path, bytes.as_slice()).map_err(|e| JitError::io(path, e))
    }

    pub fn lookup(&self, signature: &str, device: &str) -> Option<&TuningRecord> {
        self.records
            .iter()
            .find(|r| r.signature == signature && r.device == device)
    }

    /// Insert a record, keeping the faster one when the key already exists.
    pub fn commit(&mut self, record: TuningRecord) {
        match self
            .records
            .iter_mut()
            .find(|r| r.signature == record.signature && r.device == record.device)
        {
            Some(existing) if existing.measured_ns <= record.measured_ns => {}
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn records(&self) -> &[TuningRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Candidate block sizes: whole warps, doubling, up to the device limit.
pub fn candidate_block_sizes(model: &DeviceModel) -> Vec<u32> {
    let warp = model.warp_size.max(1);
    let mut sizes = Vec::new();
    let mut threads = warp;
    while threads <= model.max_threads_per_block {
        sizes.push(threads);
        threads *= 2;
    }
    if sizes.last() != Some(&model.max_threads_per_block) {
        sizes.push(model.max_threads_per_block);
    }
    sizes
}

fn measure(prim: &PrimFunc, threads: u32, repeats: usize) -> Result<u64> {
    let kernel = Kernel::compile(prim)?;
    let device = Device::cuda(0);
    let inputs: Vec<NDArray> = prim.params.iter().map(|p| NDArray::ones(p, device)).collect();
    let refs: Vec<&NDArray> = inputs.iter().collect();
    let schedule = Schedule::new(ScheduleKind::Tuned, threads, prim.launch_extent()?);
    let launch = Launch::from_schedule(&schedule);
    let mut best = u64::MAX;
    for _ in 0..repeats.max(1) {
        let start = Instant::now();
        kernel.execute(&refs, device, launch)?;
        best = best.min(start.elapsed().as_nanos() as u64);
    }
    Ok(best)
}

/// Measure every candidate block size for each primitive function of
/// `module` and commit the fastest to `db`. Returns the committed records.
pub fn tune_module(
    module: &IRModule,
    model: &DeviceModel,
    db: &mut TuningDatabase,
    repeats: usize,
) -> Result<Vec<TuningRecord>> {
    let mut tuned = Vec::with_capacity(module.prim_funcs.len());
    for prim in &module.prim_funcs {
        let mut best: Option<TuningRecord> = None;
        for threads in candidate_block_sizes(model) {
            let ns = measure(prim, threads, repeats)?;
            if best.as_ref().map_or(true, |b| ns < b.measured_ns) {
                best = Some(TuningRecord {
                    signature: prim.signature(),
                    device: model.name.clone(),
                    threads_per_block: threads,
                    measured_ns: ns,
                });
            }
        }
        if let Some(record) = best {
            db.commit(record.clone());
            tuned.push(record);
        }
    }
    Ok(tuned)
}
