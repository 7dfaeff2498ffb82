//! Opt-in artifact cache owned by one jitted function.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::CompiledArtifact;
use crate::config::target::{DeviceModel, JitTarget};
use crate::tensor::TensorDescriptor;

/// Cache key: BLAKE3 of everything that determines the compiled artifact.
pub fn artifact_key(source: &str, target: JitTarget, model: &DeviceModel, args: &[&TensorDescriptor]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source.as_bytes());
    hasher.update(b"\0");
    hasher.update(target.as_str().as_bytes());
    hasher.update(b"\0");
    for field in [&model.name, &model.display_name, &model.arch] {
        hasher.update(field.as_bytes());
        hasher.update(b"\0");
    }
    for limit in [
        model.max_threads_per_block,
        model.warp_size,
        model.max_shared_memory_per_block,
        model.multiprocessors,
    ] {
        hasher.update(&limit.to_le_bytes());
    }
    for desc in args {
        hasher.update(b"\0");
        hasher.update(desc.to_string().as_bytes());
    }
    hasher.finalize()
}

#[derive(Debug, Default)]
pub struct ArtifactCache {
    entries: Mutex<HashMap<blake3::Hash, Arc<CompiledArtifact>>>,
}

impl ArtifactCache {
    pub fn get(&self, key: &blake3::Hash) -> Option<Arc<CompiledArtifact>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    pub fn insert(&self, key: blake3::Hash, artifact: Arc<CompiledArtifact>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, artifact);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
