use std::fmt;
use std::path::Path;

use crate::error::{JitError, Result};
use crate::tensor::Device;

/// Logical target token accepted by `jit(...)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JitTarget {
    /// General-purpose host target.
    Cpu,
    /// The configured accelerator device model.
    Cuda,
}

impl JitTarget {
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "cpu" => Ok(JitTarget::Cpu),
            "cuda" => Ok(JitTarget::Cuda),
            other => Err(JitError::InvalidTarget {
                token: other.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JitTarget::Cpu => "cpu",
            JitTarget::Cuda => "cuda",
        }
    }
}

impl fmt::Display for JitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accelerator device model: everything the scheduler and code generator
/// need to know about the device, instead of hardcoded constants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceModel {
    /// Identifier used in options, CLI, and file paths (e.g. "nvidia/a100").
    pub name: String,
    /// Human-readable name (e.g. "NVIDIA A100").
    pub display_name: String,
    /// Compute capability passed to the code generator (e.g. "sm_80").
    pub arch: String,
    pub max_threads_per_block: u32,
    pub warp_size: u32,
    /// Bytes of shared memory available to one block.
    pub max_shared_memory_per_block: u32,
    /// Number of streaming multiprocessors.
    pub multiprocessors: u32,
}

impl Default for DeviceModel {
    fn default() -> Self {
        Self::geforce_rtx_3060()
    }
}

impl DeviceModel {
    pub const BUILTIN: [&'static str; 3] = ["nvidia/geforce-rtx-3060", "nvidia/a100", "nvidia/tesla-t4"];

    /// Built-in default accelerator.
    pub fn geforce_rtx_3060() -> Self {
        Self {
            name: "nvidia/geforce-rtx-3060".to_string(),
            display_name: "NVIDIA GeForce RTX 3060".to_string(),
            arch: "sm_86".to_string(),
            max_threads_per_block: 1024,
            warp_size: 32,
            max_shared_memory_per_block: 49152,
            multiprocessors: 28,
        }
    }

    pub fn a100() -> Self {
        Self {
            name: "nvidia/a100".to_string(),
            display_name: "NVIDIA A100".to_string(),
            arch: "sm_80".to_string(),
            max_threads_per_block: 1024,
            warp_size: 32,
            max_shared_memory_per_block: 49152,
            multiprocessors: 108,
        }
    }

    pub fn tesla_t4() -> Self {
        Self {
            name: "nvidia/tesla-t4".to_string(),
            display_name: "NVIDIA Tesla T4".to_string(),
            arch: "sm_75".to_string(),
            max_threads_per_block: 1024,
            warp_size: 32,
            max_shared_memory_per_block: 49152,
            multiprocessors: 40,
        }
    }

    fn builtin(name: &str) -> Option<Self> {
        match name {
            "nvidia/geforce-rtx-3060" => Some(Self::geforce_rtx_3060()),
            "nvidia/a100" => Some(Self::a100()),
            "nvidia/tesla-t4" => Some(Self::tesla_t4()),
            _ => None,
        }
    }

    /// Load a device model from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| JitError::io(path, e))?;
        Self::parse_toml(&content, path)
    }

    /// Resolve a device model by name: built-ins first, then
    /// `devices/{name}.toml` relative to the binary or working directory.
    pub fn resolve(name: &str) -> Result<Self> {
        let invalid = |reason: &str| JitError::InvalidDeviceModel {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        // Reject path traversal
        if name.is_empty() || name.contains('\\') || name.contains("..") || name.starts_with('.') || name.starts_with('/')
        {
            return Err(invalid("not a valid device model name"));
        }

        if let Some(model) = Self::builtin(name) {
            return Ok(model);
        }

        let relative = format!("devices/{}.toml", name);

        // 1. Relative to the binary
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                for base in [Some(dir), dir.parent(), dir.parent().and_then(|p| p.parent())]
                    .into_iter()
                    .flatten()
                {
                    let path = base.join(&relative);
                    if path.exists() {
                        return Self::load(&path);
                    }
                }
            }
        }

        // 2. Current working directory
        let cwd_path = std::path::PathBuf::from(&relative);
        if cwd_path.exists() {
            return Self::load(&cwd_path);
        }

        Err(JitError::InvalidDeviceModel {
            name: name.to_string(),
            reason: format!(
                "unknown device model (looked for '{}'; built-in models: {})",
                relative,
                Self::BUILTIN.join(", ")
            ),
        })
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let err = |msg: String| JitError::InvalidDeviceModel {
            name: path.display().to_string(),
            reason: msg,
        };

        let mut name = String::new();
        let mut display_name = String::new();
        let mut arch = String::new();
        let mut max_threads_per_block: u32 = 0;
        let mut warp_size: u32 = 0;
        let mut max_shared_memory_per_block: u32 = 0;
        let mut multiprocessors: u32 = 0;

        let mut section = String::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(err(format!("expected 'key = value', found '{}'", trimmed)));
            };
            let key = key.trim();
            let value = value.trim();
            let unquoted = value.trim_matches('"');
            let number = |field: &str| -> Result<u32> {
                value
                    .replace('_', "")
                    .parse()
                    .map_err(|_| err(format!("invalid {}.{}: {}", section, field, value)))
            };

            match (section.as_str(), key) {
                ("device", "name") => name = unquoted.to_string(),
                ("device", "display_name") => display_name = unquoted.to_string(),
                ("device", "arch") => arch = unquoted.to_string(),
                ("limits", "max_threads_per_block") => max_threads_per_block = number(key)?,
                ("limits", "warp_size") => warp_size = number(key)?,
                ("limits", "max_shared_memory_per_block") => max_shared_memory_per_block = number(key)?,
                ("limits", "multiprocessors") => multiprocessors = number(key)?,
                _ => {}
            }
        }

        if name.is_empty() {
            return Err(err("missing device.name".to_string()));
        }
        if !arch.starts_with("sm_") {
            return Err(err(format!("device.arch must look like 'sm_86', found '{}'", arch)));
        }
        if max_threads_per_block == 0 {
            return Err(err("limits.max_threads_per_block must be > 0".to_string()));
        }
        if warp_size == 0 {
            return Err(err("limits.warp_size must be > 0".to_string()));
        }
        if max_threads_per_block % warp_size != 0 {
            return Err(err(format!(
                "limits.max_threads_per_block ({}) must be a multiple of limits.warp_size ({})",
                max_threads_per_block, warp_size
            )));
        }
        if display_name.is_empty() {
            display_name = name.clone();
        }

        Ok(Self {
            name,
            display_name,
            arch,
            max_threads_per_block,
            warp_size,
            max_shared_memory_per_block,
            multiprocessors: multiprocessors.max(1),
        })
    }
}

/// A resolved compilation target. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub kind: JitTarget,
    /// Backend target string: `llvm` for the host, `cuda -arch=sm_XX` otherwise.
    pub target_string: String,
    pub device: Device,
    /// Accelerator model; `None` for the host.
    pub model: Option<DeviceModel>,
}

impl Target {
    pub fn resolve(kind: JitTarget, model: &DeviceModel) -> Self {
        match kind {
            JitTarget::Cpu => Self {
                kind,
                target_string: "llvm".to_string(),
                device: Device::cpu(0),
                model: None,
            },
            JitTarget::Cuda => Self {
                kind,
                target_string: format!("cuda -arch={}", model.arch),
                device: Device::cuda(0),
                model: Some(model.clone()),
            },
        }
    }

    pub fn is_accelerator(&self) -> bool {
        self.kind == JitTarget::Cuda
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Some(model) => write!(f, "{} ({}, {})", self.target_string, model.display_name, self.device),
            None => write!(f, "{} ({})", self.target_string, self.device),
        }
    }
}

#[cfg(test)]
mod tests;
