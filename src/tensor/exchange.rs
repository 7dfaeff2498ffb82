//! Binding caller data to declared tensors.
//!
//! A source either hands over its array without copying, or the binder
//! falls back to a host copy that is then uploaded to the source's device.

use super::ndarray::{Buffer, Device, Element, NDArray};
use super::{DType, TensorDescriptor};
use crate::error::{JitError, Result};

/// Anything that can provide tensor data.
pub trait TensorSource {
    fn device(&self) -> Device;

    /// Zero-copy export of the backing array, if this source supports it.
    fn export(&self) -> Option<NDArray>;

    /// A host-memory copy of the data.
    fn to_host(&self) -> Result<NDArray>;
}

impl TensorSource for NDArray {
    fn device(&self) -> Device {
        NDArray::device(self)
    }

    fn export(&self) -> Option<NDArray> {
        Some(self.clone())
    }

    fn to_host(&self) -> Result<NDArray> {
        Ok(self.copy_to(Device::cpu(0)))
    }
}

/// Raw bytes with a shape and dtype, produced outside this crate. It has
/// no exchange capability, so binding always goes through a host copy.
#[derive(Clone, Debug)]
pub struct ForeignArray {
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub bytes: Vec<u8>,
    pub device: Device,
}

impl ForeignArray {
    pub fn from_slice<T: Element>(shape: Vec<usize>, data: &[T]) -> Self {
        Self {
            shape,
            dtype: T::DTYPE,
            bytes: bytemuck::cast_slice(data).to_vec(),
            device: Device::cpu(0),
        }
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }
}

impl TensorSource for ForeignArray {
    fn device(&self) -> Device {
        self.device
    }

    fn export(&self) -> Option<NDArray> {
        None
    }

    fn to_host(&self) -> Result<NDArray> {
        let buffer = Buffer::from_bytes(self.dtype, &self.bytes).ok_or_else(|| {
            JitError::binding(format!(
                "{} bytes do not hold whole {} elements",
                self.bytes.len(),
                self.dtype
            ))
        })?;
        NDArray::from_buffer(self.shape.clone(), buffer, Device::cpu(0))
    }
}

/// A declared tensor plus the data currently bound to it.
#[derive(Clone, Debug)]
pub struct Tensor {
    desc: TensorDescriptor,
    data: Option<NDArray>,
}

impl Tensor {
    pub fn new(desc: TensorDescriptor) -> Self {
        Self { desc, data: None }
    }

    /// Declare a tensor matching `array` and bind it without copying.
    pub fn from_array(array: NDArray) -> Self {
        Self {
            desc: array.descriptor().clone(),
            data: Some(array),
        }
    }

    pub fn descriptor(&self) -> &TensorDescriptor {
        &self.desc
    }

    /// Bind data. The bound array must match the declared shape and dtype.
    pub fn set_data(&mut self, source: &dyn TensorSource) -> Result<()> {
        let array = match source.export() {
            Some(array) => array,
            None => source.to_host()?.copy_to(source.device()),
        };
        if array.shape() != self.desc.shape.as_slice() {
            return Err(JitError::binding(format!(
                "data shape {} does not match tensor shape {}",
                array.descriptor().shape_str(),
                self.desc.shape_str()
            )));
        }
        if array.dtype() != self.desc.dtype {
            return Err(JitError::binding(format!(
                "data dtype {} does not match tensor dtype {}",
                array.dtype(),
                self.desc.dtype
            )));
        }
        self.data = Some(array);
        Ok(())
    }

    pub fn data(&self) -> Result<&NDArray> {
        self.data
            .as_ref()
            .ok_or_else(|| JitError::binding(format!("no data bound to {}", self.desc)))
    }
}
