use std::fmt;
use std::sync::Arc;

use super::{format_float, DType, Scalar, TensorDescriptor};
use crate::error::{JitError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Cpu,
    Cuda,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Cpu => "cpu",
            DeviceKind::Cuda => "cuda",
        }
    }
}

/// A device handle: kind plus ordinal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Device {
    pub kind: DeviceKind,
    pub index: u32,
}

impl Device {
    pub fn cpu(index: u32) -> Self {
        Self {
            kind: DeviceKind::Cpu,
            index,
        }
    }

    pub fn cuda(index: u32) -> Self {
        Self {
            kind: DeviceKind::Cuda,
            index,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind.as_str(), self.index)
    }
}

/// Typed element storage.
#[derive(Clone, Debug, PartialEq)]
pub enum Buffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

impl Buffer {
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::Float32 => Buffer::F32(vec![0.0; len]),
            DType::Float64 => Buffer::F64(vec![0.0; len]),
            DType::Int32 => Buffer::I32(vec![0; len]),
            DType::Int64 => Buffer::I64(vec![0; len]),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Buffer::F32(_) => DType::Float32,
            Buffer::F64(_) => DType::Float64,
            Buffer::I32(_) => DType::Int32,
            Buffer::I64(_) => DType::Int64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Buffer::F32(v) => v.len(),
            Buffer::F64(v) => v.len(),
            Buffer::I32(v) => v.len(),
            Buffer::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Scalar {
        match self {
            Buffer::F32(v) => Scalar::F32(v[i]),
            Buffer::F64(v) => Scalar::F64(v[i]),
            Buffer::I32(v) => Scalar::I32(v[i]),
            Buffer::I64(v) => Scalar::I64(v[i]),
        }
    }

    /// Raw little-endian bytes of the elements.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Buffer::F32(v) => bytemuck::cast_slice(v),
            Buffer::F64(v) => bytemuck::cast_slice(v),
            Buffer::I32(v) => bytemuck::cast_slice(v),
            Buffer::I64(v) => bytemuck::cast_slice(v),
        }
    }

    /// Decode raw bytes; the length must be a multiple of the element size.
    pub fn from_bytes(dtype: DType, bytes: &[u8]) -> Option<Self> {
        if bytes.len() % dtype.size_bytes() != 0 {
            return None;
        }
        let buffer = match dtype {
            DType::Float32 => Buffer::F32(decode(bytes)),
            DType::Float64 => Buffer::F64(decode(bytes)),
            DType::Int32 => Buffer::I32(decode(bytes)),
            DType::Int64 => Buffer::I64(decode(bytes)),
        };
        Some(buffer)
    }
}

fn decode<T: bytemuck::Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned::<T>)
        .collect()
}

/// Rust element types that map onto a [`DType`].
pub trait Element: bytemuck::Pod + fmt::Debug {
    const DTYPE: DType;
    fn into_buffer(data: Vec<Self>) -> Buffer;
    fn view(buffer: &Buffer) -> Option<&[Self]>;
}

macro_rules! element {
    ($ty:ty, $dtype:ident, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;

            fn into_buffer(data: Vec<Self>) -> Buffer {
                Buffer::$variant(data)
            }

            fn view(buffer: &Buffer) -> Option<&[Self]> {
                match buffer {
                    Buffer::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

element!(f32, Float32, F32);
element!(f64, Float64, F64);
element!(i32, Int32, I32);
element!(i64, Int64, I64);

/// A dense, row-major array resident on a device. Clones share storage.
#[derive(Clone, Debug)]
pub struct NDArray {
    desc: TensorDescriptor,
    device: Device,
    storage: Arc<Buffer>,
}

impl NDArray {
    /// Wrap a buffer whose length and dtype agree with `shape`.
    pub fn from_buffer(shape: Vec<usize>, buffer: Buffer, device: Device) -> Result<Self> {
        let desc = TensorDescriptor::new(shape, buffer.dtype());
        if desc.numel() != buffer.len() {
            return Err(JitError::binding(format!(
                "shape {} needs {} elements, buffer has {}",
                desc.shape_str(),
                desc.numel(),
                buffer.len()
            )));
        }
        Ok(Self {
            desc,
            device,
            storage: Arc::new(buffer),
        })
    }

    pub fn from_vec<T: Element>(shape: Vec<usize>, data: Vec<T>, device: Device) -> Result<Self> {
        Self::from_buffer(shape, T::into_buffer(data), device)
    }

    /// Every element set to `value`, converted to the descriptor dtype.
    pub fn full(desc: &TensorDescriptor, value: f64, device: Device) -> Self {
        let n = desc.numel();
        let buffer = match desc.dtype {
            DType::Float32 => Buffer::F32(vec![value as f32; n]),
            DType::Float64 => Buffer::F64(vec![value; n]),
            DType::Int32 => Buffer::I32(vec![value as i32; n]),
            DType::Int64 => Buffer::I64(vec![value as i64; n]),
        };
        Self {
            desc: desc.clone(),
            device,
            storage: Arc::new(buffer),
        }
    }

    pub fn ones(desc: &TensorDescriptor, device: Device) -> Self {
        Self::full(desc, 1.0, device)
    }

    pub fn zeros(desc: &TensorDescriptor, device: Device) -> Self {
        Self::full(desc, 0.0, device)
    }

    /// 0-d array holding one value.
    pub fn scalar(value: Scalar, device: Device) -> Self {
        let buffer = match value {
            Scalar::F32(v) => Buffer::F32(vec![v]),
            Scalar::F64(v) => Buffer::F64(vec![v]),
            Scalar::I32(v) => Buffer::I32(vec![v]),
            Scalar::I64(v) => Buffer::I64(vec![v]),
        };
        Self {
            desc: TensorDescriptor::scalar(value.dtype()),
            device,
            storage: Arc::new(buffer),
        }
    }

    pub fn descriptor(&self) -> &TensorDescriptor {
        &self.desc
    }

    pub fn shape(&self) -> &[usize] {
        &self.desc.shape
    }

    pub fn dtype(&self) -> DType {
        self.desc.dtype
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn numel(&self) -> usize {
        self.desc.numel()
    }

    pub fn buffer(&self) -> &Buffer {
        &self.storage
    }

    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::view(&self.storage)
    }

    pub fn get(&self, flat_index: usize) -> Scalar {
        self.storage.get(flat_index)
    }

    /// The single value of a 0-d or one-element array.
    pub fn item(&self) -> Option<Scalar> {
        (self.numel() == 1).then(|| self.get(0))
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        (0..self.numel()).map(|i| self.get(i).as_f64()).collect()
    }

    /// Copy to `device`. The result never shares storage with `self`.
    pub fn copy_to(&self, device: Device) -> Self {
        Self {
            desc: self.desc.clone(),
            device,
            storage: Arc::new(self.storage.as_ref().clone()),
        }
    }

    pub fn shares_storage(&self, other: &NDArray) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Element-wise comparison within an absolute tolerance.
    pub fn allclose(&self, other: &NDArray, atol: f64) -> bool {
        self.shape() == other.shape()
            && self
                .to_f64_vec()
                .iter()
                .zip(other.to_f64_vec())
                .all(|(a, b)| (a - b).abs() <= atol)
    }

    fn element_text(&self, i: usize) -> String {
        match self.get(i) {
            Scalar::F32(v) => format_float(v),
            Scalar::F64(v) => format_float(v),
            other => other.to_string(),
        }
    }
}

/// Numpy-style `str()` rendering.
impl fmt::Display for NDArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let texts: Vec<String> = (0..self.numel()).map(|i| self.element_text(i)).collect();
        if self.desc.is_scalar() {
            return f.write_str(texts.first().map(String::as_str).unwrap_or(""));
        }
        let width = texts.iter().map(|t| t.len()).max().unwrap_or(0);
        let mut out = String::new();
        render_axis(&self.desc.shape, 0, 0, &texts, width, &mut out);
        f.write_str(&out)
    }
}

fn render_axis(
    shape: &[usize],
    axis: usize,
    offset: usize,
    texts: &[String],
    width: usize,
    out: &mut String,
) {
    out.push('[');
    let stride: usize = shape[axis + 1..].iter().product();
    let remaining = shape.len() - axis - 1;
    for i in 0..shape[axis] {
        if i > 0 {
            if remaining == 0 {
                out.push(' ');
            } else {
                out.push_str(&"\n".repeat(remaining));
                out.push_str(&" ".repeat(axis + 1));
            }
        }
        if remaining == 0 {
            out.push_str(&format!("{:>width$}", texts[offset + i], width = width));
        } else {
            render_axis(shape, axis + 1, offset + i * stride, texts, width, out);
        }
    }
    out.push(']');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_checks_element_count() {
        let ok = NDArray::from_vec(vec![2, 2], vec![1.0f32, 2.0, 3.0, 4.0], Device::cpu(0));
        assert!(ok.is_ok());
        let err = NDArray::from_vec(vec![2, 3], vec![1i64, 2], Device::cpu(0)).unwrap_err();
        assert!(matches!(err, JitError::BindingMismatch { .. }));
    }

    #[test]
    fn test_clone_shares_and_copy_does_not() {
        let desc = TensorDescriptor::new(vec![3], DType::Float32);
        let a = NDArray::ones(&desc, Device::cpu(0));
        let b = a.clone();
        let c = a.copy_to(Device::cuda(0));
        assert!(a.shares_storage(&b));
        assert!(!a.shares_storage(&c));
        assert_eq!(c.device(), Device::cuda(0));
        assert_eq!(c.as_slice::<f32>(), Some(&[1.0f32, 1.0, 1.0][..]));
    }

    #[test]
    fn test_bytes_round_trip_through_bytemuck() {
        let buffer = Buffer::I32(vec![1, -2, 3]);
        let bytes = buffer.as_bytes().to_vec();
        assert_eq!(bytes.len(), 12);
        assert_eq!(Buffer::from_bytes(DType::Int32, &bytes), Some(buffer));
        assert_eq!(Buffer::from_bytes(DType::Int64, &bytes[..7]), None);
    }

    #[test]
    fn test_numpy_style_display() {
        let desc = TensorDescriptor::new(vec![2, 3], DType::Float32);
        let a = NDArray::full(&desc, 3.0, Device::cpu(0));
        assert_eq!(a.to_string(), "[[3. 3. 3.]\n [3. 3. 3.]]");

        let v = NDArray::from_vec(vec![3], vec![1.5f64, 10.0, -2.0], Device::cpu(0)).unwrap();
        assert_eq!(v.to_string(), "[1.5 10. -2.]");

        let s = NDArray::scalar(Scalar::I64(0), Device::cpu(0));
        assert_eq!(s.to_string(), "0");
    }

    #[test]
    fn test_three_dimensional_display() {
        let desc = TensorDescriptor::new(vec![2, 1, 2], DType::Int32);
        let a = NDArray::full(&desc, 7.0, Device::cpu(0));
        assert_eq!(a.to_string(), "[[[7 7]]\n\n [[7 7]]]");
    }
}
