//! Tensor data model: descriptors, scalars, device arrays, and the data
//! binding surface used by callers.

pub mod exchange;
pub mod ndarray;

pub use exchange::{ForeignArray, Tensor, TensorSource};
pub use ndarray::{Buffer, Device, DeviceKind, Element, NDArray};

use std::fmt;

/// Element type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    Float32,
    Float64,
    Int32,
    Int64,
}

impl DType {
    pub const ALL: [DType; 4] = [DType::Float32, DType::Float64, DType::Int32, DType::Int64];

    /// Parse a numpy-style dtype string.
    pub fn parse(s: &str) -> Option<DType> {
        match s {
            "float32" => Some(DType::Float32),
            "float64" => Some(DType::Float64),
            "int32" => Some(DType::Int32),
            "int64" => Some(DType::Int64),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
        }
    }

    pub fn size_bytes(self) -> usize {
        match self {
            DType::Float32 | DType::Int32 => 4,
            DType::Float64 | DType::Int64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    /// C spelling used by generated kernel source.
    pub fn c_type(self) -> &'static str {
        match self {
            DType::Float32 => "float",
            DType::Float64 => "double",
            DType::Int32 => "int",
            DType::Int64 => "long long",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape and dtype contract of a tensor. The empty shape is a scalar.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TensorDescriptor {
    pub shape: Vec<usize>,
    pub dtype: DType,
}

impl TensorDescriptor {
    pub fn new(shape: impl Into<Vec<usize>>, dtype: DType) -> Self {
        Self {
            shape: shape.into(),
            dtype,
        }
    }

    pub fn scalar(dtype: DType) -> Self {
        Self::new(Vec::new(), dtype)
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    pub fn with_dtype(&self, dtype: DType) -> Self {
        Self::new(self.shape.clone(), dtype)
    }

    /// Shape text as a tuple, `(2, 3)`, `(4,)` or `()`.
    pub fn shape_str(&self) -> String {
        match self.shape.as_slice() {
            [] => "()".to_string(),
            [d] => format!("({},)", d),
            dims => {
                let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
                format!("({})", parts.join(", "))
            }
        }
    }
}

impl fmt::Display for TensorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(shape={}, dtype={})", self.shape_str(), self.dtype)
    }
}

/// Numpy broadcasting of two shapes; `None` if they are incompatible.
pub fn broadcast_shapes(lhs: &[usize], rhs: &[usize]) -> Option<Vec<usize>> {
    let ndim = lhs.len().max(rhs.len());
    let mut out = vec![0; ndim];
    for i in 0..ndim {
        let l = lhs.len().checked_sub(ndim - i).map_or(1, |k| lhs[k]);
        let r = rhs.len().checked_sub(ndim - i).map_or(1, |k| rhs[k]);
        out[i] = match (l, r) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            _ => return None,
        };
    }
    Some(out)
}

/// A single typed value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    F32(f32),
    F64(f64),
    I32(i32),
    I64(i64),
}

impl Scalar {
    pub fn dtype(self) -> DType {
        match self {
            Scalar::F32(_) => DType::Float32,
            Scalar::F64(_) => DType::Float64,
            Scalar::I32(_) => DType::Int32,
            Scalar::I64(_) => DType::Int64,
        }
    }

    pub fn zero(dtype: DType) -> Self {
        Scalar::from_i64(0, dtype)
    }

    pub fn from_f64(v: f64, dtype: DType) -> Self {
        match dtype {
            DType::Float32 => Scalar::F32(v as f32),
            DType::Float64 => Scalar::F64(v),
            DType::Int32 => Scalar::I32(v as i32),
            DType::Int64 => Scalar::I64(v as i64),
        }
    }

    pub fn from_i64(v: i64, dtype: DType) -> Self {
        match dtype {
            DType::Float32 => Scalar::F32(v as f32),
            DType::Float64 => Scalar::F64(v as f64),
            DType::Int32 => Scalar::I32(v as i32),
            DType::Int64 => Scalar::I64(v),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::F32(v) => v as f64,
            Scalar::F64(v) => v,
            Scalar::I32(v) => v as f64,
            Scalar::I64(v) => v as f64,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Scalar::F32(v) => v as i64,
            Scalar::F64(v) => v as i64,
            Scalar::I32(v) => v as i64,
            Scalar::I64(v) => v,
        }
    }

    pub fn cast(self, dtype: DType) -> Self {
        if self.dtype().is_float() {
            Scalar::from_f64(self.as_f64(), dtype)
        } else {
            Scalar::from_i64(self.as_i64(), dtype)
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::F32(v) => write!(f, "{}", format_float(*v)),
            Scalar::F64(v) => write!(f, "{}", format_float(*v)),
            Scalar::I32(v) => write!(f, "{}", v),
            Scalar::I64(v) => write!(f, "{}", v),
        }
    }
}

/// Numpy-style float text: `3.`, `2.5`, `inf`, `nan`.
pub fn format_float<T>(value: T) -> String
where
    T: Copy + fmt::Display + Into<f64>,
{
    let v: f64 = value.into();
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{}.", v as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_round_trips_through_strings() {
        for dtype in DType::ALL {
            assert_eq!(DType::parse(dtype.as_str()), Some(dtype));
        }
        assert_eq!(DType::parse("bfloat16"), None);
    }

    #[test]
    fn test_descriptor_text() {
        let desc = TensorDescriptor::new(vec![2, 3], DType::Float32);
        assert_eq!(desc.to_string(), "Tensor(shape=(2, 3), dtype=float32)");
        assert_eq!(desc.numel(), 6);
        assert_eq!(TensorDescriptor::new(vec![4], DType::Int32).shape_str(), "(4,)");
        assert!(TensorDescriptor::scalar(DType::Int64).is_scalar());
        assert_eq!(TensorDescriptor::scalar(DType::Int64).numel(), 1);
    }

    #[test]
    fn test_broadcast_shapes() {
        assert_eq!(broadcast_shapes(&[2, 3], &[2, 3]), Some(vec![2, 3]));
        assert_eq!(broadcast_shapes(&[2, 3], &[]), Some(vec![2, 3]));
        assert_eq!(broadcast_shapes(&[2, 1], &[1, 3]), Some(vec![2, 3]));
        assert_eq!(broadcast_shapes(&[3], &[4, 3]), Some(vec![4, 3]));
        assert_eq!(broadcast_shapes(&[2, 3], &[3, 2]), None);
    }

    #[test]
    fn test_scalar_casts() {
        assert_eq!(Scalar::I64(3).cast(DType::Float32), Scalar::F32(3.0));
        assert_eq!(Scalar::F64(2.7).cast(DType::Int32), Scalar::I32(2));
        assert_eq!(Scalar::zero(DType::Int64), Scalar::I64(0));
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_float(3.0), "3.");
        assert_eq!(format_float(-2.0), "-2.");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(Scalar::F32(0.5).to_string(), "0.5");
        assert_eq!(Scalar::I64(0).to_string(), "0");
    }
}
