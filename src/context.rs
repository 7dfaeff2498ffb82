//! Name-resolution context for parameter annotations.
//!
//! Annotations are ordinary expressions such as
//! `Tensor(shape=(N, 3), dtype="float32")`; they are evaluated against the
//! bindings of the function's defining scope, which the caller supplies.

use std::collections::BTreeMap;

use crate::ast::{Constant, Expr, Operator};
use crate::error::{JitError, Result};
use crate::syntax::span::Spanned;
use crate::tensor::{DType, TensorDescriptor};

/// A value visible to annotation expressions.
#[derive(Clone, Debug, PartialEq)]
pub enum ContextValue {
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<ContextValue>),
    Descriptor(TensorDescriptor),
    /// The descriptor constructor, `Tensor(shape, dtype)`.
    TensorType,
    Namespace(BTreeMap<String, ContextValue>),
}

impl ContextValue {
    fn kind(&self) -> &'static str {
        match self {
            ContextValue::Int(_) => "int",
            ContextValue::Float(_) => "float",
            ContextValue::Str(_) => "str",
            ContextValue::Tuple(_) => "tuple",
            ContextValue::Descriptor(_) => "Tensor",
            ContextValue::TensorType => "type",
            ContextValue::Namespace(_) => "module",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Context {
    globals: BTreeMap<String, ContextValue>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context holding the prelude: `Tensor` and the `tcl` namespace.
    pub fn new() -> Self {
        let mut tcl = BTreeMap::new();
        tcl.insert("Tensor".to_string(), ContextValue::TensorType);
        let mut globals = BTreeMap::new();
        globals.insert("Tensor".to_string(), ContextValue::TensorType);
        globals.insert("tcl".to_string(), ContextValue::Namespace(tcl));
        Self { globals }
    }

    pub fn empty() -> Self {
        Self {
            globals: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: ContextValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ContextValue) {
        self.globals.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.globals.get(name)
    }

    /// Evaluate the annotation of parameter `param` to a descriptor.
    pub fn eval_descriptor(&self, param: &str, annotation: &Spanned<Expr>) -> Result<TensorDescriptor> {
        let missing = |reason: String| JitError::MissingAnnotation {
            param: param.to_string(),
            reason,
            span: annotation.span,
        };
        match self.eval(annotation).map_err(missing)? {
            ContextValue::Descriptor(desc) => Ok(desc),
            other => Err(missing(format!(
                "annotation evaluates to a {}, not a tensor descriptor",
                other.kind()
            ))),
        }
    }

    /// Evaluate an expression; the error is a human-readable reason.
    pub fn eval(&self, expr: &Spanned<Expr>) -> std::result::Result<ContextValue, String> {
        match &expr.node {
            Expr::Name(name) => self
                .globals
                .get(name)
                .cloned()
                .ok_or_else(|| format!("name '{}' is not defined", name)),
            Expr::Constant(Constant::Int(n)) => Ok(ContextValue::Int(*n)),
            Expr::Constant(Constant::Float(v)) => Ok(ContextValue::Float(*v)),
            Expr::Constant(Constant::Str(s)) => Ok(ContextValue::Str(s.clone())),
            Expr::Tuple(elts) | Expr::List(elts) => elts
                .iter()
                .map(|e| self.eval(e))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(ContextValue::Tuple),
            Expr::Attribute { value, attr } => match self.eval(value)? {
                ContextValue::Namespace(members) => members
                    .get(&attr.node)
                    .cloned()
                    .ok_or_else(|| format!("module has no attribute '{}'", attr.node)),
                other => Err(format!("'{}' object has no attribute '{}'", other.kind(), attr.node)),
            },
            Expr::BinOp { op, left, right } => {
                let (l, r) = (self.eval(left)?, self.eval(right)?);
                int_arith(*op, &l, &r)
            }
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                let callee = self.eval(func)?;
                if callee != ContextValue::TensorType {
                    return Err(format!("'{}' object is not callable", callee.kind()));
                }
                let mut shape = None;
                let mut dtype = None;
                match args.as_slice() {
                    [] => {}
                    [s] => shape = Some(self.eval(s)?),
                    [s, d] => {
                        shape = Some(self.eval(s)?);
                        dtype = Some(self.eval(d)?);
                    }
                    _ => return Err("Tensor() takes at most 2 positional arguments".to_string()),
                }
                for kw in keywords {
                    let slot = match kw.arg.node.as_str() {
                        "shape" => &mut shape,
                        "dtype" => &mut dtype,
                        other => return Err(format!("Tensor() got an unexpected keyword argument '{}'", other)),
                    };
                    if slot.is_some() {
                        return Err(format!("Tensor() got multiple values for argument '{}'", kw.arg.node));
                    }
                    *slot = Some(self.eval(&kw.value)?);
                }
                let shape = shape.ok_or("Tensor() missing argument 'shape'")?;
                let dtype = dtype.ok_or("Tensor() missing argument 'dtype'")?;
                Ok(ContextValue::Descriptor(TensorDescriptor::new(
                    eval_shape(&shape)?,
                    eval_dtype(&dtype)?,
                )))
            }
            other => Err(format!("{} expressions are not supported in annotations", other.kind())),
        }
    }
}

fn int_arith(op: Operator, l: &ContextValue, r: &ContextValue) -> std::result::Result<ContextValue, String> {
    let (ContextValue::Int(a), ContextValue::Int(b)) = (l, r) else {
        return Err(format!(
            "unsupported operand types for {}: '{}' and '{}'",
            op.symbol(),
            l.kind(),
            r.kind()
        ));
    };
    let value = match op {
        Operator::Add => a.checked_add(*b),
        Operator::Sub => a.checked_sub(*b),
        Operator::Mult => a.checked_mul(*b),
        Operator::FloorDiv if *b != 0 => Some(a.div_euclid(*b)),
        Operator::FloorDiv => return Err("integer division by zero".to_string()),
        other => return Err(format!("operator {} is not supported in annotations", other.symbol())),
    };
    value
        .map(ContextValue::Int)
        .ok_or_else(|| "integer overflow in annotation".to_string())
}

fn eval_shape(value: &ContextValue) -> std::result::Result<Vec<usize>, String> {
    let dims = match value {
        ContextValue::Int(n) => vec![ContextValue::Int(*n)],
        ContextValue::Tuple(items) => items.clone(),
        other => return Err(format!("shape must be a tuple of integers, got {}", other.kind())),
    };
    dims.iter()
        .map(|d| match d {
            ContextValue::Int(n) if *n > 0 => Ok(*n as usize),
            ContextValue::Int(n) => Err(format!("shape dimensions must be positive, got {}", n)),
            other => Err(format!("shape dimensions must be integers, got {}", other.kind())),
        })
        .collect()
}

fn eval_dtype(value: &ContextValue) -> std::result::Result<DType, String> {
    match value {
        ContextValue::Str(s) => DType::parse(s).ok_or_else(|| {
            format!("unknown dtype '{}' (expected float32, float64, int32, or int64)", s)
        }),
        other => Err(format!("dtype must be a string, got {}", other.kind())),
    }
}
