pub mod display;

pub use display::{dump, unparse};

use crate::syntax::span::Spanned;

/// A parsed source fragment: the extracted text of one decorated function.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub body: Vec<Spanned<Stmt>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: Spanned<String>,
    pub decorators: Vec<Spanned<Expr>>,
    pub args: Vec<Arg>,
    pub returns: Option<Spanned<Expr>>,
    pub body: Vec<Spanned<Stmt>>,
}

/// A positional parameter, `name: annotation`.
#[derive(Clone, Debug, PartialEq)]
pub struct Arg {
    pub name: Spanned<String>,
    pub annotation: Option<Spanned<Expr>>,
}

/// Statements. The sub-language only lowers a handful of these; the rest
/// are parsed so that they can be rejected with a precise location.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    FunctionDef(FunctionDef),
    /// `a = b = value`: one entry in `targets` per `=`.
    Assign {
        targets: Vec<Spanned<Expr>>,
        value: Spanned<Expr>,
    },
    AugAssign {
        target: Spanned<Expr>,
        op: Operator,
        value: Spanned<Expr>,
    },
    Return(Option<Spanned<Expr>>),
    Pass,
    Expr(Spanned<Expr>),
    If {
        test: Spanned<Expr>,
        body: Vec<Spanned<Stmt>>,
        orelse: Vec<Spanned<Stmt>>,
    },
    While {
        test: Spanned<Expr>,
        body: Vec<Spanned<Stmt>>,
    },
    For {
        target: Spanned<Expr>,
        iter: Spanned<Expr>,
        body: Vec<Spanned<Stmt>>,
    },
}

impl Stmt {
    /// Node kind name as shown in dumps and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Stmt::FunctionDef(_) => "FunctionDef",
            Stmt::Assign { .. } => "Assign",
            Stmt::AugAssign { .. } => "AugAssign",
            Stmt::Return(_) => "Return",
            Stmt::Pass => "Pass",
            Stmt::Expr(_) => "Expr",
            Stmt::If { .. } => "If",
            Stmt::While { .. } => "While",
            Stmt::For { .. } => "For",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Name(String),
    Constant(Constant),
    BinOp {
        op: Operator,
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Spanned<Expr>>,
    },
    Compare {
        op: CmpOperator,
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },
    BoolOp {
        op: BoolOperator,
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },
    Call {
        func: Box<Spanned<Expr>>,
        args: Vec<Spanned<Expr>>,
        keywords: Vec<Keyword>,
    },
    Attribute {
        value: Box<Spanned<Expr>>,
        attr: Spanned<String>,
    },
    Subscript {
        value: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
    Tuple(Vec<Spanned<Expr>>),
    List(Vec<Spanned<Expr>>),
}

impl Expr {
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Name(_) => "Name",
            Expr::Constant(_) => "Constant",
            Expr::BinOp { .. } => "BinOp",
            Expr::UnaryOp { .. } => "UnaryOp",
            Expr::Compare { .. } => "Compare",
            Expr::BoolOp { .. } => "BoolOp",
            Expr::Call { .. } => "Call",
            Expr::Attribute { .. } => "Attribute",
            Expr::Subscript { .. } => "Subscript",
            Expr::Tuple(_) => "Tuple",
            Expr::List(_) => "List",
        }
    }

    /// Dotted path of a `Name` / `Attribute` chain, e.g. `tcl.Tensor`.
    pub fn dotted_path(&self) -> Option<String> {
        match self {
            Expr::Name(name) => Some(name.clone()),
            Expr::Attribute { value, attr } => {
                let base = value.node.dotted_path()?;
                Some(format!("{}.{}", base, attr.node))
            }
            _ => None,
        }
    }
}

/// `name=value` argument of a call.
#[derive(Clone, Debug, PartialEq)]
pub struct Keyword {
    pub arg: Spanned<String>,
    pub value: Spanned<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl Operator {
    pub fn name(self) -> &'static str {
        match self {
            Operator::Add => "Add",
            Operator::Sub => "Sub",
            Operator::Mult => "Mult",
            Operator::MatMult => "MatMult",
            Operator::Div => "Div",
            Operator::FloorDiv => "FloorDiv",
            Operator::Mod => "Mod",
            Operator::Pow => "Pow",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mult => "*",
            Operator::MatMult => "@",
            Operator::Div => "/",
            Operator::FloorDiv => "//",
            Operator::Mod => "%",
            Operator::Pow => "**",
        }
    }

    /// (left, right) binding power. Higher binds tighter.
    pub fn binding_power(self) -> (u8, u8) {
        match self {
            Operator::Add | Operator::Sub => (9, 10),
            Operator::Mult
            | Operator::MatMult
            | Operator::Div
            | Operator::FloorDiv
            | Operator::Mod => (11, 12),
            // right-associative, and tighter than unary minus on its left
            Operator::Pow => (16, 15),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
    Pos,
    Not,
}

impl UnaryOperator {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOperator::Neg => "USub",
            UnaryOperator::Pos => "UAdd",
            UnaryOperator::Not => "Not",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Neg => "-",
            UnaryOperator::Pos => "+",
            UnaryOperator::Not => "not ",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl CmpOperator {
    pub fn name(self) -> &'static str {
        match self {
            CmpOperator::Eq => "Eq",
            CmpOperator::NotEq => "NotEq",
            CmpOperator::Lt => "Lt",
            CmpOperator::LtE => "LtE",
            CmpOperator::Gt => "Gt",
            CmpOperator::GtE => "GtE",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOperator::Eq => "==",
            CmpOperator::NotEq => "!=",
            CmpOperator::Lt => "<",
            CmpOperator::LtE => "<=",
            CmpOperator::Gt => ">",
            CmpOperator::GtE => ">=",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

impl BoolOperator {
    pub fn name(self) -> &'static str {
        match self {
            BoolOperator::And => "And",
            BoolOperator::Or => "Or",
        }
    }
}

/// Binding powers of the non-arithmetic infix operators.
pub(crate) const OR_BP: (u8, u8) = (1, 2);
pub(crate) const AND_BP: (u8, u8) = (3, 4);
pub(crate) const NOT_BP: u8 = 5;
pub(crate) const CMP_BP: (u8, u8) = (7, 8);
pub(crate) const UNARY_BP: u8 = 13;
