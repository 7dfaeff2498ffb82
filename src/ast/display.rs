//! Rendering of AST nodes: the indented structural dump written to the
//! console during compilation, and source-like text for messages.

use super::{Arg, Constant, Expr, FunctionDef, Keyword, Module, Stmt};
use crate::syntax::span::Spanned;

/// Indented structural dump of a module, `ast.dump` style.
pub fn dump(module: &Module) -> String {
    let node = DumpNode::new("Module").list("body", module.body.iter().map(stmt_node));
    let mut out = String::new();
    node.render(0, &mut out);
    out.push('\n');
    out
}

/// Source-like text of an expression.
pub fn unparse(expr: &Expr) -> String {
    match expr {
        Expr::Name(name) => name.clone(),
        Expr::Constant(c) => constant_repr(c),
        Expr::BinOp { op, left, right } => {
            let prec = op.binding_power().0;
            format!(
                "{} {} {}",
                operand(&left.node, prec, false),
                op.symbol(),
                operand(&right.node, prec, true)
            )
        }
        Expr::UnaryOp { op, operand: inner } => {
            format!("{}{}", op.symbol(), operand(&inner.node, u8::MAX, false))
        }
        Expr::Compare { op, left, right } => {
            format!("{} {} {}", unparse(&left.node), op.symbol(), unparse(&right.node))
        }
        Expr::BoolOp { op, left, right } => format!(
            "{} {} {}",
            unparse(&left.node),
            op.name().to_lowercase(),
            unparse(&right.node)
        ),
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            let mut parts: Vec<String> = args.iter().map(|a| unparse(&a.node)).collect();
            parts.extend(
                keywords
                    .iter()
                    .map(|k| format!("{}={}", k.arg.node, unparse(&k.value.node))),
            );
            format!("{}({})", unparse(&func.node), parts.join(", "))
        }
        Expr::Attribute { value, attr } => format!("{}.{}", unparse(&value.node), attr.node),
        Expr::Subscript { value, index } => {
            format!("{}[{}]", unparse(&value.node), unparse(&index.node))
        }
        Expr::Tuple(elts) => match elts.as_slice() {
            [single] => format!("({},)", unparse(&single.node)),
            _ => format!("({})", join(elts)),
        },
        Expr::List(elts) => format!("[{}]", join(elts)),
    }
}

fn join(elts: &[Spanned<Expr>]) -> String {
    elts.iter()
        .map(|e| unparse(&e.node))
        .collect::<Vec<_>>()
        .join(", ")
}

fn operand(expr: &Expr, parent_prec: u8, right: bool) -> String {
    let text = unparse(expr);
    let needs_parens = match expr {
        Expr::BinOp { op, .. } => {
            let prec = op.binding_power().0;
            prec < parent_prec || (right && prec == parent_prec)
        }
        Expr::Compare { .. } | Expr::BoolOp { .. } => true,
        _ => false,
    };
    if needs_parens {
        format!("({})", text)
    } else {
        text
    }
}

fn constant_repr(c: &Constant) -> String {
    match c {
        Constant::Int(n) => n.to_string(),
        Constant::Float(v) => format!("{:?}", v),
        Constant::Str(s) => format!("'{}'", s.escape_default()),
        Constant::Bool(true) => "True".to_string(),
        Constant::Bool(false) => "False".to_string(),
        Constant::None => "None".to_string(),
    }
}

// --- dump tree ---

enum Field {
    Text(String),
    Node(DumpNode),
    List(Vec<DumpNode>),
}

struct DumpNode {
    kind: &'static str,
    fields: Vec<(&'static str, Field)>,
}

impl DumpNode {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            fields: Vec::new(),
        }
    }

    fn text(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((name, Field::Text(value.into())));
        self
    }

    fn node(mut self, name: &'static str, value: DumpNode) -> Self {
        self.fields.push((name, Field::Node(value)));
        self
    }

    fn opt(self, name: &'static str, value: Option<&Spanned<Expr>>) -> Self {
        match value {
            Some(e) => self.node(name, expr_node(&e.node)),
            None => self.text(name, "None"),
        }
    }

    fn list(mut self, name: &'static str, items: impl Iterator<Item = DumpNode>) -> Self {
        self.fields.push((name, Field::List(items.collect())));
        self
    }

    fn is_flat(&self) -> bool {
        self.fields.iter().all(|(_, f)| match f {
            Field::Text(_) => true,
            Field::List(items) => items.is_empty(),
            Field::Node(_) => false,
        })
    }

    fn render(&self, indent: usize, out: &mut String) {
        if self.is_flat() {
            out.push_str(self.kind);
            out.push('(');
            for (i, (name, field)) in self.fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(name);
                out.push('=');
                match field {
                    Field::Text(t) => out.push_str(t),
                    _ => out.push_str("[]"),
                }
            }
            out.push(')');
            return;
        }

        let pad = "  ".repeat(indent + 1);
        out.push_str(self.kind);
        out.push_str("(\n");
        for (i, (name, field)) in self.fields.iter().enumerate() {
            out.push_str(&pad);
            out.push_str(name);
            out.push('=');
            match field {
                Field::Text(t) => out.push_str(t),
                Field::Node(n) => n.render(indent + 1, out),
                Field::List(items) if items.is_empty() => out.push_str("[]"),
                Field::List(items) => {
                    out.push_str("[\n");
                    let item_pad = "  ".repeat(indent + 2);
                    for (j, item) in items.iter().enumerate() {
                        out.push_str(&item_pad);
                        item.render(indent + 2, out);
                        if j + 1 < items.len() {
                            out.push(',');
                        }
                        out.push('\n');
                    }
                    out.push_str(&pad);
                    out.push(']');
                }
            }
            if i + 1 < self.fields.len() {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str(&"  ".repeat(indent));
        out.push(')');
    }
}

fn stmt_node(stmt: &Spanned<Stmt>) -> DumpNode {
    match &stmt.node {
        Stmt::FunctionDef(def) => function_node(def),
        Stmt::Assign { targets, value } => DumpNode::new("Assign")
            .list("targets", targets.iter().map(|t| expr_node(&t.node)))
            .node("value", expr_node(&value.node)),
        Stmt::AugAssign { target, op, value } => DumpNode::new("AugAssign")
            .node("target", expr_node(&target.node))
            .text("op", format!("{}()", op.name()))
            .node("value", expr_node(&value.node)),
        Stmt::Return(value) => DumpNode::new("Return").opt("value", value.as_ref()),
        Stmt::Pass => DumpNode::new("Pass"),
        Stmt::Expr(value) => DumpNode::new("Expr").node("value", expr_node(&value.node)),
        Stmt::If { test, body, orelse } => DumpNode::new("If")
            .node("test", expr_node(&test.node))
            .list("body", body.iter().map(stmt_node))
            .list("orelse", orelse.iter().map(stmt_node)),
        Stmt::While { test, body } => DumpNode::new("While")
            .node("test", expr_node(&test.node))
            .list("body", body.iter().map(stmt_node)),
        Stmt::For { target, iter, body } => DumpNode::new("For")
            .node("target", expr_node(&target.node))
            .node("iter", expr_node(&iter.node))
            .list("body", body.iter().map(stmt_node)),
    }
}

fn function_node(def: &FunctionDef) -> DumpNode {
    DumpNode::new("FunctionDef")
        .text("name", format!("'{}'", def.name.node))
        .list("args", def.args.iter().map(arg_node))
        .list("body", def.body.iter().map(stmt_node))
        .list("decorator_list", def.decorators.iter().map(|d| expr_node(&d.node)))
        .opt("returns", def.returns.as_ref())
}

fn arg_node(arg: &Arg) -> DumpNode {
    DumpNode::new("arg")
        .text("arg", format!("'{}'", arg.name.node))
        .opt("annotation", arg.annotation.as_ref())
}

fn keyword_node(kw: &Keyword) -> DumpNode {
    DumpNode::new("keyword")
        .text("arg", format!("'{}'", kw.arg.node))
        .node("value", expr_node(&kw.value.node))
}

fn expr_node(expr: &Expr) -> DumpNode {
    match expr {
        Expr::Name(id) => DumpNode::new("Name").text("id", format!("'{}'", id)),
        Expr::Constant(c) => DumpNode::new("Constant").text("value", constant_repr(c)),
        Expr::BinOp { op, left, right } => DumpNode::new("BinOp")
            .node("left", expr_node(&left.node))
            .text("op", format!("{}()", op.name()))
            .node("right", expr_node(&right.node)),
        Expr::UnaryOp { op, operand } => DumpNode::new("UnaryOp")
            .text("op", format!("{}()", op.name()))
            .node("operand", expr_node(&operand.node)),
        Expr::Compare { op, left, right } => DumpNode::new("Compare")
            .node("left", expr_node(&left.node))
            .text("op", format!("{}()", op.name()))
            .node("right", expr_node(&right.node)),
        Expr::BoolOp { op, left, right } => DumpNode::new("BoolOp")
            .text("op", format!("{}()", op.name()))
            .node("left", expr_node(&left.node))
            .node("right", expr_node(&right.node)),
        Expr::Call {
            func,
            args,
            keywords,
        } => DumpNode::new("Call")
            .node("func", expr_node(&func.node))
            .list("args", args.iter().map(|a| expr_node(&a.node)))
            .list("keywords", keywords.iter().map(keyword_node)),
        Expr::Attribute { value, attr } => DumpNode::new("Attribute")
            .node("value", expr_node(&value.node))
            .text("attr", format!("'{}'", attr.node)),
        Expr::Subscript { value, index } => DumpNode::new("Subscript")
            .node("value", expr_node(&value.node))
            .node("slice", expr_node(&index.node)),
        Expr::Tuple(elts) => {
            DumpNode::new("Tuple").list("elts", elts.iter().map(|e| expr_node(&e.node)))
        }
        Expr::List(elts) => {
            DumpNode::new("List").list("elts", elts.iter().map(|e| expr_node(&e.node)))
        }
    }
}
