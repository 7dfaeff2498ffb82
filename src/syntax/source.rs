//! Locating kernel functions inside a larger source file.
//!
//! A host file may contain arbitrary code around the decorated functions,
//! so extraction works on lines and only the extracted function text is
//! handed to the parser.

use crate::ast::{Constant, Expr, Stmt};
use crate::config::target::JitTarget;
use crate::error::{JitError, Result};
use crate::syntax::span::Span;

/// A function tagged with a `@jit("<target>")` decorator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decorated {
    pub name: String,
    pub target: JitTarget,
    /// 1-based line of the `def`.
    pub line: usize,
}

/// Return the text of function `name`, decorators included, dedented to
/// column zero.
pub fn extract_function(text: &str, name: &str) -> Result<String> {
    let lines: Vec<&str> = text.lines().collect();

    let def_idx = lines
        .iter()
        .position(|line| defines(line.trim_start(), name))
        .ok_or_else(|| JitError::UnboundName {
            name: name.to_string(),
            span: Span::dummy(),
        })?;
    let indent = indentation(lines[def_idx]);

    let mut first = def_idx;
    while first > 0 {
        let prev = lines[first - 1];
        if prev.trim_start().starts_with('@') && indentation(prev) == indent {
            first -= 1;
        } else {
            break;
        }
    }

    // The header may span several lines inside its parentheses.
    let mut depth = 0i32;
    let mut idx = def_idx;
    loop {
        depth += bracket_delta(lines[idx]);
        idx += 1;
        if depth <= 0 || idx >= lines.len() {
            break;
        }
    }

    let mut last = idx;
    while idx < lines.len() {
        let line = lines[idx];
        let trimmed = line.trim_start();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            if depth <= 0 && indentation(line) <= indent {
                break;
            }
            last = idx + 1;
        }
        depth = (depth + bracket_delta(line)).max(0);
        idx += 1;
    }

    let mut out = String::new();
    for line in &lines[first..last] {
        out.push_str(strip_indent(line, indent));
        out.push('\n');
    }
    Ok(out)
}

/// Find every top-level function carrying a jit decorator. Target tokens
/// are validated here, which is decoration time.
pub fn discover(text: &str) -> Result<Vec<Decorated>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut found = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if indentation(line) != 0 {
            continue;
        }
        let trimmed = line.trim_end();
        if trimmed.starts_with('@') {
            pending.push(trimmed);
            continue;
        }
        if let Some(name) = def_name(trimmed) {
            for decorator in pending.drain(..) {
                if let Some(token) = jit_token(decorator)? {
                    found.push(Decorated {
                        name: name.to_string(),
                        target: JitTarget::parse(&token)?,
                        line: idx + 1,
                    });
                }
            }
        }
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            pending.clear();
        }
    }
    Ok(found)
}

/// Target token of a jit decorator line, or `None` for other decorators.
fn jit_token(decorator: &str) -> Result<Option<String>> {
    let snippet = format!("{}\ndef _decorated():\n    pass\n", decorator);
    let module = crate::syntax::parse(&snippet)?;
    let Some(Stmt::FunctionDef(def)) = module.body.first().map(|s| &s.node) else {
        return Ok(None);
    };
    let Some(expr) = def.decorators.first() else {
        return Ok(None);
    };
    let Expr::Call {
        func,
        args,
        keywords,
    } = &expr.node
    else {
        return Ok(None);
    };
    match func.node.dotted_path().as_deref() {
        Some("jit") | Some("tcl.jit") => {}
        _ => return Ok(None),
    }

    let value = args
        .first()
        .or_else(|| keywords.iter().find(|k| k.arg.node == "target").map(|k| &k.value));
    match value.map(|v| &v.node) {
        Some(Expr::Constant(Constant::Str(token))) => Ok(Some(token.clone())),
        Some(other) => Err(JitError::InvalidTarget {
            token: crate::ast::unparse(other),
        }),
        None => Err(JitError::InvalidTarget {
            token: String::new(),
        }),
    }
}

fn defines(trimmed: &str, name: &str) -> bool {
    def_name(trimmed) == Some(name)
}

fn def_name(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix("def ")?.trim_start();
    let end = rest.find(|c: char| !(c.is_alphanumeric() || c == '_'))?;
    let (name, tail) = rest.split_at(end);
    if name.is_empty() || !tail.trim_start().starts_with('(') {
        return None;
    }
    Some(name)
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

fn strip_indent(line: &str, indent: usize) -> &str {
    let ws = indentation(line);
    &line[ws.min(indent)..]
}

/// Net bracket depth change of a line, ignoring string contents and comments.
fn bracket_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in line.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '#' => break,
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => delta += 1,
            ')' | ']' | '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = r#"import numpy as np
import tcl
from tcl import Tensor


@tcl.jit("cuda")
def two_add(a: Tensor(shape=(2, 3), dtype="float32"),
            b: Tensor(shape=(2, 3), dtype="float32")):
    out = a + b

    # keep the input around
    out = out + a
    return out


@jit('cpu')
def print_hello():
    print("Hello, world!")


def helper(x):
    return x


if __name__ == "__main__":
    two_add(np.ones((2, 3)), np.ones((2, 3)))
"#;

    #[test]
    fn test_extract_includes_decorator_and_body() {
        let text = extract_function(HOST, "two_add").unwrap();
        assert!(text.starts_with("@tcl.jit(\"cuda\")\ndef two_add("));
        assert!(text.contains("    out = out + a\n"));
        assert!(text.ends_with("    return out\n"));
        assert!(!text.contains("print_hello"));
    }

    #[test]
    fn test_extract_dedents_nested_definitions() {
        let src = "class K:\n    @jit(\"cpu\")\n    def f(a):\n        return a\n\n    def g(self):\n        pass\n";
        let text = extract_function(src, "f").unwrap();
        assert_eq!(text, "@jit(\"cpu\")\ndef f(a):\n    return a\n");
    }

    #[test]
    fn test_extract_missing_function() {
        let err = extract_function(HOST, "nope").unwrap_err();
        assert!(matches!(err, JitError::UnboundName { ref name, .. } if name == "nope"));
    }

    #[test]
    fn test_extracted_text_parses() {
        let text = extract_function(HOST, "two_add").unwrap();
        let module = crate::syntax::parse(&text).unwrap();
        assert_eq!(module.body.len(), 1);
    }

    #[test]
    fn test_discover_decorated_functions() {
        let found = discover(HOST).unwrap();
        assert_eq!(
            found,
            vec![
                Decorated {
                    name: "two_add".to_string(),
                    target: JitTarget::Cuda,
                    line: 7,
                },
                Decorated {
                    name: "print_hello".to_string(),
                    target: JitTarget::Cpu,
                    line: 17,
                },
            ]
        );
    }

    #[test]
    fn test_discover_rejects_unknown_target() {
        let err = discover("@jit(\"tpu\")\ndef f():\n    pass\n").unwrap_err();
        assert!(matches!(err, JitError::InvalidTarget { ref token } if token == "tpu"));
    }

    #[test]
    fn test_discover_ignores_other_decorators() {
        let found = discover("@staticmethod\ndef f():\n    pass\n").unwrap();
        assert!(found.is_empty());
    }
}
