pub mod lexeme;
pub(crate) mod lexer;
pub(crate) mod parser;
pub mod source;
pub mod span;

use crate::ast::Module;
use crate::error::{JitError, Result};
use lexer::Lexer;
use parser::Parser;

/// Lex and parse function source into a module. Lexer and parser
/// diagnostics are reported together as one `Syntax` error.
pub fn parse(source: &str) -> Result<Module> {
    let (tokens, mut diagnostics) = Lexer::new(source).tokenize();
    match Parser::new(tokens).parse_module() {
        Ok(module) if diagnostics.is_empty() => Ok(module),
        Ok(_) => Err(JitError::Syntax(diagnostics)),
        Err(mut parse_errors) => {
            diagnostics.append(&mut parse_errors);
            Err(JitError::Syntax(diagnostics))
        }
    }
}
