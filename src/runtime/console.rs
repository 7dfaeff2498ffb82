//! Output sink shared by the compiler dumps and the program's `print`.

use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default)]
pub struct Captured {
    pub diagnostics: String,
    pub program: String,
}

/// Where diagnostic dumps and program output go. Clones of a capturing
/// console share one buffer.
#[derive(Clone, Debug, Default)]
pub enum Console {
    #[default]
    Stdout,
    Capture(Arc<Mutex<Captured>>),
}

impl Console {
    pub fn stdout() -> Self {
        Console::Stdout
    }

    pub fn capture() -> Self {
        Console::Capture(Arc::new(Mutex::new(Captured::default())))
    }

    /// Compiler dumps (AST, optimized IR).
    pub fn diagnostic(&self, text: &str) {
        self.write(text, |c| &mut c.diagnostics);
    }

    /// Output of the compiled program.
    pub fn program(&self, text: &str) {
        self.write(text, |c| &mut c.program);
    }

    fn write(&self, text: &str, channel: impl FnOnce(&mut Captured) -> &mut String) {
        match self {
            Console::Stdout => {
                let mut out = std::io::stdout().lock();
                let _ = writeln!(out, "{}", text);
            }
            Console::Capture(captured) => {
                let mut guard = captured.lock().unwrap_or_else(|e| e.into_inner());
                let buf = channel(&mut guard);
                buf.push_str(text);
                buf.push('\n');
            }
        }
    }

    /// Everything captured so far; empty for stdout.
    pub fn captured(&self) -> Captured {
        match self {
            Console::Stdout => Captured::default(),
            Console::Capture(captured) => captured.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }

    pub fn diagnostic_output(&self) -> String {
        self.captured().diagnostics
    }

    pub fn program_output(&self) -> String {
        self.captured().program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_separates_channels() {
        let console = Console::capture();
        let shared = console.clone();
        console.diagnostic("Module(...)");
        shared.program("Hello, World!");
        assert_eq!(console.diagnostic_output(), "Module(...)\n");
        assert_eq!(console.program_output(), "Hello, World!\n");
        assert_eq!(Console::stdout().program_output(), "");
    }
}
