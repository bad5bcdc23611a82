// ABOUTME: Runtime error type, the non-local unwind signal, and the
// Diagnostics reporter shared by every pipeline stage

use crate::token::{Token, TokenKind};
use crate::value::Value;
use thiserror::Error;

/// An error raised while evaluating the program. Carries the source line of
/// the token it was raised at for the `<message>\n[line N]` report format.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
    pub line: usize,
}

impl RuntimeError {
    /// Create a runtime error at the given token.
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        RuntimeError {
            message: message.into(),
            line: token.line,
        }
    }

    /// Create a runtime error at a bare line, for errors with no token.
    pub fn at_line(line: usize, message: impl Into<String>) -> Self {
        RuntimeError {
            message: message.into(),
            line,
        }
    }
}

/// Non-local control flow out of statement execution: either a `return`
/// traveling back to the nearest call frame, or a runtime error traveling
/// to the top of the run.
#[derive(Debug)]
pub enum Unwind {
    Return(Value),
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Error(error)
    }
}

/// Collects errors reported by the lexer, parser, resolver, and interpreter.
/// One handle is threaded through every stage of a run; the driver inspects
/// the two flags to decide whether to continue the pipeline and which exit
/// code a file run ends with.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub had_error: bool,
    pub had_runtime_error: bool,
    messages: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a lex-stage error, which has a line but no token.
    pub fn error(&mut self, line: usize, message: &str) {
        self.report(line, "", message);
    }

    /// Report a parse or resolve error at a token.
    pub fn error_at(&mut self, token: &Token, message: &str) {
        if token.kind == TokenKind::Eof {
            self.report(token.line, " at end", message);
        } else {
            let location = format!(" at '{}'", token.lexeme);
            self.report(token.line, &location, message);
        }
    }

    fn report(&mut self, line: usize, location: &str, message: &str) {
        let rendered = format!("[line {}] Error{}: {}", line, location, message);
        eprintln!("{}", rendered);
        self.messages.push(rendered);
        self.had_error = true;
    }

    /// Report a runtime error and set the runtime-error flag.
    pub fn runtime_error(&mut self, error: &RuntimeError) {
        let rendered = format!("{}\n[line {}]", error.message, error.line);
        eprintln!("{}", rendered);
        self.messages.push(rendered);
        self.had_runtime_error = true;
    }

    /// Every report rendered so far, in order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}
