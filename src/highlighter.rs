// ABOUTME: Syntax highlighter for the REPL with color support
// Implements rustyline's Highlighter trait to provide ANSI color codes
// for language syntax elements while preserving display width

use rustyline::completion::Completer;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;
use std::borrow::Cow;
use std::collections::HashSet;

// ANSI color codes (3-bit/4-bit colors for maximum terminal compatibility)
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_KEYWORD: &str = "\x1b[1;35m"; // Bold magenta
const COLOR_NATIVE: &str = "\x1b[36m"; // Cyan
const COLOR_NUMBER: &str = "\x1b[33m"; // Yellow
const COLOR_STRING: &str = "\x1b[32m"; // Green
const COLOR_COMMENT: &str = "\x1b[90m"; // Bright black (gray)

/// Main highlighter helper for the REPL.
pub struct QuillHelper;

impl QuillHelper {
    pub fn new() -> Self {
        QuillHelper
    }
}

impl Default for QuillHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Helper for QuillHelper {}

impl Completer for QuillHelper {
    type Candidate = String;
}

impl Hinter for QuillHelper {
    type Hint = String;
}

impl Validator for QuillHelper {}

impl Highlighter for QuillHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let keywords = get_keywords();
        let natives = get_natives();

        let highlighted = highlight_line(line, &keywords, &natives);

        if highlighted == line {
            Cow::Borrowed(line)
        } else {
            Cow::Owned(highlighted)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true // Always re-highlight on character input or cursor movement
    }
}

/// Tokenize a line and apply syntax highlighting.
fn highlight_line(
    line: &str,
    keywords: &HashSet<&'static str>,
    natives: &HashSet<&'static str>,
) -> String {
    let mut result = String::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            // Comments: everything from // to end of line
            '/' if i + 1 < chars.len() && chars[i + 1] == '/' => {
                result.push_str(COLOR_COMMENT);
                while i < chars.len() {
                    result.push(chars[i]);
                    i += 1;
                }
                result.push_str(COLOR_RESET);
            }

            // Strings: preserve exact content but colorize
            '"' => {
                result.push_str(COLOR_STRING);
                result.push(chars[i]);
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    result.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() {
                    result.push(chars[i]);
                    i += 1;
                }
                result.push_str(COLOR_RESET);
            }

            // Numbers
            c if c.is_ascii_digit() => {
                result.push_str(COLOR_NUMBER);
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    result.push(chars[i]);
                    i += 1;
                }
                result.push_str(COLOR_RESET);
            }

            // Identifiers and keywords
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if keywords.contains(word.as_str()) {
                    result.push_str(COLOR_KEYWORD);
                    result.push_str(&word);
                    result.push_str(COLOR_RESET);
                } else if natives.contains(word.as_str()) {
                    result.push_str(COLOR_NATIVE);
                    result.push_str(&word);
                    result.push_str(COLOR_RESET);
                } else {
                    result.push_str(&word);
                }
            }

            c => {
                result.push(c);
                i += 1;
            }
        }
    }

    result
}

/// The language's reserved words.
fn get_keywords() -> HashSet<&'static str> {
    [
        "and", "class", "else", "false", "for", "fun", "if", "nil", "or", "print", "return",
        "super", "this", "true", "var", "while",
    ]
    .iter()
    .copied()
    .collect()
}

/// Native functions seeded into the globals.
fn get_natives() -> HashSet<&'static str> {
    ["clock", "input"].iter().copied().collect()
}
