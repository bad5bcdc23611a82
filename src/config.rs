// ABOUTME: Version info and REPL constants for the quill interpreter

pub const VERSION: &str = "0.1.0";
pub const WELCOME_MESSAGE: &str = "quill v0.1";
pub const WELCOME_SUBTITLE: &str = "A small class-based scripting language";
pub const WELCOME_FOOTER: &str = "Each line runs as a program. Ctrl-D exits.";

pub const PROMPT: &str = "quill> ";
pub const HISTORY_FILE: &str = ".quill_history";
