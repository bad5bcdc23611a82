// ABOUTME: CLI entry point: runs a script file or starts the interactive REPL

use clap::Parser;
use quill::config;
use quill::error::Diagnostics;
use quill::highlighter::QuillHelper;
use quill::interpreter::Interpreter;
use quill::lexer::Lexer;
use quill::parser;
use quill::resolver::Resolver;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use std::path::{Path, PathBuf};
use std::process;

/// Interpreter for the quill scripting language
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(version = config::VERSION)]
#[command(about = "A tree-walking interpreter for a small class-based scripting language")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    match args.script {
        Some(path) => {
            run_file(&path);
            Ok(())
        }
        None => run_repl(),
    }
}

/// Execute a script file. Exits 65 on syntax or resolve errors, 70 on a
/// runtime error, 0 otherwise.
fn run_file(path: &Path) {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Cannot read script file {}: {}", path.display(), error);
            process::exit(1);
        }
    };

    let mut diagnostics = Diagnostics::new();
    let mut interpreter = Interpreter::new();
    run(&source, &mut interpreter, &mut diagnostics);

    if diagnostics.had_error {
        process::exit(65);
    }
    if diagnostics.had_runtime_error {
        process::exit(70);
    }
}

/// Read-eval-print loop. Each line runs as an independent program against a
/// persistent interpreter, so definitions carry across lines.
fn run_repl() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl =
        Editor::with_config(config).map_err(|e| format!("Failed to initialize REPL: {}", e))?;
    rl.set_helper(Some(QuillHelper::new()));

    // Try to load history from previous sessions
    let _ = rl.load_history(config::HISTORY_FILE);

    println!("{}", config::WELCOME_MESSAGE);
    println!("{}", config::WELCOME_SUBTITLE);
    println!("{}", config::WELCOME_FOOTER);

    let mut diagnostics = Diagnostics::new();
    let mut interpreter = Interpreter::new();

    loop {
        match rl.readline(config::PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                // A syntax error on one line must not poison the next; the
                // runtime-error flag stays set for the session.
                diagnostics.had_error = false;
                run(&line, &mut interpreter, &mut diagnostics);
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(error) => {
                eprintln!("Error: {}", error);
                break;
            }
        }
    }

    let _ = rl.save_history(config::HISTORY_FILE);

    Ok(())
}

/// One trip through the pipeline: lex, parse, resolve, interpret. Each stage
/// is skipped once the diagnostics handle records a syntax error.
fn run(source: &str, interpreter: &mut Interpreter, diagnostics: &mut Diagnostics) {
    let tokens = Lexer::new(source, diagnostics).scan_tokens();
    let statements = parser::Parser::new(tokens, diagnostics).parse();
    if diagnostics.had_error {
        return;
    }

    let locals = Resolver::new(diagnostics).resolve(&statements);
    if diagnostics.had_error {
        return;
    }

    interpreter.resolve(locals);
    interpreter.interpret(&statements, diagnostics);
}
