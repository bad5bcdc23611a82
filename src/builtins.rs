// ABOUTME: Native functions seeded into the global environment

use crate::env::Environment;
use crate::function::NativeFn;
use crate::interpreter::Interpreter;
use crate::value::Value;
use std::io::{BufRead, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seed the global environment with the interpreter's native functions.
pub fn register(globals: &Rc<Environment>) {
    globals.define(
        "clock".to_string(),
        Value::Native(Rc::new(NativeFn {
            name: "clock",
            arity: 0,
            func: clock,
        })),
    );
    globals.define(
        "input".to_string(),
        Value::Native(Rc::new(NativeFn {
            name: "input",
            arity: 1,
            func: input,
        })),
    );
}

/// Wall-clock seconds since the Unix epoch, as a number.
fn clock(_interpreter: &mut Interpreter, _arguments: &[Value]) -> Result<Value, String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| "System clock is before the Unix epoch.".to_string())?;
    Ok(Value::Number(now.as_secs_f64()))
}

/// Print the stringified prompt without a newline, then read one line from
/// standard input. The returned string has no trailing newline.
fn input(interpreter: &mut Interpreter, arguments: &[Value]) -> Result<Value, String> {
    {
        let mut writer = interpreter.writer().borrow_mut();
        write!(writer, "{}", arguments[0])
            .and_then(|_| writer.flush())
            .map_err(|error| error.to_string())?;
    }

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|error| error.to_string())?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Value::String(line))
}
