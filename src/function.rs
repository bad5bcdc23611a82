// ABOUTME: User-defined function values, closure capture, method binding,
// and the native-function call plumbing

use crate::ast::FunctionDecl;
use crate::class::Instance;
use crate::env::Environment;
use crate::error::{RuntimeError, Unwind};
use crate::interpreter::Interpreter;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// A user-declared function together with the environment it closed over.
/// Methods carry `is_initializer` so `init` always yields the instance.
pub struct Function {
    declaration: Rc<FunctionDecl>,
    closure: Rc<Environment>,
    is_initializer: bool,
}

impl Function {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<Environment>,
        is_initializer: bool,
    ) -> Self {
        Function {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Returns a copy of this function whose closure is wrapped in a fresh
    /// scope binding `this` to the receiving instance.
    pub fn bind(&self, instance: Rc<Instance>) -> Function {
        let environment = Environment::with_parent(self.closure.clone());
        environment.define("this".to_string(), Value::Instance(instance));
        Function::new(self.declaration.clone(), environment, self.is_initializer)
    }

    /// Execute the body in a fresh environment under the closure, binding
    /// each parameter to its argument. A return unwind stops here; an error
    /// unwind keeps traveling. Initializers yield `this` whatever the body
    /// did.
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let environment = Environment::with_parent(self.closure.clone());
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.define(param.lexeme.clone(), argument);
        }

        match interpreter.execute_block(&self.declaration.body, environment) {
            Ok(()) => {}
            Err(Unwind::Return(value)) => {
                if !self.is_initializer {
                    return Ok(value);
                }
            }
            Err(Unwind::Error(error)) => return Err(error),
        }

        if self.is_initializer {
            return Environment::get_at(&self.closure, 0, "this").ok_or_else(|| {
                RuntimeError::new(&self.declaration.name, "Undefined variable 'this'.")
            });
        }
        Ok(Value::Nil)
    }
}

impl fmt::Debug for Function {
    // The closure chain can reach back to this function; print only the
    // declaration to keep Debug terminating.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .finish_non_exhaustive()
    }
}

/// A builtin implemented in the host, displayed as `<native fn>`. Failures
/// surface as plain messages; the call site attaches the source line.
#[derive(Debug, Clone)]
pub struct NativeFn {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&mut Interpreter, &[Value]) -> Result<Value, String>,
}
