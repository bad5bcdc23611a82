// ABOUTME: Tree-walking evaluator executing the AST against a chain of
// lexical environments, driven by the resolver's depth side-table

use crate::ast::{Expr, ExprId, ExprKind, FunctionDecl, LiteralValue, Stmt};
use crate::builtins;
use crate::class::{Class, Instance};
use crate::env::Environment;
use crate::error::{Diagnostics, RuntimeError, Unwind};
use crate::function::Function;
use crate::token::{Token, TokenKind};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

pub struct Interpreter {
    pub globals: Rc<Environment>,
    environment: Rc<Environment>,
    locals: HashMap<ExprId, usize>,
    writer: Rc<RefCell<dyn Write>>,
}

impl Interpreter {
    /// An interpreter printing to standard output.
    pub fn new() -> Self {
        Self::with_writer(Rc::new(RefCell::new(io::stdout())))
    }

    /// An interpreter printing to the given sink; tests capture output this
    /// way.
    pub fn with_writer(writer: Rc<RefCell<dyn Write>>) -> Self {
        let globals = Environment::new();
        builtins::register(&globals);
        Interpreter {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            writer,
        }
    }

    pub fn writer(&self) -> &Rc<RefCell<dyn Write>> {
        &self.writer
    }

    /// Install the resolver's side-table for a batch of statements. Entries
    /// accumulate across REPL lines; expression ids never collide.
    pub fn resolve(&mut self, locals: HashMap<ExprId, usize>) {
        self.locals.extend(locals);
    }

    /// Execute a program. A runtime error aborts the batch and is recorded
    /// on the diagnostics handle.
    pub fn interpret(&mut self, statements: &[Stmt], diagnostics: &mut Diagnostics) {
        for statement in statements {
            match self.execute(statement) {
                Ok(()) => {}
                Err(Unwind::Error(error)) => {
                    diagnostics.runtime_error(&error);
                    return;
                }
                // The resolver rejects top-level returns before we run.
                Err(Unwind::Return(_)) => return,
            }
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn execute(&mut self, statement: &Stmt) -> Result<(), Unwind> {
        match statement {
            Stmt::Expression(expression) => {
                self.evaluate(expression)?;
                Ok(())
            }
            Stmt::Print(expression) => {
                let value = self.evaluate(expression)?;
                writeln!(self.writer.borrow_mut(), "{}", value).ok();
                Ok(())
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expression) => self.evaluate(expression)?,
                    None => Value::Nil,
                };
                self.environment.define(name.lexeme.clone(), value);
                Ok(())
            }
            Stmt::Block(statements) => self.execute_block(
                statements,
                Environment::with_parent(self.environment.clone()),
            ),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }
            Stmt::Function(declaration) => {
                let function =
                    Function::new(declaration.clone(), self.environment.clone(), false);
                self.environment
                    .define(declaration.name.lexeme.clone(), Value::Function(Rc::new(function)));
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expression) => self.evaluate(expression)?,
                    None => Value::Nil,
                };
                Err(Unwind::Return(value))
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Run statements in the given environment, restoring the previous one
    /// on every exit path, including unwinds.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<Environment>,
    ) -> Result<(), Unwind> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut result = Ok(());
        for statement in statements {
            result = self.execute(statement);
            if result.is_err() {
                break;
            }
        }

        self.environment = previous;
        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<(), Unwind> {
        let superclass_value = match superclass {
            Some(expression) => match self.evaluate(expression)? {
                Value::Class(class) => Some(class),
                _ => {
                    let token = match &expression.kind {
                        ExprKind::Variable { name } => name,
                        _ => name,
                    };
                    return Err(RuntimeError::new(token, "Superclass must be a class.").into());
                }
            },
            None => None,
        };

        // Defined as nil first so methods can refer to the class by name.
        self.environment.define(name.lexeme.clone(), Value::Nil);

        // Methods of a subclass close over an extra scope holding 'super'.
        let method_env = match &superclass_value {
            Some(class) => {
                let environment = Environment::with_parent(self.environment.clone());
                environment.define("super".to_string(), Value::Class(class.clone()));
                environment
            }
            None => self.environment.clone(),
        };

        let mut method_table = HashMap::new();
        for method in methods {
            let is_initializer = method.name.lexeme == "init";
            let function = Function::new(method.clone(), method_env.clone(), is_initializer);
            method_table.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let class = Class::new(name.lexeme.clone(), superclass_value, method_table);
        self.environment
            .assign(&name.lexeme, Value::Class(Rc::new(class)));
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn evaluate(&mut self, expression: &Expr) -> Result<Value, RuntimeError> {
        match &expression.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                LiteralValue::Nil => Value::Nil,
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::String(s) => Value::String(s.clone()),
            }),
            ExprKind::Grouping(inner) => self.evaluate(inner),
            ExprKind::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.kind {
                    TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
                    TokenKind::Minus => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError::new(operator, "Operand must be a number.")),
                    },
                    // Unreachable.
                    _ => Ok(Value::Nil),
                }
            }
            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary_operation(operator, left, right)
            }
            ExprKind::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                if operator.kind == TokenKind::Or {
                    if left.is_truthy() {
                        return Ok(left);
                    }
                } else if !left.is_truthy() {
                    return Ok(left);
                }
                self.evaluate(right)
            }
            ExprKind::Variable { name } => self.look_up_variable(name, expression.id),
            ExprKind::Assign { name, value } => {
                let value = self.evaluate(value)?;
                let assigned = match self.locals.get(&expression.id) {
                    Some(&depth) => Environment::assign_at(
                        &self.environment,
                        depth,
                        &name.lexeme,
                        value.clone(),
                    ),
                    None => self.globals.assign(&name.lexeme, value.clone()),
                };
                if !assigned {
                    return Err(undefined_variable(name));
                }
                Ok(value)
            }
            ExprKind::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;
                let mut evaluated = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    evaluated.push(self.evaluate(argument)?);
                }
                self.call_value(callee, evaluated, paren)
            }
            ExprKind::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, name),
                _ => Err(RuntimeError::new(name, "Only instances have properties.")),
            },
            ExprKind::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;
                let Value::Instance(instance) = object else {
                    return Err(RuntimeError::new(name, "Only instances have fields."));
                };
                let value = self.evaluate(value)?;
                instance.set(name, value.clone());
                Ok(value)
            }
            ExprKind::This { keyword } => self.look_up_variable(keyword, expression.id),
            ExprKind::Super { keyword, method } => {
                let Some(&depth) = self.locals.get(&expression.id) else {
                    return Err(RuntimeError::new(
                        keyword,
                        "Can't use 'super' outside of a class.",
                    ));
                };
                let superclass = Environment::get_at(&self.environment, depth, "super");
                let receiver = Environment::get_at(&self.environment, depth - 1, "this");
                let (Some(Value::Class(superclass)), Some(Value::Instance(receiver))) =
                    (superclass, receiver)
                else {
                    return Err(RuntimeError::new(
                        keyword,
                        "Can't use 'super' outside of a class.",
                    ));
                };

                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::Function(Rc::new(found.bind(receiver)))),
                    None => Err(RuntimeError::new(
                        method,
                        format!("Undefined property '{}'.", method.lexeme),
                    )),
                }
            }
        }
    }

    fn call_value(
        &mut self,
        callee: Value,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(function) => {
                check_arity(function.arity(), arguments.len(), paren)?;
                function.call(self, arguments)
            }
            Value::Class(class) => {
                check_arity(class.arity(), arguments.len(), paren)?;
                Class::call(&class, self, arguments)
            }
            Value::Native(native) => {
                check_arity(native.arity, arguments.len(), paren)?;
                (native.func)(self, &arguments)
                    .map_err(|message| RuntimeError::new(paren, message))
            }
            _ => Err(RuntimeError::new(
                paren,
                "Can only call functions and classes.",
            )),
        }
    }

    /// Resolved references jump exactly `depth` scopes up; unresolved ones
    /// are globals.
    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(&depth) => Environment::get_at(&self.environment, depth, &name.lexeme)
                .ok_or_else(|| undefined_variable(name)),
            None => self
                .globals
                .get(&name.lexeme)
                .ok_or_else(|| undefined_variable(name)),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn binary_operation(operator: &Token, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match operator.kind {
        TokenKind::Greater => {
            let (a, b) = number_operands(operator, left, right)?;
            Ok(Value::Bool(a > b))
        }
        TokenKind::GreaterEqual => {
            let (a, b) = number_operands(operator, left, right)?;
            Ok(Value::Bool(a >= b))
        }
        TokenKind::Less => {
            let (a, b) = number_operands(operator, left, right)?;
            Ok(Value::Bool(a < b))
        }
        TokenKind::LessEqual => {
            let (a, b) = number_operands(operator, left, right)?;
            Ok(Value::Bool(a <= b))
        }
        TokenKind::Minus => {
            let (a, b) = number_operands(operator, left, right)?;
            Ok(Value::Number(a - b))
        }
        TokenKind::Star => {
            let (a, b) = number_operands(operator, left, right)?;
            Ok(Value::Number(a * b))
        }
        TokenKind::Slash => {
            // Division by zero follows IEEE-754.
            let (a, b) = number_operands(operator, left, right)?;
            Ok(Value::Number(a / b))
        }
        TokenKind::Plus => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (Value::Number(a), Value::String(b)) => {
                Ok(Value::String(format!("{}{}", Value::Number(a), b)))
            }
            (Value::String(a), Value::Number(b)) => {
                Ok(Value::String(format!("{}{}", a, Value::Number(b))))
            }
            _ => Err(RuntimeError::new(
                operator,
                "Operands must be two numbers or two strings.",
            )),
        },
        TokenKind::BangEqual => Ok(Value::Bool(!left.equals(&right))),
        TokenKind::EqualEqual => Ok(Value::Bool(left.equals(&right))),
        // Unreachable.
        _ => Ok(Value::Nil),
    }
}

fn number_operands(
    operator: &Token,
    left: Value,
    right: Value,
) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),
        _ => Err(RuntimeError::new(operator, "Operands must be numbers.")),
    }
}

fn check_arity(expected: usize, actual: usize, paren: &Token) -> Result<(), RuntimeError> {
    if expected != actual {
        return Err(RuntimeError::new(
            paren,
            format!("Expected {} arguments but got {}.", expected, actual),
        ));
    }
    Ok(())
}

fn undefined_variable(name: &Token) -> RuntimeError {
    RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme))
}
