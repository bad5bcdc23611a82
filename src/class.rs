// ABOUTME: Class and instance runtime values: method tables, superclass
// chains, and per-instance field maps

use crate::error::RuntimeError;
use crate::function::Function;
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A class value: its name, optional superclass, and method table.
#[derive(Debug)]
pub struct Class {
    name: String,
    superclass: Option<Rc<Class>>,
    methods: HashMap<String, Rc<Function>>,
}

impl Class {
    pub fn new(
        name: String,
        superclass: Option<Rc<Class>>,
        methods: HashMap<String, Rc<Function>>,
    ) -> Self {
        Class {
            name,
            superclass,
            methods,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a method here or anywhere up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }
        if let Some(ref superclass) = self.superclass {
            return superclass.find_method(name);
        }
        None
    }

    /// A class's call arity is its initializer's arity, or zero without one.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    /// Calling a class constructs an instance, running `init` bound to it
    /// when the class declares one.
    pub fn call(
        class: &Rc<Class>,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let instance = Rc::new(Instance::new(class.clone()));
        if let Some(initializer) = class.find_method("init") {
            initializer
                .bind(instance.clone())
                .call(interpreter, arguments)?;
        }
        Ok(Value::Instance(instance))
    }
}

/// An instance: a class reference plus a mutable field map. Field lookup
/// falls through to method lookup on the class.
pub struct Instance {
    class: Rc<Class>,
    fields: RefCell<HashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Instance {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    /// Read a property: a field when present, otherwise a method from the
    /// class bound to this instance.
    pub fn get(instance: &Rc<Instance>, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = instance.fields.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = instance.class.find_method(&name.lexeme) {
            return Ok(Value::Function(Rc::new(method.bind(instance.clone()))));
        }

        Err(RuntimeError::new(
            name,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    /// Write a field unconditionally.
    pub fn set(&self, name: &Token, value: Value) {
        self.fields.borrow_mut().insert(name.lexeme.clone(), value);
    }
}

impl fmt::Debug for Instance {
    // Fields can hold this instance; print only the class to keep Debug
    // terminating.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FunctionDecl;
    use crate::env::Environment;
    use crate::token::TokenKind;

    fn method(name: &str, params: usize) -> Rc<Function> {
        let declaration = Rc::new(FunctionDecl {
            name: Token::new(TokenKind::Identifier, name, None, 1),
            params: (0..params)
                .map(|i| Token::new(TokenKind::Identifier, format!("p{}", i), None, 1))
                .collect(),
            body: Vec::new(),
        });
        Rc::new(Function::new(declaration, Environment::new(), name == "init"))
    }

    #[test]
    fn test_find_method_walks_superclass_chain() {
        let mut base_methods = HashMap::new();
        base_methods.insert("greet".to_string(), method("greet", 0));
        let base = Rc::new(Class::new("Base".to_string(), None, base_methods));

        let derived = Class::new("Derived".to_string(), Some(base), HashMap::new());
        assert!(derived.find_method("greet").is_some());
        assert!(derived.find_method("missing").is_none());
    }

    #[test]
    fn test_subclass_method_shadows_superclass() {
        let mut base_methods = HashMap::new();
        base_methods.insert("greet".to_string(), method("greet", 0));
        let base = Rc::new(Class::new("Base".to_string(), None, base_methods));

        let mut derived_methods = HashMap::new();
        let override_method = method("greet", 1);
        derived_methods.insert("greet".to_string(), override_method.clone());
        let derived = Class::new("Derived".to_string(), Some(base), derived_methods);

        let found = derived.find_method("greet").expect("method");
        assert!(Rc::ptr_eq(&found, &override_method));
    }

    #[test]
    fn test_arity_follows_init() {
        let plain = Class::new("Plain".to_string(), None, HashMap::new());
        assert_eq!(plain.arity(), 0);

        let mut methods = HashMap::new();
        methods.insert("init".to_string(), method("init", 2));
        let with_init = Class::new("WithInit".to_string(), None, methods);
        assert_eq!(with_init.arity(), 2);
    }

    #[test]
    fn test_field_set_and_get() {
        let class = Rc::new(Class::new("Point".to_string(), None, HashMap::new()));
        let instance = Rc::new(Instance::new(class));

        let name = Token::new(TokenKind::Identifier, "x", None, 1);
        instance.set(&name, Value::Number(3.0));

        match Instance::get(&instance, &name) {
            Ok(Value::Number(n)) => assert_eq!(n, 3.0),
            other => panic!("Expected Number(3.0), got {:?}", other),
        }
    }

    #[test]
    fn test_missing_property_is_an_error() {
        let class = Rc::new(Class::new("Point".to_string(), None, HashMap::new()));
        let instance = Rc::new(Instance::new(class));

        let name = Token::new(TokenKind::Identifier, "missing", None, 4);
        let error = Instance::get(&instance, &name).expect_err("should be undefined");
        assert_eq!(error.message, "Undefined property 'missing'.");
        assert_eq!(error.line, 4);
    }

    #[test]
    fn test_instance_display_through_value() {
        let class = Rc::new(Class::new("Point".to_string(), None, HashMap::new()));
        let instance = Rc::new(Instance::new(class.clone()));
        assert_eq!(format!("{}", Value::Instance(instance)), "Point instance");
        assert_eq!(format!("{}", Value::Class(class)), "Point");
    }
}
