// ABOUTME: Environment module for managing variable bindings and lexical scopes

use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A single lexical scope: a map of bindings plus an optional parent scope.
/// Scopes chain from the innermost block out to the globals.
#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new global environment with no parent.
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// Creates a new child environment enclosed by a parent.
    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Defines a binding in THIS scope (doesn't walk the parent chain).
    /// Redefining an existing name replaces it.
    pub fn define(&self, name: String, value: Value) {
        self.bindings.borrow_mut().insert(name, value);
    }

    /// Looks up a name in this scope and parent scopes recursively. Only
    /// unresolved (global) references take this path; resolved locals go
    /// through `get_at`.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }

        if let Some(ref parent) = self.parent {
            return parent.get(name);
        }

        None
    }

    /// Updates an existing binding here or in a parent scope. Returns false
    /// when the name is not bound anywhere in the chain.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        if self.bindings.borrow().contains_key(name) {
            self.bindings.borrow_mut().insert(name.to_string(), value);
            return true;
        }

        if let Some(ref parent) = self.parent {
            return parent.assign(name, value);
        }

        false
    }

    /// The scope exactly `depth` hops up the parent chain.
    pub fn ancestor(environment: &Rc<Environment>, depth: usize) -> Option<Rc<Environment>> {
        let mut current = environment.clone();
        for _ in 0..depth {
            let parent = current.parent.clone()?;
            current = parent;
        }
        Some(current)
    }

    /// Reads a binding from the scope exactly `depth` hops up, without
    /// walking past it.
    pub fn get_at(environment: &Rc<Environment>, depth: usize, name: &str) -> Option<Value> {
        let ancestor = Self::ancestor(environment, depth)?;
        let value = ancestor.bindings.borrow().get(name).cloned();
        value
    }

    /// Writes a binding into the scope exactly `depth` hops up. Returns
    /// false when the chain is shorter than `depth`.
    pub fn assign_at(
        environment: &Rc<Environment>,
        depth: usize,
        name: &str,
        value: Value,
    ) -> bool {
        match Self::ancestor(environment, depth) {
            Some(ancestor) => {
                ancestor.bindings.borrow_mut().insert(name.to_string(), value);
                true
            }
            None => false,
        }
    }
}
