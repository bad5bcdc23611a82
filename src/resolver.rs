// ABOUTME: Static resolution pass binding every variable use to a lexical depth
// and validating function/class context rules before execution

use crate::ast::{Expr, ExprId, ExprKind, FunctionDecl, Stmt};
use crate::error::Diagnostics;
use crate::token::Token;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Walks the AST once, maintaining a stack of block scopes. Each scope maps
/// a name to whether its initializer has finished. The global scope is not
/// on the stack; names that resolve to no scope are left out of the
/// side-table and looked up in globals at runtime.
pub struct Resolver<'a> {
    diagnostics: &'a mut Diagnostics,
    scopes: Vec<HashMap<String, bool>>,
    locals: HashMap<ExprId, usize>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'a> Resolver<'a> {
    pub fn new(diagnostics: &'a mut Diagnostics) -> Self {
        Resolver {
            diagnostics,
            scopes: Vec::new(),
            locals: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Resolve a program, producing the side-table the interpreter consumes:
    /// expression id → number of scopes between the use and its declaration.
    pub fn resolve(mut self, statements: &[Stmt]) -> HashMap<ExprId, usize> {
        self.resolve_statements(statements);
        self.locals
    }

    fn resolve_statements(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_statement(statement);
        }
    }

    fn resolve_statement(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_statements(statements);
                self.end_scope();
            }
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expression(initializer);
                }
                self.define(name);
            }
            Stmt::Function(declaration) => {
                self.declare(&declaration.name);
                self.define(&declaration.name);
                self.resolve_function(declaration, FunctionType::Function);
            }
            Stmt::Expression(expression) | Stmt::Print(expression) => {
                self.resolve_expression(expression);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expression(condition);
                self.resolve_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_statement(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expression(condition);
                self.resolve_statement(body);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.diagnostics
                        .error_at(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.diagnostics
                            .error_at(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expression(value);
                }
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) {
        let enclosing = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass_expr) = superclass {
            if let ExprKind::Variable { name: super_name } = &superclass_expr.kind {
                if super_name.lexeme == name.lexeme {
                    self.diagnostics
                        .error_at(super_name, "A class can't inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expression(superclass_expr);

            // Methods of a subclass close over 'super'.
            self.begin_scope();
            self.define_name("super");
        }

        // Every method closes over 'this'.
        self.begin_scope();
        self.define_name("this");

        for method in methods {
            let declaration_type = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, declaration_type);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing;
    }

    fn resolve_expression(&mut self, expression: &Expr) {
        match &expression.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Grouping(inner) => self.resolve_expression(inner),
            ExprKind::Unary { right, .. } => self.resolve_expression(right),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.resolve_expression(left);
                self.resolve_expression(right);
            }
            ExprKind::Variable { name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.diagnostics.error_at(
                            name,
                            "Can't read local variable in its own initialiser.",
                        );
                    }
                }
                self.resolve_local(expression.id, name);
            }
            ExprKind::Assign { name, value } => {
                self.resolve_expression(value);
                self.resolve_local(expression.id, name);
            }
            ExprKind::Call {
                callee, arguments, ..
            } => {
                self.resolve_expression(callee);
                for argument in arguments {
                    self.resolve_expression(argument);
                }
            }
            ExprKind::Get { object, .. } => self.resolve_expression(object),
            ExprKind::Set { object, value, .. } => {
                self.resolve_expression(value);
                self.resolve_expression(object);
            }
            ExprKind::This { keyword } => {
                if self.current_class == ClassType::None {
                    self.diagnostics
                        .error_at(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(expression.id, keyword);
            }
            ExprKind::Super { keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.diagnostics
                            .error_at(keyword, "Can't use 'super' outside of a class.");
                    }
                    ClassType::Class => {
                        self.diagnostics.error_at(
                            keyword,
                            "Can't use 'super' in a class with no superclass.",
                        );
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(expression.id, keyword);
            }
        }
    }

    fn resolve_function(&mut self, declaration: &FunctionDecl, function_type: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = function_type;

        self.begin_scope();
        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_statements(&declaration.body);
        self.end_scope();

        self.current_function = enclosing;
    }

    /// Scan the scope stack innermost-out; the first hit records the hop
    /// count. A miss means the reference is global and gets no entry.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (index, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(&name.lexeme) {
                self.locals.insert(id, self.scopes.len() - 1 - index);
                return;
            }
        }
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.contains_key(&name.lexeme) {
            self.diagnostics
                .error_at(name, "Already a variable with this name in this scope.");
        }
        scope.insert(name.lexeme.clone(), false);
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn define_name(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn resolve(source: &str) -> (HashMap<ExprId, usize>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Lexer::new(source, &mut diagnostics).scan_tokens();
        let statements = Parser::new(tokens, &mut diagnostics).parse();
        assert!(!diagnostics.had_error, "parse errors in resolver test");
        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        (locals, diagnostics)
    }

    #[test]
    fn test_global_references_get_no_entry() {
        let (locals, diagnostics) = resolve("var a = 1; print a;");
        assert!(!diagnostics.had_error);
        assert!(locals.is_empty());
    }

    #[test]
    fn test_local_reference_depth_zero() {
        let (locals, diagnostics) = resolve("{ var a = 1; print a; }");
        assert!(!diagnostics.had_error);
        assert_eq!(locals.len(), 1);
        assert!(locals.values().all(|&depth| depth == 0));
    }

    #[test]
    fn test_nested_reference_depth_counts_scopes() {
        let (locals, diagnostics) = resolve("{ var a = 1; { { print a; } } }");
        assert!(!diagnostics.had_error);
        assert_eq!(locals.len(), 1);
        assert!(locals.values().all(|&depth| depth == 2));
    }

    #[test]
    fn test_parameter_resolves_at_function_scope() {
        let (locals, diagnostics) = resolve("fun f(x) { print x; }");
        assert!(!diagnostics.had_error);
        assert_eq!(locals.len(), 1);
        assert!(locals.values().all(|&depth| depth == 0));
    }

    #[test]
    fn test_closure_reference_crosses_function_scope() {
        let (locals, diagnostics) =
            resolve("{ var i = 0; fun count() { i = i + 1; } }");
        assert!(!diagnostics.had_error);
        // Both the read and the assignment of i resolve one scope out from
        // the function body.
        assert_eq!(locals.len(), 2);
        assert!(locals.values().all(|&depth| depth == 1));
    }

    #[test]
    fn test_resolver_is_deterministic() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Lexer::new(
            "{ var a = 1; fun f(b) { { print a + b; } } }",
            &mut diagnostics,
        )
        .scan_tokens();
        let statements = Parser::new(tokens, &mut diagnostics).parse();

        let first = Resolver::new(&mut diagnostics).resolve(&statements);
        let second = Resolver::new(&mut diagnostics).resolve(&statements);
        assert_eq!(first, second);
        assert!(!diagnostics.had_error);
    }

    #[test]
    fn test_read_in_own_initializer() {
        let (_, diagnostics) = resolve("{ var a = a; }");
        assert!(diagnostics.had_error);
        assert!(diagnostics.messages()[0]
            .contains("Can't read local variable in its own initialiser."));
    }

    #[test]
    fn test_duplicate_declaration_in_scope() {
        let (_, diagnostics) = resolve("{ var a = 1; var a = 2; }");
        assert!(diagnostics.had_error);
        assert!(diagnostics.messages()[0]
            .contains("Already a variable with this name in this scope."));
    }

    #[test]
    fn test_duplicate_declaration_allowed_in_globals() {
        let (_, diagnostics) = resolve("var a = 1; var a = 2;");
        assert!(!diagnostics.had_error);
    }

    #[test]
    fn test_return_at_top_level() {
        let (_, diagnostics) = resolve("return 1;");
        assert!(diagnostics.had_error);
        assert!(diagnostics.messages()[0].contains("Can't return from top-level code."));
    }

    #[test]
    fn test_return_value_from_initializer() {
        let (_, diagnostics) = resolve("class C { init() { return 1; } }");
        assert!(diagnostics.had_error);
        assert!(diagnostics.messages()[0]
            .contains("Can't return a value from an initializer."));
    }

    #[test]
    fn test_bare_return_from_initializer_is_fine() {
        let (_, diagnostics) = resolve("class C { init() { return; } }");
        assert!(!diagnostics.had_error);
    }

    #[test]
    fn test_this_outside_class() {
        let (_, diagnostics) = resolve("print this;");
        assert!(diagnostics.had_error);
        assert!(diagnostics.messages()[0].contains("Can't use 'this' outside of a class."));
    }

    #[test]
    fn test_super_outside_class() {
        let (_, diagnostics) = resolve("print super.m;");
        assert!(diagnostics.had_error);
        assert!(diagnostics.messages()[0].contains("Can't use 'super' outside of a class."));
    }

    #[test]
    fn test_super_without_superclass() {
        let (_, diagnostics) = resolve("class C { m() { super.m(); } }");
        assert!(diagnostics.had_error);
        assert!(diagnostics.messages()[0]
            .contains("Can't use 'super' in a class with no superclass."));
    }

    #[test]
    fn test_class_inheriting_from_itself() {
        let (_, diagnostics) = resolve("class A < A {}");
        assert!(diagnostics.had_error);
        assert!(diagnostics.messages()[0].contains("A class can't inherit from itself."));
    }
}
