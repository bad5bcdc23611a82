// ABOUTME: Recursive-descent parser building the AST from the token stream

//! Grammar, lowest precedence first:
//!
//! ```text
//! program    → declaration* EOF
//! declaration→ classDecl | funDecl | varDecl | statement
//! classDecl  → "class" IDENT ( "<" IDENT )? "{" function* "}"
//! funDecl    → "fun" function
//! function   → IDENT "(" params? ")" block
//! varDecl    → "var" IDENT ( "=" expression )? ";"
//! statement  → exprStmt | forStmt | ifStmt | printStmt
//!            | returnStmt | whileStmt | block
//!
//! expression → assignment
//! assignment → ( call "." )? IDENT "=" assignment | logic_or
//! logic_or   → logic_and ( "or" logic_and )*
//! logic_and  → equality ( "and" equality )*
//! equality   → comparison ( ( "!=" | "==" ) comparison )*
//! comparison → term ( ( ">" | ">=" | "<" | "<=" ) term )*
//! term       → factor ( ( "-" | "+" ) factor )*
//! factor     → unary ( ( "/" | "*" ) unary )*
//! unary      → ( "!" | "-" ) unary | call
//! call       → primary ( "(" args? ")" | "." IDENT )*
//! primary    → "true" | "false" | "nil" | NUMBER | STRING
//!            | "(" expression ")" | IDENT | "this" | "super" "." IDENT
//! ```
//!
//! `for` loops are desugared here into an initializer block wrapping a
//! `while` loop, so the later stages never see a `for` node.

use crate::ast::{Expr, ExprKind, FunctionDecl, LiteralValue, Stmt};
use crate::error::Diagnostics;
use crate::token::{Literal, Token, TokenKind};
use std::rc::Rc;

/// Hard cap on parameters per declaration and arguments per call site.
const MAX_ARGUMENTS: usize = 255;

/// Marker for a syntax error that has already been reported. Parsing
/// unwinds to the nearest statement boundary and synchronizes there.
#[derive(Debug)]
pub struct ParseError;

type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    diagnostics: &'a mut Diagnostics,
    current: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, diagnostics: &'a mut Diagnostics) -> Self {
        Parser {
            tokens,
            diagnostics,
            current: 0,
        }
    }

    /// Parse the token stream into a statement list. Erroneous declarations
    /// are dropped after synchronization; the error flag on the diagnostics
    /// handle records that the program must not run.
    pub fn parse(mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        statements
    }

    // ========================================================================
    // Declarations and statements
    // ========================================================================

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.matches(&[TokenKind::Class]) {
            self.class_declaration()
        } else if self.matches(&[TokenKind::Fun]) {
            self.function("function").map(Stmt::Function)
        } else if self.matches(&[TokenKind::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(statement) => Some(statement),
            Err(ParseError) => {
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self
            .consume(TokenKind::Identifier, "Expect class name.")?
            .clone();

        let superclass = if self.matches(&[TokenKind::Less]) {
            let super_name = self
                .consume(TokenKind::Identifier, "Expect superclass name.")?
                .clone();
            Some(Expr::new(ExprKind::Variable { name: super_name }))
        } else {
            None
        };

        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenKind::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    fn function(&mut self, kind: &str) -> ParseResult<Rc<FunctionDecl>> {
        let name = self
            .consume(TokenKind::Identifier, &format!("Expect {} name.", kind))?
            .clone();
        self.consume(
            TokenKind::LeftParen,
            &format!("Expect '(' after {} name.", kind),
        )?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGUMENTS {
                    let token = self.peek().clone();
                    self.diagnostics
                        .error_at(&token, "Can't have more than 255 parameters.");
                }
                params.push(
                    self.consume(TokenKind::Identifier, "Expect parameter name.")?
                        .clone(),
                );
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;

        self.consume(
            TokenKind::LeftBrace,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self
            .consume(TokenKind::Identifier, "Expected variable name.")?
            .clone();

        let initializer = if self.matches(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenKind::Semicolon,
            "Expected ';' after variable declaration.",
        )?;
        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.matches(&[TokenKind::For]) {
            return self.for_statement();
        }
        if self.matches(&[TokenKind::If]) {
            return self.if_statement();
        }
        if self.matches(&[TokenKind::Print]) {
            return self.print_statement();
        }
        if self.matches(&[TokenKind::Return]) {
            return self.return_statement();
        }
        if self.matches(&[TokenKind::While]) {
            return self.while_statement();
        }
        if self.matches(&[TokenKind::LeftBrace]) {
            return Ok(Stmt::Block(self.block()?));
        }
        self.expression_statement()
    }

    /// Desugar `for (init; cond; incr) body` into
    /// `{ init; while (cond) { body; incr; } }`.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.matches(&[TokenKind::Semicolon]) {
            None
        } else if self.matches(&[TokenKind::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenKind::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition =
            condition.unwrap_or_else(|| Expr::new(ExprKind::Literal(LiteralValue::Bool(true))));
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expression = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expression))
    }

    // ========================================================================
    // Expressions, by precedence
    // ========================================================================

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or()?;

        if self.matches(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);

            return Ok(match expr.kind {
                ExprKind::Variable { name } => Expr::new(ExprKind::Assign { name, value }),
                ExprKind::Get { object, name } => {
                    Expr::new(ExprKind::Set {
                        object,
                        name,
                        value,
                    })
                }
                kind => {
                    // Report but keep parsing; the target expression stands.
                    self.diagnostics
                        .error_at(&equals, "Invalid assignment target.");
                    Expr { id: expr.id, kind }
                }
            });
        }

        Ok(expr)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;

        while self.matches(&[TokenKind::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::new(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while self.matches(&[TokenKind::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::new(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while self.matches(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::new(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while self.matches(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::new(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        while self.matches(&[TokenKind::Minus, TokenKind::Plus]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::new(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while self.matches(&[TokenKind::Slash, TokenKind::Star]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::new(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.matches(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::new(ExprKind::Unary {
                operator,
                right: Box::new(right),
            }));
        }

        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.matches(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.matches(&[TokenKind::Dot]) {
                let name = self
                    .consume(TokenKind::Identifier, "Expect property name after '.'.")?
                    .clone();
                expr = Expr::new(ExprKind::Get {
                    object: Box::new(expr),
                    name,
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGUMENTS {
                    let token = self.peek().clone();
                    self.diagnostics
                        .error_at(&token, "Can't have more than 255 arguments.");
                }
                arguments.push(self.expression()?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }

        let paren = self
            .consume(TokenKind::RightParen, "Expect ')' after arguments.")?
            .clone();

        Ok(Expr::new(ExprKind::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        }))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.matches(&[TokenKind::False]) {
            return Ok(Expr::new(ExprKind::Literal(LiteralValue::Bool(false))));
        }
        if self.matches(&[TokenKind::True]) {
            return Ok(Expr::new(ExprKind::Literal(LiteralValue::Bool(true))));
        }
        if self.matches(&[TokenKind::Nil]) {
            return Ok(Expr::new(ExprKind::Literal(LiteralValue::Nil)));
        }

        if self.matches(&[TokenKind::Number, TokenKind::String]) {
            let literal = match &self.previous().literal {
                Some(Literal::Number(n)) => LiteralValue::Number(*n),
                Some(Literal::String(s)) => LiteralValue::String(s.clone()),
                None => LiteralValue::Nil,
            };
            return Ok(Expr::new(ExprKind::Literal(literal)));
        }

        if self.matches(&[TokenKind::Super]) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Dot, "Expect '.' after 'super'.")?;
            let method = self
                .consume(TokenKind::Identifier, "Expect superclass method name.")?
                .clone();
            return Ok(Expr::new(ExprKind::Super { keyword, method }));
        }

        if self.matches(&[TokenKind::This]) {
            let keyword = self.previous().clone();
            return Ok(Expr::new(ExprKind::This { keyword }));
        }

        if self.matches(&[TokenKind::Identifier]) {
            let name = self.previous().clone();
            return Ok(Expr::new(ExprKind::Variable { name }));
        }

        if self.matches(&[TokenKind::LeftParen]) {
            let expression = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::new(ExprKind::Grouping(Box::new(expression))));
        }

        let token = self.peek().clone();
        self.diagnostics.error_at(&token, "Expect expression.");
        Err(ParseError)
    }

    // ========================================================================
    // Token stream helpers
    // ========================================================================

    /// Discard tokens until a statement boundary: just past a semicolon, or
    /// just before a token that begins a declaration or statement.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }

            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }

            self.advance();
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<&Token> {
        if self.check(kind) {
            return Ok(self.advance());
        }

        let token = self.peek().clone();
        self.diagnostics.error_at(&token, message);
        Err(ParseError)
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        for &kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }
}
