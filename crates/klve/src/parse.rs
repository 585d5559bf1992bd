//! Recursive-descent parser for the JavaScript subset.
//!
//! Automatic semicolon insertion follows the usual rule: a statement may end
//! at a `;`, before a `}`, at end of input, or at a line break. The
//! restricted productions (`return`, `throw`, `break`, `continue`, postfix
//! `++`/`--`) honor the no-newline constraint.
//!
//! Constructs outside the subset are rejected here with a `SyntaxError`
//! naming the construct, so callers can distinguish the deliberate boundary
//! from malformed input.

use crate::{
    ast::{
        ArrowBody, ArrowExpr, AssignOp, BinaryOp, CatchClause, CodeLoc, CodeRange, DeclKind, Declarator, Expr,
        ExprKind, ForInit, FunctionExpr, LogicalOp, ProgramAst, PropAccess, PropKey, Property, Stmt, StmtKind,
        UnaryOp, UpdateOp,
    },
    exception::Exception,
    lexer::{Kw, Punct, Token, TokenKind, tokenize},
};

/// Maximum nesting depth during parsing, counted per grammar-rule entry
/// (several per syntactic level). Prevents stack overflow on pathological
/// inputs like `((((((…))))))` while leaving room for instrumented output,
/// which nests an order of magnitude deeper than the program it came from.
#[cfg(not(debug_assertions))]
pub const MAX_NESTING_DEPTH: u32 = 1000;
/// Lower in debug builds, where stack frames are much larger.
#[cfg(debug_assertions)]
pub const MAX_NESTING_DEPTH: u32 = 400;

/// Parses a full source file.
pub fn parse(source: &str) -> Result<ProgramAst, Exception> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let body = parser.statements_until_eof()?;
    Ok(ProgramAst { body })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: u32,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_punct(&self, p: Punct) -> bool {
        matches!(&self.peek().kind, TokenKind::Punct(q) if *q == p)
    }

    fn at_kw(&self, kw: Kw) -> bool {
        matches!(&self.peek().kind, TokenKind::Keyword(k) if *k == kw)
    }

    fn eat_punct(&mut self, p: Punct) -> bool {
        if self.at_punct(p) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, kw: Kw) -> bool {
        if self.at_kw(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: Punct, what: &str) -> Result<Token, Exception> {
        if self.at_punct(p) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> Exception {
        let token = self.peek();
        let found = match &token.kind {
            TokenKind::Eof => "end of input".to_owned(),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::String(_) => "string literal".to_owned(),
            TokenKind::Ident(name) => format!("'{name}'"),
            TokenKind::Keyword(_) | TokenKind::Punct(_) => "this token".to_owned(),
        };
        Exception::syntax(format!("expected {what}, found {found}"), token.start())
    }

    fn unsupported(&self, construct: &str) -> Exception {
        Exception::unsupported(construct, self.peek().start())
    }

    fn enter(&mut self) -> Result<(), Exception> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(Exception::syntax("input is nested too deeply", self.peek().start()));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Consumes a statement terminator per automatic semicolon insertion.
    fn semicolon(&mut self) -> Result<(), Exception> {
        if self.eat_punct(Punct::Semicolon) {
            return Ok(());
        }
        if self.at_punct(Punct::RBrace) || matches!(self.peek().kind, TokenKind::Eof) || self.peek().newline_before {
            return Ok(());
        }
        Err(self.unexpected("';'"))
    }

    fn statements_until_eof(&mut self) -> Result<Vec<Stmt>, Exception> {
        let mut body = Vec::new();
        while !matches!(self.peek().kind, TokenKind::Eof) {
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, Exception> {
        self.expect_punct(Punct::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.at_punct(Punct::RBrace) {
            if matches!(self.peek().kind, TokenKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.statement()?);
        }
        self.bump();
        Ok(body)
    }

    fn statement(&mut self) -> Result<Stmt, Exception> {
        self.enter()?;
        let result = self.statement_inner();
        self.leave();
        result
    }

    fn statement_inner(&mut self) -> Result<Stmt, Exception> {
        let start = self.peek().start();
        let kind = self.peek().kind.clone();
        match &kind {
            TokenKind::Punct(Punct::LBrace) => {
                let body = self.block_body()?;
                Ok(self.finish_stmt(start, StmtKind::Block(body)))
            }
            TokenKind::Punct(Punct::Semicolon) => {
                self.bump();
                Ok(self.finish_stmt(start, StmtKind::Empty))
            }
            TokenKind::Keyword(kw) => match kw {
                Kw::Var | Kw::Let | Kw::Const => {
                    let (decl_kind, decls) = self.var_declaration()?;
                    self.semicolon()?;
                    Ok(self.finish_stmt(start, StmtKind::VarDecl { decl_kind, decls }))
                }
                Kw::Function => {
                    self.bump();
                    let func = self.function_rest(true)?;
                    Ok(self.finish_stmt(start, StmtKind::FunctionDecl(func)))
                }
                Kw::If => self.if_statement(start),
                Kw::For => self.for_statement(start),
                Kw::While => self.while_statement(start),
                Kw::Return => {
                    self.bump();
                    let arg = if self.restricted_argument_follows() {
                        Some(self.expression()?)
                    } else {
                        None
                    };
                    self.semicolon()?;
                    Ok(self.finish_stmt(start, StmtKind::Return(arg)))
                }
                Kw::Break => {
                    self.bump();
                    self.reject_label()?;
                    self.semicolon()?;
                    Ok(self.finish_stmt(start, StmtKind::Break))
                }
                Kw::Continue => {
                    self.bump();
                    self.reject_label()?;
                    self.semicolon()?;
                    Ok(self.finish_stmt(start, StmtKind::Continue))
                }
                Kw::Throw => {
                    self.bump();
                    if self.peek().newline_before {
                        return Err(Exception::syntax("illegal newline after throw", self.peek().start()));
                    }
                    let arg = self.expression()?;
                    self.semicolon()?;
                    Ok(self.finish_stmt(start, StmtKind::Throw(arg)))
                }
                Kw::Try => self.try_statement(start),
                Kw::Do => Err(self.unsupported("do-while loops are")),
                Kw::Class => Err(self.unsupported("classes are")),
                Kw::Switch => Err(self.unsupported("switch statements are")),
                Kw::With => Err(self.unsupported("with statements are")),
                Kw::Import => Err(self.unsupported("import declarations are")),
                Kw::Export => Err(self.unsupported("export declarations are")),
                Kw::Debugger => Err(self.unsupported("debugger statements are")),
                Kw::Async => Err(self.unsupported("async functions are")),
                _ => self.expression_statement(start),
            },
            TokenKind::Ident(_) => {
                // A label would be `ident :` at statement position.
                if matches!(self.peek_at(1).kind, TokenKind::Punct(Punct::Colon)) {
                    return Err(self.unsupported("labeled statements are"));
                }
                self.expression_statement(start)
            }
            _ => self.expression_statement(start),
        }
    }

    fn finish_stmt(&self, start: CodeLoc, kind: StmtKind) -> Stmt {
        Stmt::new(CodeRange::new(start, self.prev_end()), kind)
    }

    fn prev_end(&self) -> CodeLoc {
        if self.pos == 0 {
            return self.peek().start();
        }
        self.tokens[self.pos - 1].range.end
    }

    /// True when a `return` argument follows on the same line.
    fn restricted_argument_follows(&self) -> bool {
        if self.peek().newline_before {
            return false;
        }
        !matches!(
            &self.peek().kind,
            TokenKind::Eof | TokenKind::Punct(Punct::Semicolon | Punct::RBrace)
        )
    }

    fn reject_label(&mut self) -> Result<(), Exception> {
        if !self.peek().newline_before && matches!(self.peek().kind, TokenKind::Ident(_)) {
            return Err(self.unsupported("labeled break and continue are"));
        }
        Ok(())
    }

    fn expression_statement(&mut self, start: CodeLoc) -> Result<Stmt, Exception> {
        let expr = self.expression()?;
        self.semicolon()?;
        Ok(self.finish_stmt(start, StmtKind::Expression(expr)))
    }

    fn var_declaration(&mut self) -> Result<(DeclKind, Vec<Declarator>), Exception> {
        let decl_kind = match self.bump().kind {
            TokenKind::Keyword(Kw::Var) => DeclKind::Var,
            TokenKind::Keyword(Kw::Let) => DeclKind::Let,
            _ => DeclKind::Const,
        };
        let mut decls = Vec::new();
        loop {
            let token = self.peek().clone();
            let token_start = token.start();
            let name = match token.kind {
                TokenKind::Ident(name) => {
                    self.bump();
                    name
                }
                TokenKind::Punct(Punct::LBrace | Punct::LBracket) => {
                    return Err(self.unsupported("destructuring declarations are"));
                }
                _ => return Err(self.unexpected("a binding name")),
            };
            let init = if self.eat_punct(Punct::Assign) {
                Some(self.assignment()?)
            } else {
                None
            };
            if decl_kind == DeclKind::Const && init.is_none() {
                // `for (const x of …)` reaches here without an initializer;
                // report the loop form, not the missing initializer.
                self.reject_for_in_of()?;
                return Err(Exception::syntax(
                    "missing initializer in const declaration",
                    token_start,
                ));
            }
            decls.push(Declarator {
                name,
                name_range: token.range,
                init,
            });
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        Ok((decl_kind, decls))
    }

    fn if_statement(&mut self, start: CodeLoc) -> Result<Stmt, Exception> {
        self.bump();
        self.expect_punct(Punct::LParen, "'('")?;
        let test = self.expression()?;
        self.expect_punct(Punct::RParen, "')'")?;
        let consequent = Box::new(self.statement()?);
        let alternate = if self.eat_kw(Kw::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(self.finish_stmt(
            start,
            StmtKind::If {
                test,
                consequent,
                alternate,
            },
        ))
    }

    fn while_statement(&mut self, start: CodeLoc) -> Result<Stmt, Exception> {
        self.bump();
        self.expect_punct(Punct::LParen, "'('")?;
        let test = self.expression()?;
        self.expect_punct(Punct::RParen, "')'")?;
        let body = Box::new(self.statement()?);
        Ok(self.finish_stmt(start, StmtKind::While { test, body }))
    }

    fn for_statement(&mut self, start: CodeLoc) -> Result<Stmt, Exception> {
        self.bump();
        self.expect_punct(Punct::LParen, "'('")?;
        let init = if self.at_punct(Punct::Semicolon) {
            None
        } else if self.at_kw(Kw::Var) || self.at_kw(Kw::Let) || self.at_kw(Kw::Const) {
            let decl_start = self.peek().start();
            let (decl_kind, decls) = self.var_declaration()?;
            self.reject_for_in_of()?;
            Some(ForInit::VarDecl {
                decl_kind,
                decls,
                range: CodeRange::new(decl_start, self.prev_end()),
            })
        } else {
            let expr = self.expression()?;
            self.reject_for_in_of()?;
            Some(ForInit::Expr(expr))
        };
        self.expect_punct(Punct::Semicolon, "';'")?;
        let test = if self.at_punct(Punct::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(Punct::Semicolon, "';'")?;
        let update = if self.at_punct(Punct::RParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(Punct::RParen, "')'")?;
        let body = Box::new(self.statement()?);
        Ok(self.finish_stmt(
            start,
            StmtKind::For {
                init,
                test,
                update,
                body,
            },
        ))
    }

    fn reject_for_in_of(&mut self) -> Result<(), Exception> {
        if self.at_kw(Kw::In) {
            return Err(self.unsupported("for-in loops are"));
        }
        if matches!(&self.peek().kind, TokenKind::Ident(name) if name == "of") {
            return Err(self.unsupported("for-of loops are"));
        }
        Ok(())
    }

    fn try_statement(&mut self, start: CodeLoc) -> Result<Stmt, Exception> {
        self.bump();
        let block = self.block_body()?;
        let handler = if self.eat_kw(Kw::Catch) {
            let param = if self.eat_punct(Punct::LParen) {
                let name = match self.bump().kind {
                    TokenKind::Ident(name) => name,
                    _ => return Err(self.unexpected("a catch binding name")),
                };
                self.expect_punct(Punct::RParen, "')'")?;
                Some(name)
            } else {
                None
            };
            let body = self.block_body()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer = if self.eat_kw(Kw::Finally) {
            Some(self.block_body()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("'catch' or 'finally'"));
        }
        Ok(self.finish_stmt(
            start,
            StmtKind::Try {
                block,
                handler,
                finalizer,
            },
        ))
    }

    fn function_rest(&mut self, require_name: bool) -> Result<FunctionExpr, Exception> {
        if self.at_punct(Punct::Star) {
            return Err(self.unsupported("generator functions are"));
        }
        let name = match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.bump();
                Some(name)
            }
            _ if require_name => return Err(self.unexpected("a function name")),
            _ => None,
        };
        let params = self.parameter_list()?;
        let body = self.block_body()?;
        Ok(FunctionExpr { name, params, body })
    }

    fn parameter_list(&mut self) -> Result<Vec<String>, Exception> {
        self.expect_punct(Punct::LParen, "'('")?;
        let mut params = Vec::new();
        if self.eat_punct(Punct::RParen) {
            return Ok(params);
        }
        loop {
            if self.at_punct(Punct::Ellipsis) {
                return Err(self.unsupported("rest parameters are"));
            }
            match self.bump().kind {
                TokenKind::Ident(name) => params.push(name),
                TokenKind::Punct(Punct::LBrace | Punct::LBracket) => {
                    return Err(self.unsupported("destructuring parameters are"));
                }
                _ => return Err(self.unexpected("a parameter name")),
            }
            if self.at_punct(Punct::Assign) {
                return Err(self.unsupported("default parameter values are"));
            }
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_punct(Punct::RParen, "')'")?;
        Ok(params)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Full expression including the comma operator.
    fn expression(&mut self) -> Result<Expr, Exception> {
        self.enter()?;
        let result = self.expression_inner();
        self.leave();
        result
    }

    fn expression_inner(&mut self) -> Result<Expr, Exception> {
        let start = self.peek().start();
        let first = self.assignment()?;
        if !self.at_punct(Punct::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(Punct::Comma) {
            items.push(self.assignment()?);
        }
        Ok(Expr::new(
            CodeRange::new(start, self.prev_end()),
            ExprKind::Sequence(items),
        ))
    }

    fn assignment(&mut self) -> Result<Expr, Exception> {
        self.enter()?;
        let result = self.assignment_inner();
        self.leave();
        result
    }

    fn assignment_inner(&mut self) -> Result<Expr, Exception> {
        let start = self.peek().start();
        if let Some(arrow) = self.try_arrow()? {
            return Ok(arrow);
        }
        let left = self.conditional()?;
        let op = match &self.peek().kind {
            TokenKind::Punct(p) => match p {
                Punct::Assign => AssignOp::Assign,
                Punct::AddAssign => AssignOp::Add,
                Punct::SubAssign => AssignOp::Sub,
                Punct::MulAssign => AssignOp::Mul,
                Punct::DivAssign => AssignOp::Div,
                Punct::ModAssign => AssignOp::Mod,
                Punct::ExpAssign => AssignOp::Exp,
                Punct::BitAndAssign => AssignOp::BitAnd,
                Punct::BitOrAssign => AssignOp::BitOr,
                Punct::BitXorAssign => AssignOp::BitXor,
                Punct::ShlAssign => AssignOp::Shl,
                Punct::ShrAssign => AssignOp::Shr,
                Punct::UShrAssign => AssignOp::UShr,
                Punct::AndAssign | Punct::OrAssign | Punct::NullishAssign => {
                    return Err(self.unsupported("logical assignment operators are"));
                }
                _ => return Ok(left),
            },
            _ => return Ok(left),
        };
        if !matches!(left.kind, ExprKind::Identifier(_) | ExprKind::Member { .. }) {
            return Err(Exception::syntax("invalid assignment target", left.range.start));
        }
        self.bump();
        let value = self.assignment()?;
        Ok(Expr::new(
            CodeRange::new(start, self.prev_end()),
            ExprKind::Assign {
                op,
                target: Box::new(left),
                value: Box::new(value),
            },
        ))
    }

    /// Parses an arrow function if one starts at the current position.
    fn try_arrow(&mut self) -> Result<Option<Expr>, Exception> {
        let start = self.peek().start();
        let params = match &self.peek().kind {
            TokenKind::Ident(name) => {
                if !matches!(self.peek_at(1).kind, TokenKind::Punct(Punct::Arrow)) {
                    return Ok(None);
                }
                let params = vec![name.clone()];
                self.bump();
                params
            }
            TokenKind::Punct(Punct::LParen) => {
                if !self.paren_starts_arrow() {
                    return Ok(None);
                }
                self.parameter_list()?
            }
            _ => return Ok(None),
        };
        // The `=>` must be on the same line as the parameter list.
        if self.peek().newline_before {
            return Err(Exception::syntax("illegal newline before '=>'", self.peek().start()));
        }
        self.expect_punct(Punct::Arrow, "'=>'")?;
        let body = if self.at_punct(Punct::LBrace) {
            ArrowBody::Block(self.block_body()?)
        } else {
            ArrowBody::Expr(Box::new(self.assignment()?))
        };
        Ok(Some(Expr::new(
            CodeRange::new(start, self.prev_end()),
            ExprKind::Arrow(Box::new(ArrowExpr { params, body })),
        )))
    }

    /// Lookahead: does the parenthesized group at the current position close
    /// and continue with `=>`?
    fn paren_starts_arrow(&self) -> bool {
        let mut depth = 0usize;
        let mut offset = 0usize;
        loop {
            match &self.peek_at(offset).kind {
                TokenKind::Punct(Punct::LParen) => depth += 1,
                TokenKind::Punct(Punct::RParen) => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(self.peek_at(offset + 1).kind, TokenKind::Punct(Punct::Arrow));
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            offset += 1;
        }
    }

    fn conditional(&mut self) -> Result<Expr, Exception> {
        let start = self.peek().start();
        let test = self.binary(0)?;
        if !self.eat_punct(Punct::Question) {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect_punct(Punct::Colon, "':'")?;
        let alternate = self.assignment()?;
        Ok(Expr::new(
            CodeRange::new(start, self.prev_end()),
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
        ))
    }

    fn binary_precedence(&self) -> Option<(u8, Option<BinaryOp>, Option<LogicalOp>)> {
        let op = match &self.peek().kind {
            TokenKind::Punct(p) => match p {
                Punct::Nullish => return Some((1, None, Some(LogicalOp::Nullish))),
                Punct::Or => return Some((1, None, Some(LogicalOp::Or))),
                Punct::And => return Some((2, None, Some(LogicalOp::And))),
                Punct::BitOr => (3, BinaryOp::BitOr),
                Punct::BitXor => (4, BinaryOp::BitXor),
                Punct::BitAnd => (5, BinaryOp::BitAnd),
                Punct::EqLoose => (6, BinaryOp::EqLoose),
                Punct::NeLoose => (6, BinaryOp::NeLoose),
                Punct::EqStrict => (6, BinaryOp::EqStrict),
                Punct::NeStrict => (6, BinaryOp::NeStrict),
                Punct::Lt => (7, BinaryOp::Lt),
                Punct::Gt => (7, BinaryOp::Gt),
                Punct::Le => (7, BinaryOp::Le),
                Punct::Ge => (7, BinaryOp::Ge),
                Punct::Shl => (8, BinaryOp::Shl),
                Punct::Shr => (8, BinaryOp::Shr),
                Punct::UShr => (8, BinaryOp::UShr),
                Punct::Plus => (9, BinaryOp::Add),
                Punct::Minus => (9, BinaryOp::Sub),
                Punct::Star => (10, BinaryOp::Mul),
                Punct::Slash => (10, BinaryOp::Div),
                Punct::Percent => (10, BinaryOp::Mod),
                Punct::Exp => (11, BinaryOp::Exp),
                _ => return None,
            },
            TokenKind::Keyword(Kw::In) => (7, BinaryOp::In),
            TokenKind::Keyword(Kw::InstanceOf) => (7, BinaryOp::InstanceOf),
            _ => return None,
        };
        Some((op.0, Some(op.1), None))
    }

    fn binary(&mut self, min_prec: u8) -> Result<Expr, Exception> {
        self.enter()?;
        let result = self.binary_inner(min_prec);
        self.leave();
        result
    }

    fn binary_inner(&mut self, min_prec: u8) -> Result<Expr, Exception> {
        let start = self.peek().start();
        let mut left = self.unary()?;
        while let Some((prec, bin_op, log_op)) = self.binary_precedence() {
            if prec < min_prec {
                break;
            }
            self.bump();
            // `**` is right-associative; everything else here is left.
            let next_min = if bin_op == Some(BinaryOp::Exp) { prec } else { prec + 1 };
            let right = self.binary(next_min)?;
            let range = CodeRange::new(start, self.prev_end());
            left = match (bin_op, log_op) {
                (Some(op), _) => Expr::new(
                    range,
                    ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                ),
                (_, Some(op)) => Expr::new(
                    range,
                    ExprKind::Logical {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                ),
                _ => unreachable!("binary_precedence returns one operator"),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, Exception> {
        self.enter()?;
        let result = self.unary_inner();
        self.leave();
        result
    }

    fn unary_inner(&mut self) -> Result<Expr, Exception> {
        let start = self.peek().start();
        let op = match &self.peek().kind {
            TokenKind::Punct(Punct::Minus) => Some(UnaryOp::Minus),
            TokenKind::Punct(Punct::Plus) => Some(UnaryOp::Plus),
            TokenKind::Punct(Punct::Not) => Some(UnaryOp::Not),
            TokenKind::Punct(Punct::BitNot) => Some(UnaryOp::BitNot),
            TokenKind::Keyword(Kw::TypeOf) => Some(UnaryOp::TypeOf),
            TokenKind::Keyword(Kw::Void) => Some(UnaryOp::Void),
            TokenKind::Keyword(Kw::Delete) => Some(UnaryOp::Delete),
            TokenKind::Keyword(Kw::Await) => return Err(self.unsupported("await expressions are")),
            TokenKind::Keyword(Kw::Yield) => return Err(self.unsupported("yield expressions are")),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.unary()?;
            return Ok(Expr::new(
                CodeRange::new(start, self.prev_end()),
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            ));
        }
        if self.at_punct(Punct::Inc) || self.at_punct(Punct::Dec) {
            let op = if self.at_punct(Punct::Inc) { UpdateOp::Inc } else { UpdateOp::Dec };
            self.bump();
            let target = self.unary()?;
            self.check_update_target(&target)?;
            return Ok(Expr::new(
                CodeRange::new(start, self.prev_end()),
                ExprKind::Update {
                    op,
                    prefix: true,
                    target: Box::new(target),
                },
            ));
        }
        self.postfix()
    }

    fn check_update_target(&self, target: &Expr) -> Result<(), Exception> {
        if matches!(target.kind, ExprKind::Identifier(_) | ExprKind::Member { .. }) {
            Ok(())
        } else {
            Err(Exception::syntax(
                "invalid update expression target",
                target.range.start,
            ))
        }
    }

    fn postfix(&mut self) -> Result<Expr, Exception> {
        let start = self.peek().start();
        let expr = self.call_or_member()?;
        // Postfix `++`/`--` may not be preceded by a line break.
        if (self.at_punct(Punct::Inc) || self.at_punct(Punct::Dec)) && !self.peek().newline_before {
            let op = if self.at_punct(Punct::Inc) { UpdateOp::Inc } else { UpdateOp::Dec };
            self.bump();
            self.check_update_target(&expr)?;
            return Ok(Expr::new(
                CodeRange::new(start, self.prev_end()),
                ExprKind::Update {
                    op,
                    prefix: false,
                    target: Box::new(expr),
                },
            ));
        }
        Ok(expr)
    }

    fn call_or_member(&mut self) -> Result<Expr, Exception> {
        let start = self.peek().start();
        let mut expr = if self.at_kw(Kw::New) {
            self.new_expression()?
        } else {
            self.primary()?
        };
        loop {
            if self.at_punct(Punct::Dot) {
                self.bump();
                let name = self.property_name()?;
                expr = Expr::new(
                    CodeRange::new(start, self.prev_end()),
                    ExprKind::Member {
                        object: Box::new(expr),
                        property: PropAccess::Named(name),
                        optional: false,
                    },
                );
            } else if self.at_punct(Punct::OptionalDot) {
                if matches!(self.peek_at(1).kind, TokenKind::Punct(Punct::LParen)) {
                    return Err(self.unsupported("optional calls are"));
                }
                self.bump();
                let property = if self.eat_punct(Punct::LBracket) {
                    let idx = self.expression()?;
                    self.expect_punct(Punct::RBracket, "']'")?;
                    PropAccess::Computed(Box::new(idx))
                } else {
                    PropAccess::Named(self.property_name()?)
                };
                expr = Expr::new(
                    CodeRange::new(start, self.prev_end()),
                    ExprKind::Member {
                        object: Box::new(expr),
                        property,
                        optional: true,
                    },
                );
            } else if self.at_punct(Punct::LBracket) {
                self.bump();
                let idx = self.expression()?;
                self.expect_punct(Punct::RBracket, "']'")?;
                expr = Expr::new(
                    CodeRange::new(start, self.prev_end()),
                    ExprKind::Member {
                        object: Box::new(expr),
                        property: PropAccess::Computed(Box::new(idx)),
                        optional: false,
                    },
                );
            } else if self.at_punct(Punct::LParen) {
                let args = self.argument_list()?;
                expr = Expr::new(
                    CodeRange::new(start, self.prev_end()),
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn new_expression(&mut self) -> Result<Expr, Exception> {
        let start = self.peek().start();
        self.bump();
        // The callee of `new` is a member chain without call expressions.
        let mut callee = self.primary()?;
        loop {
            if self.at_punct(Punct::Dot) {
                self.bump();
                let name = self.property_name()?;
                callee = Expr::new(
                    CodeRange::new(start, self.prev_end()),
                    ExprKind::Member {
                        object: Box::new(callee),
                        property: PropAccess::Named(name),
                        optional: false,
                    },
                );
            } else if self.at_punct(Punct::LBracket) {
                self.bump();
                let idx = self.expression()?;
                self.expect_punct(Punct::RBracket, "']'")?;
                callee = Expr::new(
                    CodeRange::new(start, self.prev_end()),
                    ExprKind::Member {
                        object: Box::new(callee),
                        property: PropAccess::Computed(Box::new(idx)),
                        optional: false,
                    },
                );
            } else {
                break;
            }
        }
        let args = if self.at_punct(Punct::LParen) {
            self.argument_list()?
        } else {
            Vec::new()
        };
        Ok(Expr::new(
            CodeRange::new(start, self.prev_end()),
            ExprKind::New {
                callee: Box::new(callee),
                args,
            },
        ))
    }

    fn property_name(&mut self) -> Result<String, Exception> {
        match self.bump().kind {
            TokenKind::Ident(name) => Ok(name),
            // Keywords are valid property names after a dot.
            TokenKind::Keyword(kw) => Ok(keyword_text(kw).to_owned()),
            _ => Err(self.unexpected("a property name")),
        }
    }

    fn argument_list(&mut self) -> Result<Vec<Expr>, Exception> {
        self.expect_punct(Punct::LParen, "'('")?;
        let mut args = Vec::new();
        if self.eat_punct(Punct::RParen) {
            return Ok(args);
        }
        loop {
            if self.at_punct(Punct::Ellipsis) {
                return Err(self.unsupported("spread arguments are"));
            }
            args.push(self.assignment()?);
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_punct(Punct::RParen, "')'")?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, Exception> {
        let start = self.peek().start();
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.bump();
                Ok(Expr::new(token.range, ExprKind::Number(n)))
            }
            TokenKind::String(s) => {
                self.bump();
                Ok(Expr::new(token.range, ExprKind::String(s)))
            }
            TokenKind::Ident(name) => {
                self.bump();
                Ok(Expr::new(token.range, ExprKind::Identifier(name)))
            }
            TokenKind::Keyword(kw) => match kw {
                Kw::True => {
                    self.bump();
                    Ok(Expr::new(token.range, ExprKind::Bool(true)))
                }
                Kw::False => {
                    self.bump();
                    Ok(Expr::new(token.range, ExprKind::Bool(false)))
                }
                Kw::Null => {
                    self.bump();
                    Ok(Expr::new(token.range, ExprKind::Null))
                }
                Kw::This => {
                    self.bump();
                    Ok(Expr::new(token.range, ExprKind::This))
                }
                Kw::Function => {
                    self.bump();
                    let func = self.function_rest(false)?;
                    Ok(Expr::new(
                        CodeRange::new(start, self.prev_end()),
                        ExprKind::Function(Box::new(func)),
                    ))
                }
                Kw::Class => Err(self.unsupported("class expressions are")),
                Kw::Async => Err(self.unsupported("async functions are")),
                Kw::Super => Err(self.unsupported("super references are")),
                _ => Err(self.unexpected("an expression")),
            },
            TokenKind::Punct(Punct::LParen) => {
                self.bump();
                let expr = self.expression()?;
                self.expect_punct(Punct::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::Punct(Punct::LBracket) => self.array_literal(start),
            TokenKind::Punct(Punct::LBrace) => self.object_literal(start),
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn array_literal(&mut self, start: CodeLoc) -> Result<Expr, Exception> {
        self.bump();
        let mut items = Vec::new();
        while !self.at_punct(Punct::RBracket) {
            if self.at_punct(Punct::Comma) {
                return Err(self.unsupported("array holes are"));
            }
            if self.at_punct(Punct::Ellipsis) {
                return Err(self.unsupported("spread elements are"));
            }
            items.push(self.assignment()?);
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_punct(Punct::RBracket, "']'")?;
        Ok(Expr::new(
            CodeRange::new(start, self.prev_end()),
            ExprKind::Array(items),
        ))
    }

    fn object_literal(&mut self, start: CodeLoc) -> Result<Expr, Exception> {
        self.bump();
        let mut props = Vec::new();
        while !self.at_punct(Punct::RBrace) {
            if self.at_punct(Punct::Ellipsis) {
                return Err(self.unsupported("spread properties are"));
            }
            props.push(self.object_property()?);
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_punct(Punct::RBrace, "'}'")?;
        Ok(Expr::new(
            CodeRange::new(start, self.prev_end()),
            ExprKind::Object(props),
        ))
    }

    fn object_property(&mut self) -> Result<Property, Exception> {
        let token = self.peek().clone();
        let key = match &token.kind {
            TokenKind::Ident(name) => {
                self.bump();
                PropKey::Named(name.clone())
            }
            TokenKind::Keyword(kw) => {
                self.bump();
                PropKey::Named(keyword_text(*kw).to_owned())
            }
            TokenKind::String(s) => {
                self.bump();
                PropKey::Named(s.clone())
            }
            TokenKind::Number(n) => {
                self.bump();
                PropKey::Named(crate::value::number_to_string(*n))
            }
            TokenKind::Punct(Punct::LBracket) => {
                self.bump();
                let key = self.assignment()?;
                self.expect_punct(Punct::RBracket, "']'")?;
                PropKey::Computed(Box::new(key))
            }
            _ => return Err(self.unexpected("a property key")),
        };
        // Method shorthand desugars to a plain function-valued property.
        if self.at_punct(Punct::LParen) {
            let params = self.parameter_list()?;
            let body = self.block_body()?;
            let name = match &key {
                PropKey::Named(name) => Some(name.clone()),
                PropKey::Computed(_) => None,
            };
            let value = Expr::new(
                CodeRange::new(token.start(), self.prev_end()),
                ExprKind::Function(Box::new(FunctionExpr { name, params, body })),
            );
            return Ok(Property { key, value });
        }
        if self.eat_punct(Punct::Colon) {
            let value = self.assignment()?;
            return Ok(Property { key, value });
        }
        // Shorthand `{ a }`.
        match &key {
            PropKey::Named(name) if matches!(token.kind, TokenKind::Ident(_)) => {
                let value = Expr::new(token.range, ExprKind::Identifier(name.clone()));
                Ok(Property { key, value })
            }
            _ => Err(self.unexpected("':'")),
        }
    }
}

fn keyword_text(kw: Kw) -> &'static str {
    match kw {
        Kw::Var => "var",
        Kw::Let => "let",
        Kw::Const => "const",
        Kw::Function => "function",
        Kw::Return => "return",
        Kw::If => "if",
        Kw::Else => "else",
        Kw::For => "for",
        Kw::While => "while",
        Kw::Do => "do",
        Kw::Break => "break",
        Kw::Continue => "continue",
        Kw::New => "new",
        Kw::Delete => "delete",
        Kw::TypeOf => "typeof",
        Kw::Void => "void",
        Kw::In => "in",
        Kw::InstanceOf => "instanceof",
        Kw::This => "this",
        Kw::Null => "null",
        Kw::True => "true",
        Kw::False => "false",
        Kw::Try => "try",
        Kw::Catch => "catch",
        Kw::Finally => "finally",
        Kw::Throw => "throw",
        Kw::Class => "class",
        Kw::Async => "async",
        Kw::Await => "await",
        Kw::Yield => "yield",
        Kw::Switch => "switch",
        Kw::Case => "case",
        Kw::Default => "default",
        Kw::Import => "import",
        Kw::Export => "export",
        Kw::Super => "super",
        Kw::Extends => "extends",
        Kw::Static => "static",
        Kw::Debugger => "debugger",
        Kw::With => "with",
    }
}
