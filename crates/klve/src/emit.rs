//! AST-to-source emitter.
//!
//! The transformer's output is source text, which the executor parses again
//! with the same front end, so the emitter and parser must agree exactly.
//! Statements always end in explicit semicolons; parentheses are inserted
//! from operator precedence plus the handful of positions JavaScript treats
//! specially (object literals and functions at statement start, `new`
//! callees, `??` mixed with `&&`/`||`).

use std::fmt::Write as _;

use crate::{
    ast::{
        ArrowBody, Expr, ExprKind, ForInit, FunctionExpr, LogicalOp, ProgramAst, PropAccess, PropKey, Stmt, StmtKind,
        UnaryOp,
    },
    value::number_to_string,
};

/// Emits a whole program.
#[must_use]
pub fn emit(program: &ProgramAst) -> String {
    let mut emitter = Emitter {
        out: String::new(),
        indent: 0,
    };
    for stmt in &program.body {
        emitter.stmt(stmt);
    }
    emitter.out
}

/// Emits a single expression, mainly for tests and diagnostics.
#[must_use]
pub fn emit_expr(expr: &Expr) -> String {
    let mut emitter = Emitter {
        out: String::new(),
        indent: 0,
    };
    emitter.expr(expr, 0);
    emitter.out
}

// Precedence levels, tightest last. Children are emitted with the minimum
// level their position requires; anything looser gets parentheses.
const PREC_SEQUENCE: u8 = 0;
const PREC_ASSIGN: u8 = 1;
const PREC_CONDITIONAL: u8 = 2;
const PREC_NULLISH: u8 = 3;
const PREC_OR: u8 = 3;
const PREC_AND: u8 = 4;
const PREC_BIT_OR: u8 = 5;
const PREC_BIT_XOR: u8 = 6;
const PREC_BIT_AND: u8 = 7;
const PREC_EQUALITY: u8 = 8;
const PREC_RELATIONAL: u8 = 9;
const PREC_SHIFT: u8 = 10;
const PREC_ADDITIVE: u8 = 11;
const PREC_MULTIPLICATIVE: u8 = 12;
const PREC_EXPONENT: u8 = 13;
const PREC_UNARY: u8 = 14;
const PREC_POSTFIX: u8 = 15;
const PREC_CALL: u8 = 16;
const PREC_PRIMARY: u8 = 17;

fn binary_prec(op: crate::ast::BinaryOp) -> u8 {
    use crate::ast::BinaryOp as B;
    match op {
        B::BitOr => PREC_BIT_OR,
        B::BitXor => PREC_BIT_XOR,
        B::BitAnd => PREC_BIT_AND,
        B::EqLoose | B::NeLoose | B::EqStrict | B::NeStrict => PREC_EQUALITY,
        B::Lt | B::Gt | B::Le | B::Ge | B::In | B::InstanceOf => PREC_RELATIONAL,
        B::Shl | B::Shr | B::UShr => PREC_SHIFT,
        B::Add | B::Sub => PREC_ADDITIVE,
        B::Mul | B::Div | B::Mod => PREC_MULTIPLICATIVE,
        B::Exp => PREC_EXPONENT,
    }
}

fn precedence(kind: &ExprKind) -> u8 {
    match kind {
        ExprKind::Sequence(_) => PREC_SEQUENCE,
        ExprKind::Assign { .. } | ExprKind::Arrow(_) => PREC_ASSIGN,
        ExprKind::Conditional { .. } => PREC_CONDITIONAL,
        ExprKind::Logical { op, .. } => match op {
            LogicalOp::Nullish => PREC_NULLISH,
            LogicalOp::Or => PREC_OR,
            LogicalOp::And => PREC_AND,
        },
        ExprKind::Binary { op, .. } => binary_prec(*op),
        ExprKind::Unary { .. } => PREC_UNARY,
        ExprKind::Update { prefix, .. } => {
            if *prefix {
                PREC_UNARY
            } else {
                PREC_POSTFIX
            }
        }
        ExprKind::Call { .. } | ExprKind::New { .. } | ExprKind::Member { .. } => PREC_CALL,
        _ => PREC_PRIMARY,
    }
}

struct Emitter {
    out: String,
    indent: usize,
}

impl Emitter {
    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.line_start();
        self.stmt_inline(stmt);
        self.out.push('\n');
    }

    fn stmt_inline(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                if starts_ambiguously(expr) {
                    self.out.push('(');
                    self.expr(expr, 0);
                    self.out.push_str(");");
                } else {
                    self.expr(expr, 0);
                    self.out.push(';');
                }
            }
            StmtKind::VarDecl { decl_kind, decls } => {
                self.out.push_str(decl_kind.as_str());
                self.out.push(' ');
                for (index, decl) in decls.iter().enumerate() {
                    if index > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&decl.name);
                    if let Some(init) = &decl.init {
                        self.out.push_str(" = ");
                        self.expr(init, PREC_ASSIGN);
                    }
                }
                self.out.push(';');
            }
            StmtKind::Block(body) => self.block(body),
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.out.push_str("if (");
                self.expr(test, 0);
                self.out.push_str(") ");
                self.nested_stmt(consequent);
                if let Some(alternate) = alternate {
                    self.out.push_str(" else ");
                    self.nested_stmt(alternate);
                }
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.out.push_str("for (");
                match init {
                    Some(ForInit::VarDecl { decl_kind, decls, .. }) => {
                        self.out.push_str(decl_kind.as_str());
                        self.out.push(' ');
                        for (index, decl) in decls.iter().enumerate() {
                            if index > 0 {
                                self.out.push_str(", ");
                            }
                            self.out.push_str(&decl.name);
                            if let Some(init) = &decl.init {
                                self.out.push_str(" = ");
                                self.expr(init, PREC_ASSIGN);
                            }
                        }
                    }
                    Some(ForInit::Expr(expr)) => self.expr(expr, 0),
                    None => {}
                }
                self.out.push_str("; ");
                if let Some(test) = test {
                    self.expr(test, 0);
                }
                self.out.push_str("; ");
                if let Some(update) = update {
                    self.expr(update, 0);
                }
                self.out.push_str(") ");
                self.nested_stmt(body);
            }
            StmtKind::While { test, body } => {
                self.out.push_str("while (");
                self.expr(test, 0);
                self.out.push_str(") ");
                self.nested_stmt(body);
            }
            StmtKind::Return(arg) => {
                self.out.push_str("return");
                if let Some(arg) = arg {
                    self.out.push(' ');
                    self.expr(arg, 0);
                }
                self.out.push(';');
            }
            StmtKind::Break => self.out.push_str("break;"),
            StmtKind::Continue => self.out.push_str("continue;"),
            StmtKind::Throw(arg) => {
                self.out.push_str("throw ");
                self.expr(arg, 0);
                self.out.push(';');
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                self.out.push_str("try ");
                self.block(block);
                if let Some(handler) = handler {
                    match &handler.param {
                        Some(param) => {
                            self.out.push_str(" catch (");
                            self.out.push_str(param);
                            self.out.push_str(") ");
                        }
                        None => self.out.push_str(" catch "),
                    }
                    self.block(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.out.push_str(" finally ");
                    self.block(finalizer);
                }
            }
            StmtKind::FunctionDecl(func) => self.function(func),
            StmtKind::Empty => self.out.push(';'),
        }
    }

    fn nested_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Block(body) => self.block(body),
            _ => self.stmt_inline(stmt),
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        if body.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push_str("{\n");
        self.indent += 1;
        for stmt in body {
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.line_start();
        self.out.push('}');
    }

    fn function(&mut self, func: &FunctionExpr) {
        self.out.push_str("function");
        if let Some(name) = &func.name {
            self.out.push(' ');
            self.out.push_str(name);
        }
        self.out.push('(');
        for (index, param) in func.params.iter().enumerate() {
            if index > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(param);
        }
        self.out.push_str(") ");
        self.block(&func.body);
    }

    fn expr(&mut self, expr: &Expr, min_prec: u8) {
        let prec = precedence(&expr.kind);
        if prec < min_prec {
            self.out.push('(');
            self.expr_inner(expr);
            self.out.push(')');
        } else {
            self.expr_inner(expr);
        }
    }

    fn expr_inner(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Number(n) => {
                let _ = write!(self.out, "{}", number_to_string(*n));
            }
            ExprKind::String(s) => self.string_literal(s),
            ExprKind::Bool(b) => {
                let _ = write!(self.out, "{b}");
            }
            ExprKind::Null => self.out.push_str("null"),
            ExprKind::Identifier(name) => self.out.push_str(name),
            ExprKind::This => self.out.push_str("this"),
            ExprKind::Array(items) => {
                self.out.push('[');
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(item, PREC_ASSIGN);
                }
                self.out.push(']');
            }
            ExprKind::Object(props) => {
                if props.is_empty() {
                    self.out.push_str("{}");
                    return;
                }
                self.out.push_str("{ ");
                for (index, prop) in props.iter().enumerate() {
                    if index > 0 {
                        self.out.push_str(", ");
                    }
                    match &prop.key {
                        PropKey::Named(name) => {
                            if is_identifier_name(name) {
                                self.out.push_str(name);
                            } else {
                                self.string_literal(name);
                            }
                        }
                        PropKey::Computed(key) => {
                            self.out.push('[');
                            self.expr(key, PREC_ASSIGN);
                            self.out.push(']');
                        }
                    }
                    self.out.push_str(": ");
                    self.expr(&prop.value, PREC_ASSIGN);
                }
                self.out.push_str(" }");
            }
            ExprKind::Function(func) => self.function(func),
            ExprKind::Arrow(arrow) => {
                self.out.push('(');
                for (index, param) in arrow.params.iter().enumerate() {
                    if index > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(param);
                }
                self.out.push_str(") => ");
                match &arrow.body {
                    ArrowBody::Block(body) => self.block(body),
                    ArrowBody::Expr(body) => {
                        if starts_ambiguously(body) {
                            self.out.push('(');
                            self.expr(body, 0);
                            self.out.push(')');
                        } else {
                            self.expr(body, PREC_ASSIGN);
                        }
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                self.out.push_str(op.as_str());
                let needs_space = op.is_word() || starts_with_sign(operand, *op);
                if needs_space {
                    self.out.push(' ');
                }
                self.expr(operand, PREC_UNARY);
            }
            ExprKind::Update { op, prefix, target } => {
                if *prefix {
                    self.out.push_str(op.as_str());
                    self.expr(target, PREC_UNARY);
                } else {
                    self.expr(target, PREC_POSTFIX);
                    self.out.push_str(op.as_str());
                }
            }
            ExprKind::Binary { op, left, right } => {
                let prec = binary_prec(*op);
                // `**` is right-associative; the rest are left.
                let (left_min, right_min) = if *op == crate::ast::BinaryOp::Exp {
                    (prec + 1, prec)
                } else {
                    (prec, prec + 1)
                };
                self.expr(left, left_min);
                let _ = write!(self.out, " {} ", op.as_str());
                self.expr(right, right_min);
            }
            ExprKind::Logical { op, left, right } => {
                let prec = precedence(&expr.kind);
                self.logical_operand(left, *op, prec);
                let _ = write!(self.out, " {} ", op.as_str());
                self.logical_operand(right, *op, prec + 1);
            }
            ExprKind::Assign { op, target, value } => {
                self.expr(target, PREC_POSTFIX);
                let _ = write!(self.out, " {} ", op.as_str());
                self.expr(value, PREC_ASSIGN);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test, PREC_CONDITIONAL + 1);
                self.out.push_str(" ? ");
                self.expr(consequent, PREC_ASSIGN);
                self.out.push_str(" : ");
                self.expr(alternate, PREC_ASSIGN);
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee, PREC_CALL);
                self.arguments(args);
            }
            ExprKind::New { callee, args } => {
                self.out.push_str("new ");
                // Anything but a bare identifier is parenthesized so a call
                // inside the callee is not re-parsed as the `new` arguments.
                if matches!(callee.kind, ExprKind::Identifier(_)) {
                    self.expr(callee, PREC_CALL);
                } else {
                    self.out.push('(');
                    self.expr(callee, 0);
                    self.out.push(')');
                }
                self.arguments(args);
            }
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                if needs_member_parens(object) {
                    self.out.push('(');
                    self.expr(object, 0);
                    self.out.push(')');
                } else {
                    self.expr(object, PREC_CALL);
                }
                match property {
                    PropAccess::Named(name) => {
                        self.out.push_str(if *optional { "?." } else { "." });
                        self.out.push_str(name);
                    }
                    PropAccess::Computed(index) => {
                        if *optional {
                            self.out.push_str("?.");
                        }
                        self.out.push('[');
                        self.expr(index, 0);
                        self.out.push(']');
                    }
                }
            }
            ExprKind::Sequence(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(item, PREC_ASSIGN);
                }
            }
        }
    }

    /// Parenthesizes `??` mixed with `&&`/`||`, which JavaScript rejects
    /// unparenthesized.
    fn logical_operand(&mut self, operand: &Expr, parent: LogicalOp, min_prec: u8) {
        if let ExprKind::Logical { op, .. } = &operand.kind {
            let mixes = (parent == LogicalOp::Nullish) != (*op == LogicalOp::Nullish);
            if mixes {
                self.out.push('(');
                self.expr(operand, 0);
                self.out.push(')');
                return;
            }
        }
        self.expr(operand, min_prec);
    }

    fn arguments(&mut self, args: &[Expr]) {
        self.out.push('(');
        for (index, arg) in args.iter().enumerate() {
            if index > 0 {
                self.out.push_str(", ");
            }
            self.expr(arg, PREC_ASSIGN);
        }
        self.out.push(')');
    }

    fn string_literal(&mut self, s: &str) {
        self.out.push('"');
        for c in s.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                '\0' => self.out.push_str("\\0"),
                c if (c as u32) < 0x20 => {
                    let _ = write!(self.out, "\\u{:04x}", c as u32);
                }
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }
}

/// Would the statement-position expression be misparsed as a block or a
/// function declaration? Checks the leftmost sub-expression.
fn starts_ambiguously(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Object(_) | ExprKind::Function(_) => true,
        ExprKind::Sequence(items) => items.first().is_some_and(starts_ambiguously),
        ExprKind::Binary { left, .. } | ExprKind::Logical { left, .. } => starts_ambiguously(left),
        ExprKind::Conditional { test, .. } => starts_ambiguously(test),
        ExprKind::Assign { target, .. } => starts_ambiguously(target),
        ExprKind::Call { callee, .. } => starts_ambiguously(callee),
        ExprKind::Member { object, .. } => starts_ambiguously(object),
        ExprKind::Update { prefix: false, target, .. } => starts_ambiguously(target),
        _ => false,
    }
}

/// `1.toString()` is invalid; numeric literal receivers get parentheses.
fn needs_member_parens(object: &Expr) -> bool {
    matches!(object.kind, ExprKind::Number(_))
}

/// Object keys that can be written bare instead of quoted.
fn is_identifier_name(s: &str) -> bool {
    let mut chars = s.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c == '_' || c == '$' || c.is_alphabetic());
    starts_well && chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric())
}

/// `- -x` and `+ +x` need the space to avoid lexing as `--`/`++`.
fn starts_with_sign(operand: &Expr, op: UnaryOp) -> bool {
    match (&operand.kind, op) {
        (ExprKind::Unary { op: inner, .. }, UnaryOp::Minus) => *inner == UnaryOp::Minus,
        (ExprKind::Unary { op: inner, .. }, UnaryOp::Plus) => *inner == UnaryOp::Plus,
        (ExprKind::Update { prefix: true, .. }, UnaryOp::Minus | UnaryOp::Plus) => true,
        (ExprKind::Number(n), UnaryOp::Minus) => n.is_sign_negative(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{emit, emit_expr};
    use crate::parse::parse;

    fn round_trip(source: &str) -> String {
        emit(&parse(source).expect("parse failed"))
    }

    #[test]
    fn precedence_parentheses_survive() {
        assert_eq!(round_trip("(1 + 2) * 3;").trim(), "(1 + 2) * 3;");
        assert_eq!(round_trip("1 + 2 * 3;").trim(), "1 + 2 * 3;");
    }

    #[test]
    fn object_at_statement_start_is_parenthesized() {
        assert_eq!(round_trip("({ a: 1 });").trim(), "({ a: 1 });");
    }

    #[test]
    fn emitted_source_reparses() {
        let source = "let o = { a: [1, 2], f: function (x) { return x + 1; } };\nwhile (o.a[0] < 3) { o.a[0]++; }";
        let once = round_trip(source);
        let twice = emit(&parse(&once).expect("emitted source should reparse"));
        assert_eq!(once, twice);
    }

    #[test]
    fn nullish_mixing_is_parenthesized() {
        let program = parse("a ?? (b || c);").expect("parse failed");
        let crate::ast::StmtKind::Expression(expr) = &program.body[0].kind else {
            panic!("expected expression statement");
        };
        assert_eq!(emit_expr(expr), "a ?? (b || c)");
    }

    #[test]
    fn exponent_right_associativity() {
        assert_eq!(round_trip("2 ** 3 ** 2;").trim(), "2 ** 3 ** 2;");
        assert_eq!(round_trip("(2 ** 3) ** 2;").trim(), "(2 ** 3) ** 2;");
    }
}
