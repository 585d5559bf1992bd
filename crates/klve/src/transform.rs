//! The instrumenting source-to-source transformer.
//!
//! Rewrites a program so that a reserved reporter namespace observes every
//! expression and statement without changing observable behavior: statements
//! get before/after sibling reports, expressions are wrapped in
//! `NS.report(expr, meta)` (which returns its value unchanged), `while` and
//! `for` are desugared so their tests and updates report on every iteration,
//! method calls go through a cached receiver so the receiver is evaluated
//! once, and `return` stores its value in `NS.return` so it can be observed
//! before the unwind.
//!
//! The transform is non-mutating: it rebuilds a fresh tree, threading
//! done/report-before markings as visitor context instead of node flags.
//! All metadata (type, timing, location, detail, scope snapshot shape) is
//! computed here and embedded literally in the output, so the executor
//! never re-inspects the original AST.

use crate::{
    ast::{
        ArrowBody, ArrowExpr, CatchClause, CodeRange, DeclKind, Expr, ExprKind, ForInit, FunctionExpr, ProgramAst,
        PropAccess, PropKey, Property, Stmt, StmtKind, UnaryOp, build,
    },
    emit::emit,
    exception::Exception,
    meta::MetaValue,
    parse::parse,
    step::{Action, Detail, NodeType, StepCategory, Timing},
};

/// The transformed program plus the reserved namespace identifier the
/// executor must bind in the frame.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub source: String,
    pub ns: String,
}

/// Instruments `source`. Parse failures surface as `SyntaxError`s with the
/// reported location.
pub fn transform(source: &str) -> Result<TransformOutput, Exception> {
    let program = parse(source)?;
    let ns = fresh_ns();
    let mut transformer = Transformer {
        ns: ns.clone(),
        cache_slots: 0,
        scopes: Vec::new(),
        loop_updates: Vec::new(),
    };
    let mut scope = ScopeInfo::original();
    scope.bindings = program_scope_names(&program.body);
    transformer.scopes.push(scope);
    let mut body = Vec::new();
    for stmt in &program.body {
        body.extend(transformer.stmt(stmt));
    }
    transformer.scopes.pop();
    Ok(TransformOutput {
        source: emit(&ProgramAst { body }),
        ns,
    })
}

/// A fresh, collision-resistant namespace identifier per invocation.
fn fresh_ns() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("__klve_{}", &id[..12])
}

/// One lexical frame tracked while walking the tree.
struct ScopeInfo {
    bindings: Vec<String>,
    /// User-written scope. Bindings of non-original scopes are suffixed
    /// with " (!)" in snapshots.
    original: bool,
    /// Excluded from snapshots entirely.
    skip: bool,
}

impl ScopeInfo {
    fn original() -> Self {
        Self {
            bindings: Vec::new(),
            original: true,
            skip: false,
        }
    }
}

struct Transformer {
    ns: String,
    cache_slots: usize,
    scopes: Vec<ScopeInfo>,
    /// Innermost-last loop contexts. A `for` loop carries its (original)
    /// update expression so `continue` can be rewritten to evaluate it,
    /// since the desugaring moves the update to the end of the loop body.
    loop_updates: Vec<Option<Expr>>,
}

impl Transformer {
    // ------------------------------------------------------------------
    // Reporter plumbing builders
    // ------------------------------------------------------------------

    fn ns_member(&self, field: &str) -> Expr {
        build::member(build::ident(self.ns.clone()), field)
    }

    /// A fresh `NS.cache[k]` temporary.
    fn cache_slot(&mut self) -> Expr {
        let slot = self.cache_slots;
        self.cache_slots += 1;
        build::index(self.ns_member("cache"), build::number(slot as f64))
    }

    fn report_call(&self, value: Expr, meta: Expr) -> Expr {
        build::call(self.ns_member("report"), vec![value, meta])
    }

    /// The meta object literal for one step: category, type, time, loc,
    /// scope snapshot, and the transform-time detail.
    fn meta_expr(
        &self,
        category: StepCategory,
        node_type: NodeType,
        time: Timing,
        range: CodeRange,
        detail: &Detail,
    ) -> Expr {
        let category_text = match category {
            StepCategory::Statement => "statement",
            _ => "expression",
        };
        let time_text = match time {
            Timing::Before => "before",
            Timing::After => "after",
        };
        let loc = MetaValue::from_json(serde_json::to_value(range).unwrap_or(serde_json::Value::Null));
        let detail = MetaValue::from_json(serde_json::to_value(detail).unwrap_or(serde_json::Value::Null));
        let fields = vec![
            ("category".to_owned(), MetaValue::Str(category_text.to_owned())),
            ("type".to_owned(), MetaValue::Str(<&str>::from(node_type).to_owned())),
            ("time".to_owned(), MetaValue::Str(time_text.to_owned())),
            ("loc".to_owned(), loc),
            ("scopes".to_owned(), MetaValue::Array(self.scope_snapshots())),
            ("detail".to_owned(), detail),
        ];
        MetaValue::Object(fields).into_expr()
    }

    /// One object literal per visible frame, outermost first. Each binding
    /// reads its live value through a guard so dead-zone and undeclared
    /// reads contribute no entry.
    fn scope_snapshots(&self) -> Vec<MetaValue> {
        self.scopes
            .iter()
            .filter(|scope| !scope.skip)
            .map(|scope| {
                let fields = scope
                    .bindings
                    .iter()
                    .map(|name| {
                        let key = if scope.original {
                            name.clone()
                        } else {
                            format!("{name} (!)")
                        };
                        (key, MetaValue::Ast(self.guarded_describe(name)))
                    })
                    .collect();
                MetaValue::Object(fields)
            })
            .collect()
    }

    /// `(() => { try { return NS.describe(name); } catch (e) { } })()`
    fn guarded_describe(&self, name: &str) -> Expr {
        let describe_call = build::call(self.ns_member("describe"), vec![build::ident(name)]);
        let try_stmt = Stmt::new(
            CodeRange::synthetic(),
            StmtKind::Try {
                block: vec![Stmt::new(CodeRange::synthetic(), StmtKind::Return(Some(describe_call)))],
                handler: Some(CatchClause {
                    param: Some("e".to_owned()),
                    body: Vec::new(),
                }),
                finalizer: None,
            },
        );
        build::call(build::arrow_block(Vec::new(), vec![try_stmt]), Vec::new())
    }

    fn before_stmt(&self, node_type: NodeType, range: CodeRange, detail: &Detail) -> Stmt {
        let meta = self.meta_expr(StepCategory::Statement, node_type, Timing::Before, range, detail);
        build::expr_stmt(self.report_call(build::undefined(), meta))
    }

    fn after_stmt(&self, node_type: NodeType, range: CodeRange, detail: &Detail) -> Stmt {
        let meta = self.meta_expr(StepCategory::Statement, node_type, Timing::After, range, detail);
        build::expr_stmt(self.report_call(build::undefined(), meta))
    }

    /// The generic expression wrap: report the value after evaluation, and
    /// additionally report a before event for loop tests and updates.
    fn wrap_after(
        &self,
        expr: Expr,
        node_type: NodeType,
        range: CodeRange,
        detail: &Detail,
        report_before: bool,
    ) -> Expr {
        let after_meta = self.meta_expr(StepCategory::Expression, node_type, Timing::After, range, detail);
        let reported = self.report_call(expr, after_meta);
        if report_before {
            let before_meta = self.meta_expr(StepCategory::Expression, node_type, Timing::Before, range, detail);
            build::sequence(vec![self.report_call(build::undefined(), before_meta), reported])
        } else {
            reported
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn stmt(&mut self, stmt: &Stmt) -> Vec<Stmt> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                let detail = Detail::action(Action::Evaluate);
                vec![
                    self.before_stmt(NodeType::ExpressionStatement, stmt.range, &detail),
                    build::expr_stmt(self.expr(expr, false)),
                    self.after_stmt(NodeType::ExpressionStatement, stmt.range, &detail),
                ]
            }
            StmtKind::VarDecl { decl_kind, decls } => {
                let mut detail = Detail::action(Action::Declare);
                detail.kind = Some(decl_kind.as_str().to_owned());
                detail.target = Some(decls.first().map(|decl| decl.name.clone()));
                let transformed = Stmt::new(
                    stmt.range,
                    StmtKind::VarDecl {
                        decl_kind: *decl_kind,
                        decls: decls
                            .iter()
                            .map(|decl| crate::ast::Declarator {
                                name: decl.name.clone(),
                                name_range: decl.name_range,
                                init: decl.init.as_ref().map(|init| self.expr(init, false)),
                            })
                            .collect(),
                    },
                );
                vec![
                    self.before_stmt(NodeType::VariableDeclaration, stmt.range, &detail),
                    transformed,
                    self.after_stmt(NodeType::VariableDeclaration, stmt.range, &detail),
                ]
            }
            StmtKind::Block(body) => vec![self.block(body)],
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                let mut detail = Detail::action(Action::Branch);
                detail.has_alternate = Some(alternate.is_some());
                let transformed = Stmt::new(
                    stmt.range,
                    StmtKind::If {
                        test: self.expr(test, false),
                        consequent: Box::new(self.stmt_as_block(consequent)),
                        alternate: alternate.as_ref().map(|alt| Box::new(self.stmt_as_block(alt))),
                    },
                );
                vec![
                    self.before_stmt(NodeType::IfStatement, stmt.range, &detail),
                    transformed,
                    self.after_stmt(NodeType::IfStatement, stmt.range, &detail),
                ]
            }
            StmtKind::While { test, body } => {
                let detail = Detail::action(Action::Loop);
                let loop_stmt = self.desugared_loop(Some(test), body, None);
                vec![
                    self.before_stmt(NodeType::WhileStatement, stmt.range, &detail),
                    loop_stmt,
                    self.after_stmt(NodeType::WhileStatement, stmt.range, &detail),
                ]
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                let mut detail = Detail::action(Action::Loop);
                detail.has_init = Some(init.is_some());
                detail.has_test = Some(test.is_some());
                detail.has_update = Some(update.is_some());

                // The outer block is the loop's own scope: init bindings
                // live here and are visible to test, update and body.
                let mut scope = ScopeInfo::original();
                if let Some(ForInit::VarDecl { decl_kind, decls, .. }) = init
                    && *decl_kind != DeclKind::Var
                {
                    scope.bindings = decls.iter().map(|decl| decl.name.clone()).collect();
                }
                self.scopes.push(scope);

                let mut outer = Vec::new();
                match init {
                    Some(ForInit::VarDecl { decl_kind, decls, range }) => {
                        let decl_stmt = Stmt::new(
                            *range,
                            StmtKind::VarDecl {
                                decl_kind: *decl_kind,
                                decls: decls.clone(),
                            },
                        );
                        outer.extend(self.stmt(&decl_stmt));
                    }
                    Some(ForInit::Expr(expr)) => {
                        let transformed = self.expr(expr, false);
                        outer.push(build::expr_stmt(transformed));
                    }
                    None => {}
                }
                outer.push(self.desugared_loop(test.as_ref(), body, update.as_ref()));
                self.scopes.pop();

                vec![
                    self.before_stmt(NodeType::ForStatement, stmt.range, &detail),
                    build::block(outer),
                    self.after_stmt(NodeType::ForStatement, stmt.range, &detail),
                ]
            }
            StmtKind::Return(arg) => {
                let detail = Detail::action(Action::Unknown);
                let value = match arg {
                    Some(arg) => self.expr(arg, false),
                    None => build::undefined(),
                };
                let after_meta =
                    self.meta_expr(StepCategory::Statement, NodeType::ReturnStatement, Timing::After, stmt.range, &detail);
                vec![
                    self.before_stmt(NodeType::ReturnStatement, stmt.range, &detail),
                    build::expr_stmt(build::assign(self.ns_member("return"), value)),
                    build::expr_stmt(self.report_call(self.ns_member("return"), after_meta)),
                    Stmt::new(stmt.range, StmtKind::Return(Some(self.ns_member("return")))),
                ]
            }
            StmtKind::Break => {
                let detail = Detail::action(Action::Unknown);
                vec![
                    self.before_stmt(NodeType::BreakStatement, stmt.range, &detail),
                    stmt.clone(),
                ]
            }
            StmtKind::Continue => {
                let detail = Detail::action(Action::Unknown);
                let mut out = vec![self.before_stmt(NodeType::ContinueStatement, stmt.range, &detail)];
                // Inside a desugared `for`, continuing must still run the
                // update that now sits at the end of the loop body.
                if let Some(Some(update)) = self.loop_updates.last().cloned() {
                    let transformed_update = self.expr(&update, true);
                    out.push(build::expr_stmt(transformed_update));
                }
                out.push(stmt.clone());
                out
            }
            StmtKind::Throw(arg) => {
                let detail = Detail::action(Action::Unknown);
                vec![
                    self.before_stmt(NodeType::ThrowStatement, stmt.range, &detail),
                    Stmt::new(stmt.range, StmtKind::Throw(self.expr(arg, false))),
                ]
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                let mut detail = Detail::action(Action::Protect);
                detail.has_catch = Some(handler.is_some());
                detail.has_finally = Some(finalizer.is_some());
                let transformed_block = self.block_body(block);
                let transformed_handler = handler.as_ref().map(|clause| {
                    let mut scope = ScopeInfo::original();
                    if let Some(param) = &clause.param {
                        scope.bindings.push(param.clone());
                    }
                    scope.bindings.extend(block_scope_names(&clause.body));
                    self.scopes.push(scope);
                    let body = clause.body.iter().flat_map(|s| self.stmt(s)).collect();
                    self.scopes.pop();
                    CatchClause {
                        param: clause.param.clone(),
                        body,
                    }
                });
                let transformed_finalizer = finalizer.as_ref().map(|body| {
                    let mut scope = ScopeInfo::original();
                    scope.bindings = block_scope_names(body);
                    self.scopes.push(scope);
                    let body = body.iter().flat_map(|s| self.stmt(s)).collect();
                    self.scopes.pop();
                    body
                });
                let transformed = Stmt::new(
                    stmt.range,
                    StmtKind::Try {
                        block: transformed_block,
                        handler: transformed_handler,
                        finalizer: transformed_finalizer,
                    },
                );
                vec![
                    self.before_stmt(NodeType::TryStatement, stmt.range, &detail),
                    transformed,
                    self.after_stmt(NodeType::TryStatement, stmt.range, &detail),
                ]
            }
            StmtKind::FunctionDecl(func) => {
                // Hoisted with the declaration itself unreported; only the
                // body is instrumented.
                let body = self.function_body(&func.params, &func.body);
                vec![Stmt::new(
                    stmt.range,
                    StmtKind::FunctionDecl(FunctionExpr {
                        name: func.name.clone(),
                        params: func.params.clone(),
                        body,
                    }),
                )]
            }
            StmtKind::Empty => vec![stmt.clone()],
        }
    }

    /// Transforms a block statement, giving it its own snapshot scope.
    fn block(&mut self, body: &[Stmt]) -> Stmt {
        build::block(self.block_body(body))
    }

    fn block_body(&mut self, body: &[Stmt]) -> Vec<Stmt> {
        let mut scope = ScopeInfo::original();
        scope.bindings = block_scope_names(body);
        self.scopes.push(scope);
        let transformed = body.iter().flat_map(|s| self.stmt(s)).collect();
        self.scopes.pop();
        transformed
    }

    /// Wraps a statement in a block so sibling reports stay inside the
    /// parent construct. The wrapper block introduces no bindings and no
    /// snapshot scope.
    fn stmt_as_block(&mut self, stmt: &Stmt) -> Stmt {
        match &stmt.kind {
            StmtKind::Block(body) => self.block(body),
            _ => build::block(self.stmt(stmt)),
        }
    }

    /// The common `while (true)` desugaring for `while` and `for`: the test
    /// is evaluated through a cache slot and reported each iteration with a
    /// leading before event, and a missing test loops unconditionally.
    fn desugared_loop(&mut self, test: Option<&Expr>, body: &Stmt, update: Option<&Expr>) -> Stmt {
        let mut loop_body = Vec::new();
        if let Some(test) = test {
            let slot = self.cache_slot();
            let transformed_test = self.expr(test, true);
            loop_body.push(build::expr_stmt(build::assign(slot.clone(), transformed_test)));
            // The break guard is synthetic; it is neither reported nor
            // given a snapshot scope.
            loop_body.push(Stmt::new(
                CodeRange::synthetic(),
                StmtKind::If {
                    test: Expr::new(
                        CodeRange::synthetic(),
                        ExprKind::Unary {
                            op: UnaryOp::Not,
                            operand: Box::new(slot),
                        },
                    ),
                    consequent: Box::new(Stmt::new(CodeRange::synthetic(), StmtKind::Break)),
                    alternate: None,
                },
            ));
        }
        self.loop_updates.push(update.cloned());
        match &body.kind {
            StmtKind::Block(inner) => loop_body.push(self.block(inner)),
            _ => loop_body.extend(self.stmt(body)),
        }
        self.loop_updates.pop();
        if let Some(update) = update {
            let transformed_update = self.expr(update, true);
            loop_body.push(build::expr_stmt(transformed_update));
        }
        Stmt::new(
            CodeRange::synthetic(),
            StmtKind::While {
                test: build::bool_lit(true),
                body: Box::new(build::block(loop_body)),
            },
        )
    }

    fn function_body(&mut self, params: &[String], body: &[Stmt]) -> Vec<Stmt> {
        let mut scope = ScopeInfo::original();
        scope.bindings = function_scope_names(params, body);
        self.scopes.push(scope);
        // A function boundary resets loop context: a `continue` inside the
        // body cannot bind to a loop outside it.
        let saved_updates = std::mem::take(&mut self.loop_updates);
        let transformed = body.iter().flat_map(|s| self.stmt(s)).collect();
        self.loop_updates = saved_updates;
        self.scopes.pop();
        transformed
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr(&mut self, expr: &Expr, report_before: bool) -> Expr {
        match &expr.kind {
            ExprKind::Number(_) => {
                let detail = Detail::action(Action::Literal);
                self.wrap_after(expr.clone(), NodeType::NumericLiteral, expr.range, &detail, report_before)
            }
            ExprKind::String(_) => {
                let detail = Detail::action(Action::Literal);
                self.wrap_after(expr.clone(), NodeType::StringLiteral, expr.range, &detail, report_before)
            }
            ExprKind::Bool(_) => {
                let detail = Detail::action(Action::Literal);
                self.wrap_after(expr.clone(), NodeType::BooleanLiteral, expr.range, &detail, report_before)
            }
            ExprKind::Null => {
                let detail = Detail::action(Action::Literal);
                self.wrap_after(expr.clone(), NodeType::NullLiteral, expr.range, &detail, report_before)
            }
            ExprKind::Identifier(name) => {
                let mut detail = Detail::action(Action::Read);
                detail.name = Some(name.clone());
                self.wrap_after(expr.clone(), NodeType::Identifier, expr.range, &detail, report_before)
            }
            ExprKind::This => expr.clone(),
            ExprKind::Array(items) => {
                let mut detail = Detail::action(Action::Literal);
                detail.element_count = Some(items.len() as u32);
                let transformed = Expr::new(
                    expr.range,
                    ExprKind::Array(items.iter().map(|item| self.expr(item, false)).collect()),
                );
                self.wrap_after(transformed, NodeType::ArrayExpression, expr.range, &detail, report_before)
            }
            ExprKind::Object(props) => {
                let mut detail = Detail::action(Action::Literal);
                detail.property_count = Some(props.len() as u32);
                let transformed = Expr::new(
                    expr.range,
                    ExprKind::Object(
                        props
                            .iter()
                            .map(|prop| Property {
                                key: match &prop.key {
                                    PropKey::Named(name) => PropKey::Named(name.clone()),
                                    PropKey::Computed(key) => {
                                        PropKey::Computed(Box::new(self.expr(key, false)))
                                    }
                                },
                                value: self.expr(&prop.value, false),
                            })
                            .collect(),
                    ),
                );
                self.wrap_after(transformed, NodeType::ObjectExpression, expr.range, &detail, report_before)
            }
            ExprKind::Function(func) => {
                let mut detail = Detail::action(Action::Define);
                detail.name.clone_from(&func.name);
                detail.arity = Some(func.params.len() as u32);
                let body = self.function_body(&func.params, &func.body);
                let transformed = Expr::new(
                    expr.range,
                    ExprKind::Function(Box::new(FunctionExpr {
                        name: func.name.clone(),
                        params: func.params.clone(),
                        body,
                    })),
                );
                self.wrap_after(transformed, NodeType::FunctionExpression, expr.range, &detail, report_before)
            }
            ExprKind::Arrow(arrow) => self.arrow(expr, arrow, report_before),
            ExprKind::Unary { op, operand } => self.unary(expr, *op, operand, report_before),
            ExprKind::Update { op, prefix, target } => {
                self.update(expr, *op, *prefix, target, report_before)
            }
            ExprKind::Binary { op, left, right } => {
                let mut detail = Detail::action(Action::Compute);
                detail.operator = Some(op.as_str().to_owned());
                let transformed = Expr::new(
                    expr.range,
                    ExprKind::Binary {
                        op: *op,
                        left: Box::new(self.expr(left, false)),
                        right: Box::new(self.expr(right, false)),
                    },
                );
                self.wrap_after(transformed, NodeType::BinaryExpression, expr.range, &detail, report_before)
            }
            ExprKind::Logical { op, left, right } => {
                let mut detail = Detail::action(Action::Compute);
                detail.operator = Some(op.as_str().to_owned());
                let transformed = Expr::new(
                    expr.range,
                    ExprKind::Logical {
                        op: *op,
                        left: Box::new(self.expr(left, false)),
                        right: Box::new(self.expr(right, false)),
                    },
                );
                self.wrap_after(transformed, NodeType::LogicalExpression, expr.range, &detail, report_before)
            }
            ExprKind::Assign { op, target, value } => {
                let mut detail = Detail::action(Action::Assign);
                detail.operator = Some(op.as_str().to_owned());
                detail.target = Some(target.ident_name().map(ToOwned::to_owned));
                let transformed = Expr::new(
                    expr.range,
                    ExprKind::Assign {
                        op: *op,
                        target: Box::new(self.lhs(target)),
                        value: Box::new(self.expr(value, false)),
                    },
                );
                self.wrap_after(transformed, NodeType::AssignmentExpression, expr.range, &detail, report_before)
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let mut detail = Detail::action(Action::Branch);
                detail.has_alternate = Some(true);
                let transformed = Expr::new(
                    expr.range,
                    ExprKind::Conditional {
                        test: Box::new(self.expr(test, false)),
                        consequent: Box::new(self.expr(consequent, false)),
                        alternate: Box::new(self.expr(alternate, false)),
                    },
                );
                self.wrap_after(transformed, NodeType::ConditionalExpression, expr.range, &detail, report_before)
            }
            ExprKind::Call { callee, args } => self.call(expr, callee, args, report_before),
            ExprKind::New { callee, args } => {
                let mut detail = Detail::action(Action::Construct);
                detail.arity = Some(args.len() as u32);
                detail.callee = Some(callee.ident_name().map(ToOwned::to_owned));
                detail.method = Some(false);
                let transformed = Expr::new(
                    expr.range,
                    ExprKind::New {
                        callee: Box::new(self.expr(callee, false)),
                        args: args.iter().map(|arg| self.expr(arg, false)).collect(),
                    },
                );
                self.wrap_after(transformed, NodeType::NewExpression, expr.range, &detail, report_before)
            }
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let detail = member_detail(property, *optional);
                let transformed = Expr::new(
                    expr.range,
                    ExprKind::Member {
                        object: Box::new(self.expr(object, false)),
                        property: self.property(property),
                        optional: *optional,
                    },
                );
                self.wrap_after(transformed, NodeType::MemberExpression, expr.range, &detail, report_before)
            }
            ExprKind::Sequence(items) => {
                let detail = Detail::action(Action::Compute);
                let transformed = Expr::new(
                    expr.range,
                    ExprKind::Sequence(items.iter().map(|item| self.expr(item, false)).collect()),
                );
                self.wrap_after(transformed, NodeType::SequenceExpression, expr.range, &detail, report_before)
            }
        }
    }

    fn property(&mut self, property: &PropAccess) -> PropAccess {
        match property {
            PropAccess::Named(name) => PropAccess::Named(name.clone()),
            PropAccess::Computed(index) => PropAccess::Computed(Box::new(self.expr(index, false))),
        }
    }

    /// Arrows become `(function (params) { body }).bind(this)`: the bound
    /// regular function keeps the lexical receiver while the body gets its
    /// normal statement instrumentation, and the function value itself is
    /// observable at the definition site.
    fn arrow(&mut self, expr: &Expr, arrow: &ArrowExpr, report_before: bool) -> Expr {
        let mut detail = Detail::action(Action::Define);
        detail.arity = Some(arrow.params.len() as u32);
        detail.expression_body = Some(matches!(arrow.body, ArrowBody::Expr(_)));
        let body_stmts: Vec<Stmt> = match &arrow.body {
            ArrowBody::Block(body) => body.clone(),
            ArrowBody::Expr(body) => vec![Stmt::new(body.range, StmtKind::Return(Some((**body).clone())))],
        };
        let body = self.function_body(&arrow.params, &body_stmts);
        let function = build::function(None, arrow.params.clone(), body);
        let bound = build::call(
            build::member(function, "bind"),
            vec![Expr::new(CodeRange::synthetic(), ExprKind::This)],
        );
        self.wrap_after(bound, NodeType::ArrowFunctionExpression, expr.range, &detail, report_before)
    }

    fn unary(&mut self, expr: &Expr, op: UnaryOp, operand: &Expr, report_before: bool) -> Expr {
        let mut detail = Detail::action(Action::Compute);
        detail.operator = Some(op.as_str().to_owned());
        detail.prefix = Some(true);
        let transformed_operand = match (op, &operand.kind) {
            // `typeof x` must stay lenient on undeclared names, so the
            // identifier is not rewritten into a reported read.
            (UnaryOp::TypeOf, ExprKind::Identifier(_)) => operand.clone(),
            // `delete o.p` must receive the reference, not the value.
            (
                UnaryOp::Delete,
                ExprKind::Member {
                    object,
                    property,
                    optional,
                },
            ) => Expr::new(
                operand.range,
                ExprKind::Member {
                    object: Box::new(self.expr(object, false)),
                    property: self.property(property),
                    optional: *optional,
                },
            ),
            _ => self.expr(operand, false),
        };
        let transformed = Expr::new(
            expr.range,
            ExprKind::Unary {
                op,
                operand: Box::new(transformed_operand),
            },
        );
        self.wrap_after(transformed, NodeType::UnaryExpression, expr.range, &detail, report_before)
    }

    /// Update expressions desugar into reads, an assignment, and a report
    /// of the observed value: the updated value for prefix, the stashed old
    /// value for postfix.
    fn update(&mut self, expr: &Expr, op: crate::ast::UpdateOp, prefix: bool, target: &Expr, report_before: bool) -> Expr {
        let mut detail = Detail::action(Action::Update);
        detail.operator = Some(op.as_str().to_owned());
        detail.prefix = Some(prefix);
        detail.target = Some(target.ident_name().map(ToOwned::to_owned));
        let delta_op = if op == crate::ast::UpdateOp::Inc {
            crate::ast::BinaryOp::Add
        } else {
            crate::ast::BinaryOp::Sub
        };
        let after_meta = self.meta_expr(
            StepCategory::Expression,
            NodeType::UpdateExpression,
            Timing::After,
            expr.range,
            &detail,
        );
        let mut items = Vec::new();
        if report_before {
            let before_meta = self.meta_expr(
                StepCategory::Expression,
                NodeType::UpdateExpression,
                Timing::Before,
                expr.range,
                &detail,
            );
            items.push(self.report_call(build::undefined(), before_meta));
        }
        if prefix {
            let assignment = build::assign(
                self.lhs(target),
                Expr::new(
                    CodeRange::synthetic(),
                    ExprKind::Binary {
                        op: delta_op,
                        left: Box::new(strip_ranges(target)),
                        right: Box::new(build::number(1.0)),
                    },
                ),
            );
            items.push(assignment);
            items.push(self.report_call(strip_ranges(target), after_meta));
        } else {
            let slot = self.cache_slot();
            items.push(build::assign(slot.clone(), strip_ranges(target)));
            let assignment = build::assign(
                self.lhs(target),
                Expr::new(
                    CodeRange::synthetic(),
                    ExprKind::Binary {
                        op: delta_op,
                        left: Box::new(slot.clone()),
                        right: Box::new(build::number(1.0)),
                    },
                ),
            );
            items.push(assignment);
            items.push(self.report_call(slot, after_meta));
        }
        build::sequence(items)
    }

    /// Calls preserve receiver identity: for `o.m(args)` the receiver is
    /// cached once, the callee is reported as `cache.m`, and the invocation
    /// goes through `Function.prototype.call` with the cached receiver.
    fn call(&mut self, expr: &Expr, callee: &Expr, args: &[Expr], report_before: bool) -> Expr {
        let transformed_args: Vec<Expr> = args.iter().map(|arg| self.expr(arg, false)).collect();
        let mut detail = Detail::action(Action::Call);
        detail.arity = Some(args.len() as u32);
        match &callee.kind {
            ExprKind::Member {
                object,
                property,
                optional: false,
            } => {
                detail.method = Some(true);
                detail.callee = Some(match property {
                    PropAccess::Named(name) => Some(name.clone()),
                    PropAccess::Computed(_) => None,
                });
                let slot = self.cache_slot();
                let transformed_object = self.expr(object, false);
                let callee_read = Expr::new(
                    callee.range,
                    ExprKind::Member {
                        object: Box::new(slot.clone()),
                        property: self.property(property),
                        optional: false,
                    },
                );
                let callee_detail = member_detail(property, false);
                let callee_meta = self.meta_expr(
                    StepCategory::Expression,
                    NodeType::MemberExpression,
                    Timing::After,
                    callee.range,
                    &callee_detail,
                );
                let reported_callee = self.report_call(callee_read, callee_meta);
                let receiver_and_callee =
                    build::sequence(vec![build::assign(slot.clone(), transformed_object), reported_callee]);
                let mut call_args = vec![slot];
                call_args.extend(transformed_args);
                let call = build::call(build::member(receiver_and_callee, "call"), call_args);
                self.wrap_after(call, NodeType::CallExpression, expr.range, &detail, report_before)
            }
            // Optional member callees keep their direct shape so the
            // nullish receiver short-circuits the whole call.
            ExprKind::Member {
                object,
                property,
                optional: true,
            } => {
                detail.method = Some(true);
                detail.callee = Some(match property {
                    PropAccess::Named(name) => Some(name.clone()),
                    PropAccess::Computed(_) => None,
                });
                let transformed_callee = Expr::new(
                    callee.range,
                    ExprKind::Member {
                        object: Box::new(self.expr(object, false)),
                        property: self.property(property),
                        optional: true,
                    },
                );
                let call = Expr::new(
                    expr.range,
                    ExprKind::Call {
                        callee: Box::new(transformed_callee),
                        args: transformed_args,
                    },
                );
                self.wrap_after(call, NodeType::CallExpression, expr.range, &detail, report_before)
            }
            _ => {
                detail.method = Some(false);
                detail.callee = Some(callee.ident_name().map(ToOwned::to_owned));
                let transformed_callee = self.expr(callee, false);
                let mut call_args = vec![build::undefined()];
                call_args.extend(transformed_args);
                let call = build::call(build::member(transformed_callee, "call"), call_args);
                self.wrap_after(call, NodeType::CallExpression, expr.range, &detail, report_before)
            }
        }
    }

    /// Rebuilds an assignment target without wrapping it in reads: the
    /// whole target subtree is done, except computed properties, which stay
    /// reportable.
    fn lhs(&mut self, target: &Expr) -> Expr {
        match &target.kind {
            ExprKind::Member {
                object,
                property,
                optional,
            } => Expr::new(
                target.range,
                ExprKind::Member {
                    object: Box::new(self.lhs(object)),
                    property: self.property(property),
                    optional: *optional,
                },
            ),
            _ => target.clone(),
        }
    }
}

fn member_detail(property: &PropAccess, optional: bool) -> Detail {
    let mut detail = Detail::action(Action::Access);
    match property {
        PropAccess::Named(name) => {
            detail.computed = Some(false);
            detail.property = Some(Some(name.clone()));
        }
        PropAccess::Computed(_) => {
            detail.computed = Some(true);
            detail.property = Some(None);
        }
    }
    if optional {
        detail.optional = Some(true);
    }
    detail
}

/// A location-stripped structural copy, used where a target is re-read.
fn strip_ranges(expr: &Expr) -> Expr {
    let mut copy = expr.clone();
    copy.range = CodeRange::synthetic();
    copy
}

// ----------------------------------------------------------------------
// Scope binding collection
// ----------------------------------------------------------------------

/// Bindings of the top-level program scope: both function-level and
/// lexical declarations land in the same frame.
fn program_scope_names(body: &[Stmt]) -> Vec<String> {
    let mut names = function_scope_names(&[], body);
    dedup_preserving_order(&mut names);
    names
}

/// Bindings visible in a function's frame: parameters, hoisted `var`s,
/// top-level function declarations, and top-level lexicals.
fn function_scope_names(params: &[String], body: &[Stmt]) -> Vec<String> {
    let mut names: Vec<String> = params.to_vec();
    collect_vars(body, &mut names);
    names.extend(block_scope_names(body));
    dedup_preserving_order(&mut names);
    names
}

/// Bindings a plain block introduces: lexicals and function declarations
/// at that level.
fn block_scope_names(body: &[Stmt]) -> Vec<String> {
    let mut names = Vec::new();
    for stmt in body {
        match &stmt.kind {
            StmtKind::VarDecl { decl_kind, decls } if *decl_kind != DeclKind::Var => {
                names.extend(decls.iter().map(|decl| decl.name.clone()));
            }
            StmtKind::FunctionDecl(func) => {
                if let Some(name) = &func.name {
                    names.push(name.clone());
                }
            }
            _ => {}
        }
    }
    dedup_preserving_order(&mut names);
    names
}

/// `var` names, hoisted through nested statements but not into nested
/// functions.
fn collect_vars(stmts: &[Stmt], names: &mut Vec<String>) {
    for stmt in stmts {
        collect_vars_stmt(stmt, names);
    }
}

fn collect_vars_stmt(stmt: &Stmt, names: &mut Vec<String>) {
    match &stmt.kind {
        StmtKind::VarDecl { decl_kind, decls } => {
            if *decl_kind == DeclKind::Var {
                names.extend(decls.iter().map(|decl| decl.name.clone()));
            }
        }
        StmtKind::Block(body) => collect_vars(body, names),
        StmtKind::If {
            consequent, alternate, ..
        } => {
            collect_vars_stmt(consequent, names);
            if let Some(alternate) = alternate {
                collect_vars_stmt(alternate, names);
            }
        }
        StmtKind::For { init, body, .. } => {
            if let Some(ForInit::VarDecl { decl_kind, decls, .. }) = init
                && *decl_kind == DeclKind::Var
            {
                names.extend(decls.iter().map(|decl| decl.name.clone()));
            }
            collect_vars_stmt(body, names);
        }
        StmtKind::While { body, .. } => collect_vars_stmt(body, names),
        StmtKind::Try {
            block,
            handler,
            finalizer,
        } => {
            collect_vars(block, names);
            if let Some(handler) = handler {
                collect_vars(&handler.body, names);
            }
            if let Some(finalizer) = finalizer {
                collect_vars(finalizer, names);
            }
        }
        _ => {}
    }
}

fn dedup_preserving_order(names: &mut Vec<String>) {
    let mut seen = ahash::AHashSet::new();
    names.retain(|name| seen.insert(name.clone()));
}
