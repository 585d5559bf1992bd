//! Tree-walking evaluator for the JavaScript subset.
//!
//! The executor parses the instrumented source and evaluates it here; the
//! reporter plumbing (`NS.report`, `NS.describe`, the console) is just a set
//! of native functions installed in the frame, so this module knows nothing
//! about steps. The same evaluator runs untransformed programs, which is
//! what the observable-equivalence tests rely on.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::{
    ast::{
        ArrowBody, ArrowExpr, BinaryOp, CodeRange, Expr, ExprKind, ForInit, FunctionExpr, LogicalOp, PropAccess,
        PropKey, Stmt, StmtKind, UnaryOp, UpdateOp,
    },
    builtins,
    exception::{Exception, RunError},
    namespace::{self, BindingKind, EnvRef, Environment},
    value::{FunctionData, JsObject, ObjectKind, ThisMode, Value, to_int32, to_uint32},
};

/// Maximum JavaScript call depth before a `RangeError`, the stand-in for
/// "Maximum call stack size exceeded". Kept well below the point where the
/// evaluator's own recursion would overflow the Rust stack.
#[cfg(not(debug_assertions))]
pub const MAX_CALL_DEPTH: usize = 512;
#[cfg(debug_assertions)]
pub const MAX_CALL_DEPTH: usize = 128;

/// Statement completion.
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Interp {
    call_depth: usize,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    #[must_use]
    pub fn new() -> Self {
        Self { call_depth: 0 }
    }

    /// Runs a program body in the given global environment. A top-level
    /// `return` simply ends execution, matching the execution frame's
    /// wrap-in-a-function-body model.
    pub fn run_program(&mut self, body: &[Stmt], env: &EnvRef) -> Result<(), RunError> {
        hoist_vars(body, env);
        self.block_prologue(body, env);
        match self.eval_stmts(body, env)? {
            Flow::Normal | Flow::Return(_) => Ok(()),
            Flow::Break | Flow::Continue => Err(Exception::syntax(
                "illegal break or continue outside of a loop",
                crate::ast::CodeLoc::zero(),
            )
            .into()),
        }
    }

    /// Defines this block's function declarations and registers its
    /// lexical bindings (still in their dead zone).
    fn block_prologue(&mut self, stmts: &[Stmt], env: &EnvRef) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::FunctionDecl(func) => {
                    let value = self.make_function(func, env);
                    let name = func.name.clone().unwrap_or_default();
                    namespace::define(env, &name, value);
                }
                StmtKind::VarDecl { decl_kind, decls } if *decl_kind != crate::ast::DeclKind::Var => {
                    let kind = if *decl_kind == crate::ast::DeclKind::Const {
                        BindingKind::Const
                    } else {
                        BindingKind::Let
                    };
                    for decl in decls {
                        namespace::declare_lexical(env, &decl.name, kind);
                    }
                }
                _ => {}
            }
        }
    }

    fn eval_stmts(&mut self, stmts: &[Stmt], env: &EnvRef) -> Result<Flow, RunError> {
        for stmt in stmts {
            match self.eval_stmt(stmt, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn eval_stmt(&mut self, stmt: &Stmt, env: &EnvRef) -> Result<Flow, RunError> {
        let result = self.eval_stmt_inner(stmt, env);
        match result {
            Err(mut err) => {
                err.fill_loc(stmt.range);
                Err(err)
            }
            ok => ok,
        }
    }

    fn eval_stmt_inner(&mut self, stmt: &Stmt, env: &EnvRef) -> Result<Flow, RunError> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.eval_expr(expr, env)?;
                Ok(Flow::Normal)
            }
            StmtKind::VarDecl { decl_kind, decls } => {
                for decl in decls {
                    let value = match &decl.init {
                        Some(init) => Some(self.eval_expr(init, env)?),
                        None => None,
                    };
                    match decl_kind {
                        crate::ast::DeclKind::Var => {
                            if let Some(value) = value {
                                namespace::assign(env, &decl.name, value).map_err(RunError::from)?;
                            }
                        }
                        crate::ast::DeclKind::Let | crate::ast::DeclKind::Const => {
                            namespace::initialize(env, &decl.name, value.unwrap_or(Value::Undefined));
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Block(body) => {
                let scope = Environment::new_block(env.clone());
                self.block_prologue(body, &scope);
                self.eval_stmts(body, &scope)
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test, env)?.truthy() {
                    self.eval_stmt(consequent, env)
                } else if let Some(alternate) = alternate {
                    self.eval_stmt(alternate, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                let scope = Environment::new_block(env.clone());
                match init {
                    Some(ForInit::VarDecl { decl_kind, decls, range }) => {
                        let decl_stmt = Stmt::new(
                            *range,
                            StmtKind::VarDecl {
                                decl_kind: *decl_kind,
                                decls: decls.clone(),
                            },
                        );
                        self.block_prologue(std::slice::from_ref(&decl_stmt), &scope);
                        self.eval_stmt(&decl_stmt, &scope)?;
                    }
                    Some(ForInit::Expr(expr)) => {
                        self.eval_expr(expr, &scope)?;
                    }
                    None => {}
                }
                loop {
                    if let Some(test) = test
                        && !self.eval_expr(test, &scope)?.truthy()
                    {
                        return Ok(Flow::Normal);
                    }
                    match self.eval_stmt(body, &scope)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => return Ok(Flow::Normal),
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                    if let Some(update) = update {
                        self.eval_expr(update, &scope)?;
                    }
                }
            }
            StmtKind::While { test, body } => {
                while self.eval_expr(test, env)?.truthy() {
                    match self.eval_stmt(body, env)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Return(arg) => {
                let value = match arg {
                    Some(arg) => self.eval_expr(arg, env)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Throw(arg) => {
                let value = self.eval_expr(arg, env)?;
                let message = Some(value.to_js_string());
                Err(RunError::Exc(Exception::thrown(value, message).with_loc(stmt.range)))
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                let scope = Environment::new_block(env.clone());
                self.block_prologue(block, &scope);
                let mut result = self.eval_stmts(block, &scope);
                if let (Err(RunError::Exc(exc)), Some(handler)) = (&result, handler) {
                    let catch_scope = Environment::new_block(env.clone());
                    if let Some(param) = &handler.param {
                        namespace::define(&catch_scope, param, exc.to_value());
                    }
                    self.block_prologue(&handler.body, &catch_scope);
                    result = self.eval_stmts(&handler.body, &catch_scope);
                }
                if let Some(finalizer) = finalizer {
                    let finally_scope = Environment::new_block(env.clone());
                    self.block_prologue(finalizer, &finally_scope);
                    match self.eval_stmts(finalizer, &finally_scope)? {
                        Flow::Normal => {}
                        // An abrupt finalizer completion replaces the try result.
                        flow => return Ok(flow),
                    }
                }
                result
            }
            StmtKind::FunctionDecl(_) | StmtKind::Empty => Ok(Flow::Normal),
        }
    }

    pub fn eval_expr(&mut self, expr: &Expr, env: &EnvRef) -> Result<Value, RunError> {
        let result = self.eval_expr_inner(expr, env);
        match result {
            Err(mut err) => {
                err.fill_loc(expr.range);
                Err(err)
            }
            ok => ok,
        }
    }

    fn eval_expr_inner(&mut self, expr: &Expr, env: &EnvRef) -> Result<Value, RunError> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::str(s.as_str())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Identifier(name) => Ok(namespace::lookup(env, name)?),
            ExprKind::This => Ok(namespace::lookup_this(env)),
            ExprKind::Array(items) => {
                let mut elements = Vec::with_capacity(items.len());
                for item in items {
                    elements.push(self.eval_expr(item, env)?);
                }
                Ok(Value::object(JsObject::array(elements)))
            }
            ExprKind::Object(props) => {
                let mut obj = JsObject::plain();
                for prop in props {
                    let key = match &prop.key {
                        PropKey::Named(name) => name.clone(),
                        PropKey::Computed(key) => self.eval_expr(key, env)?.to_js_string(),
                    };
                    let value = self.eval_expr(&prop.value, env)?;
                    obj.properties.insert(key, value);
                }
                Ok(Value::object(obj))
            }
            ExprKind::Function(func) => Ok(self.make_function(func, env)),
            ExprKind::Arrow(arrow) => Ok(self.make_arrow(arrow, env)),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, env),
            ExprKind::Update { op, prefix, target } => self.eval_update(*op, *prefix, target, env),
            ExprKind::Binary { op, left, right } => {
                let left = self.eval_expr(left, env)?;
                let right = self.eval_expr(right, env)?;
                Ok(apply_binary(*op, &left, &right)?)
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.eval_expr(left, env)?;
                let take_right = match op {
                    LogicalOp::And => left.truthy(),
                    LogicalOp::Or => !left.truthy(),
                    LogicalOp::Nullish => left.is_nullish(),
                };
                if take_right {
                    self.eval_expr(right, env)
                } else {
                    Ok(left)
                }
            }
            ExprKind::Assign { op, target, value } => {
                let new_value = match op.binary_op() {
                    None => self.eval_expr(value, env)?,
                    Some(binary) => {
                        let current = self.read_target(target, env)?;
                        let rhs = self.eval_expr(value, env)?;
                        apply_binary(binary, &current, &rhs)?
                    }
                };
                self.write_target(target, new_value.clone(), env)?;
                Ok(new_value)
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test, env)?.truthy() {
                    self.eval_expr(consequent, env)
                } else {
                    self.eval_expr(alternate, env)
                }
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args, env, expr.range),
            ExprKind::New { callee, args } => {
                let callee_value = self.eval_expr(callee, env)?;
                let mut arg_values: SmallVec<[Value; 8]> = SmallVec::new();
                for arg in args {
                    arg_values.push(self.eval_expr(arg, env)?);
                }
                self.construct(&callee_value, &arg_values, expr.range)
            }
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let object_value = self.eval_expr(object, env)?;
                if *optional && object_value.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = self.member_key(property, env)?;
                self.get_member(&object_value, &key, expr.range)
            }
            ExprKind::Sequence(items) => {
                let mut last = Value::Undefined;
                for item in items {
                    last = self.eval_expr(item, env)?;
                }
                Ok(last)
            }
        }
    }

    fn member_key(&mut self, property: &PropAccess, env: &EnvRef) -> Result<String, RunError> {
        match property {
            PropAccess::Named(name) => Ok(name.clone()),
            PropAccess::Computed(index) => Ok(self.eval_expr(index, env)?.to_js_string()),
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, env: &EnvRef) -> Result<Value, RunError> {
        match op {
            UnaryOp::TypeOf => {
                // `typeof` on an unresolvable identifier answers "undefined"
                // instead of raising, so the operand is read leniently.
                if let ExprKind::Identifier(name) = &operand.kind
                    && !namespace::is_bound(env, name)
                {
                    return Ok(Value::str("undefined"));
                }
                let value = self.eval_expr(operand, env)?;
                Ok(Value::str(value.type_of()))
            }
            UnaryOp::Delete => match &operand.kind {
                ExprKind::Member {
                    object,
                    property,
                    optional: _,
                } => {
                    let object_value = self.eval_expr(object, env)?;
                    let key = self.member_key(property, env)?;
                    Ok(Value::Bool(delete_member(&object_value, &key)))
                }
                _ => {
                    self.eval_expr(operand, env)?;
                    Ok(Value::Bool(true))
                }
            },
            _ => {
                let value = self.eval_expr(operand, env)?;
                Ok(match op {
                    UnaryOp::Minus => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::BitNot => Value::Number(f64::from(!to_int32(value.to_number()))),
                    UnaryOp::Void => Value::Undefined,
                    UnaryOp::TypeOf | UnaryOp::Delete => unreachable!("handled above"),
                })
            }
        }
    }

    fn eval_update(&mut self, op: UpdateOp, prefix: bool, target: &Expr, env: &EnvRef) -> Result<Value, RunError> {
        let old = Value::Number(self.read_target(target, env)?.to_number());
        let delta = if op == UpdateOp::Inc { 1.0 } else { -1.0 };
        let new = Value::Number(old.to_number() + delta);
        self.write_target(target, new.clone(), env)?;
        Ok(if prefix { new } else { old })
    }

    fn read_target(&mut self, target: &Expr, env: &EnvRef) -> Result<Value, RunError> {
        match &target.kind {
            ExprKind::Identifier(name) => Ok(namespace::lookup(env, name)?),
            ExprKind::Member {
                object,
                property,
                optional: _,
            } => {
                let object_value = self.eval_expr(object, env)?;
                let key = self.member_key(property, env)?;
                self.get_member(&object_value, &key, target.range)
            }
            _ => Err(Exception::syntax("invalid assignment target", target.range.start).into()),
        }
    }

    fn write_target(&mut self, target: &Expr, value: Value, env: &EnvRef) -> Result<(), RunError> {
        match &target.kind {
            ExprKind::Identifier(name) => {
                namespace::assign(env, name, value)?;
                Ok(())
            }
            ExprKind::Member {
                object,
                property,
                optional: _,
            } => {
                let object_value = self.eval_expr(object, env)?;
                let key = self.member_key(property, env)?;
                set_member(&object_value, &key, value)?;
                Ok(())
            }
            _ => Err(Exception::syntax("invalid assignment target", target.range.start).into()),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], env: &EnvRef, range: CodeRange) -> Result<Value, RunError> {
        let (func, this) = match &callee.kind {
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let object_value = self.eval_expr(object, env)?;
                if *optional && object_value.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = self.member_key(property, env)?;
                let func = self.get_member(&object_value, &key, callee.range)?;
                (func, object_value)
            }
            _ => (self.eval_expr(callee, env)?, Value::Undefined),
        };
        let mut arg_values: SmallVec<[Value; 8]> = SmallVec::new();
        for arg in args {
            arg_values.push(self.eval_expr(arg, env)?);
        }
        self.call_function(&func, this, &arg_values, range)
    }

    /// Invokes a callable value. `range` feeds error locations.
    pub fn call_function(
        &mut self,
        func: &Value,
        this: Value,
        args: &[Value],
        range: CodeRange,
    ) -> Result<Value, RunError> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(Exception::range_error("Maximum call stack size exceeded")
                .with_loc(range)
                .into());
        }
        let Some(obj) = func.as_object() else {
            return Err(Exception::type_error(format!("{} is not a function", func.to_js_string()))
                .with_loc(range)
                .into());
        };
        enum Target {
            Native(crate::value::NativeImpl),
            User {
                params: Rc<[String]>,
                body: Rc<[Stmt]>,
                env: EnvRef,
                this_mode: ThisMode,
                bound_this: Option<Value>,
                bound_args: Vec<Value>,
            },
        }
        let target = {
            let borrowed = obj.borrow();
            match &borrowed.kind {
                ObjectKind::Native(native) => Target::Native(native.func.clone()),
                ObjectKind::Function(data) => Target::User {
                    params: data.params.clone(),
                    body: data.body.clone(),
                    env: data.env.clone(),
                    this_mode: data.this_mode,
                    bound_this: data.bound_this.as_deref().cloned(),
                    bound_args: data.bound_args.clone(),
                },
                _ => {
                    return Err(Exception::type_error(format!(
                        "{} is not a function",
                        func.to_js_string()
                    ))
                    .with_loc(range)
                    .into());
                }
            }
        };
        self.call_depth += 1;
        let result = match target {
            Target::Native(native) => native(self, this, args),
            Target::User {
                params,
                body,
                env: closure,
                this_mode,
                bound_this,
                bound_args,
            } => {
                let effective_this = bound_this.unwrap_or(this);
                let scope_this = match this_mode {
                    ThisMode::Dynamic => Some(effective_this),
                    ThisMode::Lexical => None,
                };
                let scope = Environment::new_function(closure, scope_this);
                let mut all_args: Vec<Value> = bound_args;
                all_args.extend(args.iter().cloned());
                for (index, param) in params.iter().enumerate() {
                    let value = all_args.get(index).cloned().unwrap_or(Value::Undefined);
                    namespace::define(&scope, param, value);
                }
                if this_mode == ThisMode::Dynamic {
                    namespace::define(&scope, "arguments", Value::object(JsObject::array(all_args)));
                }
                hoist_vars(&body, &scope);
                self.block_prologue(&body, &scope);
                self.eval_stmts(&body, &scope).map(|flow| match flow {
                    Flow::Return(value) => value,
                    _ => Value::Undefined,
                })
            }
        };
        self.call_depth -= 1;
        result.map_err(|mut err| {
            err.fill_loc(range);
            err
        })
    }

    /// `new` semantics: fresh receiver, class name and constructor identity
    /// recorded for `instanceof` and the describer's `cname`.
    pub fn construct(&mut self, callee: &Value, args: &[Value], range: CodeRange) -> Result<Value, RunError> {
        let Some(obj) = callee.as_object() else {
            return Err(Exception::type_error(format!("{} is not a constructor", callee.to_js_string()))
                .with_loc(range)
                .into());
        };
        let identity = Rc::as_ptr(obj) as usize;
        let is_native = {
            let borrowed = obj.borrow();
            match &borrowed.kind {
                ObjectKind::Native(_) => true,
                ObjectKind::Function(data) => {
                    if data.this_mode == ThisMode::Lexical {
                        return Err(Exception::type_error("arrow functions cannot be constructed")
                            .with_loc(range)
                            .into());
                    }
                    false
                }
                _ => {
                    return Err(Exception::type_error(format!(
                        "{} is not a constructor",
                        callee.to_js_string()
                    ))
                    .with_loc(range)
                    .into());
                }
            }
        };
        if is_native {
            let result = self.call_function(callee, Value::Undefined, args, range)?;
            if let Value::Object(result_obj) = &result {
                let mut borrowed = result_obj.borrow_mut();
                if borrowed.constructed_by.is_none() {
                    borrowed.constructed_by = Some(identity);
                }
            }
            return Ok(result);
        }
        let class_name = obj.borrow().function_name();
        let mut instance = JsObject::plain();
        instance.class_name = class_name;
        instance.constructed_by = Some(identity);
        let this = Value::object(instance);
        let result = self.call_function(callee, this.clone(), args, range)?;
        Ok(match result {
            Value::Object(_) => result,
            _ => this,
        })
    }

    /// Property read with primitive method dispatch.
    pub fn get_member(&mut self, object: &Value, key: &str, range: CodeRange) -> Result<Value, RunError> {
        match object {
            Value::Undefined | Value::Null => Err(Exception::type_error(format!(
                "Cannot read properties of {} (reading '{key}')",
                object.to_js_string()
            ))
            .with_loc(range)
            .into()),
            Value::Str(s) => Ok(builtins::string_member(s, key)),
            Value::Number(n) => Ok(builtins::number_member(*n, key)),
            Value::Bool(_) | Value::Described(_) => Ok(Value::Undefined),
            Value::Object(obj) => {
                {
                    let borrowed = obj.borrow();
                    if let Some(value) = borrowed.properties.get(key) {
                        return Ok(value.clone());
                    }
                    match &borrowed.kind {
                        ObjectKind::Array(elements) => {
                            if key == "length" {
                                return Ok(Value::Number(elements.len() as f64));
                            }
                            if let Ok(index) = key.parse::<usize>() {
                                return Ok(elements.get(index).cloned().unwrap_or(Value::Undefined));
                            }
                        }
                        ObjectKind::Function(data) => {
                            if key == "name" {
                                return Ok(Value::str(data.name.as_deref().unwrap_or("")));
                            }
                            if key == "length" {
                                return Ok(Value::Number(data.params.len() as f64));
                            }
                        }
                        ObjectKind::Native(native) => {
                            if key == "name" {
                                return Ok(Value::str(native.name.as_ref()));
                            }
                            if key == "length" {
                                return Ok(Value::Number(0.0));
                            }
                        }
                        ObjectKind::Plain => {}
                    }
                }
                enum Family {
                    Array,
                    Function,
                    Plain,
                }
                let family = match &obj.borrow().kind {
                    ObjectKind::Array(_) => Family::Array,
                    ObjectKind::Function(_) | ObjectKind::Native(_) => Family::Function,
                    ObjectKind::Plain => Family::Plain,
                };
                match family {
                    Family::Array => Ok(builtins::array_member(object, key)),
                    Family::Function => Ok(builtins::function_member(object, key)),
                    Family::Plain => Ok(Value::Undefined),
                }
            }
        }
    }

    fn make_function(&mut self, func: &FunctionExpr, env: &EnvRef) -> Value {
        let data = FunctionData {
            name: func.name.as_deref().map(Rc::from),
            params: func.params.clone().into(),
            body: func.body.clone().into(),
            env: env.clone(),
            this_mode: ThisMode::Dynamic,
            bound_this: None,
            bound_args: Vec::new(),
        };
        let mut obj = JsObject::plain();
        obj.kind = ObjectKind::Function(data);
        Value::object(obj)
    }

    fn make_arrow(&mut self, arrow: &ArrowExpr, env: &EnvRef) -> Value {
        let body: Vec<Stmt> = match &arrow.body {
            ArrowBody::Block(body) => body.clone(),
            ArrowBody::Expr(expr) => vec![Stmt::new(expr.range, StmtKind::Return(Some((**expr).clone())))],
        };
        let data = FunctionData {
            name: None,
            params: arrow.params.clone().into(),
            body: body.into(),
            env: env.clone(),
            this_mode: ThisMode::Lexical,
            bound_this: None,
            bound_args: Vec::new(),
        };
        let mut obj = JsObject::plain();
        obj.kind = ObjectKind::Function(data);
        Value::object(obj)
    }
}

/// Declares every `var` found in the statements (not descending into nested
/// functions) in the nearest function scope.
pub fn hoist_vars(stmts: &[Stmt], env: &EnvRef) {
    let mut names = Vec::new();
    collect_var_names(stmts, &mut names);
    for name in names {
        namespace::declare_var(env, &name);
    }
}

fn collect_var_names(stmts: &[Stmt], names: &mut Vec<String>) {
    for stmt in stmts {
        collect_var_names_stmt(stmt, names);
    }
}

fn collect_var_names_stmt(stmt: &Stmt, names: &mut Vec<String>) {
    match &stmt.kind {
        StmtKind::VarDecl { decl_kind, decls } => {
            if *decl_kind == crate::ast::DeclKind::Var {
                for decl in decls {
                    names.push(decl.name.clone());
                }
            }
        }
        StmtKind::Block(body) => collect_var_names(body, names),
        StmtKind::If {
            consequent, alternate, ..
        } => {
            collect_var_names_stmt(consequent, names);
            if let Some(alternate) = alternate {
                collect_var_names_stmt(alternate, names);
            }
        }
        StmtKind::For { init, body, .. } => {
            if let Some(ForInit::VarDecl { decl_kind, decls, .. }) = init
                && *decl_kind == crate::ast::DeclKind::Var
            {
                for decl in decls {
                    names.push(decl.name.clone());
                }
            }
            collect_var_names_stmt(body, names);
        }
        StmtKind::While { body, .. } => collect_var_names_stmt(body, names),
        StmtKind::Try {
            block,
            handler,
            finalizer,
        } => {
            collect_var_names(block, names);
            if let Some(handler) = handler {
                collect_var_names(&handler.body, names);
            }
            if let Some(finalizer) = finalizer {
                collect_var_names(finalizer, names);
            }
        }
        _ => {}
    }
}

fn delete_member(object: &Value, key: &str) -> bool {
    let Value::Object(obj) = object else {
        return true;
    };
    let mut borrowed = obj.borrow_mut();
    if borrowed.frozen {
        return false;
    }
    if let ObjectKind::Array(elements) = &mut borrowed.kind
        && let Ok(index) = key.parse::<usize>()
    {
        if index < elements.len() {
            elements[index] = Value::Undefined;
        }
        return true;
    }
    borrowed.properties.shift_remove(key);
    true
}

/// Property write. Writing through `undefined`/`null` raises; writes to
/// other primitives are silently dropped, as in sloppy-mode JavaScript.
pub fn set_member(object: &Value, key: &str, value: Value) -> Result<(), RunError> {
    match object {
        Value::Undefined | Value::Null => Err(Exception::type_error(format!(
            "Cannot set properties of {} (setting '{key}')",
            object.to_js_string()
        ))
        .into()),
        Value::Object(obj) => {
            let mut borrowed = obj.borrow_mut();
            if borrowed.frozen {
                return Ok(());
            }
            if let ObjectKind::Array(elements) = &mut borrowed.kind {
                if key == "length" {
                    let new_len = value.to_number();
                    if new_len < 0.0 || new_len.fract() != 0.0 || !new_len.is_finite() {
                        return Err(Exception::range_error("Invalid array length").into());
                    }
                    elements.resize(new_len as usize, Value::Undefined);
                    return Ok(());
                }
                if let Ok(index) = key.parse::<usize>() {
                    if index >= elements.len() {
                        elements.resize(index + 1, Value::Undefined);
                    }
                    elements[index] = value;
                    return Ok(());
                }
            }
            borrowed.properties.insert(key.to_owned(), value);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Applies a binary operator to already-evaluated operands.
pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Exception> {
    let value = match op {
        BinaryOp::Add => {
            // ToPrimitive on objects goes through the string form, so any
            // string or object operand makes `+` concatenate.
            let concatenates = matches!(left, Value::Str(_) | Value::Object(_))
                || matches!(right, Value::Str(_) | Value::Object(_));
            if concatenates {
                Value::str(format!("{}{}", left.to_js_string(), right.to_js_string()))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Exp => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            let result = match (left, right) {
                (Value::Str(a), Value::Str(b)) => match op {
                    BinaryOp::Lt => a < b,
                    BinaryOp::Gt => a > b,
                    BinaryOp::Le => a <= b,
                    _ => a >= b,
                },
                _ => {
                    let a = left.to_number();
                    let b = right.to_number();
                    match op {
                        BinaryOp::Lt => a < b,
                        BinaryOp::Gt => a > b,
                        BinaryOp::Le => a <= b,
                        _ => a >= b,
                    }
                }
            };
            Value::Bool(result)
        }
        BinaryOp::EqLoose => Value::Bool(left.loose_eq(right)),
        BinaryOp::NeLoose => Value::Bool(!left.loose_eq(right)),
        BinaryOp::EqStrict => Value::Bool(left.strict_eq(right)),
        BinaryOp::NeStrict => Value::Bool(!left.strict_eq(right)),
        BinaryOp::BitAnd => Value::Number(f64::from(to_int32(left.to_number()) & to_int32(right.to_number()))),
        BinaryOp::BitOr => Value::Number(f64::from(to_int32(left.to_number()) | to_int32(right.to_number()))),
        BinaryOp::BitXor => Value::Number(f64::from(to_int32(left.to_number()) ^ to_int32(right.to_number()))),
        BinaryOp::Shl => Value::Number(f64::from(
            to_int32(left.to_number()) << (to_uint32(right.to_number()) & 31),
        )),
        BinaryOp::Shr => Value::Number(f64::from(
            to_int32(left.to_number()) >> (to_uint32(right.to_number()) & 31),
        )),
        BinaryOp::UShr => Value::Number(f64::from(
            to_uint32(left.to_number()) >> (to_uint32(right.to_number()) & 31),
        )),
        BinaryOp::In => {
            let Value::Object(obj) = right else {
                return Err(Exception::type_error(
                    "Cannot use 'in' operator to search in a non-object",
                ));
            };
            let key = left.to_js_string();
            let borrowed = obj.borrow();
            let found = borrowed.properties.contains_key(&key)
                || match &borrowed.kind {
                    ObjectKind::Array(elements) => {
                        key == "length" || key.parse::<usize>().is_ok_and(|index| index < elements.len())
                    }
                    _ => false,
                };
            Value::Bool(found)
        }
        BinaryOp::InstanceOf => {
            let Value::Object(ctor) = right else {
                return Err(Exception::type_error("Right-hand side of 'instanceof' is not callable"));
            };
            if !ctor.borrow().is_callable() {
                return Err(Exception::type_error("Right-hand side of 'instanceof' is not callable"));
            }
            let identity = Rc::as_ptr(ctor) as usize;
            let matches = match left {
                Value::Object(obj) => obj.borrow().constructed_by == Some(identity),
                _ => false,
            };
            Value::Bool(matches)
        }
    };
    Ok(value)
}
