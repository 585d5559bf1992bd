//! Lexical environments for the evaluator.
//!
//! Environments form a parent chain. `var` declarations hoist to the
//! nearest function (or global) scope; `let`/`const` bind in the current
//! block and stay in their temporal dead zone until initialized, which the
//! scope-snapshot guards rely on: reading an uninitialized binding raises a
//! `ReferenceError` that the guard swallows.

use std::{cell::RefCell, rc::Rc};

use ahash::AHashMap;

use crate::{
    exception::Exception,
    value::Value,
};

pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
}

struct Binding {
    value: Value,
    kind: BindingKind,
    initialized: bool,
}

pub struct Environment {
    bindings: AHashMap<String, Binding>,
    parent: Option<EnvRef>,
    /// True for the global scope and every function body scope; `var`
    /// hoisting stops here.
    function_scope: bool,
    /// The `this` value of a function scope. `None` on block scopes and on
    /// arrow-function scopes, so lookup continues outward.
    this_value: Option<Value>,
}

impl Environment {
    #[must_use]
    pub fn new_global() -> EnvRef {
        Rc::new(RefCell::new(Self {
            bindings: AHashMap::new(),
            parent: None,
            function_scope: true,
            this_value: Some(Value::Undefined),
        }))
    }

    #[must_use]
    pub fn new_function(parent: EnvRef, this_value: Option<Value>) -> EnvRef {
        Rc::new(RefCell::new(Self {
            bindings: AHashMap::new(),
            parent: Some(parent),
            function_scope: true,
            this_value,
        }))
    }

    #[must_use]
    pub fn new_block(parent: EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Self {
            bindings: AHashMap::new(),
            parent: Some(parent),
            function_scope: false,
            this_value: None,
        }))
    }
}

/// Declares a `var` binding in the nearest function scope, initialized to
/// `undefined` unless the name is already bound there.
pub fn declare_var(env: &EnvRef, name: &str) {
    let target = function_scope_of(env);
    let mut target = target.borrow_mut();
    target.bindings.entry(name.to_owned()).or_insert(Binding {
        value: Value::Undefined,
        kind: BindingKind::Var,
        initialized: true,
    });
}

/// Defines an initialized binding in the current scope, replacing any
/// existing one. Used for parameters, hoisted function declarations, and
/// frame globals.
pub fn define(env: &EnvRef, name: &str, value: Value) {
    env.borrow_mut().bindings.insert(
        name.to_owned(),
        Binding {
            value,
            kind: BindingKind::Var,
            initialized: true,
        },
    );
}

/// Declares a `let`/`const` binding in the current scope, uninitialized
/// (temporal dead zone) until [`initialize`] runs.
pub fn declare_lexical(env: &EnvRef, name: &str, kind: BindingKind) {
    env.borrow_mut().bindings.insert(
        name.to_owned(),
        Binding {
            value: Value::Undefined,
            kind,
            initialized: false,
        },
    );
}

/// Initializes a lexical binding declared in the current scope.
pub fn initialize(env: &EnvRef, name: &str, value: Value) {
    if let Some(binding) = env.borrow_mut().bindings.get_mut(name) {
        binding.value = value;
        binding.initialized = true;
    }
}

/// Reads a binding, walking the scope chain.
pub fn lookup(env: &EnvRef, name: &str) -> Result<Value, Exception> {
    let mut current = env.clone();
    loop {
        {
            let borrowed = current.borrow();
            if let Some(binding) = borrowed.bindings.get(name) {
                if !binding.initialized {
                    return Err(Exception::reference_error(format!(
                        "Cannot access '{name}' before initialization"
                    )));
                }
                return Ok(binding.value.clone());
            }
        }
        let parent = current.borrow().parent.clone();
        match parent {
            Some(parent) => current = parent,
            None => {
                return Err(Exception::reference_error(format!("{name} is not defined")));
            }
        }
    }
}

/// True when the name resolves somewhere on the chain, TDZ included.
#[must_use]
pub fn is_bound(env: &EnvRef, name: &str) -> bool {
    let mut current = env.clone();
    loop {
        if current.borrow().bindings.contains_key(name) {
            return true;
        }
        let parent = current.borrow().parent.clone();
        match parent {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// Writes a binding, walking the scope chain. Assigning to a `const` raises
/// a `TypeError`; assigning to a name bound nowhere creates a global, as
/// sloppy-mode JavaScript does.
pub fn assign(env: &EnvRef, name: &str, value: Value) -> Result<(), Exception> {
    let mut current = env.clone();
    loop {
        {
            let mut borrowed = current.borrow_mut();
            if let Some(binding) = borrowed.bindings.get_mut(name) {
                if binding.kind == BindingKind::Const && binding.initialized {
                    return Err(Exception::type_error(format!(
                        "Assignment to constant variable '{name}'"
                    )));
                }
                if !binding.initialized && binding.kind != BindingKind::Var {
                    return Err(Exception::reference_error(format!(
                        "Cannot access '{name}' before initialization"
                    )));
                }
                binding.value = value;
                return Ok(());
            }
        }
        let parent = current.borrow().parent.clone();
        match parent {
            Some(parent) => current = parent,
            None => {
                define(&current, name, value);
                return Ok(());
            }
        }
    }
}

/// Resolves `this` at the current position: the nearest function scope that
/// carries a receiver.
#[must_use]
pub fn lookup_this(env: &EnvRef) -> Value {
    let mut current = env.clone();
    loop {
        {
            let borrowed = current.borrow();
            if let Some(this_value) = &borrowed.this_value {
                return this_value.clone();
            }
        }
        let parent = current.borrow().parent.clone();
        match parent {
            Some(parent) => current = parent,
            None => return Value::Undefined,
        }
    }
}

fn function_scope_of(env: &EnvRef) -> EnvRef {
    let mut current = env.clone();
    loop {
        if current.borrow().function_scope {
            return current;
        }
        let parent = current.borrow().parent.clone();
        match parent {
            Some(parent) => current = parent,
            None => return current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BindingKind, Environment, assign, declare_lexical, declare_var, define, initialize, lookup};
    use crate::value::Value;

    #[test]
    fn var_hoists_to_function_scope() {
        let global = Environment::new_global();
        let block = Environment::new_block(global.clone());
        declare_var(&block, "x");
        assert!(lookup(&global, "x").is_ok());
    }

    #[test]
    fn tdz_read_is_a_reference_error() {
        let global = Environment::new_global();
        declare_lexical(&global, "x", BindingKind::Let);
        let err = lookup(&global, "x").expect_err("TDZ read should fail");
        assert!(err.message().is_some_and(|m| m.contains("before initialization")));
        initialize(&global, "x", Value::Number(1.0));
        assert!(lookup(&global, "x").is_ok());
    }

    #[test]
    fn const_assignment_is_a_type_error() {
        let global = Environment::new_global();
        declare_lexical(&global, "x", BindingKind::Const);
        initialize(&global, "x", Value::Number(1.0));
        assert!(assign(&global, "x", Value::Number(2.0)).is_err());
    }

    #[test]
    fn shadowing_resolves_innermost() {
        let global = Environment::new_global();
        define(&global, "x", Value::Number(1.0));
        let block = Environment::new_block(global);
        declare_lexical(&block, "x", BindingKind::Let);
        initialize(&block, "x", Value::Number(2.0));
        match lookup(&block, "x").expect("lookup failed") {
            Value::Number(n) => assert_eq!(n, 2.0),
            other => panic!("unexpected value {other:?}"),
        }
    }
}
