//! `Function.prototype` members.
//!
//! `call` and `bind` are load-bearing: the instrumenting transformer emits
//! `callee.call(receiver, …)` for every call site and `(function …).bind(this)`
//! for every arrow rewrite, so these run on nearly every traced program.

use crate::{
    ast::CodeRange,
    exception::Exception,
    value::{ObjectKind, Value},
};

#[must_use]
pub fn function_member(this: &Value, key: &str) -> Value {
    match key {
        "call" => Value::native("call", |interp, this, args| {
            let receiver = args.first().cloned().unwrap_or(Value::Undefined);
            let rest = args.get(1..).unwrap_or(&[]);
            interp.call_function(&this, receiver, rest, CodeRange::synthetic())
        }),
        "apply" => Value::native("apply", |interp, this, args| {
            let receiver = args.first().cloned().unwrap_or(Value::Undefined);
            let spread: Vec<Value> = match args.get(1) {
                None | Some(Value::Undefined | Value::Null) => Vec::new(),
                Some(Value::Object(obj)) => match &obj.borrow().kind {
                    ObjectKind::Array(elements) => elements.clone(),
                    _ => {
                        return Err(Exception::type_error("apply() arguments must be an array").into());
                    }
                },
                Some(_) => {
                    return Err(Exception::type_error("apply() arguments must be an array").into());
                }
            };
            interp.call_function(&this, receiver, &spread, CodeRange::synthetic())
        }),
        "bind" => Value::native("bind", |_interp, this, args| {
            let bound_this = args.first().cloned().unwrap_or(Value::Undefined);
            let bound_args: Vec<Value> = args.get(1..).unwrap_or(&[]).to_vec();
            let target = this.clone();
            let name = match this.as_object() {
                Some(obj) => format!("bound {}", obj.borrow().function_name().as_deref().unwrap_or("")),
                None => "bound".to_owned(),
            };
            Ok(Value::native(&name, move |interp, _this, call_args| {
                let mut full = bound_args.clone();
                full.extend(call_args.iter().cloned());
                interp.call_function(&target, bound_this.clone(), &full, CodeRange::synthetic())
            }))
        }),
        _ => {
            let _ = this;
            Value::Undefined
        }
    }
}
