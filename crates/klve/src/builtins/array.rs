//! Array instance methods.
//!
//! Iterating methods snapshot the elements before invoking user callbacks,
//! so a callback that mutates the array cannot re-enter a borrowed cell;
//! mutations land and are visible on the next read.

use crate::{
    ast::CodeRange,
    eval::Interp,
    exception::{Exception, RunError},
    value::{JsObject, ObjectKind, Value},
};

fn elements_of(this: &Value) -> Vec<Value> {
    match this.as_object() {
        Some(obj) => match &obj.borrow().kind {
            ObjectKind::Array(elements) => elements.clone(),
            _ => Vec::new(),
        },
        None => Vec::new(),
    }
}

fn set_elements(this: &Value, elements: Vec<Value>) {
    if let Some(obj) = this.as_object()
        && let ObjectKind::Array(slot) = &mut obj.borrow_mut().kind
    {
        *slot = elements;
    }
}

fn call_back(
    interp: &mut Interp,
    callback: &Value,
    element: Value,
    index: usize,
    this: &Value,
) -> Result<Value, RunError> {
    interp.call_function(
        callback,
        Value::Undefined,
        &[element, Value::Number(index as f64), this.clone()],
        CodeRange::synthetic(),
    )
}

fn require_callback(args: &[Value], name: &str) -> Result<Value, RunError> {
    let callback = args.first().cloned().unwrap_or(Value::Undefined);
    if callback.is_callable() {
        Ok(callback)
    } else {
        Err(Exception::type_error(format!("{name} callback is not a function")).into())
    }
}

#[must_use]
pub fn array_member(_this: &Value, key: &str) -> Value {
    match key {
        "push" => Value::native("push", |_interp, this, args| {
            let mut elements = elements_of(&this);
            elements.extend(args.iter().cloned());
            let len = elements.len();
            set_elements(&this, elements);
            Ok(Value::Number(len as f64))
        }),
        "pop" => Value::native("pop", |_interp, this, _args| {
            let mut elements = elements_of(&this);
            let popped = elements.pop().unwrap_or(Value::Undefined);
            set_elements(&this, elements);
            Ok(popped)
        }),
        "shift" => Value::native("shift", |_interp, this, _args| {
            let mut elements = elements_of(&this);
            let shifted = if elements.is_empty() {
                Value::Undefined
            } else {
                elements.remove(0)
            };
            set_elements(&this, elements);
            Ok(shifted)
        }),
        "unshift" => Value::native("unshift", |_interp, this, args| {
            let mut elements = elements_of(&this);
            for (offset, arg) in args.iter().enumerate() {
                elements.insert(offset, arg.clone());
            }
            let len = elements.len();
            set_elements(&this, elements);
            Ok(Value::Number(len as f64))
        }),
        "indexOf" => Value::native("indexOf", |_interp, this, args| {
            let needle = args.first().cloned().unwrap_or(Value::Undefined);
            let found = elements_of(&this).iter().position(|e| e.strict_eq(&needle));
            Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
        }),
        "lastIndexOf" => Value::native("lastIndexOf", |_interp, this, args| {
            let needle = args.first().cloned().unwrap_or(Value::Undefined);
            let found = elements_of(&this).iter().rposition(|e| e.strict_eq(&needle));
            Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
        }),
        "includes" => Value::native("includes", |_interp, this, args| {
            let needle = args.first().cloned().unwrap_or(Value::Undefined);
            Ok(Value::Bool(elements_of(&this).iter().any(|e| e.strict_eq(&needle))))
        }),
        "join" => Value::native("join", |_interp, this, args| {
            let separator = match args.first() {
                None | Some(Value::Undefined) => ",".to_owned(),
                Some(sep) => sep.to_js_string(),
            };
            let parts: Vec<String> = elements_of(&this)
                .iter()
                .map(|e| if e.is_nullish() { String::new() } else { e.to_js_string() })
                .collect();
            Ok(Value::str(parts.join(&separator)))
        }),
        "slice" => Value::native("slice", |_interp, this, args| {
            let elements = elements_of(&this);
            let len = elements.len();
            let start = super::string::slice_bound(args.first(), 0.0, len);
            let end = super::string::slice_bound(args.get(1), len as f64, len);
            let out: Vec<Value> = elements
                .into_iter()
                .skip(start)
                .take(end.saturating_sub(start))
                .collect();
            Ok(Value::object(JsObject::array(out)))
        }),
        "concat" => Value::native("concat", |_interp, this, args| {
            let mut out = elements_of(&this);
            for arg in args {
                match arg.as_object().map(|obj| matches!(obj.borrow().kind, ObjectKind::Array(_))) {
                    Some(true) => out.extend(elements_of(arg)),
                    _ => out.push(arg.clone()),
                }
            }
            Ok(Value::object(JsObject::array(out)))
        }),
        "reverse" => Value::native("reverse", |_interp, this, _args| {
            let mut elements = elements_of(&this);
            elements.reverse();
            set_elements(&this, elements);
            Ok(this)
        }),
        "fill" => Value::native("fill", |_interp, this, args| {
            let filler = args.first().cloned().unwrap_or(Value::Undefined);
            let mut elements = elements_of(&this);
            let len = elements.len();
            let start = super::string::slice_bound(args.get(1), 0.0, len);
            let end = super::string::slice_bound(args.get(2), len as f64, len);
            for slot in elements.iter_mut().take(end).skip(start) {
                *slot = filler.clone();
            }
            set_elements(&this, elements);
            Ok(this)
        }),
        "map" => Value::native("map", |interp, this, args| {
            let callback = require_callback(args, "map")?;
            let elements = elements_of(&this);
            let mut out = Vec::with_capacity(elements.len());
            for (index, element) in elements.into_iter().enumerate() {
                out.push(call_back(interp, &callback, element, index, &this)?);
            }
            Ok(Value::object(JsObject::array(out)))
        }),
        "filter" => Value::native("filter", |interp, this, args| {
            let callback = require_callback(args, "filter")?;
            let elements = elements_of(&this);
            let mut out = Vec::new();
            for (index, element) in elements.into_iter().enumerate() {
                if call_back(interp, &callback, element.clone(), index, &this)?.truthy() {
                    out.push(element);
                }
            }
            Ok(Value::object(JsObject::array(out)))
        }),
        "forEach" => Value::native("forEach", |interp, this, args| {
            let callback = require_callback(args, "forEach")?;
            let elements = elements_of(&this);
            for (index, element) in elements.into_iter().enumerate() {
                call_back(interp, &callback, element, index, &this)?;
            }
            Ok(Value::Undefined)
        }),
        "reduce" => Value::native("reduce", |interp, this, args| {
            let callback = require_callback(args, "reduce")?;
            let elements = elements_of(&this);
            let mut iter = elements.into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match iter.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(Exception::type_error("Reduce of empty array with no initial value").into());
                    }
                },
            };
            for (index, element) in iter {
                acc = interp.call_function(
                    &callback,
                    Value::Undefined,
                    &[acc, element, Value::Number(index as f64), this.clone()],
                    CodeRange::synthetic(),
                )?;
            }
            Ok(acc)
        }),
        "find" => Value::native("find", |interp, this, args| {
            let callback = require_callback(args, "find")?;
            for (index, element) in elements_of(&this).into_iter().enumerate() {
                if call_back(interp, &callback, element.clone(), index, &this)?.truthy() {
                    return Ok(element);
                }
            }
            Ok(Value::Undefined)
        }),
        "findIndex" => Value::native("findIndex", |interp, this, args| {
            let callback = require_callback(args, "findIndex")?;
            for (index, element) in elements_of(&this).into_iter().enumerate() {
                if call_back(interp, &callback, element, index, &this)?.truthy() {
                    return Ok(Value::Number(index as f64));
                }
            }
            Ok(Value::Number(-1.0))
        }),
        "some" => Value::native("some", |interp, this, args| {
            let callback = require_callback(args, "some")?;
            for (index, element) in elements_of(&this).into_iter().enumerate() {
                if call_back(interp, &callback, element, index, &this)?.truthy() {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }),
        "every" => Value::native("every", |interp, this, args| {
            let callback = require_callback(args, "every")?;
            for (index, element) in elements_of(&this).into_iter().enumerate() {
                if !call_back(interp, &callback, element, index, &this)?.truthy() {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }),
        "flat" => Value::native("flat", |_interp, this, args| {
            let depth = args.first().map_or(1.0, Value::to_number);
            let mut out = Vec::new();
            flatten(&elements_of(&this), depth, &mut out);
            Ok(Value::object(JsObject::array(out)))
        }),
        "toString" => Value::native("toString", |_interp, this, _args| {
            Ok(Value::str(this.to_js_string()))
        }),
        _ => Value::Undefined,
    }
}

fn flatten(elements: &[Value], depth: f64, out: &mut Vec<Value>) {
    for element in elements {
        let nested = element
            .as_object()
            .is_some_and(|obj| matches!(obj.borrow().kind, ObjectKind::Array(_)));
        if nested && depth >= 1.0 {
            flatten(&elements_of(element), depth - 1.0, out);
        } else {
            out.push(element.clone());
        }
    }
}
