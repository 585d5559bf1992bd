//! The `JSON` namespace object.

use std::{fmt::Write as _, rc::Rc};

use ahash::AHashSet;

use crate::{
    exception::Exception,
    value::{JsObject, ObjectKind, Value, number_to_string},
};

#[must_use]
pub fn make_json() -> Value {
    let mut json = JsObject::plain();
    json.class_name = Some("JSON".into());
    json.properties.insert(
        "stringify".to_owned(),
        Value::native("stringify", |_interp, _this, args| {
            let value = args.first().cloned().unwrap_or(Value::Undefined);
            let mut seen = AHashSet::new();
            Ok(match stringify(&value, &mut seen)? {
                Some(text) => Value::str(text),
                None => Value::Undefined,
            })
        }),
    );
    json.properties.insert(
        "parse".to_owned(),
        Value::native("parse", |_interp, _this, args| {
            let text = args.first().map_or_else(|| "undefined".to_owned(), Value::to_js_string);
            let parsed: serde_json::Value = serde_json::from_str(&text)
                .map_err(|err| Exception::syntax(format!("Unexpected token in JSON: {err}"), crate::ast::CodeLoc::zero()))?;
            Ok(json_to_value(&parsed))
        }),
    );
    Value::object(json)
}

/// JSON.stringify semantics for the shapes the subset produces: `None`
/// means the value is omitted (undefined/function at the top level).
fn stringify(value: &Value, seen: &mut AHashSet<usize>) -> Result<Option<String>, Exception> {
    match value {
        Value::Undefined | Value::Described(_) => Ok(None),
        Value::Null => Ok(Some("null".to_owned())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(if n.is_finite() {
            number_to_string(*n)
        } else {
            "null".to_owned()
        })),
        Value::Str(s) => Ok(Some(quote(s))),
        Value::Object(obj) => {
            let identity = Rc::as_ptr(obj) as usize;
            if !seen.insert(identity) {
                return Err(Exception::type_error("Converting circular structure to JSON"));
            }
            enum Shape {
                Callable,
                Array(Vec<Value>),
                Plain(Vec<(String, Value)>),
            }
            let shape = {
                let borrowed = obj.borrow();
                match &borrowed.kind {
                    ObjectKind::Function(_) | ObjectKind::Native(_) => Shape::Callable,
                    ObjectKind::Array(elements) => Shape::Array(elements.clone()),
                    ObjectKind::Plain => Shape::Plain(
                        borrowed
                            .properties
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                    ),
                }
            };
            let out = match shape {
                Shape::Callable => None,
                Shape::Array(elements) => {
                    let mut out = String::from("[");
                    for (index, element) in elements.iter().enumerate() {
                        if index > 0 {
                            out.push(',');
                        }
                        out.push_str(&stringify(element, seen)?.unwrap_or_else(|| "null".to_owned()));
                    }
                    out.push(']');
                    Some(out)
                }
                Shape::Plain(properties) => {
                    let mut out = String::from("{");
                    let mut first = true;
                    for (key, prop) in properties {
                        if let Some(text) = stringify(&prop, seen)? {
                            if !first {
                                out.push(',');
                            }
                            first = false;
                            let _ = write!(out, "{}:{}", quote(&key), text);
                        }
                    }
                    out.push('}');
                    Some(out)
                }
            };
            seen.remove(&identity);
            Ok(out)
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::str(s.as_str()),
        serde_json::Value::Array(items) => {
            Value::object(JsObject::array(items.iter().map(json_to_value).collect()))
        }
        serde_json::Value::Object(map) => {
            let mut obj = JsObject::plain();
            for (key, value) in map {
                obj.properties.insert(key.clone(), json_to_value(value));
            }
            Value::object(obj)
        }
    }
}
