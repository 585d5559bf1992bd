//! Frame globals: the runtime library installed into every execution frame.

use crate::{
    namespace::{self, EnvRef},
    value::{JsObject, ObjectKind, Value},
};

use super::{json::make_json, math::make_math};

/// Installs every global except `console` (which needs the log queue) and
/// the reserved reporter namespace (which the executor injects itself).
pub fn install_globals(env: &EnvRef) {
    namespace::define(env, "undefined", Value::Undefined);
    namespace::define(env, "NaN", Value::Number(f64::NAN));
    namespace::define(env, "Infinity", Value::Number(f64::INFINITY));
    namespace::define(env, "globalThis", Value::object(JsObject::plain()));
    namespace::define(env, "Math", make_math());
    namespace::define(env, "JSON", make_json());

    namespace::define(
        env,
        "parseInt",
        Value::native("parseInt", |_interp, _this, args| {
            let text = args.first().map_or_else(|| "undefined".to_owned(), Value::to_js_string);
            let radix = args.get(1).map_or(f64::NAN, Value::to_number);
            Ok(Value::Number(parse_int(&text, radix)))
        }),
    );
    namespace::define(
        env,
        "parseFloat",
        Value::native("parseFloat", |_interp, _this, args| {
            let text = args.first().map_or_else(|| "undefined".to_owned(), Value::to_js_string);
            Ok(Value::Number(parse_float(&text)))
        }),
    );
    namespace::define(
        env,
        "isNaN",
        Value::native("isNaN", |_interp, _this, args| {
            Ok(Value::Bool(args.first().map_or(true, |v| v.to_number().is_nan())))
        }),
    );
    namespace::define(
        env,
        "isFinite",
        Value::native("isFinite", |_interp, _this, args| {
            Ok(Value::Bool(args.first().is_some_and(|v| v.to_number().is_finite())))
        }),
    );

    namespace::define(env, "String", make_string_global());
    namespace::define(env, "Number", make_number_global());
    namespace::define(
        env,
        "Boolean",
        Value::native("Boolean", |_interp, _this, args| {
            Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
        }),
    );
    namespace::define(env, "Array", make_array_global());
    namespace::define(env, "Object", make_object_global());

    for name in ["Error", "TypeError", "RangeError"] {
        namespace::define(env, name, make_error_ctor(name));
    }
}

fn make_string_global() -> Value {
    let string_fn = Value::native("String", |_interp, _this, args| {
        Ok(match args.first() {
            None => Value::str(""),
            Some(value) => Value::str(value.to_js_string()),
        })
    });
    if let Value::Object(obj) = &string_fn {
        obj.borrow_mut().properties.insert(
            "fromCharCode".to_owned(),
            Value::native("fromCharCode", |_interp, _this, args| {
                let out: String = args
                    .iter()
                    .filter_map(|arg| char::from_u32(crate::value::to_uint32(arg.to_number())))
                    .collect();
                Ok(Value::str(out))
            }),
        );
    }
    string_fn
}

fn make_number_global() -> Value {
    let number_fn = Value::native("Number", |_interp, _this, args| {
        Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
    });
    if let Value::Object(obj) = &number_fn {
        let mut borrowed = obj.borrow_mut();
        borrowed.properties.insert(
            "isInteger".to_owned(),
            Value::native("isInteger", |_interp, _this, args| {
                Ok(Value::Bool(matches!(
                    args.first(),
                    Some(Value::Number(n)) if n.is_finite() && n.fract() == 0.0
                )))
            }),
        );
        borrowed.properties.insert(
            "isFinite".to_owned(),
            Value::native("isFinite", |_interp, _this, args| {
                Ok(Value::Bool(matches!(args.first(), Some(Value::Number(n)) if n.is_finite())))
            }),
        );
        borrowed.properties.insert(
            "isNaN".to_owned(),
            Value::native("isNaN", |_interp, _this, args| {
                Ok(Value::Bool(matches!(args.first(), Some(Value::Number(n)) if n.is_nan())))
            }),
        );
        borrowed.properties.insert(
            "parseFloat".to_owned(),
            Value::native("parseFloat", |_interp, _this, args| {
                let text = args.first().map_or_else(|| "undefined".to_owned(), Value::to_js_string);
                Ok(Value::Number(parse_float(&text)))
            }),
        );
        borrowed.properties.insert(
            "parseInt".to_owned(),
            Value::native("parseInt", |_interp, _this, args| {
                let text = args.first().map_or_else(|| "undefined".to_owned(), Value::to_js_string);
                let radix = args.get(1).map_or(f64::NAN, Value::to_number);
                Ok(Value::Number(parse_int(&text, radix)))
            }),
        );
        borrowed
            .properties
            .insert("MAX_SAFE_INTEGER".to_owned(), Value::Number(9_007_199_254_740_991.0));
        borrowed
            .properties
            .insert("MIN_SAFE_INTEGER".to_owned(), Value::Number(-9_007_199_254_740_991.0));
        borrowed.properties.insert("EPSILON".to_owned(), Value::Number(f64::EPSILON));
    }
    number_fn
}

fn make_array_global() -> Value {
    let array_fn = Value::native("Array", |_interp, _this, args| {
        // `Array(n)` preallocates; any other arity builds from the arguments.
        if args.len() == 1
            && let Value::Number(n) = &args[0]
        {
            if *n < 0.0 || n.fract() != 0.0 || !n.is_finite() {
                return Err(crate::exception::Exception::range_error("Invalid array length").into());
            }
            return Ok(Value::object(JsObject::array(vec![Value::Undefined; *n as usize])));
        }
        Ok(Value::object(JsObject::array(args.to_vec())))
    });
    if let Value::Object(obj) = &array_fn {
        obj.borrow_mut().properties.insert(
            "isArray".to_owned(),
            Value::native("isArray", |_interp, _this, args| {
                let is_array = args
                    .first()
                    .and_then(Value::as_object)
                    .is_some_and(|obj| matches!(obj.borrow().kind, ObjectKind::Array(_)));
                Ok(Value::Bool(is_array))
            }),
        );
    }
    array_fn
}

fn make_object_global() -> Value {
    let object_fn = Value::native("Object", |_interp, _this, args| {
        Ok(match args.first() {
            Some(value @ Value::Object(_)) => value.clone(),
            _ => Value::object(JsObject::plain()),
        })
    });
    if let Value::Object(obj) = &object_fn {
        let mut borrowed = obj.borrow_mut();
        borrowed.properties.insert(
            "keys".to_owned(),
            Value::native("keys", |_interp, _this, args| {
                let keys = own_entries(args.first()).into_iter().map(|(k, _)| Value::str(k)).collect();
                Ok(Value::object(JsObject::array(keys)))
            }),
        );
        borrowed.properties.insert(
            "values".to_owned(),
            Value::native("values", |_interp, _this, args| {
                let values = own_entries(args.first()).into_iter().map(|(_, v)| v).collect();
                Ok(Value::object(JsObject::array(values)))
            }),
        );
        borrowed.properties.insert(
            "entries".to_owned(),
            Value::native("entries", |_interp, _this, args| {
                let entries = own_entries(args.first())
                    .into_iter()
                    .map(|(k, v)| Value::object(JsObject::array(vec![Value::str(k), v])))
                    .collect();
                Ok(Value::object(JsObject::array(entries)))
            }),
        );
        borrowed.properties.insert(
            "assign".to_owned(),
            Value::native("assign", |_interp, _this, args| {
                let Some(target @ Value::Object(target_obj)) = args.first() else {
                    return Err(crate::exception::Exception::type_error(
                        "Cannot convert undefined or null to object",
                    )
                    .into());
                };
                for source in args.get(1..).unwrap_or(&[]) {
                    for (key, value) in own_entries(Some(source)) {
                        target_obj.borrow_mut().properties.insert(key, value);
                    }
                }
                Ok(target.clone())
            }),
        );
        borrowed.properties.insert(
            "freeze".to_owned(),
            Value::native("freeze", |_interp, _this, args| {
                let value = args.first().cloned().unwrap_or(Value::Undefined);
                if let Value::Object(obj) = &value {
                    obj.borrow_mut().frozen = true;
                }
                Ok(value)
            }),
        );
    }
    object_fn
}

/// Enumerable own entries: array indices first, then named properties.
fn own_entries(value: Option<&Value>) -> Vec<(String, Value)> {
    let Some(Value::Object(obj)) = value else {
        return Vec::new();
    };
    let borrowed = obj.borrow();
    let mut entries = Vec::new();
    if let ObjectKind::Array(elements) = &borrowed.kind {
        for (index, element) in elements.iter().enumerate() {
            entries.push((index.to_string(), element.clone()));
        }
    }
    for (key, prop) in &borrowed.properties {
        entries.push((key.clone(), prop.clone()));
    }
    entries
}

fn make_error_ctor(name: &'static str) -> Value {
    Value::native(name, move |_interp, _this, args| {
        let message = match args.first() {
            None | Some(Value::Undefined) => String::new(),
            Some(value) => value.to_js_string(),
        };
        Ok(Value::new_error(name, &message))
    })
}

/// `parseInt` semantics: trimmed prefix parse with optional sign and radix.
fn parse_int(text: &str, radix: f64) -> f64 {
    let t = text.trim();
    let (sign, t) = match t.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, t.strip_prefix('+').unwrap_or(t)),
    };
    let mut radix = if radix.is_nan() || radix == 0.0 { 10 } else { radix as u32 };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let t = if (radix == 16 || radix == 10) && (t.starts_with("0x") || t.starts_with("0X")) {
        radix = 16;
        &t[2..]
    } else {
        t
    };
    let digits: String = t.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let mut value = 0.0f64;
    for c in digits.chars() {
        value = value * f64::from(radix) + f64::from(c.to_digit(radix).unwrap_or(0));
    }
    sign * value
}

/// `parseFloat`: longest numeric prefix.
fn parse_float(text: &str) -> f64 {
    let t = text.trim();
    if t.starts_with("Infinity") || t.starts_with("+Infinity") {
        return f64::INFINITY;
    }
    if t.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }
    let mut end = 0;
    let bytes = t.as_bytes();
    let mut seen_dot = false;
    let mut seen_exp = false;
    while end < bytes.len() {
        let b = bytes[end];
        let ok = b.is_ascii_digit()
            || (b == b'.' && !seen_dot && !seen_exp)
            || ((b == b'e' || b == b'E') && !seen_exp && end > 0)
            || ((b == b'+' || b == b'-')
                && (end == 0 || bytes[end - 1] == b'e' || bytes[end - 1] == b'E'));
        if !ok {
            break;
        }
        if b == b'.' {
            seen_dot = true;
        }
        if b == b'e' || b == b'E' {
            seen_exp = true;
            seen_dot = true;
        }
        end += 1;
    }
    // Trim a dangling exponent marker so "1e" parses as 1.
    let mut slice = &t[..end];
    while slice.ends_with(['e', 'E', '+', '-']) {
        slice = &slice[..slice.len() - 1];
    }
    if slice.is_empty() {
        return f64::NAN;
    }
    slice.parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::{parse_float, parse_int};

    #[test]
    fn parse_int_prefixes() {
        assert_eq!(parse_int("42px", f64::NAN), 42.0);
        assert_eq!(parse_int("  -17", f64::NAN), -17.0);
        assert_eq!(parse_int("0xff", f64::NAN), 255.0);
        assert_eq!(parse_int("11", 2.0), 3.0);
        assert!(parse_int("zz", f64::NAN).is_nan());
    }

    #[test]
    fn parse_float_prefixes() {
        assert_eq!(parse_float("3.5rem"), 3.5);
        assert_eq!(parse_float("1e3"), 1000.0);
        assert!(parse_float("x1").is_nan());
        assert_eq!(parse_float("1e"), 1.0);
    }
}
