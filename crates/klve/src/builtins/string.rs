//! String and number members, dispatched from the evaluator's property
//! reads on primitives. Indices are in characters rather than UTF-16 code
//! units; the difference only shows outside the Basic Multilingual Plane.

use crate::value::{JsObject, Value, number_to_string};

fn receiver_string(this: &Value) -> String {
    this.to_js_string()
}

fn arg_number(args: &[Value], index: usize, default: f64) -> f64 {
    args.get(index).map_or(default, Value::to_number)
}

fn arg_string(args: &[Value], index: usize) -> String {
    args.get(index).map_or_else(|| "undefined".to_owned(), Value::to_js_string)
}

/// Resolves a `slice`-style bound argument: missing uses the default,
/// negatives count from the end, everything clamps to the length.
pub(crate) fn slice_bound(arg: Option<&Value>, default: f64, len: usize) -> usize {
    let raw = match arg {
        None | Some(Value::Undefined) => default,
        Some(value) => value.to_number(),
    };
    slice_index(raw, len)
}

/// Resolves negative or out-of-range slice endpoints the way `slice` does.
fn slice_index(raw: f64, len: usize) -> usize {
    if raw.is_nan() {
        return 0;
    }
    if raw < 0.0 {
        let from_end = len as f64 + raw;
        if from_end < 0.0 { 0 } else { from_end as usize }
    } else if raw as usize > len {
        len
    } else {
        raw as usize
    }
}

#[must_use]
pub fn string_member(s: &str, key: &str) -> Value {
    if key == "length" {
        return Value::Number(s.chars().count() as f64);
    }
    if let Ok(index) = key.parse::<usize>() {
        return s
            .chars()
            .nth(index)
            .map_or(Value::Undefined, |c| Value::str(c.to_string()));
    }
    match key {
        "charAt" => Value::native("charAt", |_interp, this, args| {
            let s = receiver_string(&this);
            let index = arg_number(args, 0, 0.0);
            let c = if index < 0.0 {
                None
            } else {
                s.chars().nth(index as usize)
            };
            Ok(Value::str(c.map(String::from).unwrap_or_default()))
        }),
        "charCodeAt" => Value::native("charCodeAt", |_interp, this, args| {
            let s = receiver_string(&this);
            let index = arg_number(args, 0, 0.0);
            let c = if index < 0.0 {
                None
            } else {
                s.chars().nth(index as usize)
            };
            Ok(Value::Number(c.map_or(f64::NAN, |c| f64::from(c as u32))))
        }),
        "indexOf" => Value::native("indexOf", |_interp, this, args| {
            let s = receiver_string(&this);
            let needle = arg_string(args, 0);
            Ok(Value::Number(char_index_of(&s, &needle).map_or(-1.0, |i| i as f64)))
        }),
        "lastIndexOf" => Value::native("lastIndexOf", |_interp, this, args| {
            let s = receiver_string(&this);
            let needle = arg_string(args, 0);
            let found = s.rfind(&needle).map(|byte| s[..byte].chars().count());
            Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
        }),
        "includes" => Value::native("includes", |_interp, this, args| {
            let s = receiver_string(&this);
            Ok(Value::Bool(s.contains(&arg_string(args, 0))))
        }),
        "startsWith" => Value::native("startsWith", |_interp, this, args| {
            let s = receiver_string(&this);
            Ok(Value::Bool(s.starts_with(&arg_string(args, 0))))
        }),
        "endsWith" => Value::native("endsWith", |_interp, this, args| {
            let s = receiver_string(&this);
            Ok(Value::Bool(s.ends_with(&arg_string(args, 0))))
        }),
        "slice" => Value::native("slice", |_interp, this, args| {
            let s = receiver_string(&this);
            let len = s.chars().count();
            let start = slice_bound(args.first(), 0.0, len);
            let end = slice_bound(args.get(1), len as f64, len);
            let out: String = s.chars().skip(start).take(end.saturating_sub(start)).collect();
            Ok(Value::str(out))
        }),
        "substring" => Value::native("substring", |_interp, this, args| {
            let s = receiver_string(&this);
            let len = s.chars().count();
            let a = arg_number(args, 0, 0.0).clamp(0.0, len as f64) as usize;
            let b = arg_number(args, 1, len as f64).clamp(0.0, len as f64) as usize;
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            let out: String = s.chars().skip(start).take(end - start).collect();
            Ok(Value::str(out))
        }),
        "toUpperCase" => Value::native("toUpperCase", |_interp, this, _args| {
            Ok(Value::str(receiver_string(&this).to_uppercase()))
        }),
        "toLowerCase" => Value::native("toLowerCase", |_interp, this, _args| {
            Ok(Value::str(receiver_string(&this).to_lowercase()))
        }),
        "trim" => Value::native("trim", |_interp, this, _args| {
            Ok(Value::str(receiver_string(&this).trim().to_owned()))
        }),
        "split" => Value::native("split", |_interp, this, args| {
            let s = receiver_string(&this);
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::Undefined) => vec![Value::str(s)],
                Some(sep) => {
                    let sep = sep.to_js_string();
                    if sep.is_empty() {
                        s.chars().map(|c| Value::str(c.to_string())).collect()
                    } else {
                        s.split(&sep as &str).map(|p| Value::str(p.to_owned())).collect()
                    }
                }
            };
            Ok(Value::object(JsObject::array(parts)))
        }),
        "repeat" => Value::native("repeat", |_interp, this, args| {
            let s = receiver_string(&this);
            let count = arg_number(args, 0, 0.0);
            if count < 0.0 || !count.is_finite() {
                return Err(crate::exception::Exception::range_error("Invalid count value").into());
            }
            Ok(Value::str(s.repeat(count as usize)))
        }),
        "padStart" => Value::native("padStart", |_interp, this, args| {
            Ok(Value::str(pad(&receiver_string(&this), args, true)))
        }),
        "padEnd" => Value::native("padEnd", |_interp, this, args| {
            Ok(Value::str(pad(&receiver_string(&this), args, false)))
        }),
        "replace" => Value::native("replace", |_interp, this, args| {
            let s = receiver_string(&this);
            let pattern = arg_string(args, 0);
            let replacement = arg_string(args, 1);
            Ok(Value::str(s.replacen(&pattern as &str, &replacement, 1)))
        }),
        "concat" => Value::native("concat", |_interp, this, args| {
            let mut s = receiver_string(&this);
            for arg in args {
                s.push_str(&arg.to_js_string());
            }
            Ok(Value::str(s))
        }),
        "toString" => Value::native("toString", |_interp, this, _args| {
            Ok(Value::str(receiver_string(&this)))
        }),
        _ => Value::Undefined,
    }
}

fn char_index_of(s: &str, needle: &str) -> Option<usize> {
    s.find(needle).map(|byte| s[..byte].chars().count())
}

fn pad(s: &str, args: &[Value], at_start: bool) -> String {
    let target = arg_number(args, 0, 0.0);
    let filler = match args.get(1) {
        None | Some(Value::Undefined) => " ".to_owned(),
        Some(value) => value.to_js_string(),
    };
    let len = s.chars().count();
    if target.is_nan() || target as usize <= len || filler.is_empty() {
        return s.to_owned();
    }
    let missing = target as usize - len;
    let padding: String = filler.chars().cycle().take(missing).collect();
    if at_start {
        format!("{padding}{s}")
    } else {
        format!("{s}{padding}")
    }
}

#[must_use]
pub fn number_member(n: f64, key: &str) -> Value {
    match key {
        "toFixed" => Value::native("toFixed", move |_interp, this, args| {
            let digits = arg_number(args, 0, 0.0);
            if !(0.0..=100.0).contains(&digits) {
                return Err(crate::exception::Exception::range_error(
                    "toFixed() digits argument must be between 0 and 100",
                )
                .into());
            }
            let value = this.to_number();
            let precision = digits as usize;
            Ok(Value::str(format!("{value:.precision$}")))
        }),
        "toString" => Value::native("toString", move |_interp, this, args| {
            let value = this.to_number();
            let radix = arg_number(args, 0, 10.0);
            if !(2.0..=36.0).contains(&radix) {
                return Err(crate::exception::Exception::range_error(
                    "toString() radix must be between 2 and 36",
                )
                .into());
            }
            if radix == 10.0 {
                return Ok(Value::str(number_to_string(value)));
            }
            Ok(Value::str(format_radix(value, radix as u32)))
        }),
        _ => {
            let _ = n;
            Value::Undefined
        }
    }
}

/// Integer-only radix formatting; fractional parts fall back to truncation,
/// which covers the radix conversions the tracer meets in practice.
fn format_radix(value: f64, radix: u32) -> String {
    if value.is_nan() {
        return "NaN".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    let negative = value < 0.0;
    let mut n = value.abs().trunc() as u64;
    if n == 0 {
        return "0".to_owned();
    }
    let digits = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    while n > 0 {
        out.push(digits[(n % u64::from(radix)) as usize]);
        n /= u64::from(radix);
    }
    if negative {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
