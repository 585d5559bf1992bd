//! The `Math` namespace object.

use crate::value::{JsObject, Value};

fn unary(name: &str, f: fn(f64) -> f64) -> (String, Value) {
    (
        name.to_owned(),
        Value::native(name, move |_interp, _this, args| {
            let x = args.first().map_or(f64::NAN, Value::to_number);
            Ok(Value::Number(f(x)))
        }),
    )
}

/// `min`/`max` fold over all arguments; the empty call yields the identity.
fn fold(name: &str, identity: f64, f: fn(f64, f64) -> f64) -> (String, Value) {
    (
        name.to_owned(),
        Value::native(name, move |_interp, _this, args| {
            let mut acc = identity;
            for arg in args {
                let x = arg.to_number();
                if x.is_nan() {
                    return Ok(Value::Number(f64::NAN));
                }
                acc = f(acc, x);
            }
            Ok(Value::Number(acc))
        }),
    )
}

#[must_use]
pub fn make_math() -> Value {
    let mut math = JsObject::plain();
    math.class_name = Some("Math".into());
    let entries = [
        unary("abs", f64::abs),
        unary("ceil", f64::ceil),
        unary("floor", f64::floor),
        unary("round", |x| (x + 0.5).floor()),
        unary("trunc", f64::trunc),
        unary("sign", |x| if x == 0.0 || x.is_nan() { x } else { x.signum() }),
        unary("sqrt", f64::sqrt),
        unary("cbrt", f64::cbrt),
        unary("exp", f64::exp),
        unary("log", f64::ln),
        unary("log2", f64::log2),
        unary("log10", f64::log10),
        fold("min", f64::INFINITY, f64::min),
        fold("max", f64::NEG_INFINITY, f64::max),
    ];
    for (name, value) in entries {
        math.properties.insert(name, value);
    }
    math.properties.insert(
        "pow".to_owned(),
        Value::native("pow", |_interp, _this, args| {
            let base = args.first().map_or(f64::NAN, Value::to_number);
            let exponent = args.get(1).map_or(f64::NAN, Value::to_number);
            Ok(Value::Number(base.powf(exponent)))
        }),
    );
    math.properties.insert(
        "hypot".to_owned(),
        Value::native("hypot", |_interp, _this, args| {
            let sum: f64 = args.iter().map(|a| a.to_number().powi(2)).sum();
            Ok(Value::Number(sum.sqrt()))
        }),
    );
    math.properties.insert(
        "random".to_owned(),
        Value::native("random", |_interp, _this, _args| {
            Ok(Value::Number(rand::random::<f64>()))
        }),
    );
    math.properties.insert("E".to_owned(), Value::Number(std::f64::consts::E));
    math.properties.insert("PI".to_owned(), Value::Number(std::f64::consts::PI));
    Value::object(math)
}
