//! Runtime values for the evaluator.
//!
//! The dynamic value sum covers the primitive shapes plus heap objects
//! (plain objects, arrays, user functions, native functions). Objects are
//! reference-counted with interior mutability; identity (for strict
//! equality, the describer's writer map and `instanceof`) is the `Rc`
//! pointer.

use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::Stmt,
    describe::DescribedValue,
    exception::RunError,
    namespace::EnvRef,
};

pub type ObjRef = Rc<RefCell<JsObject>>;

/// Maximum recursion depth for data-structure walks (string conversion of
/// nested arrays). Separate from the call-stack limit; protects against
/// structures like `a = [a]`.
pub const MAX_DATA_RECURSION_DEPTH: u16 = 64;

/// Signature shared by all native (Rust-implemented) functions: the
/// interpreter, the receiver, and the argument slice.
pub type NativeImpl = Rc<dyn Fn(&mut crate::eval::Interp, Value, &[Value]) -> Result<Value, RunError>>;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(ObjRef),
    /// Opaque handle produced by the injected describe helper; flows only
    /// through reporter metadata, never through user-visible operations.
    Described(Rc<DescribedValue>),
}

/// What a heap object is, beyond its named properties.
pub enum ObjectKind {
    Plain,
    Array(Vec<Value>),
    Function(FunctionData),
    Native(NativeFunction),
}

pub struct JsObject {
    pub kind: ObjectKind,
    /// Named own properties in insertion order, matching JS enumeration.
    pub properties: IndexMap<String, Value>,
    /// Constructor name for objects created with `new`; feeds the
    /// describer's `cname`.
    pub class_name: Option<Rc<str>>,
    /// Identity of the constructor that produced this object, for
    /// `instanceof`.
    pub constructed_by: Option<usize>,
    pub frozen: bool,
}

impl JsObject {
    #[must_use]
    pub fn plain() -> Self {
        Self {
            kind: ObjectKind::Plain,
            properties: IndexMap::new(),
            class_name: None,
            constructed_by: None,
            frozen: false,
        }
    }

    #[must_use]
    pub fn array(elements: Vec<Value>) -> Self {
        Self {
            kind: ObjectKind::Array(elements),
            properties: IndexMap::new(),
            class_name: None,
            constructed_by: None,
            frozen: false,
        }
    }

    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_) | ObjectKind::Native(_))
    }

    /// Function name for display and describe purposes, if any.
    #[must_use]
    pub fn function_name(&self) -> Option<Rc<str>> {
        match &self.kind {
            ObjectKind::Function(data) => data.name.clone(),
            ObjectKind::Native(native) => Some(native.name.clone()),
            _ => None,
        }
    }
}

/// How `this` is resolved when the function is invoked.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ThisMode {
    /// Regular function: `this` comes from the call site.
    Dynamic,
    /// Arrow function: `this` is captured from the defining scope.
    Lexical,
}

/// A user-defined function: parameters, body, and the closure environment.
pub struct FunctionData {
    pub name: Option<Rc<str>>,
    pub params: Rc<[String]>,
    pub body: Rc<[Stmt]>,
    pub env: EnvRef,
    pub this_mode: ThisMode,
    /// Receiver fixed by `Function.prototype.bind`, if any.
    pub bound_this: Option<Box<Value>>,
    /// Leading arguments fixed by `bind`.
    pub bound_args: Vec<Value>,
}

pub struct NativeFunction {
    pub name: Rc<str>,
    pub func: NativeImpl,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<Rc<str>>,
        func: impl Fn(&mut crate::eval::Interp, Value, &[Value]) -> Result<Value, RunError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }
}

impl Value {
    #[must_use]
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Self::Str(s.into())
    }

    #[must_use]
    pub fn object(obj: JsObject) -> Self {
        Self::Object(Rc::new(RefCell::new(obj)))
    }

    #[must_use]
    pub fn native(name: &str, func: impl Fn(&mut crate::eval::Interp, Value, &[Value]) -> Result<Value, RunError> + 'static) -> Self {
        let mut obj = JsObject::plain();
        obj.kind = ObjectKind::Native(NativeFunction::new(name, func));
        Self::object(obj)
    }

    /// Builds an error object the way the `Error` family of constructors
    /// does: `name` and `message` own properties, class name for display.
    #[must_use]
    pub fn new_error(name: &str, message: &str) -> Self {
        let mut obj = JsObject::plain();
        obj.class_name = Some(Rc::from(name));
        obj.properties.insert("name".to_owned(), Self::str(name));
        obj.properties.insert("message".to_owned(), Self::str(message));
        Self::object(obj)
    }

    #[must_use]
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Object(obj) => {
                if obj.borrow().is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
            Self::Described(_) => "object",
        }
    }

    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Object(_) | Self::Described(_) => true,
        }
    }

    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(|obj| obj.borrow().is_callable())
    }

    /// ToNumber. Objects convert through their string form, which matches
    /// the observable behavior for arrays (`+[] === 0`, `+[7] === 7`) and
    /// plain objects (`NaN`).
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Number(n) => *n,
            Self::Str(s) => string_to_number(s),
            Self::Object(_) => string_to_number(&self.to_js_string()),
            Self::Described(_) => f64::NAN,
        }
    }

    /// ToString without invoking user code (no `toString` dispatch).
    #[must_use]
    pub fn to_js_string(&self) -> String {
        self.to_js_string_bounded(0)
    }

    fn to_js_string_bounded(&self, depth: u16) -> String {
        match self {
            Self::Undefined => "undefined".to_owned(),
            Self::Null => "null".to_owned(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => number_to_string(*n),
            Self::Str(s) => s.to_string(),
            Self::Object(obj) => {
                let obj = obj.borrow();
                match &obj.kind {
                    ObjectKind::Array(elements) => {
                        // Cyclic arrays bottom out as empty entries instead
                        // of recursing without bound.
                        if depth >= MAX_DATA_RECURSION_DEPTH {
                            return String::new();
                        }
                        let parts: Vec<String> = elements
                            .iter()
                            .map(|v| {
                                if v.is_nullish() {
                                    String::new()
                                } else {
                                    v.to_js_string_bounded(depth + 1)
                                }
                            })
                            .collect();
                        parts.join(",")
                    }
                    ObjectKind::Function(data) => {
                        let name = data.name.as_deref().unwrap_or("");
                        format!("function {name}() {{ ... }}")
                    }
                    ObjectKind::Native(native) => {
                        format!("function {}() {{ [native code] }}", native.name)
                    }
                    ObjectKind::Plain => {
                        if let Some(class_name) = &obj.class_name
                            && is_error_class(class_name)
                        {
                            let message = match obj.properties.get("message") {
                                Some(Self::Str(s)) if !s.is_empty() => format!(": {s}"),
                                _ => String::new(),
                            };
                            return format!("{class_name}{message}");
                        }
                        "[object Object]".to_owned()
                    }
                }
            }
            Self::Described(_) => "[object Object]".to_owned(),
        }
    }

    /// Strict equality (`===`).
    #[must_use]
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Loose equality (`==`) over the subset's value shapes.
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined | Self::Null, Self::Undefined | Self::Null) => true,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bool(_), _) => Self::Number(self.to_number()).loose_eq(other),
            (_, Self::Bool(_)) => self.loose_eq(&Self::Number(other.to_number())),
            (Self::Number(a), Self::Str(s)) => *a == string_to_number(s),
            (Self::Str(s), Self::Number(b)) => string_to_number(s) == *b,
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Object(_), Self::Number(_) | Self::Str(_)) => {
                Self::str(self.to_js_string()).loose_eq(other)
            }
            (Self::Number(_) | Self::Str(_), Self::Object(_)) => {
                self.loose_eq(&Self::str(other.to_js_string()))
            }
            _ => false,
        }
    }
}

fn is_error_class(name: &str) -> bool {
    matches!(name, "Error" | "TypeError" | "RangeError" | "ReferenceError" | "SyntaxError")
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{}", number_to_string(*n)),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Object(obj) => {
                let obj = obj.borrow();
                match &obj.kind {
                    ObjectKind::Array(elements) => write!(f, "Array({})", elements.len()),
                    ObjectKind::Function(_) | ObjectKind::Native(_) => {
                        write!(f, "Function({})", obj.function_name().as_deref().unwrap_or(""))
                    }
                    ObjectKind::Plain => write!(f, "Object({} props)", obj.properties.len()),
                }
            }
            Self::Described(_) => write!(f, "Described"),
        }
    }
}

/// ToNumber for strings: trimmed, with the usual hex/octal/binary prefixes;
/// empty converts to 0.
#[must_use]
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    if let Some(oct) = t.strip_prefix("0o").or_else(|| t.strip_prefix("0O")) {
        return u64::from_str_radix(oct, 8).map_or(f64::NAN, |v| v as f64);
    }
    if let Some(bin) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
        return u64::from_str_radix(bin, 2).map_or(f64::NAN, |v| v as f64);
    }
    if t == "Infinity" || t == "+Infinity" {
        return f64::INFINITY;
    }
    if t == "-Infinity" {
        return f64::NEG_INFINITY;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// Formats an f64 the way JavaScript's Number-to-String conversion does for
/// the common cases: integral values without a decimal point, shortest
/// round-trip representation otherwise.
#[must_use]
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        // Integral and small enough that JS prints no exponent.
        return format!("{n:.0}");
    }
    let mut buffer = ryu::Buffer::new();
    let printed = buffer.format(n);
    // ryu prints `1.5e300`; strip a redundant trailing `.0` if present.
    match printed.strip_suffix(".0") {
        Some(stripped) => stripped.to_owned(),
        None => printed.to_owned(),
    }
}

/// ToInt32 for the bitwise operators.
#[must_use]
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let m = n.trunc();
    let modulo = m.rem_euclid(4_294_967_296.0);
    if modulo >= 2_147_483_648.0 {
        (modulo - 4_294_967_296.0) as i32
    } else {
        modulo as i32
    }
}

/// ToUint32 for `>>>`.
#[must_use]
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

/// Converts a runtime value to JSON for the reporter's metadata decoding.
/// Functions and described handles map to null; cycles cannot occur in the
/// transformer-built metadata this is used on.
#[must_use]
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Undefined | Value::Null | Value::Described(_) => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => {
            // Integral values encode as JSON integers so they deserialize
            // into integer-typed fields (locations, arities).
            if n.fract() == 0.0 && n.is_finite() && n.abs() <= 9_007_199_254_740_992.0 {
                serde_json::Value::Number(serde_json::Number::from(*n as i64))
            } else {
                serde_json::Number::from_f64(*n).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
        }
        Value::Str(s) => serde_json::Value::String(s.to_string()),
        Value::Object(obj) => {
            let obj = obj.borrow();
            match &obj.kind {
                ObjectKind::Array(elements) => {
                    serde_json::Value::Array(elements.iter().map(value_to_json).collect())
                }
                ObjectKind::Function(_) | ObjectKind::Native(_) => serde_json::Value::Null,
                ObjectKind::Plain => {
                    let mut map = serde_json::Map::new();
                    for (key, value) in &obj.properties {
                        map.insert(key.clone(), value_to_json(value));
                    }
                    serde_json::Value::Object(map)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Value, number_to_string, string_to_number, to_int32, to_uint32};

    #[test]
    fn number_formatting_matches_js() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(-3.0), "-3");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e21");
    }

    #[test]
    fn string_coercion() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert!(string_to_number("nope").is_nan());
    }

    #[test]
    fn int32_wrapping() {
        assert_eq!(to_int32(4_294_967_296.0), 0);
        assert_eq!(to_int32(2_147_483_648.0), -2_147_483_648);
        assert_eq!(to_int32(-1.0), -1);
        assert_eq!(to_uint32(-1.0), 4_294_967_295);
    }

    #[test]
    fn loose_equality() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(Value::Number(1.0).loose_eq(&Value::str("1")));
        assert!(Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(!Value::Number(f64::NAN).loose_eq(&Value::Number(f64::NAN)));
    }
}
