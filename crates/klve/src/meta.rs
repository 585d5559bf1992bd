//! Encoding of reporter metadata into object-literal AST.
//!
//! The transformer computes each step's static metadata (category, type,
//! timing, location, detail) in Rust and embeds it literally into the
//! instrumented source, so the reporter never re-inspects the AST at run
//! time. Scope snapshots need *live* expressions inside that literal; the
//! [`MetaValue::Ast`] sentinel splices an already-built expression into the
//! encoded literal verbatim.

use crate::ast::{CodeRange, Expr, ExprKind, PropKey, Property, UnaryOp, build};

/// A JSON-like tree with an escape hatch for live AST expressions.
pub enum MetaValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<MetaValue>),
    Object(Vec<(String, MetaValue)>),
    /// Spliced into the encoded literal as-is.
    Ast(Expr),
}

impl MetaValue {
    /// Converts serde_json output (e.g. a serialized `Detail`) into an
    /// encodable tree.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Array(items) => Self::Array(items.into_iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from_json(v))).collect())
            }
        }
    }

    /// Encodes the tree as an expression.
    #[must_use]
    pub fn into_expr(self) -> Expr {
        match self {
            Self::Undefined => build::undefined(),
            Self::Null => build::null(),
            Self::Bool(b) => build::bool_lit(b),
            Self::Number(n) => encode_number(n),
            Self::Str(s) => build::string(s),
            Self::Array(items) => build::array(items.into_iter().map(Self::into_expr).collect()),
            Self::Object(fields) => build::object(
                fields
                    .into_iter()
                    .map(|(key, value)| Property {
                        key: PropKey::Named(key),
                        value: value.into_expr(),
                    })
                    .collect(),
            ),
            Self::Ast(expr) => expr,
        }
    }
}

/// Number literals cannot be negative; encode negatives as unary minus.
fn encode_number(n: f64) -> Expr {
    if n.is_sign_negative() && n != 0.0 {
        Expr::new(
            CodeRange::synthetic(),
            ExprKind::Unary {
                op: UnaryOp::Minus,
                operand: Box::new(build::number(-n)),
            },
        )
    } else {
        build::number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::MetaValue;
    use crate::ast::{ExprKind, PropKey};

    #[test]
    fn objects_encode_to_object_literals() {
        let meta = MetaValue::Object(vec![
            ("a".to_owned(), MetaValue::Number(1.0)),
            ("b".to_owned(), MetaValue::Str("x".to_owned())),
        ]);
        let expr = meta.into_expr();
        let ExprKind::Object(props) = expr.kind else {
            panic!("expected an object literal");
        };
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].key, PropKey::Named("a".to_owned()));
    }

    #[test]
    fn negative_numbers_encode_as_unary_minus() {
        let expr = MetaValue::Number(-2.0).into_expr();
        assert!(matches!(expr.kind, ExprKind::Unary { .. }));
    }
}
