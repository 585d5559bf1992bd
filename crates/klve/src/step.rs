//! The step record: one entry per observed syntactic event.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{ast::CodeRange, describe::DescribedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepCategory {
    Init,
    Statement,
    Expression,
}

/// Which side of the node's evaluation a step describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timing {
    Before,
    After,
}

/// Every AST type the transformer emits steps for. Serialized under the
/// conventional Babel-style names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::IntoStaticStr)]
pub enum NodeType {
    NumericLiteral,
    StringLiteral,
    BooleanLiteral,
    NullLiteral,
    ArrayExpression,
    ObjectExpression,
    Identifier,
    VariableDeclaration,
    AssignmentExpression,
    UpdateExpression,
    MemberExpression,
    BinaryExpression,
    LogicalExpression,
    UnaryExpression,
    SequenceExpression,
    CallExpression,
    NewExpression,
    ArrowFunctionExpression,
    FunctionExpression,
    IfStatement,
    ConditionalExpression,
    ForStatement,
    WhileStatement,
    TryStatement,
    ExpressionStatement,
    ReturnStatement,
    ThrowStatement,
    BreakStatement,
    ContinueStatement,
}

impl NodeType {
    /// All emitted types, for invariant checks.
    pub const ALL: [Self; 29] = [
        Self::NumericLiteral,
        Self::StringLiteral,
        Self::BooleanLiteral,
        Self::NullLiteral,
        Self::ArrayExpression,
        Self::ObjectExpression,
        Self::Identifier,
        Self::VariableDeclaration,
        Self::AssignmentExpression,
        Self::UpdateExpression,
        Self::MemberExpression,
        Self::BinaryExpression,
        Self::LogicalExpression,
        Self::UnaryExpression,
        Self::SequenceExpression,
        Self::CallExpression,
        Self::NewExpression,
        Self::ArrowFunctionExpression,
        Self::FunctionExpression,
        Self::IfStatement,
        Self::ConditionalExpression,
        Self::ForStatement,
        Self::WhileStatement,
        Self::TryStatement,
        Self::ExpressionStatement,
        Self::ReturnStatement,
        Self::ThrowStatement,
        Self::BreakStatement,
        Self::ContinueStatement,
    ];
}

/// The static action classification carried in every non-init step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Access,
    Assign,
    Update,
    Declare,
    Call,
    Construct,
    Compute,
    Branch,
    Loop,
    Protect,
    Evaluate,
    Define,
    Literal,
    Unknown,
}

/// Deserializes a field so that an explicit `null` becomes `Some(None)`
/// while a missing field stays `None` (via `#[serde(default)]`). Needed for
/// detail fields whose contract is "name or null".
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Static, AST-derived metadata attached to a step, shaped by the node
/// type. Every field other than `action` is optional and serialized only
/// when the node type defines it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Detail {
    pub action: Action,
    /// Identifier reads: the name read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Member access: whether the property is computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed: Option<bool>,
    /// Member access: the static property name, or null when computed.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub property: Option<Option<String>>,
    /// Member access: present (true) for optional chaining.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    /// Assignments, updates, computes: the operator spelling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Assignments, updates, declarations: the target name, or null when
    /// the target is not a plain identifier.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub target: Option<Option<String>>,
    /// Updates and unary computes: operator position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<bool>,
    /// Declarations: `var` / `let` / `const`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Calls, constructs, defines: number of arguments or parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arity: Option<u32>,
    /// Calls: callee or method name, or null when not statically known.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub callee: Option<Option<String>>,
    /// Calls: whether the callee is a member expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<bool>,
    /// Branches: whether an else/alternate exists.
    #[serde(rename = "hasAlternate", skip_serializing_if = "Option::is_none")]
    pub has_alternate: Option<bool>,
    /// For loops: which slots are present.
    #[serde(rename = "hasInit", skip_serializing_if = "Option::is_none")]
    pub has_init: Option<bool>,
    #[serde(rename = "hasTest", skip_serializing_if = "Option::is_none")]
    pub has_test: Option<bool>,
    #[serde(rename = "hasUpdate", skip_serializing_if = "Option::is_none")]
    pub has_update: Option<bool>,
    /// Try statements.
    #[serde(rename = "hasCatch", skip_serializing_if = "Option::is_none")]
    pub has_catch: Option<bool>,
    #[serde(rename = "hasFinally", skip_serializing_if = "Option::is_none")]
    pub has_finally: Option<bool>,
    /// Arrow definitions: expression-bodied or block-bodied.
    #[serde(rename = "expressionBody", skip_serializing_if = "Option::is_none")]
    pub expression_body: Option<bool>,
    /// Function definitions.
    #[serde(rename = "async", skip_serializing_if = "Option::is_none")]
    pub is_async: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<bool>,
    /// Array literals.
    #[serde(rename = "elementCount", skip_serializing_if = "Option::is_none")]
    pub element_count: Option<u32>,
    /// Object literals.
    #[serde(rename = "propertyCount", skip_serializing_if = "Option::is_none")]
    pub property_count: Option<u32>,
}

impl Default for Action {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Detail {
    #[must_use]
    pub fn action(action: Action) -> Self {
        Self {
            action,
            ..Self::default()
        }
    }

    /// Candidate identifier names for the name filter: every string-typed
    /// name-ish field present on this detail.
    #[must_use]
    pub fn candidate_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        if let Some(name) = &self.name {
            names.push(name.as_str());
        }
        if let Some(Some(target)) = &self.target {
            names.push(target.as_str());
        }
        if let Some(Some(callee)) = &self.callee {
            names.push(callee.as_str());
        }
        if let Some(Some(property)) = &self.property {
            names.push(property.as_str());
        }
        names
    }
}

/// One lexical frame of a scope snapshot: binding name → described value,
/// in declaration order.
pub type ScopeSnapshot = IndexMap<String, DescribedValue>;

/// One entry of the output sequence.
///
/// The init step carries only `step` and `category`; every other field is
/// optional so the data filter can strip it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub step: usize,
    pub category: StepCategory,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<Timing>,
    /// Milliseconds elapsed since trace start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<CodeRange>,
    /// Lexical frames visible at the node, outermost first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<ScopeSnapshot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<DescribedValue>,
    /// Console writes since the previous step, one entry per call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<Vec<DescribedValue>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Detail>,
}

impl Step {
    /// The init marker that opens every trace.
    #[must_use]
    pub fn init() -> Self {
        Self {
            step: 0,
            category: StepCategory::Init,
            node_type: None,
            time: None,
            dt: None,
            loc: None,
            scopes: None,
            value: None,
            logs: None,
            detail: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, Detail, Step};

    #[test]
    fn init_step_serializes_minimally() {
        let json = serde_json::to_value(Step::init()).expect("serialize failed");
        assert_eq!(json, serde_json::json!({ "step": 0, "category": "init" }));
    }

    #[test]
    fn null_target_round_trips() {
        let mut detail = Detail::action(Action::Assign);
        detail.operator = Some("=".to_owned());
        detail.target = Some(None);
        let json = serde_json::to_value(&detail).expect("serialize failed");
        assert_eq!(json["target"], serde_json::Value::Null);
        let back: Detail = serde_json::from_value(json).expect("deserialize failed");
        assert_eq!(back.target, Some(None));
    }

    #[test]
    fn missing_target_stays_absent() {
        let json = serde_json::json!({ "action": "read", "name": "x" });
        let detail: Detail = serde_json::from_value(json).expect("deserialize failed");
        assert_eq!(detail.target, None);
        assert_eq!(detail.candidate_names(), vec!["x"]);
    }
}
