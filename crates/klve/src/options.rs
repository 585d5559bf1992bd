//! Trace options: node toggles, name/timing filters, data-field stripping,
//! and the record limits.
//!
//! Every field is optional on the wire and defaults to "keep"; a missing
//! configuration section deserializes to its all-true default, so the
//! filter always operates on a fully-populated record.

use serde::{Deserialize, Serialize};

use crate::{error::TraceError, step::NodeType};

fn default_true() -> bool {
    true
}

macro_rules! toggle_struct {
    ($name:ident { $($(#[serde(rename = $rename:literal)])? $field:ident),+ $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $name {
            $(
                $(#[serde(rename = $rename)])?
                #[serde(default = "default_true")]
                pub $field: bool,
            )+
        }

        impl Default for $name {
            fn default() -> Self {
                Self { $($field: true),+ }
            }
        }
    };
}

toggle_struct!(LiteralToggles { numeric, string, boolean, null, array, object });
toggle_struct!(VariableToggles { read, declaration, assignment, update });
toggle_struct!(MemberToggles { access });
toggle_struct!(OperatorToggles { binary, logical, unary });
toggle_struct!(CallToggles { call, construct });
toggle_struct!(FunctionToggles { arrow, expression });
toggle_struct!(BranchToggles {
    #[serde(rename = "if")]
    if_,
    ternary,
});
toggle_struct!(LoopToggles {
    #[serde(rename = "for")]
    for_,
    #[serde(rename = "while")]
    while_,
});
toggle_struct!(ErrorToggles {
    #[serde(rename = "try")]
    try_,
});
toggle_struct!(TimingToggles { before, after });
toggle_struct!(DataToggles { scopes, value, logs, dt, loc });

/// Per-node-type toggles, grouped the way the options schema groups them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeToggles {
    pub literals: LiteralToggles,
    pub variables: VariableToggles,
    pub members: MemberToggles,
    pub operators: OperatorToggles,
    pub calls: CallToggles,
    pub functions: FunctionToggles,
    pub branches: BranchToggles,
    pub loops: LoopToggles,
    pub errors: ErrorToggles,
}

impl NodeToggles {
    /// The fixed type-to-toggle table, exhaustive over the configurable
    /// types. Types outside the table (plain statements and sequence
    /// expressions) are always kept.
    #[must_use]
    pub fn keeps(&self, node_type: NodeType) -> bool {
        match node_type {
            NodeType::NumericLiteral => self.literals.numeric,
            NodeType::StringLiteral => self.literals.string,
            NodeType::BooleanLiteral => self.literals.boolean,
            NodeType::NullLiteral => self.literals.null,
            NodeType::ArrayExpression => self.literals.array,
            NodeType::ObjectExpression => self.literals.object,
            NodeType::Identifier => self.variables.read,
            NodeType::VariableDeclaration => self.variables.declaration,
            NodeType::AssignmentExpression => self.variables.assignment,
            NodeType::UpdateExpression => self.variables.update,
            NodeType::MemberExpression => self.members.access,
            NodeType::BinaryExpression => self.operators.binary,
            NodeType::LogicalExpression => self.operators.logical,
            NodeType::UnaryExpression => self.operators.unary,
            NodeType::CallExpression => self.calls.call,
            NodeType::NewExpression => self.calls.construct,
            NodeType::ArrowFunctionExpression => self.functions.arrow,
            NodeType::FunctionExpression => self.functions.expression,
            NodeType::IfStatement => self.branches.if_,
            NodeType::ConditionalExpression => self.branches.ternary,
            NodeType::ForStatement => self.loops.for_,
            NodeType::WhileStatement => self.loops.while_,
            NodeType::TryStatement => self.errors.try_,
            _ => true,
        }
    }
}

/// Identifier-name filter. When both lists are populated the options are
/// semantically invalid; [`verify_options`] rejects that before recording.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// The resolved filtering mode: a non-empty include list wins, otherwise a
/// non-empty exclude list, otherwise no name filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMode {
    Include,
    Exclude,
    None,
}

impl NameFilter {
    #[must_use]
    pub fn mode(&self) -> NameMode {
        if !self.include.is_empty() {
            NameMode::Include
        } else if !self.exclude.is_empty() {
            NameMode::Exclude
        } else {
            NameMode::None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    pub names: NameFilter,
    pub timing: TimingToggles,
    pub data: DataToggles,
}

/// All options accepted by the tracer. Defaults keep everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceOptions {
    pub nodes: NodeToggles,
    pub filter: FilterOptions,
}

/// Step and time ceilings for one record invocation; `None` disables the
/// corresponding limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxLimits {
    pub steps: Option<usize>,
    /// Milliseconds.
    pub time: Option<u64>,
}

/// Host-supplied invocation metadata. Unknown fields are accepted and
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordMeta {
    pub max: MaxLimits,
}

/// Everything [`record`](crate::record) needs besides the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    pub meta: RecordMeta,
    pub options: TraceOptions,
}

/// Rejects semantically invalid option combinations. The only constraint:
/// `filter.names.include` and `filter.names.exclude` cannot both be
/// non-empty.
pub fn verify_options(options: &TraceOptions) -> Result<(), TraceError> {
    if !options.filter.names.include.is_empty() && !options.filter.names.exclude.is_empty() {
        return Err(TraceError::OptionsSemanticInvalid {
            message: "filter.names.include and filter.names.exclude cannot both be non-empty".to_owned(),
        });
    }
    Ok(())
}

/// The JSON Schema (draft-07) for [`TraceOptions`]. Every field is
/// optional.
#[must_use]
pub fn options_schema() -> serde_json::Value {
    fn boolean_props(names: &[&str]) -> serde_json::Value {
        let mut props = serde_json::Map::new();
        for name in names {
            props.insert((*name).to_owned(), serde_json::json!({ "type": "boolean" }));
        }
        serde_json::json!({ "type": "object", "additionalProperties": false, "properties": props })
    }

    serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "nodes": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "literals": boolean_props(&["numeric", "string", "boolean", "null", "array", "object"]),
                    "variables": boolean_props(&["read", "declaration", "assignment", "update"]),
                    "members": boolean_props(&["access"]),
                    "operators": boolean_props(&["binary", "logical", "unary"]),
                    "calls": boolean_props(&["call", "construct"]),
                    "functions": boolean_props(&["arrow", "expression"]),
                    "branches": boolean_props(&["if", "ternary"]),
                    "loops": boolean_props(&["for", "while"]),
                    "errors": boolean_props(&["try"]),
                }
            },
            "filter": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "names": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {
                            "include": { "type": "array", "items": { "type": "string" } },
                            "exclude": { "type": "array", "items": { "type": "string" } },
                        }
                    },
                    "timing": boolean_props(&["before", "after"]),
                    "data": boolean_props(&["scopes", "value", "logs", "dt", "loc"]),
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{NameMode, TraceOptions, verify_options};

    #[test]
    fn defaults_keep_everything() {
        let options = TraceOptions::default();
        for node_type in crate::step::NodeType::ALL {
            assert!(options.nodes.keeps(node_type));
        }
        assert!(options.filter.timing.before);
        assert!(options.filter.data.scopes);
        assert_eq!(options.filter.names.mode(), NameMode::None);
    }

    #[test]
    fn missing_fields_fill_with_defaults() {
        let options: TraceOptions =
            serde_json::from_value(serde_json::json!({ "nodes": { "loops": { "for": false } } }))
                .expect("deserialize failed");
        assert!(!options.nodes.keeps(crate::step::NodeType::ForStatement));
        assert!(options.nodes.keeps(crate::step::NodeType::WhileStatement));
        assert!(options.filter.timing.after);
    }

    #[test]
    fn include_wins_over_exclude_only_at_resolution() {
        let options: TraceOptions = serde_json::from_value(serde_json::json!({
            "filter": { "names": { "include": ["x"] } }
        }))
        .expect("deserialize failed");
        assert_eq!(options.filter.names.mode(), NameMode::Include);
        assert!(verify_options(&options).is_ok());
    }

    #[test]
    fn both_name_lists_are_rejected() {
        let options: TraceOptions = serde_json::from_value(serde_json::json!({
            "filter": { "names": { "include": ["x"], "exclude": ["y"] } }
        }))
        .expect("deserialize failed");
        assert!(verify_options(&options).is_err());
    }
}
