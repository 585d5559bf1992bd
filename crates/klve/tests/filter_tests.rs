//! Filtering properties over real traces: monotonicity, order
//! independence, name-set equivalences.

use klve::{NodeType, RecordConfig, Step, TraceOptions, filter_steps, record_sync, verify_options};
use pretty_assertions::assert_eq;

const SOURCE: &str = "\
let total = 0;
for (let i = 0; i < 3; i++) { total = total + i; }
let label = total > 1 ? 'big' : 'small';
console.log(label, total);
";

fn raw() -> Vec<Step> {
    record_sync(SOURCE, &RecordConfig::default()).expect("trace failed")
}

fn options(json: serde_json::Value) -> TraceOptions {
    serde_json::from_value(json).expect("options failed to deserialize")
}

fn shape(steps: &[Step]) -> Vec<(usize, Option<NodeType>, Option<klve::Timing>)> {
    steps.iter().map(|s| (s.step, s.node_type, s.time)).collect()
}

#[test]
fn every_restriction_is_monotone() {
    let base = raw();
    let restrictions = [
        options(serde_json::json!({ "filter": { "timing": { "before": false } } })),
        options(serde_json::json!({ "nodes": { "literals": { "numeric": false } } })),
        options(serde_json::json!({ "nodes": { "loops": { "for": false } } })),
        options(serde_json::json!({ "filter": { "names": { "include": ["total"] } } })),
        options(serde_json::json!({ "filter": { "names": { "exclude": ["total"] } } })),
    ];
    for restriction in restrictions {
        let filtered = filter_steps(base.clone(), &restriction);
        assert!(filtered.len() <= base.len());
    }
}

#[test]
fn filter_axes_commute() {
    let base = raw();
    let timing = options(serde_json::json!({ "filter": { "timing": { "before": false } } }));
    let nodes = options(serde_json::json!({ "nodes": { "variables": { "read": false } } }));
    let names = options(serde_json::json!({ "filter": { "names": { "include": ["total", "i"] } } }));
    let combined = options(serde_json::json!({
        "filter": { "timing": { "before": false }, "names": { "include": ["total", "i"] } },
        "nodes": { "variables": { "read": false } },
    }));

    let one = filter_steps(filter_steps(filter_steps(base.clone(), &timing), &nodes), &names);
    let two = filter_steps(filter_steps(filter_steps(base.clone(), &names), &timing), &nodes);
    let three = filter_steps(base, &combined);
    assert_eq!(shape(&one), shape(&two));
    assert_eq!(shape(&one), shape(&three));
}

#[test]
fn include_equals_complement_exclude() {
    let base = raw();
    // Every candidate name present anywhere in the trace.
    let mut all_names: Vec<String> = base
        .iter()
        .filter_map(|s| s.detail.as_ref())
        .flat_map(|detail| detail.candidate_names().into_iter().map(ToOwned::to_owned).collect::<Vec<_>>())
        .collect();
    all_names.sort();
    all_names.dedup();
    let keep = "total";
    let complement: Vec<String> = all_names.into_iter().filter(|name| name != keep).collect();

    let by_include = filter_steps(
        base.clone(),
        &options(serde_json::json!({ "filter": { "names": { "include": [keep] } } })),
    );
    let by_exclude = filter_steps(
        base,
        &options(serde_json::json!({ "filter": { "names": { "exclude": complement } } })),
    );
    assert_eq!(shape(&by_include), shape(&by_exclude));
}

#[test]
fn steps_without_candidates_survive_name_filters() {
    let base = raw();
    let filtered = filter_steps(
        base,
        &options(serde_json::json!({ "filter": { "names": { "include": ["no-such-name"] } } })),
    );
    // The init step and candidate-free steps (literals, loop statements)
    // remain.
    assert!(filtered.len() > 1);
    assert!(filtered.iter().any(|s| s.node_type == Some(NodeType::NumericLiteral)));
}

#[test]
fn disabling_a_node_type_removes_exactly_that_type() {
    let base = raw();
    let without_for = filter_steps(
        base.clone(),
        &options(serde_json::json!({ "nodes": { "loops": { "for": false } } })),
    );
    assert!(without_for.iter().all(|s| s.node_type != Some(NodeType::ForStatement)));
    let dropped: usize = base
        .iter()
        .filter(|s| s.node_type == Some(NodeType::ForStatement))
        .count();
    assert_eq!(base.len() - without_for.len(), dropped);
}

#[test]
fn conflicting_name_lists_fail_verification() {
    let conflicting = options(serde_json::json!({
        "filter": { "names": { "include": ["a"], "exclude": ["b"] } }
    }));
    let err = verify_options(&conflicting).expect_err("verification should fail");
    assert_eq!(err.kind(), "options-semantic-invalid");
}

#[test]
fn schema_is_draft_07_and_all_optional() {
    let schema = klve::options_schema();
    assert_eq!(schema["$schema"], "http://json-schema.org/draft-07/schema#");
    assert!(schema.get("required").is_none());
    assert!(schema["properties"]["filter"]["properties"]["data"]["properties"]["scopes"].is_object());
}
