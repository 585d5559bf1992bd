//! End-to-end recording scenarios and step-sequence invariants.

use klve::{
    Action, DescribedValue, MaxLimits, NodeType, PrimitiveKind, PrimitiveRepr, RecordConfig, RecordMeta, Step,
    StepCategory, Timing, TraceError, ValueDescriptor, record_sync,
};
use pretty_assertions::assert_eq;

fn trace(source: &str) -> Vec<Step> {
    record_sync(source, &RecordConfig::default()).expect("trace failed")
}

fn with_max_steps(max: usize) -> RecordConfig {
    RecordConfig {
        meta: RecordMeta {
            max: MaxLimits {
                steps: Some(max),
                time: None,
            },
        },
        options: klve::TraceOptions::default(),
    }
}

fn described_number(described: &DescribedValue) -> Option<f64> {
    match &described.descriptor {
        ValueDescriptor::Primitive {
            kind: PrimitiveKind::Number,
            value: Some(PrimitiveRepr::Num(n)),
            ..
        } => Some(*n),
        _ => None,
    }
}

fn described_string(described: &DescribedValue) -> Option<&str> {
    match &described.descriptor {
        ValueDescriptor::Primitive {
            kind: PrimitiveKind::String,
            value: Some(PrimitiveRepr::Str(s)),
            ..
        } => Some(s),
        _ => None,
    }
}

#[test]
fn const_declaration_produces_a_declare_step() {
    let steps = trace("const x = 1;");
    assert!(steps.len() > 1);
    assert_eq!(steps[0].step, 1);
    assert_eq!(steps[0].category, StepCategory::Init);
    let declare = steps
        .iter()
        .find(|s| s.node_type == Some(NodeType::VariableDeclaration))
        .expect("no declaration step");
    let detail = declare.detail.as_ref().expect("declaration step has no detail");
    assert_eq!(detail.action, Action::Declare);
    assert_eq!(detail.kind.as_deref(), Some("const"));
    assert_eq!(detail.target, Some(Some("x".to_owned())));
}

#[test]
fn binary_expression_reports_its_value() {
    let steps = trace("1 + 2;");
    let binary = steps
        .iter()
        .find(|s| s.node_type == Some(NodeType::BinaryExpression))
        .expect("no binary step");
    assert_eq!(binary.time, Some(Timing::After));
    let detail = binary.detail.as_ref().expect("binary step has no detail");
    assert_eq!(detail.action, Action::Compute);
    assert_eq!(detail.operator.as_deref(), Some("+"));
    let value = binary.value.as_ref().expect("binary step has no value");
    assert_eq!(described_number(value), Some(3.0));
}

#[test]
fn postfix_update_reports_the_old_value() {
    let steps = trace("let x = 0; x++;");
    let update = steps
        .iter()
        .find(|s| s.node_type == Some(NodeType::UpdateExpression))
        .expect("no update step");
    let detail = update.detail.as_ref().expect("update step has no detail");
    assert_eq!(detail.action, Action::Update);
    assert_eq!(detail.operator.as_deref(), Some("++"));
    assert_eq!(detail.prefix, Some(false));
    assert_eq!(detail.target, Some(Some("x".to_owned())));
    let value = update.value.as_ref().expect("update step has no value");
    assert_eq!(described_number(value), Some(0.0));
}

#[test]
fn step_limit_rejects_long_loops() {
    let err = record_sync("for (let i = 0; i < 100; i++) {}", &with_max_steps(5))
        .expect_err("limit should trip");
    let TraceError::LimitExceeded(limit) = &err else {
        panic!("expected limit-exceeded, got {err:?}");
    };
    assert_eq!(limit.kind(), "steps");
    let klve::LimitExceeded::Steps { observed, .. } = limit else {
        panic!("expected a step limit");
    };
    assert!(*observed >= 5);
}

#[test]
fn console_arguments_are_described_in_logs() {
    let steps = trace("console.log('a','b');");
    let entry = steps
        .iter()
        .filter_map(|s| s.logs.as_ref())
        .flatten()
        .find(|entry| entry.len() == 2)
        .expect("no two-argument log entry");
    assert_eq!(described_string(&entry[0]), Some("a"));
    assert_eq!(described_string(&entry[1]), Some("b"));
}

#[test]
fn malformed_input_is_a_parse_error_with_location() {
    let err = record_sync("const = 1;", &RecordConfig::default()).expect_err("parse should fail");
    let TraceError::Parse { loc, .. } = &err else {
        panic!("expected parse-error, got {err:?}");
    };
    assert!(loc.line >= 1);
}

#[test]
fn numbering_is_consecutive_from_one_with_a_single_init() {
    let steps = trace("let a = 1; let b = a + 2; if (b > 2) { b = b - 1; }");
    for (index, step) in steps.iter().enumerate() {
        assert_eq!(step.step, index + 1);
    }
    let inits = steps.iter().filter(|s| s.category == StepCategory::Init).count();
    assert_eq!(inits, 1);
    assert_eq!(steps[0].category, StepCategory::Init);
}

#[test]
fn non_init_steps_carry_type_time_and_monotonic_dt() {
    let steps = trace("let n = 2; while (n > 0) { n--; } console.log(n);");
    let mut last_dt = 0.0f64;
    for step in &steps {
        if step.category == StepCategory::Init {
            assert!(step.node_type.is_none());
            assert!(step.dt.is_none());
            continue;
        }
        assert!(step.node_type.is_some(), "step {} has no type", step.step);
        assert!(step.time.is_some(), "step {} has no time", step.step);
        let dt = step.dt.expect("step has no dt");
        assert!(dt >= 0.0);
        assert!(dt >= last_dt, "dt went backwards at step {}", step.step);
        last_dt = dt;
    }
}

#[test]
fn init_step_serializes_to_exactly_step_and_category() {
    let steps = trace("1;");
    let json = serde_json::to_value(&steps[0]).expect("serialize failed");
    assert_eq!(json, serde_json::json!({ "step": 1, "category": "init" }));
}

#[test]
fn before_after_events_nest_properly() {
    // No abrupt control flow, so every statement's before has a matching
    // after and the bracket discipline must hold exactly.
    let steps = trace("let t = 0; for (let i = 0; i < 3; i = i + 1) { t = t + i; } console.log(t);");
    let mut stack: Vec<(NodeType, Option<klve::CodeRange>)> = Vec::new();
    for step in &steps {
        let Some(node_type) = step.node_type else { continue };
        let key = (node_type, step.loc);
        match step.time {
            Some(Timing::Before) => stack.push(key),
            Some(Timing::After) => {
                if stack.last() == Some(&key) {
                    stack.pop();
                } else {
                    // An after for something deeper in the stack would mean
                    // interleaved, non-nested events.
                    assert!(
                        !stack.contains(&key),
                        "interleaved before/after for {node_type:?} at step {}",
                        step.step
                    );
                }
            }
            None => {}
        }
    }
    assert!(stack.is_empty(), "unmatched before events: {stack:?}");
}

#[test]
fn loop_tests_report_before_and_after_each_iteration() {
    let steps = trace("let i = 0; while (i < 2) { i = i + 1; }");
    // Three evaluations of the test (two entering, one failing), each with
    // a before and an after event on the test's binary expression.
    let test_loc = steps
        .iter()
        .find(|s| s.node_type == Some(NodeType::BinaryExpression) && s.time == Some(Timing::Before))
        .and_then(|s| s.loc)
        .expect("no before event for the loop test");
    let befores = steps
        .iter()
        .filter(|s| {
            s.node_type == Some(NodeType::BinaryExpression)
                && s.time == Some(Timing::Before)
                && s.loc == Some(test_loc)
        })
        .count();
    let afters = steps
        .iter()
        .filter(|s| {
            s.node_type == Some(NodeType::BinaryExpression)
                && s.time == Some(Timing::After)
                && s.loc == Some(test_loc)
        })
        .count();
    assert_eq!(befores, 3);
    assert_eq!(afters, 3);
}

#[test]
fn max_steps_boundary_is_exact() {
    let source = "let x = 1; x = x + 1;";
    let unlimited = trace(source);
    let total = unlimited.len();
    assert!(record_sync(source, &with_max_steps(total)).is_ok());
    assert!(record_sync(source, &with_max_steps(total - 1)).is_err());
}

#[test]
fn scopes_capture_live_bindings() {
    let steps = trace("let x = 41; x = x + 1;");
    let assign = steps
        .iter()
        .find(|s| s.node_type == Some(NodeType::AssignmentExpression))
        .expect("no assignment step");
    let scopes = assign.scopes.as_ref().expect("assignment step has no scopes");
    let snapshot = scopes.last().expect("no frames in snapshot");
    let x = snapshot.get("x").expect("x missing from scope snapshot");
    assert_eq!(described_number(x), Some(42.0));
}

#[test]
fn dead_zone_bindings_produce_no_scope_entry() {
    let steps = trace("let a = 1; let b = 2;");
    // The declaration step for `a` runs while `b` is still in its dead
    // zone; the guard must drop the entry rather than describe undefined.
    let first_declare = steps
        .iter()
        .find(|s| s.node_type == Some(NodeType::VariableDeclaration))
        .expect("no declaration step");
    let scopes = first_declare.scopes.as_ref().expect("no scopes");
    let snapshot = scopes.first().expect("no frames");
    assert!(!snapshot.contains_key("b"));
}

#[test]
fn function_calls_trace_into_bodies() {
    let steps = trace("function f(n) { return n * 2; } console.log(f(21));");
    let call_steps: Vec<&Step> = steps
        .iter()
        .filter(|s| s.node_type == Some(NodeType::CallExpression))
        .collect();
    assert!(!call_steps.is_empty());
    let return_step = steps
        .iter()
        .find(|s| s.node_type == Some(NodeType::ReturnStatement) && s.time == Some(Timing::After))
        .expect("no return step");
    let value = return_step.value.as_ref().expect("return step has no value");
    assert_eq!(described_number(value), Some(42.0));
    let entry = steps
        .iter()
        .filter_map(|s| s.logs.as_ref())
        .flatten()
        .next()
        .expect("no log entry");
    assert_eq!(described_number(&entry[0]), Some(42.0));
}

#[test]
fn async_entrypoint_matches_sync() {
    let source = "let x = 1 + 1;";
    let sync_steps = trace(source);
    let async_steps =
        pollster::block_on(klve::record(source, &RecordConfig::default())).expect("async record failed");
    // dt is wall-clock and differs between runs; everything else agrees.
    let shape = |steps: &[Step]| -> Vec<(usize, StepCategory, Option<NodeType>, Option<Timing>)> {
        steps.iter().map(|s| (s.step, s.category, s.node_type, s.time)).collect()
    };
    assert_eq!(shape(&sync_steps), shape(&async_steps));
}
