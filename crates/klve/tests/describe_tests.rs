//! Described values as they come out of traces, and the undescribe
//! inverse.

use klve::{
    DescribedValue, HeapKind, NodeType, PrimitiveKind, RecordConfig, Revived, RevivedKind, Step, ValueDescriptor,
    record_sync, undescribe,
};

fn trace(source: &str) -> Vec<Step> {
    record_sync(source, &RecordConfig::default()).expect("trace failed")
}

/// The described value of the last step carrying the given node type.
fn last_value_of(source: &str, node_type: NodeType) -> DescribedValue {
    trace(source)
        .into_iter()
        .rev()
        .find(|s| s.node_type == Some(node_type))
        .and_then(|s| s.value)
        .expect("no value for node type")
}

#[test]
fn primitives_round_trip_identically() {
    let described = last_value_of("3.5;", NodeType::NumericLiteral);
    assert!(matches!(undescribe(&described), Revived::Number(n) if n == 3.5));
    let described = last_value_of("'hey';", NodeType::StringLiteral);
    assert!(matches!(undescribe(&described), Revived::Str(s) if s == "hey"));
    let described = last_value_of("true;", NodeType::BooleanLiteral);
    assert!(matches!(undescribe(&described), Revived::Bool(true)));
    let described = last_value_of("null;", NodeType::NullLiteral);
    assert!(matches!(undescribe(&described), Revived::Null));
}

#[test]
fn array_length_survives_the_round_trip() {
    let described = last_value_of("[1, 2, 3];", NodeType::ArrayExpression);
    let Revived::Ref(node) = undescribe(&described) else {
        panic!("expected a revived array");
    };
    assert_eq!(node.borrow().kind, RevivedKind::Array { length: 3 });
    assert_eq!(node.borrow().entries.len(), 3);
}

#[test]
fn cycle_topology_is_preserved() {
    let described = last_value_of("let a = {}; a.self = a; a;", NodeType::Identifier);
    let ValueDescriptor::Compound { at } = described.descriptor else {
        panic!("expected a compound descriptor");
    };
    // The heap entry for `a` points back at itself.
    let heap_object = &described.heap[at];
    assert_eq!(heap_object.entries[0].0, "self");
    assert_eq!(heap_object.entries[0].1, ValueDescriptor::Compound { at });

    let Revived::Ref(node) = undescribe(&described) else {
        panic!("expected a revived object");
    };
    let node_ref = node.borrow();
    let Revived::Ref(back) = &node_ref.entries[0].1 else {
        panic!("expected a cyclic reference");
    };
    assert!(std::rc::Rc::ptr_eq(&node, back));
}

#[test]
fn shared_structure_is_shared_after_revival() {
    let described = last_value_of(
        "let leaf = { n: 1 }; let pair = { a: leaf, b: leaf }; pair;",
        NodeType::Identifier,
    );
    let Revived::Ref(pair) = undescribe(&described) else {
        panic!("expected a revived object");
    };
    let pair_ref = pair.borrow();
    let (Revived::Ref(a), Revived::Ref(b)) = (&pair_ref.entries[0].1, &pair_ref.entries[1].1) else {
        panic!("expected object entries");
    };
    assert!(std::rc::Rc::ptr_eq(a, b));
}

#[test]
fn functions_describe_as_opaque_functions() {
    let described = last_value_of("function f() { return 1; } f;", NodeType::Identifier);
    let ValueDescriptor::Compound { at } = described.descriptor else {
        panic!("expected a compound descriptor");
    };
    assert_eq!(described.heap[at].kind, HeapKind::Function);
    let Revived::Ref(node) = undescribe(&described) else {
        panic!("expected a revived function");
    };
    assert_eq!(node.borrow().kind, RevivedKind::Function);
}

#[test]
fn thenable_shapes_describe_as_promises() {
    let source = "let fake = { then: function () {}, catch: function () {} }; fake;";
    let described = last_value_of(source, NodeType::Identifier);
    let ValueDescriptor::Compound { at } = described.descriptor else {
        panic!("expected a compound descriptor");
    };
    assert_eq!(described.heap[at].kind, HeapKind::Promise);
    let Revived::Ref(node) = undescribe(&described) else {
        panic!("expected a revived promise");
    };
    assert_eq!(node.borrow().kind, RevivedKind::Promise);
}

#[test]
fn class_instances_carry_their_constructor_name() {
    let source = "function Point(x) { this.x = x; } let p = new Point(3); p;";
    let described = last_value_of(source, NodeType::Identifier);
    let ValueDescriptor::Compound { at } = described.descriptor else {
        panic!("expected a compound descriptor");
    };
    assert_eq!(described.heap[at].cname.as_deref(), Some("Point"));
    assert_eq!(described.heap[at].entries[0].0, "x");
}

#[test]
fn heaps_are_self_contained() {
    let steps = trace("let o = { a: { b: [1, { c: 2 }] } }; o; o.a;");
    for step in steps {
        for described in described_values_of(&step) {
            let check = |descriptor: &ValueDescriptor| {
                if let ValueDescriptor::Compound { at } = descriptor {
                    assert!(*at < described.heap.len(), "dangling heap index {at}");
                }
            };
            check(&described.descriptor);
            for heap_object in &described.heap {
                for (_, entry) in &heap_object.entries {
                    check(entry);
                }
            }
        }
    }
}

fn described_values_of(step: &Step) -> Vec<&DescribedValue> {
    let mut out = Vec::new();
    if let Some(value) = &step.value {
        out.push(value);
    }
    if let Some(scopes) = &step.scopes {
        for frame in scopes {
            out.extend(frame.values());
        }
    }
    if let Some(logs) = &step.logs {
        for entry in logs {
            out.extend(entry.iter());
        }
    }
    out
}

#[test]
fn symbol_descriptors_revive_to_their_display_form() {
    // The subset has no runtime symbols; the descriptor arm exists for
    // schema completeness and must still revive.
    let described = DescribedValue {
        descriptor: ValueDescriptor::Primitive {
            kind: PrimitiveKind::Symbol,
            value: None,
            str: Some("Symbol(tag)".to_owned()),
        },
        heap: Vec::new(),
    };
    assert!(matches!(undescribe(&described), Revived::Symbol(s) if s == "Symbol(tag)"));
}
