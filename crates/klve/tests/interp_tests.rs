//! Subset semantics observed through the trace: coercions, control flow,
//! closures, the runtime library.

use klve::{DescribedValue, HeapKind, PrimitiveKind, PrimitiveRepr, RecordConfig, TraceError, ValueDescriptor,
    record_sync};

/// Runs `source` and returns every console entry, flattened in order.
fn logged(source: &str) -> Vec<Vec<DescribedValue>> {
    let steps = record_sync(source, &RecordConfig::default()).expect("trace failed");
    steps.into_iter().filter_map(|s| s.logs).flatten().collect()
}

/// The primitive payloads of a single-value log call, rendered to strings
/// for compact assertions.
fn logged_repr(source: &str) -> Vec<String> {
    logged(source)
        .into_iter()
        .map(|entry| {
            entry
                .iter()
                .map(|described| match &described.descriptor {
                    ValueDescriptor::Primitive { kind, value, .. } => match (kind, value) {
                        (PrimitiveKind::Undefined, _) => "undefined".to_owned(),
                        (PrimitiveKind::Null, _) => "null".to_owned(),
                        (_, Some(PrimitiveRepr::Bool(b))) => b.to_string(),
                        (_, Some(PrimitiveRepr::Num(n))) => format!("{n}"),
                        (_, Some(PrimitiveRepr::Str(s))) => s.clone(),
                        _ => "?".to_owned(),
                    },
                    ValueDescriptor::Compound { at } => {
                        let heap = &described.heap[*at];
                        format!("<{:?}:{}>", heap.kind, heap.entries.len())
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn runtime_error(source: &str) -> TraceError {
    let err = record_sync(source, &RecordConfig::default()).expect_err("expected a runtime error");
    assert_eq!(err.kind(), "runtime-error", "got {err:?}");
    err
}

#[test]
fn arithmetic_and_string_coercion() {
    assert_eq!(
        logged_repr("console.log(1 + 2 * 3); console.log('a' + 1); console.log('5' - 1); console.log(7 % 4);"),
        vec!["7", "a1", "4", "3"]
    );
}

#[test]
fn equality_operators() {
    assert_eq!(
        logged_repr("console.log(1 == '1'); console.log(1 === '1'); console.log(null == undefined); console.log(null === undefined);"),
        vec!["true", "false", "true", "false"]
    );
}

#[test]
fn logical_operators_short_circuit() {
    assert_eq!(
        logged_repr("console.log(0 || 'fallback'); console.log(0 ?? 'fallback'); console.log(1 && 2);"),
        vec!["fallback", "0", "2"]
    );
}

#[test]
fn closures_capture_their_environment() {
    let source = "\
function counter() {
  let n = 0;
  return function () { n = n + 1; return n; };
}
const c = counter();
c();
console.log(c());
";
    assert_eq!(logged_repr(source), vec!["2"]);
}

#[test]
fn arrows_keep_the_lexical_receiver() {
    let source = "\
const box = {
  value: 5,
  grab: function () {
    const f = () => this.value;
    return f();
  }
};
console.log(box.grab());
";
    assert_eq!(logged_repr(source), vec!["5"]);
}

#[test]
fn var_hoisting_and_function_declarations() {
    let source = "\
console.log(typeof hoisted);
console.log(early());
var hoisted = 1;
function early() { return 'ok'; }
";
    assert_eq!(logged_repr(source), vec!["undefined", "ok"]);
}

#[test]
fn try_catch_finally_ordering() {
    let source = "\
function risky() { throw new Error('boom'); }
try {
  risky();
} catch (e) {
  console.log('caught', e.message);
} finally {
  console.log('finally');
}
";
    assert_eq!(logged_repr(source), vec!["caught boom", "finally"]);
}

#[test]
fn uncaught_user_throws_become_runtime_errors() {
    let err = runtime_error("throw new Error('kaput');");
    let TraceError::Runtime { message, .. } = &err else {
        panic!("expected runtime-error");
    };
    assert!(message.contains("kaput"), "got {message:?}");
}

#[test]
fn undefined_property_reads_fail_with_location() {
    let err = runtime_error("let o;\no.missing;");
    let TraceError::Runtime { message, loc } = &err else {
        panic!("expected runtime-error");
    };
    assert!(message.contains("missing"), "got {message:?}");
    assert_eq!(loc.line, 2);
}

#[test]
fn array_methods() {
    let source = "\
const xs = [3, 1, 2];
console.log(xs.length);
console.log(xs.map(x => x * 10).join('-'));
console.log(xs.filter(x => x > 1).length);
console.log(xs.reduce((a, b) => a + b, 0));
console.log(xs.indexOf(2));
xs.push(9);
console.log(xs.length);
";
    assert_eq!(logged_repr(source), vec!["3", "30-10-20", "2", "6", "2", "4"]);
}

#[test]
fn string_methods() {
    let source = "\
const s = 'Hello World';
console.log(s.toUpperCase());
console.log(s.slice(0, 5));
console.log(s.split(' ').length);
console.log(s.indexOf('World'));
console.log('7'.padStart(3, '0'));
";
    assert_eq!(logged_repr(source), vec!["HELLO WORLD", "Hello", "2", "6", "007"]);
}

#[test]
fn math_and_number_globals() {
    let source = "\
console.log(Math.max(1, 9, 4));
console.log(Math.floor(2.9));
console.log(Number.isInteger(4));
console.log(parseInt('42px'));
console.log(parseFloat('2.5rem'));
console.log(isNaN('nope'));
";
    assert_eq!(logged_repr(source), vec!["9", "2", "true", "42", "2.5", "true"]);
}

#[test]
fn json_round_trip() {
    let source = "\
const text = JSON.stringify({ a: 1, b: [true, null] });
console.log(text);
const back = JSON.parse(text);
console.log(back.b[0]);
";
    assert_eq!(
        logged_repr(source),
        vec!["{\"a\":1,\"b\":[true,null]}", "true"]
    );
}

#[test]
fn object_statics() {
    let source = "\
const o = { a: 1, b: 2 };
console.log(Object.keys(o).join(','));
console.log(Object.values(o).length);
const merged = Object.assign({}, o, { c: 3 });
console.log(Object.keys(merged).length);
";
    assert_eq!(logged_repr(source), vec!["a,b", "2", "3"]);
}

#[test]
fn constructors_and_instanceof() {
    let source = "\
function Point(x, y) { this.x = x; this.y = y; }
const p = new Point(1, 2);
console.log(p.x + p.y);
console.log(p instanceof Point);
console.log(new Error('e') instanceof Error);
";
    assert_eq!(logged_repr(source), vec!["3", "true", "true"]);
}

#[test]
fn described_objects_carry_structure() {
    let entries = logged("const p = { x: 1 }; console.log(p, [1, 2]);");
    let entry = entries.first().expect("no log entry");
    let ValueDescriptor::Compound { at } = &entry[0].descriptor else {
        panic!("expected a compound descriptor");
    };
    assert_eq!(entry[0].heap[*at].kind, HeapKind::Object);
    let ValueDescriptor::Compound { at } = &entry[1].descriptor else {
        panic!("expected a compound descriptor");
    };
    assert_eq!(entry[1].heap[*at].kind, HeapKind::Array);
    assert_eq!(entry[1].heap[*at].length, Some(2));
}

#[test]
fn deep_recursion_is_a_range_error_not_a_crash() {
    let err = runtime_error("function f(n) { return f(n + 1); } f(0);");
    let TraceError::Runtime { message, .. } = &err else {
        panic!("expected runtime-error");
    };
    assert!(message.contains("call stack"), "got {message:?}");
}

#[test]
fn bitwise_and_shift_operators() {
    assert_eq!(
        logged_repr("console.log(5 & 3); console.log(5 | 3); console.log(1 << 3); console.log(-1 >>> 28);"),
        vec!["1", "7", "8", "15"]
    );
}

#[test]
fn ternary_and_sequence() {
    assert_eq!(
        logged_repr("let x = (1, 2, 3); console.log(x > 2 ? 'yes' : 'no');"),
        vec!["yes"]
    );
}

#[test]
fn optional_member_access_short_circuits() {
    assert_eq!(
        logged_repr("let o = null; console.log(o?.missing); let p = { q: 1 }; console.log(p?.q);"),
        vec!["undefined", "1"]
    );
}
