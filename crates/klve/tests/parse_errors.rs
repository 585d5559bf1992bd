//! Parse failures: malformed input and deliberate subset boundaries.

use klve::{Program, RecordConfig, TraceError, record_sync};

fn parse_error(source: &str) -> TraceError {
    let err = record_sync(source, &RecordConfig::default()).expect_err("expected a parse error");
    assert_eq!(err.kind(), "parse-error", "got {err:?}");
    err
}

fn message_of(err: &TraceError) -> String {
    let TraceError::Parse { message, .. } = err else {
        panic!("expected parse-error, got {err:?}");
    };
    message.clone()
}

#[test]
fn plain_syntax_errors_carry_their_location() {
    let err = parse_error("let 5 = x;");
    let TraceError::Parse { loc, .. } = &err else {
        panic!("expected parse-error");
    };
    assert_eq!(loc.line, 1);
    assert!(loc.column > 0);
}

#[test]
fn error_locations_track_lines() {
    let err = parse_error("let a = 1;\nlet b = ;\n");
    let TraceError::Parse { loc, .. } = &err else {
        panic!("expected parse-error");
    };
    assert_eq!(loc.line, 2);
}

#[test]
fn unsupported_constructs_name_the_construct() {
    let cases = [
        ("class A {}", "classes"),
        ("async function f() {}", "async functions"),
        ("function* g() {}", "generator functions"),
        ("const [a, b] = pair;", "destructuring"),
        ("for (const x of xs) {}", "for-of"),
        ("for (const k in o) {}", "for-in"),
        ("do { x(); } while (cond);", "do-while"),
        ("switch (x) { }", "switch"),
        ("label: while (true) {}", "labeled"),
        ("f(...args);", "spread"),
        ("let t = `text`;", "template literals"),
        ("let r = /ab+/;", "regular expression"),
        ("x ??= 1;", "logical assignment"),
        ("o.m?.();", "optional calls"),
        ("function f(a = 1) {}", "default parameter"),
        ("import x from 'mod';", "import"),
    ];
    for (source, needle) in cases {
        let err = parse_error(source);
        let message = message_of(&err);
        assert!(
            message.contains(needle),
            "message for {source:?} should mention {needle:?}, got {message:?}"
        );
        assert!(message.contains("not supported"), "got {message:?}");
    }
}

#[test]
fn const_without_initializer_is_rejected() {
    let message = message_of(&parse_error("const x;"));
    assert!(message.contains("initializer"), "got {message:?}");
}

#[test]
fn deep_nesting_is_rejected_not_overflowed() {
    let source = format!("let x = {}1{};", "(".repeat(500), ")".repeat(500));
    let message = message_of(&parse_error(&source));
    assert!(message.contains("nested"), "got {message:?}");
}

#[test]
fn program_api_surfaces_the_same_failures() {
    assert!(Program::new("const = 1;").is_err());
    assert!(Program::new("let x = 1;").is_ok());
}
