//! Shape of the instrumented source: namespace plumbing, loop desugaring,
//! receiver caching, arrow rewriting.

use klve::{Program, transform};

#[test]
fn output_reparses_with_the_same_front_end() {
    let output = transform(
        "function f(a) { return a + 1; }\nlet total = 0;\nfor (let i = 0; i < 3; i++) { total += f(i); }",
    )
    .expect("transform failed");
    Program::new(output.source.as_str()).expect("instrumented source should parse");
}

#[test]
fn namespace_is_fresh_per_invocation() {
    let a = transform("1;").expect("transform failed");
    let b = transform("1;").expect("transform failed");
    assert!(a.ns.starts_with("__klve_"));
    assert_ne!(a.ns, b.ns);
    assert!(a.source.contains(&a.ns));
}

#[test]
fn loops_desugar_to_while_true() {
    let output = transform("while (cond()) { work(); }").expect("transform failed");
    assert!(output.source.contains("while (true)"));
    assert!(output.source.contains(&format!("{}.cache[0]", output.ns)));
    assert!(output.source.contains("break;"));
}

#[test]
fn for_loops_keep_their_init_outside_the_rewritten_loop() {
    let output = transform("for (let i = 0; i < 2; i++) {}").expect("transform failed");
    assert!(output.source.contains("while (true)"));
    assert!(output.source.contains("let i ="));
}

#[test]
fn method_calls_cache_the_receiver() {
    let output = transform("obj.method(1);").expect("transform failed");
    let cache = format!("{}.cache[0]", output.ns);
    assert!(output.source.contains(&format!("({cache} = ")));
    assert!(output.source.contains(&format!(".call({cache}, ")));
}

#[test]
fn plain_calls_go_through_call_with_undefined_receiver() {
    let output = transform("f(1, 2);").expect("transform failed");
    assert!(output.source.contains(".call(undefined, "));
}

#[test]
fn arrows_become_bound_functions() {
    let output = transform("const f = (x) => x + 1;").expect("transform failed");
    assert!(output.source.contains(".bind(this)"));
    assert!(output.source.contains("function"));
    assert!(!output.source.contains("=> x"));
}

#[test]
fn returns_route_through_the_namespace_holder() {
    let output = transform("function f() { return 7; }").expect("transform failed");
    let holder = format!("{}.return", output.ns);
    assert!(output.source.contains(&format!("{holder} = ")));
    assert!(output.source.contains(&format!("return {holder};")));
}

#[test]
fn function_declarations_are_not_wrapped() {
    let output = transform("function f() {}").expect("transform failed");
    assert!(output.source.trim_start().starts_with("function f()"));
}

#[test]
fn assignment_targets_are_not_reported_as_reads() {
    let output = transform("x = 1;").expect("transform failed");
    // The target identifier appears exactly once, unwrapped, on the left of
    // the assignment inside the report call.
    let reads = output.source.matches("action: \"read\"").count();
    assert_eq!(reads, 0);
}

#[test]
fn computed_properties_on_the_left_stay_reported() {
    let output = transform("o[k] = 1;").expect("transform failed");
    let reads = output.source.matches("action: \"read\"").count();
    // `k` is read; `o` (the target base) is not.
    assert_eq!(reads, 1);
    assert!(output.source.contains("name: \"k\""));
}

#[test]
fn metadata_embeds_location_and_detail_literally() {
    let output = transform("let x = 1;").expect("transform failed");
    assert!(output.source.contains("category: \"statement\""));
    assert!(output.source.contains("type: \"VariableDeclaration\""));
    assert!(output.source.contains("action: \"declare\""));
    assert!(output.source.contains("line: 1"));
}

#[test]
fn scope_snapshots_read_through_guards() {
    let output = transform("let x = 1; x;").expect("transform failed");
    assert!(output.source.contains("() => "));
    assert!(output.source.contains(&format!("return {}.describe(x)", output.ns)));
    assert!(output.source.contains("catch (e)"));
}
