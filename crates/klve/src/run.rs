//! Executor and reporter: runs an instrumented program in a fresh frame and
//! collects the raw step list.
//!
//! The frame provides the runtime library, a `console` that drains into the
//! step log queue, and the reserved reporter namespace with its `report`,
//! `describe`, `cache` and `return` fields. The reporter enforces the step
//! and time ceilings on every invocation; a tripped ceiling propagates as an
//! uncatchable error so user `try`/`catch` cannot swallow it.

use std::{cell::RefCell, rc::Rc, time::Instant};

use serde::{Deserialize, Serialize};

use crate::{
    ast::{CodeRange, Stmt},
    builtins::{self, LogQueue},
    describe::{DescribedValue, describe},
    eval::Interp,
    exception::{Exception, LimitExceeded, RunError},
    namespace::{self, Environment},
    options::MaxLimits,
    parse::parse,
    step::{Detail, NodeType, ScopeSnapshot, Step, StepCategory, Timing},
    transform::TransformOutput,
    value::{JsObject, Value, value_to_json},
};

/// A parsed program, cheap to keep around and serializable so hosts can
/// cache the parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    source: String,
    body: Vec<Stmt>,
}

impl Program {
    /// Parses `source`.
    pub fn new(source: impl Into<String>) -> Result<Self, Exception> {
        let source = source.into();
        let program = parse(&source)?;
        Ok(Self {
            source,
            body: program.body,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    /// Serializes to a compact binary form.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Restores a program serialized with [`Program::dump`].
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

/// Runs the instrumented source and returns the raw step list, init step
/// first, unfiltered and unrenumbered.
pub fn execute(output: &TransformOutput, limits: &MaxLimits) -> Result<Vec<Step>, RunError> {
    let program = parse(&output.source)?;
    let logs: LogQueue = Rc::new(RefCell::new(Vec::new()));
    let collector = Rc::new(RefCell::new(Collector::new(limits, logs.clone())));

    let global = Environment::new_global();
    builtins::install_globals(&global);
    namespace::define(&global, "console", builtins::make_console(&logs));
    namespace::define(&global, &output.ns, make_ns_object(&collector));

    let mut interp = Interp::new();
    interp.run_program(&program.body, &global)?;

    let steps = std::mem::take(&mut collector.borrow_mut().steps);
    Ok(steps)
}

/// The raw step accumulator behind `NS.report`.
struct Collector {
    steps: Vec<Step>,
    logs: LogQueue,
    started: Instant,
    max_steps: Option<usize>,
    max_time_ms: Option<u64>,
}

impl Collector {
    fn new(limits: &MaxLimits, logs: LogQueue) -> Self {
        Self {
            steps: vec![Step::init()],
            logs,
            started: Instant::now(),
            max_steps: limits.steps,
            max_time_ms: limits.time,
        }
    }

    fn report(&mut self, value: &Value, meta: &Value) -> Result<(), RunError> {
        let dt = self.started.elapsed().as_secs_f64() * 1000.0;
        if let Some(limit_ms) = self.max_time_ms
            && dt > limit_ms as f64
        {
            return Err(RunError::Limit(LimitExceeded::Time {
                limit_ms,
                observed_ms: dt,
            }));
        }
        if let Some(limit) = self.max_steps
            && self.steps.len() >= limit
        {
            return Err(RunError::Limit(LimitExceeded::Steps {
                limit,
                observed: self.steps.len(),
            }));
        }
        let (header, scopes) = decode_meta(meta)?;
        let step = Step {
            step: self.steps.len(),
            category: header.category,
            node_type: header.node_type,
            time: header.time,
            dt: Some(dt),
            loc: header.loc,
            scopes: Some(scopes),
            value: Some(describe(value)),
            logs: Some(self.logs.borrow_mut().drain(..).collect()),
            detail: header.detail,
        };
        self.steps.push(step);
        Ok(())
    }
}

/// The static parts of a reporter metadata payload, decoded back out of the
/// evaluated object literal.
#[derive(Deserialize)]
struct MetaHeader {
    category: StepCategory,
    #[serde(rename = "type")]
    node_type: Option<NodeType>,
    time: Option<Timing>,
    loc: Option<CodeRange>,
    detail: Option<Detail>,
}

/// Splits an evaluated meta object into its typed header and the scope
/// snapshot. Scope entries whose guarded read did not produce a described
/// value (dead zone, undeclared) are dropped.
fn decode_meta(meta: &Value) -> Result<(MetaHeader, Vec<ScopeSnapshot>), RunError> {
    let Value::Object(obj) = meta else {
        return Err(Exception::type_error("malformed reporter metadata").into());
    };
    let borrowed = obj.borrow();
    let mut scopes = Vec::new();
    if let Some(Value::Object(scope_list)) = borrowed.properties.get("scopes") {
        let scope_list = scope_list.borrow();
        if let crate::value::ObjectKind::Array(frames) = &scope_list.kind {
            for frame in frames {
                let mut snapshot = ScopeSnapshot::new();
                if let Value::Object(frame_obj) = frame {
                    for (name, entry) in &frame_obj.borrow().properties {
                        if let Value::Described(described) = entry {
                            snapshot.insert(name.clone(), DescribedValue::clone(described));
                        }
                    }
                }
                scopes.push(snapshot);
            }
        }
    }
    let mut header_json = serde_json::Map::new();
    for (key, prop) in &borrowed.properties {
        if key == "scopes" {
            continue;
        }
        header_json.insert(key.clone(), value_to_json(prop));
    }
    let header: MetaHeader = serde_json::from_value(serde_json::Value::Object(header_json))
        .map_err(|_| RunError::from(Exception::type_error("malformed reporter metadata")))?;
    Ok((header, scopes))
}

/// Builds the reserved namespace object: `report`, `describe`, the
/// temporary `cache`, and the `return` holder.
fn make_ns_object(collector: &Rc<RefCell<Collector>>) -> Value {
    let mut ns = JsObject::plain();
    let sink = collector.clone();
    ns.properties.insert(
        "report".to_owned(),
        Value::native("report", move |_interp, _this, args| {
            let value = args.first().cloned().unwrap_or(Value::Undefined);
            let meta = args.get(1).cloned().unwrap_or(Value::Undefined);
            sink.borrow_mut().report(&value, &meta)?;
            // The wrapped expression's value flows through unchanged.
            Ok(value)
        }),
    );
    ns.properties.insert(
        "describe".to_owned(),
        Value::native("describe", |_interp, _this, args| {
            let value = args.first().cloned().unwrap_or(Value::Undefined);
            Ok(Value::Described(Rc::new(describe(&value))))
        }),
    );
    ns.properties.insert("cache".to_owned(), Value::object(JsObject::plain()));
    ns.properties.insert("return".to_owned(), Value::Undefined);
    Value::object(ns)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Program, execute};
    use crate::{
        builtins::{self, LogQueue},
        describe::{DescribedValue, describe},
        eval::Interp,
        namespace::{self, Environment},
        options::MaxLimits,
        parse::parse,
        transform::transform,
        value::Value,
    };
    use std::{cell::RefCell, rc::Rc};

    /// Runs `source` uninstrumented and reports the described final values
    /// of `bindings` plus everything written to the console.
    fn run_plain(source: &str, bindings: &[&str]) -> (Vec<DescribedValue>, Vec<Vec<DescribedValue>>) {
        let program = parse(source).expect("parse failed");
        let logs: LogQueue = Rc::new(RefCell::new(Vec::new()));
        let global = Environment::new_global();
        builtins::install_globals(&global);
        namespace::define(&global, "console", builtins::make_console(&logs));
        let mut interp = Interp::new();
        interp.run_program(&program.body, &global).expect("execution failed");
        let described = bindings
            .iter()
            .map(|name| describe(&namespace::lookup(&global, name).unwrap_or(Value::Undefined)))
            .collect();
        let collected = logs.borrow().clone();
        (described, collected)
    }

    /// Runs the instrumented form of `source` and reports the same
    /// observables.
    fn run_instrumented(source: &str, bindings: &[&str]) -> (Vec<DescribedValue>, Vec<Vec<DescribedValue>>) {
        let output = transform(source).expect("transform failed");
        let program = parse(&output.source).expect("instrumented source failed to parse");
        let logs: LogQueue = Rc::new(RefCell::new(Vec::new()));
        let collector = Rc::new(RefCell::new(super::Collector::new(&MaxLimits::default(), logs.clone())));
        let global = Environment::new_global();
        builtins::install_globals(&global);
        namespace::define(&global, "console", builtins::make_console(&logs));
        namespace::define(&global, &output.ns, super::make_ns_object(&collector));
        let mut interp = Interp::new();
        interp.run_program(&program.body, &global).expect("execution failed");
        let described = bindings
            .iter()
            .map(|name| describe(&namespace::lookup(&global, name).unwrap_or(Value::Undefined)))
            .collect();
        let collected = logs.borrow().clone();
        (described, collected)
    }

    #[test]
    fn instrumentation_preserves_observable_state() {
        let source = "\
var total = 0;
var parts = [];
function add(n) { total += n; return total; }
for (let i = 1; i <= 4; i++) {
  if (i % 2 === 0) { parts.push(i); continue; }
  add(i * 10);
}
var obj = { a: 1 };
obj.b = obj.a + 1;
var label = typeof missing === 'undefined' ? 'none' : 'some';
";
        let bindings = ["total", "parts", "obj", "label"];
        assert_eq!(run_plain(source, &bindings), run_instrumented(source, &bindings));
    }

    #[test]
    fn instrumentation_preserves_console_output_order() {
        let source = "\
function greet(name) { console.log('hi', name); return name.length; }
var n = greet('ada');
console.log(n + 1);
while (n > 2) { n--; console.log(n); }
";
        assert_eq!(run_plain(source, &["n"]), run_instrumented(source, &["n"]));
    }

    #[test]
    fn instrumentation_preserves_thrown_errors() {
        let source = "var x = 0; try { null.f(); } catch (e) { x = 1; } finally { x += 2; }";
        assert_eq!(run_plain(source, &["x"]), run_instrumented(source, &["x"]));
    }

    #[test]
    fn receiver_identity_is_preserved_for_method_calls() {
        let source = "\
var calls = 0;
var counter = {
  value: 7,
  read: function () { calls++; return this.value; }
};
var got = counter.read();
";
        assert_eq!(
            run_plain(source, &["calls", "got"]),
            run_instrumented(source, &["calls", "got"])
        );
    }

    #[test]
    fn program_dump_load_round_trips() {
        let program = Program::new("let x = 1 + 2;").expect("parse failed");
        let bytes = program.dump().expect("dump failed");
        let restored = Program::load(&bytes).expect("load failed");
        assert_eq!(program.source(), restored.source());
        assert_eq!(program.body(), restored.body());
    }

    #[test]
    fn limit_errors_are_not_catchable_by_user_code() {
        let output = transform("try { while (true) { var x = 1; } } catch (e) { }").expect("transform failed");
        let limits = MaxLimits {
            steps: Some(50),
            time: None,
        };
        let err = execute(&output, &limits).expect_err("limit should trip");
        assert!(matches!(
            err,
            crate::exception::RunError::Limit(crate::exception::LimitExceeded::Steps { .. })
        ));
    }
}
