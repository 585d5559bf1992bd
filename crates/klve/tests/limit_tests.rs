//! Step and time ceilings.

use klve::{LimitExceeded, MaxLimits, RecordConfig, RecordMeta, TraceError, TraceOptions, record_sync};

fn config(steps: Option<usize>, time: Option<u64>) -> RecordConfig {
    RecordConfig {
        meta: RecordMeta {
            max: MaxLimits { steps, time },
        },
        options: TraceOptions::default(),
    }
}

#[test]
fn disabled_limits_let_long_programs_finish() {
    let steps = record_sync("for (let i = 0; i < 50; i++) {}", &config(None, None)).expect("trace failed");
    assert!(steps.len() > 100);
}

#[test]
fn step_limit_reports_kind_and_magnitude() {
    let err = record_sync("while (true) { var x = 1; }", &config(Some(20), None)).expect_err("limit should trip");
    let TraceError::LimitExceeded(LimitExceeded::Steps { limit, observed }) = err else {
        panic!("expected a step limit, got {err:?}");
    };
    assert_eq!(limit, 20);
    assert!(observed >= 20);
}

#[test]
fn time_limit_reports_kind_and_magnitude() {
    let err =
        record_sync("while (true) { var x = 1; }", &config(None, Some(0))).expect_err("limit should trip");
    let TraceError::LimitExceeded(LimitExceeded::Time { limit_ms, observed_ms }) = err else {
        panic!("expected a time limit, got {err:?}");
    };
    assert_eq!(limit_ms, 0);
    assert!(observed_ms >= 0.0);
}

#[test]
fn limits_also_stop_runaway_recursion_free_programs() {
    // A loop with no allocations or calls still reports every step, so the
    // ceiling cuts it off.
    let err = record_sync("let n = 0; while (true) { n = n + 1; }", &config(Some(1000), None))
        .expect_err("limit should trip");
    assert_eq!(err.kind(), "limit-exceeded");
}

#[test]
fn short_programs_fit_under_generous_limits() {
    let steps = record_sync("let x = 1 + 2;", &config(Some(10_000), Some(10_000))).expect("trace failed");
    assert!(steps.len() <= 10_001);
}
