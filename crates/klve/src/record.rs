//! The record entrypoint and the tracer's static identity.

use crate::{
    error::TraceError,
    filter::filter_steps,
    options::RecordConfig,
    run::execute,
    step::Step,
    transform::transform,
};

/// Stable tracer identifier exposed to hosts.
pub const TRACER_ID: &str = "js:klve";

/// File extensions this tracer accepts.
pub const LANGS: [&str; 3] = ["js", "mjs", "cjs"];

/// Records an execution trace of `source`: instrument, execute, filter,
/// renumber. The configuration is assumed to be schema- and
/// semantics-validated by the host; see
/// [`verify_options`](crate::options::verify_options).
pub fn record_sync(source: &str, config: &RecordConfig) -> Result<Vec<Step>, TraceError> {
    let instrumented = transform(source).map_err(|exception| TraceError::from_parse(&exception))?;
    let raw = execute(&instrumented, &config.meta.max).map_err(|error| TraceError::from_run(&error))?;
    Ok(filter_steps(raw, &config.options))
}

/// Awaitable form of [`record_sync`]. Execution itself is synchronous; the
/// async surface exists so callers need not assume that.
pub async fn record(source: &str, config: &RecordConfig) -> Result<Vec<Step>, TraceError> {
    record_sync(source, config)
}
