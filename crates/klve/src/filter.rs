//! Post-processing of the raw step list: timing filter, node-type filter,
//! name filter, data stripping, and renumbering.
//!
//! The four axes are independent predicates over a step, so their
//! application order cannot change the surviving set; the single pass here
//! applies them together and then renumbers the survivors from 1.

use ahash::AHashSet;

use crate::{
    options::{NameMode, TraceOptions},
    step::{Step, StepCategory, Timing},
};

/// Applies `options` to a raw step list and renumbers the result.
#[must_use]
pub fn filter_steps(raw: Vec<Step>, options: &TraceOptions) -> Vec<Step> {
    let name_mode = options.filter.names.mode();
    let name_set: AHashSet<&str> = match name_mode {
        NameMode::Include => options.filter.names.include.iter().map(String::as_str).collect(),
        NameMode::Exclude => options.filter.names.exclude.iter().map(String::as_str).collect(),
        NameMode::None => AHashSet::new(),
    };

    let mut kept: Vec<Step> = raw
        .into_iter()
        .filter(|step| keeps(step, options, name_mode, &name_set))
        .map(|step| strip_data(step, options))
        .collect();
    for (index, step) in kept.iter_mut().enumerate() {
        step.step = index + 1;
    }
    kept
}

/// The init step is never filtered; other steps must pass all three
/// predicates.
fn keeps(step: &Step, options: &TraceOptions, name_mode: NameMode, name_set: &AHashSet<&str>) -> bool {
    if step.category == StepCategory::Init {
        return true;
    }
    match step.time {
        Some(Timing::Before) if !options.filter.timing.before => return false,
        Some(Timing::After) if !options.filter.timing.after => return false,
        _ => {}
    }
    if let Some(node_type) = step.node_type
        && !options.nodes.keeps(node_type)
    {
        return false;
    }
    match name_mode {
        NameMode::None => true,
        mode => {
            let candidates = step.detail.as_ref().map(|detail| detail.candidate_names()).unwrap_or_default();
            // Steps that name nothing are kept under either mode.
            if candidates.is_empty() {
                return true;
            }
            let hit = candidates.iter().any(|name| name_set.contains(name));
            match mode {
                NameMode::Include => hit,
                _ => !hit,
            }
        }
    }
}

/// Drops the data fields disabled in `filter.data`.
fn strip_data(mut step: Step, options: &TraceOptions) -> Step {
    let data = &options.filter.data;
    if !data.scopes {
        step.scopes = None;
    }
    if !data.value {
        step.value = None;
    }
    if !data.logs {
        step.logs = None;
    }
    if !data.dt {
        step.dt = None;
    }
    if !data.loc {
        step.loc = None;
    }
    step
}

#[cfg(test)]
mod tests {
    use super::filter_steps;
    use crate::{
        options::TraceOptions,
        step::{Action, Detail, NodeType, Step, StepCategory, Timing},
    };

    fn step(node_type: NodeType, time: Timing, name: Option<&str>) -> Step {
        let mut detail = Detail::action(Action::Read);
        detail.name = name.map(ToOwned::to_owned);
        Step {
            step: 0,
            category: StepCategory::Expression,
            node_type: Some(node_type),
            time: Some(time),
            dt: Some(0.0),
            loc: None,
            scopes: Some(Vec::new()),
            value: None,
            logs: Some(Vec::new()),
            detail: Some(detail),
        }
    }

    fn raw() -> Vec<Step> {
        vec![
            Step::init(),
            step(NodeType::Identifier, Timing::After, Some("x")),
            step(NodeType::Identifier, Timing::After, Some("y")),
            step(NodeType::BinaryExpression, Timing::After, None),
        ]
    }

    #[test]
    fn renumbering_starts_at_one_and_is_consecutive() {
        let filtered = filter_steps(raw(), &TraceOptions::default());
        let numbers: Vec<usize> = filtered.iter().map(|s| s.step).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn include_and_equivalent_exclude_agree() {
        let include: TraceOptions = serde_json::from_value(serde_json::json!({
            "filter": { "names": { "include": ["x"] } }
        }))
        .expect("deserialize failed");
        let exclude: TraceOptions = serde_json::from_value(serde_json::json!({
            "filter": { "names": { "exclude": ["y"] } }
        }))
        .expect("deserialize failed");
        let by_include: Vec<Option<NodeType>> =
            filter_steps(raw(), &include).iter().map(|s| s.node_type).collect();
        let by_exclude: Vec<Option<NodeType>> =
            filter_steps(raw(), &exclude).iter().map(|s| s.node_type).collect();
        assert_eq!(by_include, by_exclude);
    }

    #[test]
    fn init_survives_every_filter() {
        let options: TraceOptions = serde_json::from_value(serde_json::json!({
            "filter": { "timing": { "before": false, "after": false } }
        }))
        .expect("deserialize failed");
        let filtered = filter_steps(raw(), &options);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].category, StepCategory::Init);
        assert_eq!(filtered[0].step, 1);
    }

    #[test]
    fn data_strip_removes_only_disabled_fields() {
        let options: TraceOptions = serde_json::from_value(serde_json::json!({
            "filter": { "data": { "scopes": false, "dt": false } }
        }))
        .expect("deserialize failed");
        let filtered = filter_steps(raw(), &options);
        let sample = &filtered[1];
        assert!(sample.scopes.is_none());
        assert!(sample.dt.is_none());
        assert!(sample.logs.is_some());
    }
}
