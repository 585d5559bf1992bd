//! The frame's `console`.
//!
//! Every console method routes its arguments through the describer into a
//! shared queue; the reporter drains the queue into the next step's `logs`.
//! Levels all feed the same queue because the step schema carries no level.

use std::{cell::RefCell, rc::Rc};

use crate::{
    describe::{DescribedValue, describe},
    value::{JsObject, Value},
};

/// Console writes accumulated since the last step, one entry per call.
pub type LogQueue = Rc<RefCell<Vec<Vec<DescribedValue>>>>;

/// Builds the `console` object over the given queue.
#[must_use]
pub fn make_console(queue: &LogQueue) -> Value {
    let mut console = JsObject::plain();
    for name in ["log", "info", "warn", "error", "debug"] {
        let queue = queue.clone();
        console.properties.insert(
            name.to_owned(),
            Value::native(name, move |_interp, _this, args| {
                let entry: Vec<DescribedValue> = args.iter().map(describe).collect();
                queue.borrow_mut().push(entry);
                Ok(Value::Undefined)
            }),
        );
    }
    Value::object(console)
}
