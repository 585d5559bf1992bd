//! Exception types raised while parsing or executing a program.
//!
//! Two layers exist: [`Exception`] models a JavaScript exception (the thing a
//! `catch` clause can bind), while [`RunError`] is the evaluator's error
//! channel and additionally carries [`LimitExceeded`], which deliberately
//! cannot be caught by user code so resource ceilings always abort.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    ast::{CodeLoc, CodeRange},
    value::Value,
};

/// JavaScript error classes produced by the parser and evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcKind {
    SyntaxError,
    ReferenceError,
    TypeError,
    RangeError,
    /// A thrown value with no recognized error class, or a plain `Error`.
    Error,
}

/// A JavaScript exception: kind, message, best-effort location, and the
/// original thrown value when user code raised one with `throw`.
#[derive(Debug, Clone)]
pub struct Exception {
    kind: ExcKind,
    message: Option<String>,
    loc: Option<CodeRange>,
    thrown: Option<Value>,
}

impl Exception {
    #[must_use]
    pub fn new(kind: ExcKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
            loc: None,
            thrown: None,
        }
    }

    #[must_use]
    pub fn syntax(message: impl Into<String>, loc: CodeLoc) -> Self {
        Self {
            kind: ExcKind::SyntaxError,
            message: Some(message.into()),
            loc: Some(CodeRange::new(loc, loc)),
            thrown: None,
        }
    }

    /// A syntax failure for a construct outside the supported subset. The
    /// message names the construct so callers can tell a typo from a
    /// deliberate boundary. `construct` reads like "template literals are".
    #[must_use]
    pub fn unsupported(construct: &str, loc: CodeLoc) -> Self {
        Self::syntax(format!("{construct} not supported"), loc)
    }

    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::TypeError, message)
    }

    #[must_use]
    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::ReferenceError, message)
    }

    #[must_use]
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::RangeError, message)
    }

    /// Wraps a value raised by a user `throw` statement.
    #[must_use]
    pub fn thrown(value: Value, message: Option<String>) -> Self {
        Self {
            kind: ExcKind::Error,
            message,
            loc: None,
            thrown: Some(value),
        }
    }

    #[must_use]
    pub fn with_loc(mut self, loc: CodeRange) -> Self {
        self.loc = Some(loc);
        self
    }

    /// Attaches a location only if none is set yet, so the innermost frame
    /// that knows a position wins.
    pub fn fill_loc(&mut self, loc: CodeRange) {
        if self.loc.is_none() {
            self.loc = Some(loc);
        }
    }

    #[must_use]
    pub fn kind(&self) -> ExcKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[must_use]
    pub fn loc(&self) -> Option<CodeRange> {
        self.loc
    }

    #[must_use]
    pub fn start_loc(&self) -> CodeLoc {
        self.loc.map_or_else(CodeLoc::zero, |range| range.start)
    }

    /// The value a `catch` clause binds: the originally thrown value if there
    /// was one, otherwise a fresh error object for the kind and message.
    #[must_use]
    pub fn to_value(&self) -> Value {
        if let Some(value) = &self.thrown {
            return value.clone();
        }
        Value::new_error(self.kind.into(), self.message.as_deref().unwrap_or(""))
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Exception {}

/// Which resource ceiling was hit, with the configured limit and the
/// observed magnitude at the moment of the check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LimitExceeded {
    Steps { limit: usize, observed: usize },
    Time { limit_ms: u64, observed_ms: f64 },
}

impl LimitExceeded {
    /// The wire name of the limit kind: `"steps"` or `"time"`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Steps { .. } => "steps",
            Self::Time { .. } => "time",
        }
    }
}

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Steps { limit, observed } => {
                write!(f, "step limit exceeded: {observed} >= {limit}")
            }
            Self::Time { limit_ms, observed_ms } => {
                write!(f, "time limit exceeded: {observed_ms}ms > {limit_ms}ms")
            }
        }
    }
}

/// The evaluator's error channel.
///
/// `Exc` is an ordinary JavaScript exception and is interceptable by
/// `try`/`catch`. `Limit` is raised by the reporter when a resource ceiling
/// is hit and propagates through every handler.
#[derive(Debug, Clone)]
pub enum RunError {
    Exc(Exception),
    Limit(LimitExceeded),
}

impl RunError {
    #[must_use]
    pub fn exc(exception: Exception) -> Self {
        Self::Exc(exception)
    }

    /// Attaches a location to a carried exception if it has none yet.
    pub fn fill_loc(&mut self, loc: CodeRange) {
        if let Self::Exc(exc) = self {
            exc.fill_loc(loc);
        }
    }
}

impl From<Exception> for RunError {
    fn from(exception: Exception) -> Self {
        Self::Exc(exception)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exc(exc) => write!(f, "{exc}"),
            Self::Limit(limit) => write!(f, "{limit}"),
        }
    }
}

impl std::error::Error for RunError {}
