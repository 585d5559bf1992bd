//! The error surface of a record invocation.
//!
//! Failures inside the pipeline are classified into three kinds: parse
//! errors (with the reported location), limit errors (with the kind and the
//! observed magnitude), and everything else as a runtime error with a
//! best-effort location. Option validation failures are a fourth kind
//! raised before the pipeline runs.

use std::fmt;

use serde::Serialize;
use strum::IntoStaticStr;

use crate::{
    ast::CodeLoc,
    exception::{ExcKind, Exception, LimitExceeded, RunError},
};

#[derive(Debug, Clone, PartialEq, Serialize, IntoStaticStr)]
pub enum TraceError {
    #[strum(serialize = "parse-error")]
    Parse { message: String, loc: CodeLoc },
    #[strum(serialize = "runtime-error")]
    Runtime { message: String, loc: CodeLoc },
    #[strum(serialize = "limit-exceeded")]
    LimitExceeded(LimitExceeded),
    #[strum(serialize = "options-semantic-invalid")]
    OptionsSemanticInvalid { message: String },
}

impl TraceError {
    /// The stable kind name: `parse-error`, `runtime-error`,
    /// `limit-exceeded` or `options-semantic-invalid`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// Lifts a parser failure, substituting line 1 column 0 when the
    /// exception carries no location.
    #[must_use]
    pub fn from_parse(exception: &Exception) -> Self {
        Self::Parse {
            message: exception.message().unwrap_or("invalid input").to_owned(),
            loc: exception.start_loc(),
        }
    }

    /// Classifies an execution failure: limit errors pass through, anything
    /// else becomes a runtime error.
    #[must_use]
    pub fn from_run(error: &RunError) -> Self {
        match error {
            RunError::Limit(limit) => Self::LimitExceeded(*limit),
            RunError::Exc(exception) => {
                let message = match (exception.kind(), exception.message()) {
                    (_, None) => exception.to_string(),
                    // Thrown values already carry their display form.
                    (ExcKind::Error, Some(message)) => message.to_owned(),
                    _ => exception.to_string(),
                };
                Self::Runtime {
                    message,
                    loc: exception.start_loc(),
                }
            }
        }
    }
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { message, loc } => {
                write!(f, "parse error at {}:{}: {message}", loc.line, loc.column)
            }
            Self::Runtime { message, loc } => {
                write!(f, "runtime error at {}:{}: {message}", loc.line, loc.column)
            }
            Self::LimitExceeded(limit) => write!(f, "{limit}"),
            Self::OptionsSemanticInvalid { message } => write!(f, "invalid options: {message}"),
        }
    }
}

impl std::error::Error for TraceError {}

#[cfg(test)]
mod tests {
    use super::TraceError;
    use crate::{
        ast::CodeLoc,
        exception::{Exception, LimitExceeded, RunError},
    };

    #[test]
    fn kind_names_are_stable() {
        let parse = TraceError::Parse {
            message: "x".to_owned(),
            loc: CodeLoc::zero(),
        };
        assert_eq!(parse.kind(), "parse-error");
        let limit = TraceError::LimitExceeded(LimitExceeded::Steps { limit: 1, observed: 1 });
        assert_eq!(limit.kind(), "limit-exceeded");
    }

    #[test]
    fn missing_locations_fall_back_to_line_one() {
        let adapted = TraceError::from_run(&RunError::Exc(Exception::type_error("boom")));
        let TraceError::Runtime { loc, .. } = adapted else {
            panic!("expected a runtime error");
        };
        assert_eq!(loc, CodeLoc::zero());
    }
}
