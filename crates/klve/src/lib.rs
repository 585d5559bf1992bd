#![doc = include_str!("../../../README.md")]
#![expect(clippy::struct_excessive_bools, reason = "option toggles mirror the wire schema")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked at the call sites")]
#![expect(clippy::cast_sign_loss, reason = "casts from checked non-negative floats")]

mod ast;
mod builtins;
mod describe;
mod emit;
mod error;
mod eval;
mod exception;
mod filter;
mod lexer;
mod meta;
mod namespace;
mod options;
mod parse;
mod record;
mod run;
mod step;
mod transform;
mod value;

pub use crate::{
    ast::{CodeLoc, CodeRange},
    describe::{
        DescribedValue, HeapKind, HeapObject, PrimitiveKind, PrimitiveRepr, Revived, RevivedKind, RevivedObject,
        ValueDescriptor, undescribe,
    },
    error::TraceError,
    exception::{ExcKind, Exception, LimitExceeded},
    filter::filter_steps,
    options::{
        BranchToggles, CallToggles, DataToggles, ErrorToggles, FilterOptions, FunctionToggles, LiteralToggles,
        LoopToggles, MaxLimits, MemberToggles, NameFilter, NameMode, NodeToggles, OperatorToggles, RecordConfig,
        RecordMeta, TimingToggles, TraceOptions, VariableToggles, options_schema, verify_options,
    },
    record::{LANGS, TRACER_ID, record, record_sync},
    run::Program,
    step::{Action, Detail, NodeType, ScopeSnapshot, Step, StepCategory, Timing},
    transform::{TransformOutput, transform},
};
