//! Error taxonomy for the execution core.
//!
//! Precondition violations fail fast; empty-result conditions (no match,
//! idle thread) are ordinary values and never appear here.

use crate::flow::FlowKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("invalid module id: {id} ({num_modules} modules compiled)")]
    InvalidModuleId { id: usize, num_modules: usize },
    #[error("no flow control registered for type: {0}")]
    UnknownFlowType(FlowKind),
    #[error("module-defining instruction at position {pos} carries no tag")]
    MalformedModuleDefinition { pos: usize },
    #[error("instruction dispatch error: {0}")]
    Dispatch(String),
}
