//! Tagvm Runtime
//!
//! Control-flow execution core for the tag-addressed linear VM: module
//! discovery over flat programs, approximate tag dispatch, nested call/flow
//! stacks, and the single-step primitive a scheduler drives.

pub mod error;
pub mod flow;
pub mod matchbin;
pub mod memory;
pub mod modules;
pub mod state;
pub mod stepper;

pub use error::VmError;
pub use flow::{FlowControl, FlowControlRegistry, FlowHook, FlowKind};
pub use matchbin::{RankedHammingMatcher, TagIndex, TagMatcher};
pub use memory::{MemBuffer, MemoryModel, MemoryState};
pub use modules::Module;
pub use state::{CallFrame, ExecutionState, FlowFrame, Thread};
pub use stepper::{ExecutionStepper, Hardware, StepOutcome};
