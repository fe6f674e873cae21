//! Tagvm Core
//!
//! Shared data model for the tag-addressed linear VM: bit tags, instructions,
//! programs, and the opcode metadata library consumed by the execution core.

pub mod inst_lib;
pub mod program;
pub mod tags;

pub use inst_lib::{InstProperty, InstructionLibrary, OpcodeDef};
pub use program::{Instruction, OpcodeId, Program};
pub use tags::{Tag, TAG_WIDTH};
