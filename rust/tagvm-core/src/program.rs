//! Linear programs: flat, mutation-tolerant instruction sequences.

use crate::tags::Tag;
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Index into an [`InstructionLibrary`](crate::inst_lib::InstructionLibrary).
pub type OpcodeId = usize;

/// One instruction: an opcode plus its tag and argument operands.
///
/// Instructions are immutable once placed in a [`Program`]; mutation
/// operators produce whole new programs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: OpcodeId,
    pub tags: Vec<Tag>,
    pub args: Vec<i32>,
}

impl Instruction {
    pub fn new(op: OpcodeId, tags: Vec<Tag>, args: Vec<i32>) -> Self {
        Self { op, tags, args }
    }

    /// Instruction with no tags and no arguments.
    pub fn plain(op: OpcodeId) -> Self {
        Self::new(op, vec![], vec![])
    }

    pub fn with_tag(op: OpcodeId, tag: Tag) -> Self {
        Self::new(op, vec![tag], vec![])
    }

    pub fn first_tag(&self) -> Option<Tag> {
        self.tags.first().copied()
    }
}

/// Ordered instruction sequence, indexed `0..len`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, inst: Instruction) {
        self.instructions.push(inst);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&Instruction> {
        self.instructions.get(pos)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }
}

impl Index<usize> for Program {
    type Output = Instruction;

    fn index(&self, pos: usize) -> &Instruction {
        &self.instructions[pos]
    }
}

impl FromIterator<Instruction> for Program {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        Self {
            instructions: iter.into_iter().collect(),
        }
    }
}
