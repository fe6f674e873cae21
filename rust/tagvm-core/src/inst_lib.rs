//! Opcode metadata registry.
//!
//! The execution core never interprets opcode semantics; it only asks the
//! library about structural properties (is this instruction a module
//! boundary?). Opcode behavior lives with the driver that owns the
//! instruction set.

use crate::program::OpcodeId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Structural flags an opcode may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstProperty {
    /// Instances of this opcode open a new module in the program.
    Module,
}

/// One registered opcode.
#[derive(Debug, Clone)]
pub struct OpcodeDef {
    pub name: String,
    pub properties: HashSet<InstProperty>,
}

/// Registry mapping opcode ids to definitions, with name lookup.
#[derive(Debug, Default)]
pub struct InstructionLibrary {
    opcodes: Vec<OpcodeDef>,
    lookup: HashMap<String, OpcodeId>,
}

impl InstructionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an opcode and return its dense id.
    pub fn add_opcode(&mut self, name: &str, properties: &[InstProperty]) -> OpcodeId {
        let id = self.opcodes.len();
        self.opcodes.push(OpcodeDef {
            name: name.to_string(),
            properties: properties.iter().copied().collect(),
        });
        self.lookup.insert(name.to_string(), id);
        id
    }

    pub fn has_property(&self, op: OpcodeId, prop: InstProperty) -> bool {
        self.opcodes
            .get(op)
            .is_some_and(|def| def.properties.contains(&prop))
    }

    pub fn name(&self, op: OpcodeId) -> Option<&str> {
        self.opcodes.get(op).map(|def| def.name.as_str())
    }

    pub fn id_of(&self, name: &str) -> Option<OpcodeId> {
        self.lookup.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.opcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opcodes.is_empty()
    }
}
