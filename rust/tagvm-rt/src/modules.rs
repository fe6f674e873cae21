//! Module discovery: partitioning a flat program into tag-addressed modules.
//!
//! A module is opened by any instruction whose opcode carries the `Module`
//! property and spans the instructions up to the next boundary. The program
//! is treated as logically circular: instructions before the first boundary
//! ("dangling" positions) wrap around into the last module found.

use crate::error::VmError;
use std::collections::BTreeSet;
use tagvm_core::{InstProperty, InstructionLibrary, Program, Tag};

/// One contiguous (circularly wrapping) region of the program.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Dense id, equal to discovery order.
    pub id: usize,
    /// First body instruction, one past the defining boundary.
    pub begin: usize,
    /// One past the last body instruction. May be less than `begin` when the
    /// module wraps around the end of the program.
    pub end: usize,
    /// Tag used to call/reference this module.
    pub tag: Tag,
    /// Instruction positions assigned to this module during the scan.
    pub in_module: BTreeSet<usize>,
}

impl Module {
    fn new(id: usize, begin: usize, end: usize, tag: Tag) -> Self {
        Self {
            id,
            begin,
            end,
            tag,
            in_module: BTreeSet::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.in_module.len()
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.in_module.contains(&pos)
    }
}

/// Scan `program` for module boundaries and build the module table.
///
/// An empty program yields an empty table. A program with no boundaries
/// yields exactly one module spanning the whole program, tagged with
/// `default_tag`. A boundary instruction without a tag is a malformed
/// definition and aborts compilation.
pub fn compile_modules(
    program: &Program,
    inst_lib: &InstructionLibrary,
    default_tag: Tag,
) -> Result<Vec<Module>, VmError> {
    let mut modules: Vec<Module> = Vec::new();
    if program.is_empty() {
        return Ok(modules);
    }
    let mut dangling: Vec<usize> = Vec::new();
    for (pos, inst) in program.iter().enumerate() {
        if inst_lib.has_property(inst.op, InstProperty::Module) {
            // Close the previous module at this boundary.
            if let Some(last) = modules.last_mut() {
                last.end = pos;
            }
            let tag = inst
                .first_tag()
                .ok_or(VmError::MalformedModuleDefinition { pos })?;
            let id = modules.len();
            let begin = if pos + 1 < program.len() { pos + 1 } else { 0 };
            modules.push(Module::new(id, begin, usize::MAX, tag));
        } else if let Some(last) = modules.last_mut() {
            last.in_module.insert(pos);
        } else {
            dangling.push(pos);
        }
    }
    if modules.is_empty() {
        // No boundaries at all: one default module covering everything.
        modules.push(Module::new(0, 0, program.len(), default_tag));
    } else {
        // The last module inherits whatever precedes the first module's
        // body (circular wrap), stopping short of the first boundary.
        let first_begin = modules[0].begin;
        let end = if first_begin > 1 {
            first_begin - 1
        } else {
            program.len()
        };
        if let Some(last) = modules.last_mut() {
            last.end = end;
        }
    }
    // Dangling positions wrap around into the last module.
    if let Some(last) = modules.last_mut() {
        last.in_module.extend(dangling);
    }
    Ok(modules)
}
