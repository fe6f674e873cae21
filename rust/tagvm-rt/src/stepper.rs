//! Execution stepper: owns the program, module table, tag index, and flow
//! registry, and exposes the thread-init / single-step primitives a
//! scheduler drives.

use crate::error::VmError;
use crate::flow::{FlowControlRegistry, FlowKind};
use crate::matchbin::{TagIndex, TagMatcher};
use crate::memory::MemoryModel;
use crate::modules::{compile_modules, Module};
use crate::state::{CallFrame, ExecutionState, FlowFrame, Thread};
use std::fmt::Write;
use std::sync::Arc;
use tagvm_core::{Instruction, InstructionLibrary, Program, Tag};

/// Result of one step. Stepping an idle thread is a signal, not an error,
/// so the external scheduler can retire the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Executed,
    Halted,
}

/// External instruction-execution contract.
///
/// The stepper fetches and hands over one instruction per step; what the
/// instruction *does* is entirely the driver's business. Implementations may
/// call back into the stepper (resolve a module, push a call frame) and may
/// reposition the read head; the stepper only advances the instruction
/// pointer when the dispatch left it where it was.
pub trait Hardware {
    fn execute_inst(
        &mut self,
        stepper: &mut ExecutionStepper,
        state: &mut ExecutionState,
        inst: Instruction,
    ) -> Result<(), VmError>;
}

/// The control-flow execution core of one virtual machine.
///
/// Shared read-mostly by every thread stepping against it; replacing the
/// program must be externally serialized against in-flight steps.
pub struct ExecutionStepper {
    inst_lib: Arc<InstructionLibrary>,
    flow: FlowControlRegistry,
    memory_model: MemoryModel,
    program: Program,
    modules: Vec<Module>,
    default_tag: Tag,
    index: TagIndex,
}

impl ExecutionStepper {
    pub fn new(inst_lib: Arc<InstructionLibrary>) -> Self {
        Self {
            inst_lib,
            flow: FlowControlRegistry::default(),
            memory_model: MemoryModel::new(),
            program: Program::new(),
            modules: Vec::new(),
            default_tag: Tag::default(),
            index: TagIndex::default(),
        }
    }

    /// Stepper with a caller-supplied approximate matcher.
    pub fn with_matcher(inst_lib: Arc<InstructionLibrary>, matcher: Box<dyn TagMatcher>) -> Self {
        let mut stepper = Self::new(inst_lib);
        stepper.index = TagIndex::new(matcher);
        stepper
    }

    /// Replace the program and recompile the module table. The tag index is
    /// invalidated even when compilation fails; a failed compile leaves the
    /// module table empty rather than stale.
    pub fn set_program(&mut self, program: Program) -> Result<(), VmError> {
        self.program = program;
        self.update_modules()
    }

    fn update_modules(&mut self) -> Result<(), VmError> {
        self.index.mark_dirty();
        self.modules.clear();
        self.modules = compile_modules(&self.program, &self.inst_lib, self.default_tag)?;
        Ok(())
    }

    /// Tag given to the synthesized module of a marker-less program. Takes
    /// effect at the next program compile.
    pub fn set_default_tag(&mut self, tag: Tag) {
        self.default_tag = tag;
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn num_modules(&self) -> usize {
        self.modules.len()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn instruction_library(&self) -> &InstructionLibrary {
        &self.inst_lib
    }

    pub fn memory_model(&self) -> &MemoryModel {
        &self.memory_model
    }

    pub fn memory_model_mut(&mut self) -> &mut MemoryModel {
        &mut self.memory_model
    }

    pub fn flow_registry(&self) -> &FlowControlRegistry {
        &self.flow
    }

    pub fn flow_registry_mut(&mut self) -> &mut FlowControlRegistry {
        &mut self.flow
    }

    /// Best-`n` module ids for `tag`, rebuilding the index if the module
    /// table changed since the last query.
    pub fn find_module_match(&mut self, tag: Tag, n: usize) -> Vec<usize> {
        self.index.resolve(&self.modules, tag, n)
    }

    /// Seed a thread to run `module_id` from the top: one call frame with
    /// fresh memory, one CALL flow frame over the module's body. An invalid
    /// id fails up front and leaves the thread's prior state untouched.
    pub fn init_thread<T: Thread>(&mut self, thread: &mut T, module_id: usize) -> Result<(), VmError> {
        let Some(module) = self.modules.get(module_id) else {
            return Err(VmError::InvalidModuleId {
                id: module_id,
                num_modules: self.modules.len(),
            });
        };
        let frame = FlowFrame::new(
            FlowKind::Call,
            module_id,
            module.begin,
            module.begin,
            module.end,
        );
        let state = thread.execution_state_mut();
        state.clear();
        let mut call = CallFrame::new(self.memory_model.fresh_state());
        call.flow_stack.push(frame);
        state.call_stack.push(call);
        Ok(())
    }

    /// Push a fresh call frame running `module_id`, invoking the CALL
    /// open hook. Used by CALL-opcode instructions in the driver.
    pub fn call_module(
        &mut self,
        module_id: usize,
        state: &mut ExecutionState,
    ) -> Result<(), VmError> {
        let Some(module) = self.modules.get(module_id) else {
            return Err(VmError::InvalidModuleId {
                id: module_id,
                num_modules: self.modules.len(),
            });
        };
        let frame = FlowFrame::new(
            FlowKind::Call,
            module_id,
            module.begin,
            module.begin,
            module.end,
        );
        state.call_stack.push(CallFrame::new(self.memory_model.fresh_state()));
        self.open_flow(state, frame)
    }

    /// Push `frame` onto the innermost call frame and run its kind's open
    /// hook. The registry is consulted before any mutation.
    pub fn open_flow(&self, state: &mut ExecutionState, frame: FlowFrame) -> Result<(), VmError> {
        let control = self.flow.get(frame.kind)?;
        state.push_flow(frame);
        (control.on_open)(state);
        Ok(())
    }

    /// Run `kind`'s break hook against `state`.
    pub fn break_flow(&self, state: &mut ExecutionState, kind: FlowKind) -> Result<(), VmError> {
        let control = self.flow.get(kind)?;
        (control.on_break)(state);
        Ok(())
    }

    /// Execute at most one instruction of `state`.
    ///
    /// At a flow frame's `end` the kind's close hook runs instead of an
    /// instruction. A dispatch error propagates with the core's state
    /// exactly as it was before the step; nothing here mutates ahead of
    /// the dispatch.
    pub fn single_step<H: Hardware>(
        &mut self,
        hardware: &mut H,
        state: &mut ExecutionState,
    ) -> Result<StepOutcome, VmError> {
        if state.is_idle() {
            return Ok(StepOutcome::Halted);
        }
        let program_len = self.program.len();
        let Some(flow) = state.current_flow() else {
            // call frame with nothing left to run
            state.pop_call();
            return Ok(StepOutcome::Executed);
        };
        let (kind, ip) = (flow.kind, flow.ip);
        if flow_done(flow) {
            let control = self.flow.get(kind)?;
            (control.on_close)(state);
            return Ok(StepOutcome::Executed);
        }
        let Some(inst) = self.program.get(ip).cloned() else {
            // read head ran off the program; treat like reaching the end
            let control = self.flow.get(kind)?;
            (control.on_close)(state);
            return Ok(StepOutcome::Executed);
        };
        let call_depth = state.call_stack.len();
        let flow_depth = state.current_call().map_or(0, |call| call.flow_stack.len());
        hardware.execute_inst(self, state, inst)?;
        // Advance unless the dispatch or a hook moved the read head.
        let undisturbed = state.call_stack.len() == call_depth
            && state.current_call().map(|call| call.flow_stack.len()) == Some(flow_depth)
            && state.current_flow().map(|flow| flow.ip) == Some(ip);
        if undisturbed {
            if let Some(flow) = state.current_flow_mut() {
                flow.ip += 1;
                // wrapped frames continue at position 0 (circular program)
                if flow.end < flow.begin && flow.ip >= program_len {
                    flow.ip = 0;
                }
            }
        }
        Ok(StepOutcome::Executed)
    }

    /// `Modules: [{id:I, begin:B, end:E, tag:T},...]`
    pub fn format_modules(&self) -> String {
        let mut out = String::from("Modules: [");
        for (i, module) in self.modules.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(
                out,
                "{{id:{}, begin:{}, end:{}, tag:{}}}",
                module.id, module.begin, module.end, module.tag
            );
        }
        out.push(']');
        out
    }

    /// Call-stack dump, innermost call first, one `Call: {...}` line per
    /// frame followed by its memory dump.
    pub fn format_execution_state(&self, state: &ExecutionState) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Call stack ({}):", state.call_stack.len());
        out.push_str("------ TOP ------\n");
        for call in state.call_stack.iter().rev() {
            if let Some(flow) = call.flow_stack.last() {
                let _ = writeln!(
                    out,
                    "Call: {{mp:{}, ip:{}, flow-begin:{}, flow-end:{}, flow-type:{}}}",
                    flow.module_id, flow.ip, flow.begin, flow.end, flow.kind
                );
            }
            out.push_str(&self.memory_model.format_memory_state(&call.memory));
            out.push_str("---\n");
        }
        out.push_str("-----------------");
        out
    }
}

/// Has this frame's read head reached its end?
fn flow_done(flow: &FlowFrame) -> bool {
    if flow.begin <= flow.end {
        flow.ip >= flow.end
    } else {
        // wrapped frame: body is [begin, len) then [0, end)
        flow.ip >= flow.end && flow.ip < flow.begin
    }
}
