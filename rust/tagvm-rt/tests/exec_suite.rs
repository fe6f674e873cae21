//! End-to-end stepping suite: module discovery, tag dispatch, and nested
//! call/flow control driven through a small recording instruction set.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use tagvm_core::{InstProperty, Instruction, InstructionLibrary, Program, Tag};
use tagvm_rt::{
    ExecutionState, ExecutionStepper, FlowControlRegistry, FlowFrame, FlowKind, Hardware,
    StepOutcome, VmError,
};

// Opcode ids used by every fixture program.
const NOP: usize = 0;
const MODULE_DEF: usize = 1;
const CALL: usize = 2;
const OPEN_LOOP: usize = 3;
const BREAK: usize = 4;
const FAULT: usize = 5;

fn test_lib() -> Arc<InstructionLibrary> {
    let mut lib = InstructionLibrary::new();
    lib.add_opcode("Nop", &[]);
    lib.add_opcode("ModuleDef", &[InstProperty::Module]);
    lib.add_opcode("Call", &[]);
    lib.add_opcode("OpenLoop", &[]);
    lib.add_opcode("Break", &[]);
    lib.add_opcode("Fault", &[]);
    Arc::new(lib)
}

/// Driver covering the handful of control opcodes the suite needs. Records
/// every executed instruction position.
#[derive(Default)]
struct TestHardware {
    executed: Vec<usize>,
}

impl Hardware for TestHardware {
    fn execute_inst(
        &mut self,
        stepper: &mut ExecutionStepper,
        state: &mut ExecutionState,
        inst: Instruction,
    ) -> Result<(), VmError> {
        let ip = state.current_flow().map(|flow| flow.ip).unwrap_or(0);
        self.executed.push(ip);
        match inst.op {
            CALL => {
                let tag = inst
                    .first_tag()
                    .ok_or_else(|| VmError::Dispatch("Call without a tag".into()))?;
                let Some(&target) = stepper.find_module_match(tag, 1).first() else {
                    return Ok(());
                };
                // resume after the call site once the callee returns
                if let Some(flow) = state.current_flow_mut() {
                    flow.ip += 1;
                }
                stepper.call_module(target, state)?;
            }
            OPEN_LOOP => {
                // args are the loop body's [begin, end)
                let (begin, end) = (inst.args[0] as usize, inst.args[1] as usize);
                let module_id = state.current_flow().map(|flow| flow.module_id).unwrap_or(0);
                if let Some(flow) = state.current_flow_mut() {
                    flow.ip = end;
                }
                stepper.open_flow(
                    state,
                    FlowFrame::new(FlowKind::Loop, module_id, begin, begin, end),
                )?;
            }
            BREAK => {
                stepper.break_flow(state, FlowKind::Loop)?;
            }
            FAULT => {
                return Err(VmError::Dispatch("fault instruction".into()));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Hooks the suite's programs rely on: calls pop their frame on close,
/// loops repeat on close and pop on break.
fn install_default_hooks(stepper: &mut ExecutionStepper) {
    let registry = stepper.flow_registry_mut();
    registry.set_on_close(FlowKind::Call, |state: &mut ExecutionState| {
        state.pop_call();
    });
    registry.set_on_close(FlowKind::Routine, |state: &mut ExecutionState| {
        state.pop_call();
    });
    registry.set_on_close(FlowKind::Loop, |state: &mut ExecutionState| {
        if let Some(flow) = state.current_flow_mut() {
            flow.ip = flow.begin;
        }
    });
    registry.set_on_break(FlowKind::Loop, |state: &mut ExecutionState| {
        state.pop_flow();
    });
}

fn make_stepper(program: Program) -> ExecutionStepper {
    let mut stepper = ExecutionStepper::new(test_lib());
    install_default_hooks(&mut stepper);
    stepper.set_program(program).expect("program should compile");
    stepper
}

/// Step until the thread goes idle, with a safety bound.
fn run_to_halt(
    stepper: &mut ExecutionStepper,
    hardware: &mut TestHardware,
    state: &mut ExecutionState,
) {
    for _ in 0..256 {
        match stepper.single_step(hardware, state).expect("step should succeed") {
            StepOutcome::Halted => return,
            StepOutcome::Executed => {}
        }
    }
    panic!("thread did not halt within 256 steps");
}

fn module_def(tag: u16) -> Instruction {
    Instruction::with_tag(MODULE_DEF, Tag::new(tag))
}

#[test]
fn test_sequential_execution_to_return() {
    // one module: marker at 0, body [1, 4)
    let mut program = Program::new();
    program.push(module_def(1));
    for _ in 0..3 {
        program.push(Instruction::plain(NOP));
    }
    let mut stepper = make_stepper(program);
    let mut hardware = TestHardware::default();
    let mut state = ExecutionState::new();
    stepper.init_thread(&mut state, 0).unwrap();
    run_to_halt(&mut stepper, &mut hardware, &mut state);
    assert_eq!(hardware.executed, vec![1, 2, 3]);
    assert!(state.is_idle());
    // a retired thread keeps signalling halted
    assert_eq!(
        stepper.single_step(&mut hardware, &mut state).unwrap(),
        StepOutcome::Halted
    );
}

#[test]
fn test_call_and_return_via_tag_dispatch() {
    // module 0 calls module 1 by tag, then finishes its own body
    let mut program = Program::new();
    program.push(module_def(0b0001)); // 0: module 0
    program.push(Instruction::with_tag(CALL, Tag::new(0b1000))); // 1
    program.push(Instruction::plain(NOP)); // 2
    program.push(module_def(0b1000)); // 3: module 1
    program.push(Instruction::plain(NOP)); // 4
    program.push(Instruction::plain(NOP)); // 5
    let mut stepper = make_stepper(program);
    let mut hardware = TestHardware::default();
    let mut state = ExecutionState::new();
    stepper.init_thread(&mut state, 0).unwrap();

    // step the call site: a second call frame appears
    stepper.single_step(&mut hardware, &mut state).unwrap();
    assert_eq!(state.call_stack.len(), 2);
    let callee = state.current_flow().unwrap();
    assert_eq!(callee.kind, FlowKind::Call);
    assert_eq!(callee.module_id, 1);
    assert_eq!(callee.ip, 4);

    run_to_halt(&mut stepper, &mut hardware, &mut state);
    // call site, callee body, then the caller's remaining body
    assert_eq!(hardware.executed, vec![1, 4, 5, 2]);
}

#[test]
fn test_call_open_hook_runs() {
    let opened = Rc::new(Cell::new(0usize));
    let mut program = Program::new();
    program.push(module_def(0b0001));
    program.push(Instruction::with_tag(CALL, Tag::new(0b0001)));
    let mut stepper = make_stepper(program);
    let counter = Rc::clone(&opened);
    stepper
        .flow_registry_mut()
        .set_on_open(FlowKind::Call, move |_state: &mut ExecutionState| {
            counter.set(counter.get() + 1);
        });
    let mut hardware = TestHardware::default();
    let mut state = ExecutionState::new();
    stepper.init_thread(&mut state, 0).unwrap();
    stepper.single_step(&mut hardware, &mut state).unwrap();
    assert_eq!(opened.get(), 1);
}

#[test]
fn test_loop_repeats_and_breaks() {
    // module body: OpenLoop over [2, 4), loop body = nop, break-on-second-pass
    // pass 1 executes 2 and 3; close resets to 2; pass 2 hits Break at 3.
    let mut program = Program::new();
    program.push(module_def(1)); // 0
    program.push(Instruction::new(OPEN_LOOP, vec![], vec![2, 4])); // 1
    program.push(Instruction::plain(NOP)); // 2
    program.push(Instruction::plain(BREAK)); // 3  (no-op outside a loop)
    program.push(Instruction::plain(NOP)); // 4
    let mut stepper = make_stepper(program);

    // break only on the second visit to position 3
    let visits = Rc::new(Cell::new(0usize));
    let seen = Rc::clone(&visits);
    stepper
        .flow_registry_mut()
        .set_on_break(FlowKind::Loop, move |state: &mut ExecutionState| {
            seen.set(seen.get() + 1);
            if seen.get() >= 2 {
                state.pop_flow();
            }
        });

    let mut hardware = TestHardware::default();
    let mut state = ExecutionState::new();
    stepper.init_thread(&mut state, 0).unwrap();
    run_to_halt(&mut stepper, &mut hardware, &mut state);
    // open, body, break(stay), close->repeat, body, break(pop), rest of module
    assert_eq!(hardware.executed, vec![1, 2, 3, 2, 3, 4]);
    assert_eq!(visits.get(), 2);
}

#[test]
fn test_wrapped_module_executes_circularly() {
    // size 4, marker at 2: module body wraps as [3, 4) then [0, 2)
    let mut program = Program::new();
    program.push(Instruction::plain(NOP)); // 0 (dangling)
    program.push(Instruction::plain(NOP)); // 1 (dangling)
    program.push(module_def(6)); // 2
    program.push(Instruction::plain(NOP)); // 3
    let mut stepper = make_stepper(program);
    assert_eq!(stepper.modules()[0].begin, 3);
    assert_eq!(stepper.modules()[0].end, 2);

    let mut hardware = TestHardware::default();
    let mut state = ExecutionState::new();
    stepper.init_thread(&mut state, 0).unwrap();
    run_to_halt(&mut stepper, &mut hardware, &mut state);
    assert_eq!(hardware.executed, vec![3, 0, 1]);
}

#[test]
fn test_dispatch_error_leaves_state_untouched() {
    let mut program = Program::new();
    program.push(module_def(1));
    program.push(Instruction::plain(FAULT));
    program.push(Instruction::plain(NOP));
    let mut stepper = make_stepper(program);
    let mut hardware = TestHardware::default();
    let mut state = ExecutionState::new();
    stepper.init_thread(&mut state, 0).unwrap();
    let before = state.clone();
    let err = stepper.single_step(&mut hardware, &mut state).unwrap_err();
    assert!(matches!(err, VmError::Dispatch(_)));
    assert_eq!(state.call_stack.len(), before.call_stack.len());
    assert_eq!(state.current_flow(), before.current_flow());
}

#[test]
fn test_exhausted_call_frame_is_popped() {
    let mut program = Program::new();
    program.push(module_def(1));
    program.push(Instruction::plain(NOP));
    let mut stepper = make_stepper(program);
    let mut state = ExecutionState::new();
    stepper.init_thread(&mut state, 0).unwrap();
    // strip the flow stack: the call has nothing left to run
    state.current_call_mut().unwrap().flow_stack.clear();
    let mut hardware = TestHardware::default();
    assert_eq!(
        stepper.single_step(&mut hardware, &mut state).unwrap(),
        StepOutcome::Executed
    );
    assert!(state.is_idle());
}

#[test]
fn test_unregistered_flow_kind_is_an_error() {
    let mut program = Program::new();
    program.push(module_def(1));
    program.push(Instruction::plain(NOP));
    let mut stepper = make_stepper(program);
    *stepper.flow_registry_mut() = FlowControlRegistry::empty();
    let mut state = ExecutionState::new();
    stepper.init_thread(&mut state, 0).unwrap();
    // run the body out, then the close consults the missing CALL control
    let mut hardware = TestHardware::default();
    stepper.single_step(&mut hardware, &mut state).unwrap();
    let err = stepper.single_step(&mut hardware, &mut state).unwrap_err();
    assert!(matches!(err, VmError::UnknownFlowType(FlowKind::Call)));
}

#[test]
fn test_program_replacement_redirects_dispatch() {
    let mut stepper = make_stepper({
        let mut program = Program::new();
        program.push(module_def(0b0011));
        program.push(Instruction::plain(NOP));
        program
    });
    assert_eq!(stepper.find_module_match(Tag::new(0b0011), 1), vec![0]);

    // same tag now belongs to the second module of the new program
    let mut program = Program::new();
    program.push(module_def(0b1100));
    program.push(Instruction::plain(NOP));
    program.push(module_def(0b0011));
    program.push(Instruction::plain(NOP));
    stepper.set_program(program).unwrap();
    assert_eq!(stepper.num_modules(), 2);
    assert_eq!(stepper.find_module_match(Tag::new(0b0011), 1), vec![1]);
    // near-miss tags resolve to the closest module
    assert_eq!(
        stepper.find_module_match(Tag::new(0b0011).toggle(0), 1),
        vec![1]
    );
}

#[test]
fn test_default_tag_applies_to_markerless_program() {
    let mut stepper = ExecutionStepper::new(test_lib());
    install_default_hooks(&mut stepper);
    stepper.set_default_tag(Tag::new(0xABCD));
    let program: Program = (0..3).map(|_| Instruction::plain(NOP)).collect();
    stepper.set_program(program).unwrap();
    assert_eq!(stepper.num_modules(), 1);
    assert_eq!(stepper.modules()[0].tag, Tag::new(0xABCD));
    assert_eq!(stepper.find_module_match(Tag::new(0xABCD), 1), vec![0]);
}
