//! Per-thread execution state: a stack of call frames, each owning a stack
//! of flow frames. A thread is idle exactly when its call stack is empty.

use crate::flow::FlowKind;
use crate::memory::MemoryState;

/// One nested control construct's read head.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowFrame {
    pub kind: FlowKind,
    /// Module being executed.
    pub module_id: usize,
    /// Instruction pointer.
    pub ip: usize,
    pub begin: usize,
    pub end: usize,
}

impl FlowFrame {
    pub fn new(kind: FlowKind, module_id: usize, ip: usize, begin: usize, end: usize) -> Self {
        Self {
            kind,
            module_id,
            ip,
            begin,
            end,
        }
    }
}

/// One procedure-call nesting level.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub memory: MemoryState,
    pub flow_stack: Vec<FlowFrame>,
}

impl CallFrame {
    pub fn new(memory: MemoryState) -> Self {
        Self {
            memory,
            flow_stack: Vec::new(),
        }
    }
}

/// Mutable state owned by exactly one logical thread.
#[derive(Debug, Default, Clone)]
pub struct ExecutionState {
    pub call_stack: Vec<CallFrame>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.call_stack.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.call_stack.is_empty()
    }

    pub fn current_call(&self) -> Option<&CallFrame> {
        self.call_stack.last()
    }

    pub fn current_call_mut(&mut self) -> Option<&mut CallFrame> {
        self.call_stack.last_mut()
    }

    /// Innermost flow frame of the innermost call frame.
    pub fn current_flow(&self) -> Option<&FlowFrame> {
        self.call_stack.last()?.flow_stack.last()
    }

    pub fn current_flow_mut(&mut self) -> Option<&mut FlowFrame> {
        self.call_stack.last_mut()?.flow_stack.last_mut()
    }

    /// Push a flow frame onto the innermost call frame. No-op on an idle
    /// thread (there is no call to attach the flow to).
    pub fn push_flow(&mut self, frame: FlowFrame) {
        if let Some(call) = self.call_stack.last_mut() {
            call.flow_stack.push(frame);
        }
    }

    pub fn pop_flow(&mut self) -> Option<FlowFrame> {
        self.call_stack.last_mut()?.flow_stack.pop()
    }

    pub fn pop_call(&mut self) -> Option<CallFrame> {
        self.call_stack.pop()
    }
}

/// Thread-object contract: anything owning an [`ExecutionState`] the
/// stepper may (re)initialize. Bare states stand in for full thread objects
/// in tests and simple drivers.
pub trait Thread {
    fn execution_state_mut(&mut self) -> &mut ExecutionState;
}

impl Thread for ExecutionState {
    fn execution_state_mut(&mut self) -> &mut ExecutionState {
        self
    }
}
