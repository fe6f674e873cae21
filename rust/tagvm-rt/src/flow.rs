//! Pluggable flow control: per-construct open/close/break hooks.
//!
//! The stepper consults this registry at construct boundaries; the hooks
//! themselves are supplied by the driver that owns the instruction set.
//! Contract: `on_open` runs right after a flow frame is pushed; `on_close`
//! runs when the read head reaches a frame's `end` and decides pop versus
//! repeat (for `Call` and `Routine` it pops the owning call frame);
//! `on_break` pops the innermost matching or enclosing frame unconditionally.

use crate::error::VmError;
use crate::state::ExecutionState;
use std::collections::HashMap;
use std::fmt;

/// Kinds of nested control constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Basic,
    Loop,
    Routine,
    Call,
}

impl FlowKind {
    pub const ALL: [FlowKind; 4] = [
        FlowKind::Basic,
        FlowKind::Loop,
        FlowKind::Routine,
        FlowKind::Call,
    ];
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowKind::Basic => "BASIC",
            FlowKind::Loop => "LOOP",
            FlowKind::Routine => "ROUTINE",
            FlowKind::Call => "CALL",
        };
        f.write_str(name)
    }
}

pub type FlowHook = Box<dyn Fn(&mut ExecutionState)>;

/// Hook triple for one flow kind.
pub struct FlowControl {
    pub on_open: FlowHook,
    pub on_close: FlowHook,
    pub on_break: FlowHook,
}

impl FlowControl {
    pub fn noop() -> Self {
        Self {
            on_open: Box::new(|_| {}),
            on_close: Box::new(|_| {}),
            on_break: Box::new(|_| {}),
        }
    }
}

impl Default for FlowControl {
    fn default() -> Self {
        Self::noop()
    }
}

/// Flow-kind to hook-triple table. Defaults to no-op hooks for all kinds.
pub struct FlowControlRegistry {
    controls: HashMap<FlowKind, FlowControl>,
}

impl Default for FlowControlRegistry {
    fn default() -> Self {
        let mut controls = HashMap::new();
        for kind in FlowKind::ALL {
            controls.insert(kind, FlowControl::noop());
        }
        Self { controls }
    }
}

impl FlowControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with no kinds registered. Drivers that install a full set
    /// of controls themselves start from here; looking up a kind that was
    /// never installed is then a hard error.
    pub fn empty() -> Self {
        Self {
            controls: HashMap::new(),
        }
    }

    pub fn get(&self, kind: FlowKind) -> Result<&FlowControl, VmError> {
        self.controls
            .get(&kind)
            .ok_or(VmError::UnknownFlowType(kind))
    }

    pub fn set_control(&mut self, kind: FlowKind, control: FlowControl) {
        self.controls.insert(kind, control);
    }

    pub fn set_on_open<F>(&mut self, kind: FlowKind, hook: F)
    where
        F: Fn(&mut ExecutionState) + 'static,
    {
        self.controls.entry(kind).or_default().on_open = Box::new(hook);
    }

    pub fn set_on_close<F>(&mut self, kind: FlowKind, hook: F)
    where
        F: Fn(&mut ExecutionState) + 'static,
    {
        self.controls.entry(kind).or_default().on_close = Box::new(hook);
    }

    pub fn set_on_break<F>(&mut self, kind: FlowKind, hook: F)
    where
        F: Fn(&mut ExecutionState) + 'static,
    {
        self.controls.entry(kind).or_default().on_break = Box::new(hook);
    }
}
