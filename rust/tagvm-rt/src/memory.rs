//! Per-call memory model: working/input/output buffers plus one global
//! buffer shared by every call running on the same stepper.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Sparse numeric memory buffer. Ordered so diagnostic dumps are stable.
pub type MemBuffer = std::collections::BTreeMap<i32, f64>;

/// Memory owned by a single call frame.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    pub working: MemBuffer,
    pub input: MemBuffer,
    pub output: MemBuffer,
}

/// Factory for call-frame memory. Holds the global buffer, which outlives
/// any individual call.
#[derive(Debug, Default)]
pub struct MemoryModel {
    global: MemBuffer,
}

impl MemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_memory_state(
        &self,
        working: MemBuffer,
        input: MemBuffer,
        output: MemBuffer,
    ) -> MemoryState {
        MemoryState {
            working,
            input,
            output,
        }
    }

    /// Memory state with all three buffers empty.
    pub fn fresh_state(&self) -> MemoryState {
        MemoryState::default()
    }

    pub fn global(&self) -> &MemBuffer {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut MemBuffer {
        &mut self.global
    }

    /// Three-line dump, one line per buffer, newline-terminated.
    pub fn format_memory_state(&self, state: &MemoryState) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Working memory: {}", format_buffer(&state.working));
        let _ = writeln!(out, "Input memory: {}", format_buffer(&state.input));
        let _ = writeln!(out, "Output memory: {}", format_buffer(&state.output));
        out
    }
}

fn format_buffer(buf: &MemBuffer) -> String {
    let mut out = String::from("{");
    for (i, (key, value)) in buf.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}:{}", key, value);
    }
    out.push('}');
    out
}
