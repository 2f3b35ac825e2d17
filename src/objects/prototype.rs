//! Compiled function bodies.

use crate::heap::Handle;
use crate::instruction::Instruction;
use crate::value::Value;
use hashbrown::HashMap;

/// Describes how a closure's upvalue slot is populated when a `CLOSURE`
/// instruction runs: either by capturing a local register of the enclosing
/// frame, or by copying an upvalue already held by the enclosing closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpvalueDesc {
    ParentLocal(u16),
    ParentUpvalue(u16),
}

/// The immutable compiled body of a function: code, constants, upvalue
/// descriptors and register count. Produced by the bytecode text loader.
#[derive(Debug, Clone)]
pub struct Prototype {
    pub name: String,
    pub source_name: String,
    pub code: Vec<Instruction>,
    pub constants: Vec<Value>,
    pub upvalue_descs: Vec<UpvalueDesc>,
    pub num_registers: u16,
    pub num_upvalues: u16,
    /// Declared parameter count, used for strict arity checking on CALL.
    pub num_params: u16,
    /// Resolved label name -> instruction offset. Retained for diagnostics
    /// after loading even though jump instructions carry resolved offsets.
    pub labels: HashMap<String, u32>,
}

impl Prototype {
    pub fn trace(&self, out: &mut Vec<Handle>) {
        for value in &self.constants {
            crate::heap::trace_value(value, out);
        }
    }
}
