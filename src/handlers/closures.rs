//! Upvalue read/write and closure construction.

use crate::engine::Engine;
use crate::error::VmResult;
use crate::heap::Object;
use crate::instruction::Instruction;
use crate::objects::{Closure, UpvalueDesc, UpvalueState};
use crate::value::Value;

pub fn op_get_upvalue(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, index) = match instr {
        Instruction::GetUpvalue { dst, index } => (*dst, *index),
        _ => return Err(crate::error::VmError::internal("op_get_upvalue: wrong instruction")),
    };
    let frame = engine.current_frame()?;
    let base = frame.slot_start;
    let upvalue_handle = engine.heap().closure(frame.closure)?.upvalues[index as usize];
    let value = match &engine.heap().upvalue(upvalue_handle)?.state {
        UpvalueState::Open { slot_index } => engine.regs().get(*slot_index)?.clone(),
        UpvalueState::Closed { value } => value.clone(),
    };
    engine.regs_mut().set(base + dst as usize, value)
}

pub fn op_set_upvalue(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (src, index) = match instr {
        Instruction::SetUpvalue { src, index } => (*src, *index),
        _ => return Err(crate::error::VmError::internal("op_set_upvalue: wrong instruction")),
    };
    let frame = engine.current_frame()?;
    let base = frame.slot_start;
    let value = engine.regs().get(base + src as usize)?.clone();
    let upvalue_handle = engine.heap().closure(frame.closure)?.upvalues[index as usize];
    let slot_index = match engine.heap().upvalue(upvalue_handle)?.state {
        UpvalueState::Open { slot_index } => Some(slot_index),
        UpvalueState::Closed { .. } => None,
    };
    match slot_index {
        Some(slot_index) => engine.regs_mut().set(slot_index, value),
        None => {
            engine.heap_mut().upvalue_mut(upvalue_handle)?.state = UpvalueState::Closed { value };
            Ok(())
        }
    }
}

pub fn op_closure(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, proto_k, descs) = match instr {
        Instruction::Closure { dst, proto_k, upvalues } => (*dst, *proto_k, upvalues.clone()),
        _ => return Err(crate::error::VmError::internal("op_closure: wrong instruction")),
    };
    let frame = engine.current_frame()?.clone();
    let base = frame.slot_start;
    let proto = match &engine.heap().prototype(engine.heap().closure(frame.closure)?.proto)?.constants[proto_k as usize] {
        Value::Prototype(h) => *h,
        other => return Err(crate::error::VmError::internal(format!("constant is not a Prototype: {other:?}"))),
    };

    // Building the upvalue vector can itself register new heap objects
    // (capture_upvalue) ahead of the closure's own registration; disable
    // collection across the whole sequence so a collect() never runs with
    // some upvalues live only in a local Vec and not yet reachable from any
    // root.
    let mut engine = engine.disable_gc_scoped();
    let mut upvalues = Vec::with_capacity(descs.len());
    for desc in descs {
        let handle = match desc {
            UpvalueDesc::ParentLocal(slot) => engine.capture_upvalue(base + slot as usize)?,
            UpvalueDesc::ParentUpvalue(index) => engine.heap().closure(frame.closure)?.upvalues[index as usize],
        };
        upvalues.push(handle);
    }

    let closure = Closure { proto, upvalues, module: frame.module };
    let handle = engine.heap_mut().register(Object::Closure(closure));
    engine.regs_mut().set(base + dst as usize, Value::Function(handle))
}

pub fn op_close_upvalues(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let from_slot = match instr {
        Instruction::CloseUpvalues { from_slot } => *from_slot,
        _ => return Err(crate::error::VmError::internal("op_close_upvalues: wrong instruction")),
    };
    let base = engine.current_frame()?.slot_start;
    engine.close_upvalues_from(base + from_slot as usize);
    Ok(())
}
