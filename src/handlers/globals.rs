//! Module-scoped globals, keyed by a name constant resolved from the
//! current frame's prototype.

use crate::engine::Engine;
use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::value::Value;

fn const_name(engine: &Engine, name_k: u16) -> VmResult<String> {
    let frame = engine.current_frame()?;
    let proto = engine.heap().closure(frame.closure)?.proto;
    match &engine.heap().prototype(proto)?.constants[name_k as usize] {
        Value::String(s) => Ok(s.to_string()),
        other => Err(VmError::internal(format!("name constant is not a string: {other:?}"))),
    }
}

pub fn op_get_global(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, name_k) = match instr {
        Instruction::GetGlobal { dst, name_k } => (*dst, *name_k),
        _ => return Err(VmError::internal("op_get_global: wrong instruction")),
    };
    let name = const_name(engine, name_k)?;
    let module = engine.current_frame()?.module;
    let value = engine
        .heap()
        .module(module)?
        .globals
        .get(&name)
        .cloned()
        .ok_or_else(|| VmError::name_error(name.clone()))?;
    let base = engine.current_frame()?.slot_start;
    engine.regs_mut().set(base + dst as usize, value)
}

pub fn op_set_global(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (src, name_k) = match instr {
        Instruction::SetGlobal { src, name_k } => (*src, *name_k),
        _ => return Err(VmError::internal("op_set_global: wrong instruction")),
    };
    let name = const_name(engine, name_k)?;
    let base = engine.current_frame()?.slot_start;
    let value = engine.regs().get(base + src as usize)?.clone();
    let module = engine.current_frame()?.module;
    engine.heap_mut().module_mut(module)?.globals.insert(name, value);
    Ok(())
}
