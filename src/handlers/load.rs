//! MOVE and the LOAD_* family.

use crate::engine::Engine;
use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::value::Value;

fn base(engine: &Engine) -> VmResult<usize> {
    Ok(engine.current_frame()?.slot_start)
}

pub fn op_move(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, src) = match instr {
        Instruction::Move { dst, src } => (*dst, *src),
        _ => return Err(VmError::internal("op_move: wrong instruction")),
    };
    let base = base(engine)?;
    let value = engine.regs().get(base + src as usize)?.clone();
    engine.regs_mut().set(base + dst as usize, value)
}

pub fn op_load_const(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, k) = match instr {
        Instruction::LoadConst { dst, k } => (*dst, *k),
        _ => return Err(VmError::internal("op_load_const: wrong instruction")),
    };
    let base = base(engine)?;
    let proto = engine.heap().closure(engine.current_frame()?.closure)?.proto;
    let value = engine.heap().prototype(proto)?.constants[k as usize].clone();
    engine.regs_mut().set(base + dst as usize, value)
}

pub fn op_load_int(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, imm) = match instr {
        Instruction::LoadInt { dst, imm } => (*dst, *imm),
        _ => return Err(VmError::internal("op_load_int: wrong instruction")),
    };
    let base = base(engine)?;
    engine.regs_mut().set(base + dst as usize, Value::Int(imm))
}

pub fn op_load_null(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let dst = match instr {
        Instruction::LoadNull { dst } => *dst,
        _ => return Err(VmError::internal("op_load_null: wrong instruction")),
    };
    let base = base(engine)?;
    engine.regs_mut().set(base + dst as usize, Value::Null)
}

pub fn op_load_true(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let dst = match instr {
        Instruction::LoadTrue { dst } => *dst,
        _ => return Err(VmError::internal("op_load_true: wrong instruction")),
    };
    let base = base(engine)?;
    engine.regs_mut().set(base + dst as usize, Value::Bool(true))
}

pub fn op_load_false(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let dst = match instr {
        Instruction::LoadFalse { dst } => *dst,
        _ => return Err(VmError::internal("op_load_false: wrong instruction")),
    };
    let base = base(engine)?;
    engine.regs_mut().set(base + dst as usize, Value::Bool(false))
}
