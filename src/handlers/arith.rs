//! Binary and unary arithmetic/comparison opcodes: a thin dispatch into the
//! `OperatorDispatcher`'s type-indexed cells.

use crate::engine::Engine;
use crate::error::VmResult;
use crate::instruction::Instruction;

fn base(engine: &Engine) -> VmResult<usize> {
    Ok(engine.current_frame()?.slot_start)
}

pub fn op_binary(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (op, dst, left, right) = match instr {
        Instruction::Binary { op, dst, left, right } => (*op, *dst, *left, *right),
        _ => return Err(crate::error::VmError::internal("op_binary: wrong instruction")),
    };
    let base = base(engine)?;
    let lv = engine.regs().get(base + left as usize)?.clone();
    let rv = engine.regs().get(base + right as usize)?.clone();
    let result = engine.operators().binary(op, &lv, &rv, engine.heap_mut())?;
    engine.regs_mut().set(base + dst as usize, result)
}

pub fn op_unary(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (op, dst, src) = match instr {
        Instruction::Unary { op, dst, src } => (*op, *dst, *src),
        _ => return Err(crate::error::VmError::internal("op_unary: wrong instruction")),
    };
    let base = base(engine)?;
    let value = engine.regs().get(base + src as usize)?.clone();
    let result = engine.operators().unary(op, &value, engine.heap())?;
    engine.regs_mut().set(base + dst as usize, result)
}
