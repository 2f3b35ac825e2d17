//! Jumps, CALL and RETURN. HALT is intercepted directly by `Engine::step`
//! and never reaches this table.

use crate::engine::{CallDest, Engine};
use crate::error::VmResult;
use crate::instruction::Instruction;

pub fn op_jump(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let offset = match instr {
        Instruction::Jump { offset } => *offset,
        _ => return Err(crate::error::VmError::internal("op_jump: wrong instruction")),
    };
    apply_offset(engine, offset)
}

pub fn op_jump_if_false(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (reg, offset) = match instr {
        Instruction::JumpIfFalse { reg, offset } => (*reg, *offset),
        _ => return Err(crate::error::VmError::internal("op_jump_if_false: wrong instruction")),
    };
    let base = engine.current_frame()?.slot_start;
    let value = engine.regs().get(base + reg as usize)?.clone();
    if !value.truthy(engine.heap()) {
        apply_offset(engine, offset)?;
    }
    Ok(())
}

pub fn op_jump_if_true(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (reg, offset) = match instr {
        Instruction::JumpIfTrue { reg, offset } => (*reg, *offset),
        _ => return Err(crate::error::VmError::internal("op_jump_if_true: wrong instruction")),
    };
    let base = engine.current_frame()?.slot_start;
    let value = engine.regs().get(base + reg as usize)?.clone();
    if value.truthy(engine.heap()) {
        apply_offset(engine, offset)?;
    }
    Ok(())
}

fn apply_offset(engine: &mut Engine, offset: i32) -> VmResult<()> {
    let frame = engine.current_frame()?;
    let new_ip = frame.ip as i64 + offset as i64;
    if new_ip < 0 {
        return Err(crate::error::VmError::internal("jump target before start of function"));
    }
    engine.set_ip(new_ip as usize)
}

pub fn op_call(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, first_arg, argc) = match instr {
        Instruction::Call { dst, first_arg, argc } => (*dst, *first_arg, *argc),
        _ => return Err(crate::error::VmError::internal("op_call: wrong instruction")),
    };
    let base = engine.current_frame()?.slot_start;
    let callee_reg = base + first_arg as usize - 1;
    let callee = engine.regs().get(callee_reg)?.clone();
    let mut args = Vec::with_capacity(argc as usize);
    for i in 0..argc as usize {
        args.push(engine.regs().get(base + first_arg as usize + i)?.clone());
    }
    engine.invoke(callee, args, CallDest::Register(dst))
}

pub fn op_return(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let src = match instr {
        Instruction::Return { src } => *src,
        _ => return Err(crate::error::VmError::internal("op_return: wrong instruction")),
    };
    let frame = engine.current_frame()?;
    let base = frame.slot_start;
    let ret_reg = frame.ret_reg;
    let value = engine.regs().get(base + src as usize)?.clone();
    engine.close_upvalues_from(base);
    engine.pop_frame()?;
    engine.regs_mut().truncate(base);
    match ret_reg {
        Some(reg) => {
            let caller_base = engine.current_frame()?.slot_start;
            engine.regs_mut().set(caller_base + reg as usize, value)
        }
        None => {
            engine.set_pending_result(value);
            Ok(())
        }
    }
}
