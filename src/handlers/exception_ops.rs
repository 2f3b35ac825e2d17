//! SETUP_TRY / POP_TRY / THROW: thin wrappers over the engine's exception
//! machinery.

use crate::engine::Engine;
use crate::error::VmResult;
use crate::instruction::Instruction;

pub fn op_setup_try(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let catch_ip = match instr {
        Instruction::SetupTry { catch_ip } => *catch_ip,
        _ => return Err(crate::error::VmError::internal("op_setup_try: wrong instruction")),
    };
    engine.setup_try(catch_ip)
}

pub fn op_pop_try(engine: &mut Engine, _instr: &Instruction) -> VmResult<()> {
    engine.pop_try()
}

pub fn op_throw(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let src = match instr {
        Instruction::Throw { src } => *src,
        _ => return Err(crate::error::VmError::internal("op_throw: wrong instruction")),
    };
    let base = engine.current_frame()?.slot_start;
    let value = engine.regs().get(base + src as usize)?.clone();
    engine.throw(value)
}
