//! Opcode dispatch: one handler function per opcode, reached through an
//! `OpCode`-indexed array of function pointers (the same jump-table idiom
//! the engine's handler table always used, just now with pre-decoded
//! operand enums instead of raw byte offsets).

mod arith;
mod class_ops;
mod closures;
mod container;
mod control;
mod exception_ops;
mod globals;
mod load;
mod module_ops;

use crate::engine::Engine;
use crate::error::VmResult;
use crate::instruction::Instruction;
use crate::opcode::{NUM_OPCODES, OpCode};

pub type InstructionHandler = fn(&mut Engine, &Instruction) -> VmResult<()>;

pub struct HandlerTable {
    handlers: [Option<InstructionHandler>; NUM_OPCODES],
}

impl HandlerTable {
    pub fn new() -> Self {
        let mut table = Self { handlers: [None; NUM_OPCODES] };
        table.set(OpCode::Move, load::op_move);
        table.set(OpCode::LoadConst, load::op_load_const);
        table.set(OpCode::LoadInt, load::op_load_int);
        table.set(OpCode::LoadNull, load::op_load_null);
        table.set(OpCode::LoadTrue, load::op_load_true);
        table.set(OpCode::LoadFalse, load::op_load_false);

        for op in [
            OpCode::Add, OpCode::Sub, OpCode::Mul, OpCode::Div, OpCode::Mod,
            OpCode::Eq, OpCode::Ne, OpCode::Lt, OpCode::Le, OpCode::Gt, OpCode::Ge,
        ] {
            table.set(op, arith::op_binary);
        }
        table.set(OpCode::Neg, arith::op_unary);
        table.set(OpCode::Not, arith::op_unary);

        table.set(OpCode::GetGlobal, globals::op_get_global);
        table.set(OpCode::SetGlobal, globals::op_set_global);

        table.set(OpCode::GetUpvalue, closures::op_get_upvalue);
        table.set(OpCode::SetUpvalue, closures::op_set_upvalue);
        table.set(OpCode::Closure, closures::op_closure);
        table.set(OpCode::CloseUpvalues, closures::op_close_upvalues);

        table.set(OpCode::Jump, control::op_jump);
        table.set(OpCode::JumpIfFalse, control::op_jump_if_false);
        table.set(OpCode::JumpIfTrue, control::op_jump_if_true);
        table.set(OpCode::Call, control::op_call);
        table.set(OpCode::Return, control::op_return);
        // OpCode::Halt is handled directly by Engine::step, never through this table.

        table.set(OpCode::NewArray, container::op_new_array);
        table.set(OpCode::NewHash, container::op_new_hash);
        table.set(OpCode::GetIndex, container::op_get_index);
        table.set(OpCode::SetIndex, container::op_set_index);
        table.set(OpCode::GetKeys, container::op_get_keys);
        table.set(OpCode::GetValues, container::op_get_values);

        table.set(OpCode::NewClass, class_ops::op_new_class);
        table.set(OpCode::NewInstance, class_ops::op_new_instance);
        table.set(OpCode::GetProp, class_ops::op_get_prop);
        table.set(OpCode::SetProp, class_ops::op_set_prop);
        table.set(OpCode::SetMethod, class_ops::op_set_method);
        table.set(OpCode::Inherit, class_ops::op_inherit);
        table.set(OpCode::GetSuper, class_ops::op_get_super);

        table.set(OpCode::ImportModule, module_ops::op_import_module);
        table.set(OpCode::Export, module_ops::op_export);
        table.set(OpCode::GetExport, module_ops::op_get_export);
        table.set(OpCode::GetModuleExport, module_ops::op_get_module_export);
        table.set(OpCode::ImportAll, module_ops::op_import_all);

        table.set(OpCode::SetupTry, exception_ops::op_setup_try);
        table.set(OpCode::PopTry, exception_ops::op_pop_try);
        table.set(OpCode::Throw, exception_ops::op_throw);

        table
    }

    fn set(&mut self, op: OpCode, handler: InstructionHandler) {
        self.handlers[op as usize] = Some(handler);
    }

    pub fn get(&self, op: OpCode) -> Option<InstructionHandler> {
        self.handlers[op as usize]
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}
