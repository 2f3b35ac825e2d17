//! The fixed opcode set, one variant per mnemonic recognised by the
//! bytecode text loader and dispatched on by the interpreter loop.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Move,
    LoadConst,
    LoadInt,
    LoadNull,
    LoadTrue,
    LoadFalse,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Neg,
    Not,
    GetGlobal,
    SetGlobal,
    GetUpvalue,
    SetUpvalue,
    Closure,
    CloseUpvalues,
    Jump,
    JumpIfFalse,
    JumpIfTrue,
    Call,
    Return,
    Halt,
    NewArray,
    NewHash,
    GetIndex,
    SetIndex,
    GetKeys,
    GetValues,
    NewClass,
    NewInstance,
    GetProp,
    SetProp,
    SetMethod,
    Inherit,
    GetSuper,
    ImportModule,
    Export,
    GetExport,
    GetModuleExport,
    ImportAll,
    SetupTry,
    PopTry,
    Throw,
}

pub const NUM_OPCODES: usize = 51;

impl OpCode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Move => "MOVE",
            OpCode::LoadConst => "LOAD_CONST",
            OpCode::LoadInt => "LOAD_INT",
            OpCode::LoadNull => "LOAD_NULL",
            OpCode::LoadTrue => "LOAD_TRUE",
            OpCode::LoadFalse => "LOAD_FALSE",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Eq => "EQ",
            OpCode::Ne => "NE",
            OpCode::Lt => "LT",
            OpCode::Le => "LE",
            OpCode::Gt => "GT",
            OpCode::Ge => "GE",
            OpCode::Neg => "NEG",
            OpCode::Not => "NOT",
            OpCode::GetGlobal => "GET_GLOBAL",
            OpCode::SetGlobal => "SET_GLOBAL",
            OpCode::GetUpvalue => "GET_UPVALUE",
            OpCode::SetUpvalue => "SET_UPVALUE",
            OpCode::Closure => "CLOSURE",
            OpCode::CloseUpvalues => "CLOSE_UPVALUES",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfTrue => "JUMP_IF_TRUE",
            OpCode::Call => "CALL",
            OpCode::Return => "RETURN",
            OpCode::Halt => "HALT",
            OpCode::NewArray => "NEW_ARRAY",
            OpCode::NewHash => "NEW_HASH",
            OpCode::GetIndex => "GET_INDEX",
            OpCode::SetIndex => "SET_INDEX",
            OpCode::GetKeys => "GET_KEYS",
            OpCode::GetValues => "GET_VALUES",
            OpCode::NewClass => "NEW_CLASS",
            OpCode::NewInstance => "NEW_INSTANCE",
            OpCode::GetProp => "GET_PROP",
            OpCode::SetProp => "SET_PROP",
            OpCode::SetMethod => "SET_METHOD",
            OpCode::Inherit => "INHERIT",
            OpCode::GetSuper => "GET_SUPER",
            OpCode::ImportModule => "IMPORT_MODULE",
            OpCode::Export => "EXPORT",
            OpCode::GetExport => "GET_EXPORT",
            OpCode::GetModuleExport => "GET_MODULE_EXPORT",
            OpCode::ImportAll => "IMPORT_ALL",
            OpCode::SetupTry => "SETUP_TRY",
            OpCode::PopTry => "POP_TRY",
            OpCode::Throw => "THROW",
        }
    }

    pub const ALL: [OpCode; NUM_OPCODES] = [
        OpCode::Move,
        OpCode::LoadConst,
        OpCode::LoadInt,
        OpCode::LoadNull,
        OpCode::LoadTrue,
        OpCode::LoadFalse,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Mod,
        OpCode::Eq,
        OpCode::Ne,
        OpCode::Lt,
        OpCode::Le,
        OpCode::Gt,
        OpCode::Ge,
        OpCode::Neg,
        OpCode::Not,
        OpCode::GetGlobal,
        OpCode::SetGlobal,
        OpCode::GetUpvalue,
        OpCode::SetUpvalue,
        OpCode::Closure,
        OpCode::CloseUpvalues,
        OpCode::Jump,
        OpCode::JumpIfFalse,
        OpCode::JumpIfTrue,
        OpCode::Call,
        OpCode::Return,
        OpCode::Halt,
        OpCode::NewArray,
        OpCode::NewHash,
        OpCode::GetIndex,
        OpCode::SetIndex,
        OpCode::GetKeys,
        OpCode::GetValues,
        OpCode::NewClass,
        OpCode::NewInstance,
        OpCode::GetProp,
        OpCode::SetProp,
        OpCode::SetMethod,
        OpCode::Inherit,
        OpCode::GetSuper,
        OpCode::ImportModule,
        OpCode::Export,
        OpCode::GetExport,
        OpCode::GetModuleExport,
        OpCode::ImportAll,
        OpCode::SetupTry,
        OpCode::PopTry,
        OpCode::Throw,
    ];

    pub fn from_mnemonic(s: &str) -> Option<OpCode> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_opcode_round_trips_through_its_mnemonic() {
        for op in OpCode::ALL {
            assert_eq!(OpCode::from_mnemonic(op.mnemonic()), Some(op));
        }
    }
}
