//! Two-pass parser for the line-oriented bytecode assembly format (§6/§4.7
//! of the design notes): a scan pass records constants, upvalue
//! descriptors, labels and instructions per `.proto ... .end` block; a
//! resolve pass rewrites label references into relative (jump) or
//! absolute (`SETUP_TRY`) instruction offsets, then a final cross-file
//! pass links `proto <name>` constants once every prototype has a handle.
//!
//! Nested `.proto` blocks are not supported: one flat region per function,
//! with `proto <name>` constant entries providing late-linked references to
//! a sibling prototype defined elsewhere in the same file.

use crate::error::{VmError, VmResult};
use crate::heap::{Handle, Heap, Object};
use crate::instruction::Instruction;
use crate::objects::{Prototype, UpvalueDesc};
use crate::opcode::OpCode;
use crate::operators::{BinOp, UnOp};
use crate::value::Value;
use hashbrown::HashMap;

#[derive(Debug, Clone, Copy)]
enum JumpKind {
    Relative,
    Absolute,
}

struct PendingJump {
    code_index: usize,
    label: String,
    kind: JumpKind,
}

struct RawProto {
    name: String,
    regs: u16,
    upvalues: u16,
    params: u16,
    constants: Vec<Value>,
    /// Index into `constants` and the referenced prototype's name, for
    /// constants declared `.const proto NAME` — patched once every
    /// prototype in the file has a heap handle.
    proto_refs: Vec<(usize, String)>,
    upvalue_descs: Vec<UpvalueDesc>,
    code: Vec<Instruction>,
    labels: HashMap<String, u32>,
    pending_jumps: Vec<PendingJump>,
}

impl RawProto {
    fn new(name: String, regs: u16, upvalues: u16, params: u16) -> Self {
        Self {
            name,
            regs,
            upvalues,
            params,
            constants: Vec::new(),
            proto_refs: Vec::new(),
            upvalue_descs: Vec::new(),
            code: Vec::new(),
            labels: HashMap::new(),
            pending_jumps: Vec::new(),
        }
    }

    fn push_const(&mut self, rest: &str) -> VmResult<()> {
        let rest = rest.trim();
        let (ty, value_part) = rest.split_once(' ').unwrap_or((rest, ""));
        let value_part = value_part.trim();
        let value = match ty {
            "int" => Value::Int(
                value_part
                    .parse()
                    .map_err(|_| VmError::load_error(format!("bad int constant `{value_part}`")))?,
            ),
            "real" => Value::Real(
                value_part
                    .parse()
                    .map_err(|_| VmError::load_error(format!("bad real constant `{value_part}`")))?,
            ),
            "bool" => Value::Bool(match value_part {
                "true" => true,
                "false" => false,
                other => return Err(VmError::load_error(format!("bad bool constant `{other}`"))),
            }),
            "null" => Value::Null,
            "string" => Value::string(parse_string_literal(value_part)?),
            "proto" => {
                self.proto_refs.push((self.constants.len(), value_part.to_string()));
                Value::Null
            }
            other => return Err(VmError::load_error(format!("unknown constant type `{other}`"))),
        };
        self.constants.push(value);
        Ok(())
    }

    fn push_upvalue_desc(&mut self, rest: &str) -> VmResult<()> {
        let mut parts = rest.split_whitespace();
        let local_flag: u16 = parse_token(parts.next(), "`.upvalue` LOCAL flag")?;
        let index: u16 = parse_token(parts.next(), "`.upvalue` INDEX")?;
        self.upvalue_descs.push(if local_flag != 0 {
            UpvalueDesc::ParentLocal(index)
        } else {
            UpvalueDesc::ParentUpvalue(index)
        });
        Ok(())
    }

    fn record_label(&mut self, name: &str) -> VmResult<()> {
        if self.labels.insert(name.to_string(), self.code.len() as u32).is_some() {
            return Err(VmError::load_error(format!("duplicate label `{name}`")));
        }
        Ok(())
    }

    fn push_instruction(&mut self, line: &str) -> VmResult<()> {
        let mut tokens = line.split_whitespace();
        let mnemonic = tokens.next().ok_or_else(|| VmError::load_error("empty instruction line"))?;
        let opcode = OpCode::from_mnemonic(mnemonic)
            .ok_or_else(|| VmError::load_error(format!("unknown opcode `{mnemonic}`")))?;
        let args: Vec<&str> = tokens.collect();
        let instr = self.decode(opcode, &args)?;
        self.code.push(instr);
        Ok(())
    }

    fn decode(&mut self, opcode: OpCode, args: &[&str]) -> VmResult<Instruction> {
        let code_index = self.code.len();
        let ctx = opcode.mnemonic();
        let u16_at = |i: usize| u16_arg(args, i, ctx);
        let i64_at = |i: usize| i64_arg(args, i, ctx);

        let instr = match opcode {
            OpCode::Move => Instruction::Move { dst: u16_at(0)?, src: u16_at(1)? },
            OpCode::LoadConst => Instruction::LoadConst { dst: u16_at(0)?, k: u16_at(1)? },
            OpCode::LoadInt => Instruction::LoadInt { dst: u16_at(0)?, imm: i64_at(1)? },
            OpCode::LoadNull => Instruction::LoadNull { dst: u16_at(0)? },
            OpCode::LoadTrue => Instruction::LoadTrue { dst: u16_at(0)? },
            OpCode::LoadFalse => Instruction::LoadFalse { dst: u16_at(0)? },
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Mod | OpCode::Eq | OpCode::Ne
            | OpCode::Lt | OpCode::Le | OpCode::Gt | OpCode::Ge => Instruction::Binary {
                op: bin_op_of(opcode),
                dst: u16_at(0)?,
                left: u16_at(1)?,
                right: u16_at(2)?,
            },
            OpCode::Neg | OpCode::Not => Instruction::Unary {
                op: un_op_of(opcode),
                dst: u16_at(0)?,
                src: u16_at(1)?,
            },
            OpCode::GetGlobal => Instruction::GetGlobal { dst: u16_at(0)?, name_k: u16_at(1)? },
            OpCode::SetGlobal => Instruction::SetGlobal { src: u16_at(0)?, name_k: u16_at(1)? },
            OpCode::GetUpvalue => Instruction::GetUpvalue { dst: u16_at(0)?, index: u16_at(1)? },
            OpCode::SetUpvalue => Instruction::SetUpvalue { src: u16_at(0)?, index: u16_at(1)? },
            OpCode::Closure => {
                let dst = u16_at(0)?;
                let proto_k = u16_at(1)?;
                let mut upvalues = Vec::new();
                let mut i = 2;
                while i + 1 < args.len() {
                    let flag: u16 = u16_arg(args, i, ctx)?;
                    let index = u16_arg(args, i + 1, ctx)?;
                    upvalues.push(if flag != 0 {
                        UpvalueDesc::ParentLocal(index)
                    } else {
                        UpvalueDesc::ParentUpvalue(index)
                    });
                    i += 2;
                }
                Instruction::Closure { dst, proto_k, upvalues }
            }
            OpCode::CloseUpvalues => Instruction::CloseUpvalues { from_slot: u16_at(0)? },
            OpCode::Jump => {
                let label = label_arg(args, 0, ctx)?;
                self.pending_jumps.push(PendingJump { code_index, label, kind: JumpKind::Relative });
                Instruction::Jump { offset: 0 }
            }
            OpCode::JumpIfFalse => {
                let reg = u16_at(0)?;
                let label = label_arg(args, 1, ctx)?;
                self.pending_jumps.push(PendingJump { code_index, label, kind: JumpKind::Relative });
                Instruction::JumpIfFalse { reg, offset: 0 }
            }
            OpCode::JumpIfTrue => {
                let reg = u16_at(0)?;
                let label = label_arg(args, 1, ctx)?;
                self.pending_jumps.push(PendingJump { code_index, label, kind: JumpKind::Relative });
                Instruction::JumpIfTrue { reg, offset: 0 }
            }
            OpCode::Call => Instruction::Call { dst: u16_at(0)?, first_arg: u16_at(1)?, argc: u16_at(2)? },
            OpCode::Return => Instruction::Return { src: u16_at(0)? },
            OpCode::Halt => Instruction::Halt,
            OpCode::NewArray => Instruction::NewArray { dst: u16_at(0)?, first_elem: u16_at(1)?, count: u16_at(2)? },
            OpCode::NewHash => Instruction::NewHash { dst: u16_at(0)?, first_pair: u16_at(1)?, pair_count: u16_at(2)? },
            OpCode::GetIndex => Instruction::GetIndex { dst: u16_at(0)?, obj: u16_at(1)?, key: u16_at(2)? },
            OpCode::SetIndex => Instruction::SetIndex { obj: u16_at(0)?, key: u16_at(1)?, value: u16_at(2)? },
            OpCode::GetKeys => Instruction::GetKeys { dst: u16_at(0)?, obj: u16_at(1)? },
            OpCode::GetValues => Instruction::GetValues { dst: u16_at(0)?, obj: u16_at(1)? },
            OpCode::NewClass => Instruction::NewClass { dst: u16_at(0)?, name_k: u16_at(1)? },
            OpCode::NewInstance => Instruction::NewInstance {
                dst: u16_at(0)?,
                class_reg: u16_at(1)?,
                first_arg: u16_at(2)?,
                argc: u16_at(3)?,
            },
            OpCode::GetProp => Instruction::GetProp { dst: u16_at(0)?, obj: u16_at(1)?, name_k: u16_at(2)? },
            OpCode::SetProp => Instruction::SetProp { obj: u16_at(0)?, name_k: u16_at(1)?, value: u16_at(2)? },
            OpCode::SetMethod => Instruction::SetMethod {
                class_reg: u16_at(0)?,
                name_k: u16_at(1)?,
                fn_reg: u16_at(2)?,
            },
            OpCode::Inherit => Instruction::Inherit { sub_reg: u16_at(0)?, super_reg: u16_at(1)? },
            OpCode::GetSuper => Instruction::GetSuper { dst: u16_at(0)?, super_reg: u16_at(1)?, name_k: u16_at(2)? },
            OpCode::ImportModule => Instruction::ImportModule { dst: u16_at(0)?, path_k: u16_at(1)? },
            OpCode::Export => Instruction::Export { name_k: u16_at(0)?, value: u16_at(1)? },
            OpCode::GetExport => Instruction::GetExport {
                dst: u16_at(0)?,
                module_reg: u16_at(1)?,
                name_k: u16_at(2)?,
            },
            OpCode::GetModuleExport => Instruction::GetModuleExport {
                dst: u16_at(0)?,
                path_k: u16_at(1)?,
                name_k: u16_at(2)?,
            },
            OpCode::ImportAll => Instruction::ImportAll { dst: u16_at(0)?, path_k: u16_at(1)? },
            OpCode::SetupTry => {
                let label = label_arg(args, 0, ctx)?;
                self.pending_jumps.push(PendingJump { code_index, label, kind: JumpKind::Absolute });
                Instruction::SetupTry { catch_ip: 0 }
            }
            OpCode::PopTry => Instruction::PopTry,
            OpCode::Throw => Instruction::Throw { src: u16_at(0)? },
        };
        Ok(instr)
    }

    fn resolve_local_jumps(&mut self) -> VmResult<()> {
        let pending = std::mem::take(&mut self.pending_jumps);
        for pj in pending {
            let target = *self
                .labels
                .get(&pj.label)
                .ok_or_else(|| VmError::load_error(format!("unresolved label `{}`", pj.label)))?;
            match pj.kind {
                JumpKind::Relative => {
                    let relative = target as i64 - (pj.code_index as i64 + 1);
                    match &mut self.code[pj.code_index] {
                        Instruction::Jump { offset } => *offset = relative as i32,
                        Instruction::JumpIfFalse { offset, .. } => *offset = relative as i32,
                        Instruction::JumpIfTrue { offset, .. } => *offset = relative as i32,
                        _ => return Err(VmError::internal("pending jump recorded against a non-jump instruction")),
                    }
                }
                JumpKind::Absolute => match &mut self.code[pj.code_index] {
                    Instruction::SetupTry { catch_ip } => *catch_ip = target,
                    _ => return Err(VmError::internal("pending absolute jump recorded against a non-SETUP_TRY instruction")),
                },
            }
        }
        Ok(())
    }

    fn into_prototype(self, source_name: &str) -> Prototype {
        Prototype {
            name: self.name,
            source_name: source_name.to_string(),
            code: self.code,
            constants: self.constants,
            upvalue_descs: self.upvalue_descs,
            num_registers: self.regs,
            num_upvalues: self.upvalues,
            num_params: self.params,
            labels: self.labels,
        }
    }
}

fn parse_string_literal(s: &str) -> VmResult<String> {
    let inner = s
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| VmError::load_error(format!("malformed string constant `{s}`")))?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => return Err(VmError::load_error(format!("unknown escape `\\{other}`"))),
            None => return Err(VmError::load_error("dangling escape at end of string constant")),
        }
    }
    Ok(out)
}

fn parse_token<T: std::str::FromStr>(token: Option<&str>, ctx: &str) -> VmResult<T> {
    token
        .ok_or_else(|| VmError::load_error(format!("{ctx}: missing value")))?
        .parse()
        .map_err(|_| VmError::load_error(format!("{ctx}: malformed value")))
}

fn u16_arg(args: &[&str], index: usize, ctx: &str) -> VmResult<u16> {
    args.get(index)
        .ok_or_else(|| VmError::load_error(format!("{ctx}: missing operand {index}")))?
        .parse()
        .map_err(|_| VmError::load_error(format!("{ctx}: bad operand {index} `{}`", args[index])))
}

fn i64_arg(args: &[&str], index: usize, ctx: &str) -> VmResult<i64> {
    args.get(index)
        .ok_or_else(|| VmError::load_error(format!("{ctx}: missing operand {index}")))?
        .parse()
        .map_err(|_| VmError::load_error(format!("{ctx}: bad operand {index} `{}`", args[index])))
}

fn label_arg(args: &[&str], index: usize, ctx: &str) -> VmResult<String> {
    args.get(index)
        .map(|s| s.to_string())
        .ok_or_else(|| VmError::load_error(format!("{ctx}: missing label operand {index}")))
}

fn bin_op_of(opcode: OpCode) -> BinOp {
    match opcode {
        OpCode::Add => BinOp::Add,
        OpCode::Sub => BinOp::Sub,
        OpCode::Mul => BinOp::Mul,
        OpCode::Div => BinOp::Div,
        OpCode::Mod => BinOp::Mod,
        OpCode::Eq => BinOp::Eq,
        OpCode::Ne => BinOp::Ne,
        OpCode::Lt => BinOp::Lt,
        OpCode::Le => BinOp::Le,
        OpCode::Gt => BinOp::Gt,
        OpCode::Ge => BinOp::Ge,
        _ => unreachable!("bin_op_of called with a non-binary opcode"),
    }
}

fn un_op_of(opcode: OpCode) -> UnOp {
    match opcode {
        OpCode::Neg => UnOp::Neg,
        OpCode::Not => UnOp::Not,
        _ => unreachable!("un_op_of called with a non-unary opcode"),
    }
}

/// Parses every `.proto ... .end` block in `source`, links jump labels
/// within each, then cross-links `proto <name>` constants once every
/// prototype has a heap handle. The first prototype in the file is the
/// module's main. Returns the main prototype's handle and the module name.
pub fn parse_module(heap: &mut Heap, source: &str, source_name: &str) -> VmResult<(Handle, String)> {
    let mut protos: Vec<RawProto> = Vec::new();
    let mut name_index: HashMap<String, usize> = HashMap::new();
    let mut current: Option<RawProto> = None;

    for (lineno, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix(".proto ") {
            if current.is_some() {
                return Err(VmError::load_error(format!("nested `.proto` block at line {}", lineno + 1)));
            }
            let mut parts = rest.split_whitespace();
            let name = parts
                .next()
                .ok_or_else(|| VmError::load_error(format!("`.proto` missing NAME at line {}", lineno + 1)))?
                .to_string();
            let regs = parse_token(parts.next(), "`.proto` REGS")?;
            let upvalues = parse_token(parts.next(), "`.proto` UPVALUES")?;
            let params = parse_token(parts.next(), "`.proto` PARAMS")?;
            current = Some(RawProto::new(name, regs, upvalues, params));
        } else if line == ".end" {
            let proto = current
                .take()
                .ok_or_else(|| VmError::load_error(format!("`.end` without matching `.proto` at line {}", lineno + 1)))?;
            if name_index.contains_key(&proto.name) {
                return Err(VmError::load_error(format!("duplicate prototype name `{}`", proto.name)));
            }
            name_index.insert(proto.name.clone(), protos.len());
            protos.push(proto);
        } else if let Some(rest) = line.strip_prefix(".const ") {
            current
                .as_mut()
                .ok_or_else(|| VmError::load_error(format!("`.const` outside `.proto` at line {}", lineno + 1)))?
                .push_const(rest)?;
        } else if let Some(rest) = line.strip_prefix(".upvalue ") {
            current
                .as_mut()
                .ok_or_else(|| VmError::load_error(format!("`.upvalue` outside `.proto` at line {}", lineno + 1)))?
                .push_upvalue_desc(rest)?;
        } else if let Some(rest) = line.strip_prefix(".label ") {
            current
                .as_mut()
                .ok_or_else(|| VmError::load_error(format!("`.label` outside `.proto` at line {}", lineno + 1)))?
                .record_label(rest.trim())?;
        } else {
            current
                .as_mut()
                .ok_or_else(|| VmError::load_error(format!("instruction outside `.proto` at line {}", lineno + 1)))?
                .push_instruction(line)?;
        }
    }
    if current.is_some() {
        return Err(VmError::load_error("unterminated `.proto` block (missing `.end`)"));
    }
    if protos.is_empty() {
        return Err(VmError::load_error("module contains no `.proto` blocks"));
    }

    for proto in &mut protos {
        proto.resolve_local_jumps()?;
    }

    let mut handles = Vec::with_capacity(protos.len());
    let mut proto_refs_by_proto = Vec::with_capacity(protos.len());
    for proto in protos {
        proto_refs_by_proto.push(proto.proto_refs.clone());
        handles.push(heap.register(Object::Prototype(proto.into_prototype(source_name))));
    }

    for (i, proto_refs) in proto_refs_by_proto.into_iter().enumerate() {
        for (const_index, proto_name) in proto_refs {
            let &target_index = name_index
                .get(&proto_name)
                .ok_or_else(|| VmError::load_error(format!("`proto {proto_name}` references an undefined prototype")))?;
            let target_handle = handles[target_index];
            heap.prototype_mut(handles[i])?.constants[const_index] = Value::Prototype(target_handle);
        }
    }

    let main_name = heap.prototype(handles[0])?.name.clone();
    Ok((handles[0], main_name))
}
