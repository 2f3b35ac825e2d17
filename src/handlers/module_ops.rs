//! Module import/export. A module value at runtime is a `Hash` snapshot of
//! its exports taken at the moment of import — see the design notes on why
//! this sidesteps adding a dedicated Module `Value` variant.

use crate::engine::Engine;
use crate::error::{VmError, VmResult};
use crate::heap::Object;
use crate::instruction::Instruction;
use crate::module_loader;
use crate::objects::HashObj;
use crate::value::Value;

fn const_string(engine: &Engine, k: u16) -> VmResult<String> {
    let frame = engine.current_frame()?;
    let proto = engine.heap().closure(frame.closure)?.proto;
    match &engine.heap().prototype(proto)?.constants[k as usize] {
        Value::String(s) => Ok(s.to_string()),
        other => Err(VmError::internal(format!("constant is not a string: {other:?}"))),
    }
}

fn exports_snapshot(engine: &mut Engine, module_handle: crate::heap::Handle) -> VmResult<Value> {
    let mut hash = HashObj::new();
    for (name, value) in engine.heap().module(module_handle)?.exports.clone() {
        hash.insert(name, value);
    }
    Ok(Value::Hash(engine.heap_mut().register(Object::Hash(hash))))
}

fn import(engine: &mut Engine, path_k: u16) -> VmResult<Value> {
    let path = const_string(engine, path_k)?;
    let importer_path = engine.heap().module(engine.current_frame()?.module)?.path.clone();
    let (module_handle, _) = module_loader::get_or_load_module(engine, &path, Some(&importer_path), false)?;
    exports_snapshot(engine, module_handle)
}

pub fn op_import_module(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, path_k) = match instr {
        Instruction::ImportModule { dst, path_k } => (*dst, *path_k),
        _ => return Err(VmError::internal("op_import_module: wrong instruction")),
    };
    let value = import(engine, path_k)?;
    let base = engine.current_frame()?.slot_start;
    engine.regs_mut().set(base + dst as usize, value)
}

pub fn op_import_all(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, path_k) = match instr {
        Instruction::ImportAll { dst, path_k } => (*dst, *path_k),
        _ => return Err(VmError::internal("op_import_all: wrong instruction")),
    };
    let value = import(engine, path_k)?;
    let base = engine.current_frame()?.slot_start;
    engine.regs_mut().set(base + dst as usize, value)
}

pub fn op_export(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (name_k, value) = match instr {
        Instruction::Export { name_k, value } => (*name_k, *value),
        _ => return Err(VmError::internal("op_export: wrong instruction")),
    };
    let name = const_string(engine, name_k)?;
    let base = engine.current_frame()?.slot_start;
    let exported = engine.regs().get(base + value as usize)?.clone();
    let module = engine.current_frame()?.module;
    engine.heap_mut().module_mut(module)?.exports.insert(name, exported);
    Ok(())
}

pub fn op_get_export(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, module_reg, name_k) = match instr {
        Instruction::GetExport { dst, module_reg, name_k } => (*dst, *module_reg, *name_k),
        _ => return Err(VmError::internal("op_get_export: wrong instruction")),
    };
    let name = const_string(engine, name_k)?;
    let base = engine.current_frame()?.slot_start;
    let module_value = engine.regs().get(base + module_reg as usize)?.clone();
    let handle = match module_value {
        Value::Hash(h) => h,
        other => return Err(VmError::type_mismatch("GET_EXPORT", "Object", other.type_name())),
    };
    let value = engine
        .heap()
        .hash(handle)?
        .get(&name)
        .cloned()
        .ok_or_else(|| VmError::name_error(name))?;
    engine.regs_mut().set(base + dst as usize, value)
}

pub fn op_get_module_export(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, path_k, name_k) = match instr {
        Instruction::GetModuleExport { dst, path_k, name_k } => (*dst, *path_k, *name_k),
        _ => return Err(VmError::internal("op_get_module_export: wrong instruction")),
    };
    let path = const_string(engine, path_k)?;
    let name = const_string(engine, name_k)?;
    let importer_path = engine.heap().module(engine.current_frame()?.module)?.path.clone();
    let (module_handle, _) = module_loader::get_or_load_module(engine, &path, Some(&importer_path), false)?;
    let value = engine
        .heap()
        .module(module_handle)?
        .exports
        .get(&name)
        .cloned()
        .ok_or_else(|| VmError::name_error(name))?;
    let base = engine.current_frame()?.slot_start;
    engine.regs_mut().set(base + dst as usize, value)
}
