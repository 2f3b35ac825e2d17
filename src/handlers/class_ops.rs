//! Class declaration, instantiation, property access and inheritance.

use crate::engine::{CallDest, Engine};
use crate::error::{VmError, VmResult};
use crate::heap::Object;
use crate::instruction::Instruction;
use crate::objects::{BoundMethodObj, ClassObj};
use crate::value::Value;

fn const_name(engine: &Engine, name_k: u16) -> VmResult<String> {
    let frame = engine.current_frame()?;
    let proto = engine.heap().closure(frame.closure)?.proto;
    match &engine.heap().prototype(proto)?.constants[name_k as usize] {
        Value::String(s) => Ok(s.to_string()),
        other => Err(VmError::internal(format!("name constant is not a string: {other:?}"))),
    }
}

pub fn op_new_class(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, name_k) = match instr {
        Instruction::NewClass { dst, name_k } => (*dst, *name_k),
        _ => return Err(VmError::internal("op_new_class: wrong instruction")),
    };
    let name = const_name(engine, name_k)?;
    let base = engine.current_frame()?.slot_start;
    let handle = engine.heap_mut().register(Object::Class(ClassObj::new(name)));
    engine.regs_mut().set(base + dst as usize, Value::Class(handle))
}

pub fn op_new_instance(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, class_reg, first_arg, argc) = match instr {
        Instruction::NewInstance { dst, class_reg, first_arg, argc } => (*dst, *class_reg, *first_arg, *argc),
        _ => return Err(VmError::internal("op_new_instance: wrong instruction")),
    };
    let base = engine.current_frame()?.slot_start;
    let class_value = engine.regs().get(base + class_reg as usize)?.clone();
    if !matches!(class_value, Value::Class(_)) {
        return Err(VmError::not_callable(class_value.type_name()));
    }
    let mut args = Vec::with_capacity(argc as usize);
    for i in 0..argc as usize {
        args.push(engine.regs().get(base + first_arg as usize + i)?.clone());
    }
    engine.invoke(class_value, args, CallDest::Register(dst))
}

pub fn op_get_prop(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, obj, name_k) = match instr {
        Instruction::GetProp { dst, obj, name_k } => (*dst, *obj, *name_k),
        _ => return Err(VmError::internal("op_get_prop: wrong instruction")),
    };
    let name = const_name(engine, name_k)?;
    let base = engine.current_frame()?.slot_start;
    let obj_value = engine.regs().get(base + obj as usize)?.clone();
    let resolved = engine
        .get_magic_method(&obj_value, &name)?
        .ok_or_else(|| VmError::name_error(name))?;
    let base = engine.current_frame()?.slot_start;
    engine.regs_mut().set(base + dst as usize, resolved)
}

pub fn op_set_prop(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (obj, name_k, value) = match instr {
        Instruction::SetProp { obj, name_k, value } => (*obj, *name_k, *value),
        _ => return Err(VmError::internal("op_set_prop: wrong instruction")),
    };
    let name = const_name(engine, name_k)?;
    let base = engine.current_frame()?.slot_start;
    let obj_value = engine.regs().get(base + obj as usize)?.clone();
    let new_value = engine.regs().get(base + value as usize)?.clone();
    match obj_value {
        Value::Instance(h) => {
            engine.heap_mut().instance_mut(h)?.fields.insert(name, new_value);
            Ok(())
        }
        other => Err(VmError::type_mismatch("SET_PROP", "Instance", other.type_name())),
    }
}

pub fn op_set_method(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (class_reg, name_k, fn_reg) = match instr {
        Instruction::SetMethod { class_reg, name_k, fn_reg } => (*class_reg, *name_k, *fn_reg),
        _ => return Err(VmError::internal("op_set_method: wrong instruction")),
    };
    let name = const_name(engine, name_k)?;
    let base = engine.current_frame()?.slot_start;
    let class_value = engine.regs().get(base + class_reg as usize)?.clone();
    let fn_value = engine.regs().get(base + fn_reg as usize)?.clone();
    match class_value {
        Value::Class(h) => {
            engine.heap_mut().class_mut(h)?.methods.insert(name, fn_value);
            Ok(())
        }
        other => Err(VmError::type_mismatch("SET_METHOD", "Class", other.type_name())),
    }
}

/// Records the superclass link only; `binding::resolve_instance` walks the
/// chain at method-lookup time, so a method added to the superclass after
/// `INHERIT` runs is still visible (and an override on the subclass always
/// wins without needing to re-copy anything).
pub fn op_inherit(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (sub_reg, super_reg) = match instr {
        Instruction::Inherit { sub_reg, super_reg } => (*sub_reg, *super_reg),
        _ => return Err(VmError::internal("op_inherit: wrong instruction")),
    };
    let base = engine.current_frame()?.slot_start;
    let sub_value = engine.regs().get(base + sub_reg as usize)?.clone();
    let super_value = engine.regs().get(base + super_reg as usize)?.clone();
    let (sub_handle, super_handle) = match (sub_value, super_value) {
        (Value::Class(sub), Value::Class(sup)) => (sub, sup),
        (sub, sup) => return Err(VmError::type_mismatch("INHERIT", sub.type_name(), sup.type_name())),
    };
    engine.heap_mut().class_mut(sub_handle)?.superclass = Some(super_handle);
    Ok(())
}

/// Resolves `name` against `super_reg`'s class (and its superclass chain),
/// binding the result to whatever receiver lives in register 0 of the
/// current frame — the implicit-`self` convention every user closure opens
/// with.
pub fn op_get_super(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, super_reg, name_k) = match instr {
        Instruction::GetSuper { dst, super_reg, name_k } => (*dst, *super_reg, *name_k),
        _ => return Err(VmError::internal("op_get_super: wrong instruction")),
    };
    let name = const_name(engine, name_k)?;
    let base = engine.current_frame()?.slot_start;
    let super_value = engine.regs().get(base + super_reg as usize)?.clone();
    let receiver = engine.regs().get(base)?.clone();

    let mut current = match super_value {
        Value::Class(h) => Some(h),
        other => return Err(VmError::type_mismatch("GET_SUPER", "Class", other.type_name())),
    };
    let method = loop {
        let Some(class_handle) = current else {
            return Err(VmError::name_error(name));
        };
        let class = engine.heap().class(class_handle)?;
        if let Some(value) = class.methods.get(&name).cloned() {
            break value;
        }
        current = class.superclass;
    };

    let bound = BoundMethodObj { receiver, callable: method };
    let handle = engine.heap_mut().register(Object::BoundMethod(bound));
    let base = engine.current_frame()?.slot_start;
    engine.regs_mut().set(base + dst as usize, Value::BoundMethod(handle))
}
