//! Array/Hash construction and indexed get/set, dispatched by receiver type
//! the way the spec's property-access table reads: Array by int index,
//! String by int index (single-character result), Hash/Instance by string
//! key.

use crate::engine::Engine;
use crate::error::{VmError, VmResult};
use crate::heap::Object;
use crate::instruction::Instruction;
use crate::objects::{ArrayObj, HashObj};
use crate::value::Value;

pub fn op_new_array(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, first_elem, count) = match instr {
        Instruction::NewArray { dst, first_elem, count } => (*dst, *first_elem, *count),
        _ => return Err(VmError::internal("op_new_array: wrong instruction")),
    };
    let base = engine.current_frame()?.slot_start;
    let mut items = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        items.push(engine.regs().get(base + first_elem as usize + i)?.clone());
    }
    let handle = engine.heap_mut().register(Object::Array(ArrayObj::new(items)));
    engine.regs_mut().set(base + dst as usize, Value::Array(handle))
}

pub fn op_new_hash(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, first_pair, pair_count) = match instr {
        Instruction::NewHash { dst, first_pair, pair_count } => (*dst, *first_pair, *pair_count),
        _ => return Err(VmError::internal("op_new_hash: wrong instruction")),
    };
    let base = engine.current_frame()?.slot_start;
    let mut hash = HashObj::new();
    for i in 0..pair_count as usize {
        let key_reg = base + first_pair as usize + i * 2;
        let value_reg = key_reg + 1;
        let key = expect_string(engine.regs().get(key_reg)?)?;
        let value = engine.regs().get(value_reg)?.clone();
        hash.insert(key, value);
    }
    let handle = engine.heap_mut().register(Object::Hash(hash));
    engine.regs_mut().set(base + dst as usize, Value::Hash(handle))
}

pub fn op_get_index(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, obj, key) = match instr {
        Instruction::GetIndex { dst, obj, key } => (*dst, *obj, *key),
        _ => return Err(VmError::internal("op_get_index: wrong instruction")),
    };
    let base = engine.current_frame()?.slot_start;
    let obj_value = engine.regs().get(base + obj as usize)?.clone();
    let key_value = engine.regs().get(base + key as usize)?.clone();

    let result = match &obj_value {
        Value::Array(h) => {
            let items = &engine.heap().array(*h)?.items;
            let index = expect_int(&key_value)?;
            index_into(items, index)?.clone()
        }
        Value::String(s) => {
            let index = expect_int(&key_value)?;
            let chars: Vec<char> = s.chars().collect();
            let idx = normalize_index(index, chars.len())?;
            Value::string(chars[idx].to_string())
        }
        Value::Hash(h) => {
            let key_name = expect_string(&key_value)?;
            engine
                .heap()
                .hash(*h)?
                .get(&key_name)
                .cloned()
                .ok_or_else(|| VmError::key_error(key_name))?
        }
        Value::Instance(h) => {
            let key_name = expect_string(&key_value)?;
            engine
                .heap()
                .instance(*h)?
                .fields
                .get(&key_name)
                .cloned()
                .ok_or_else(|| VmError::name_error(key_name))?
        }
        other => return Err(VmError::type_mismatch("GET_INDEX", other.type_name(), key_value.type_name())),
    };
    let base = engine.current_frame()?.slot_start;
    engine.regs_mut().set(base + dst as usize, result)
}

pub fn op_set_index(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (obj, key, value) = match instr {
        Instruction::SetIndex { obj, key, value } => (*obj, *key, *value),
        _ => return Err(VmError::internal("op_set_index: wrong instruction")),
    };
    let base = engine.current_frame()?.slot_start;
    let obj_value = engine.regs().get(base + obj as usize)?.clone();
    let key_value = engine.regs().get(base + key as usize)?.clone();
    let new_value = engine.regs().get(base + value as usize)?.clone();

    match &obj_value {
        Value::Array(h) => {
            let index = expect_int(&key_value)?;
            let len = engine.heap().array(*h)?.items.len();
            let idx = normalize_index(index, len)?;
            engine.heap_mut().array_mut(*h)?.items[idx] = new_value;
        }
        Value::Hash(h) => {
            let key_name = expect_string(&key_value)?;
            engine.heap_mut().hash_mut(*h)?.insert(key_name, new_value);
        }
        Value::Instance(h) => {
            let key_name = expect_string(&key_value)?;
            engine.heap_mut().instance_mut(*h)?.fields.insert(key_name, new_value);
        }
        other => return Err(VmError::type_mismatch("SET_INDEX", other.type_name(), key_value.type_name())),
    }
    Ok(())
}

pub fn op_get_keys(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, obj) = match instr {
        Instruction::GetKeys { dst, obj } => (*dst, *obj),
        _ => return Err(VmError::internal("op_get_keys: wrong instruction")),
    };
    let base = engine.current_frame()?.slot_start;
    let obj_value = engine.regs().get(base + obj as usize)?.clone();
    let handle = expect_hash(&obj_value)?;
    let keys: Vec<Value> = engine.heap().hash(handle)?.keys().map(|k| Value::string(k.clone())).collect();
    let array_handle = engine.heap_mut().register(Object::Array(ArrayObj::new(keys)));
    engine.regs_mut().set(base + dst as usize, Value::Array(array_handle))
}

pub fn op_get_values(engine: &mut Engine, instr: &Instruction) -> VmResult<()> {
    let (dst, obj) = match instr {
        Instruction::GetValues { dst, obj } => (*dst, *obj),
        _ => return Err(VmError::internal("op_get_values: wrong instruction")),
    };
    let base = engine.current_frame()?.slot_start;
    let obj_value = engine.regs().get(base + obj as usize)?.clone();
    let handle = expect_hash(&obj_value)?;
    let values: Vec<Value> = engine.heap().hash(handle)?.values().cloned().collect();
    let array_handle = engine.heap_mut().register(Object::Array(ArrayObj::new(values)));
    engine.regs_mut().set(base + dst as usize, Value::Array(array_handle))
}

fn expect_string(value: &Value) -> VmResult<String> {
    match value {
        Value::String(s) => Ok(s.to_string()),
        other => Err(VmError::type_mismatch("INDEX", "String", other.type_name())),
    }
}

fn expect_int(value: &Value) -> VmResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(VmError::type_mismatch("INDEX", "Int", other.type_name())),
    }
}

fn expect_hash(value: &Value) -> VmResult<crate::heap::Handle> {
    match value {
        Value::Hash(h) => Ok(*h),
        other => Err(VmError::type_mismatch("KEYS/VALUES", "Object", other.type_name())),
    }
}

fn normalize_index(index: i64, len: usize) -> VmResult<usize> {
    if index < 0 || index as usize >= len {
        Err(VmError::index_error(index, len))
    } else {
        Ok(index as usize)
    }
}

fn index_into(items: &[Value], index: i64) -> VmResult<&Value> {
    let idx = normalize_index(index, items.len())?;
    Ok(&items[idx])
}
