//! The builtin method/getter registries and the seed standard library.
//!
//! Registration is the only way non-core code installs behavior consumed by
//! method resolution (`binding::get_magic_method`); the core itself seeds a
//! minimal library at VM construction to exercise the interface end to end.

use crate::engine::Engine;
use crate::error::{VmError, VmResult};
use crate::value::{NativeFn, Value};
use hashbrown::HashMap;
use std::rc::Rc;

/// Methods and getters keyed by `(type name, member name)`. Type names match
/// `ValueType::name()` ("Array", "String", "Object", "Int", "Real", "Bool").
#[derive(Default)]
pub struct BuiltinRegistry {
    methods: HashMap<(String, String), Value>,
    getters: HashMap<(String, String), Value>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_method(&mut self, type_name: impl Into<String>, name: impl Into<String>, value: Value) {
        self.methods.insert((type_name.into(), name.into()), value);
    }

    pub fn register_getter(&mut self, type_name: impl Into<String>, name: impl Into<String>, value: Value) {
        self.getters.insert((type_name.into(), name.into()), value);
    }

    pub fn method(&self, type_name: &str, name: &str) -> Option<&Value> {
        self.methods.get(&(type_name.to_string(), name.to_string()))
    }

    pub fn getter(&self, type_name: &str, name: &str) -> Option<&Value> {
        self.getters.get(&(type_name.to_string(), name.to_string()))
    }

    /// All values held by the registries, for GC root enumeration.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.methods.values().chain(self.getters.values())
    }
}

fn simple(f: impl Fn(&[Value]) -> VmResult<Value> + 'static) -> Value {
    Value::NativeFn(NativeFn::Simple(Rc::new(f)))
}

fn advanced(f: impl Fn(&mut Engine, &[Value]) -> VmResult<Value> + 'static) -> Value {
    Value::NativeFn(NativeFn::Advanced(Rc::new(f)))
}

fn arg(args: &[Value], index: usize, method: &str) -> VmResult<Value> {
    args.get(index)
        .cloned()
        .ok_or_else(|| VmError::arity_error(method, index + 1, args.len()))
}

/// Installs the seed library described in the builtin registration surface:
/// Array length/push/pop/get/set, String length/get, Hash length/keys,
/// Int/Real/Bool to_string. Every receiver is bound as argument 0 by the
/// method-resolution wrapper, so these take the receiver first.
pub fn install_seed_library(registry: &mut BuiltinRegistry) {
    registry.register_getter(
        "Array",
        "length",
        advanced(|engine, args| {
            let recv = arg(args, 0, "length")?;
            let handle = expect_array(&recv)?;
            Ok(Value::Int(engine.heap().array(handle)?.items.len() as i64))
        }),
    );
    registry.register_method(
        "Array",
        "push",
        advanced(|engine, args| {
            let recv = arg(args, 0, "push")?;
            let handle = expect_array(&recv)?;
            let value = arg(args, 1, "push")?;
            engine.heap_mut().array_mut(handle)?.items.push(value);
            Ok(Value::Null)
        }),
    );
    registry.register_method(
        "Array",
        "pop",
        advanced(|engine, args| {
            let recv = arg(args, 0, "pop")?;
            let handle = expect_array(&recv)?;
            Ok(engine.heap_mut().array_mut(handle)?.items.pop().unwrap_or(Value::Null))
        }),
    );
    registry.register_method(
        "Array",
        "get",
        advanced(|engine, args| {
            let recv = arg(args, 0, "get")?;
            let handle = expect_array(&recv)?;
            let index = expect_int(&arg(args, 1, "get")?)?;
            let items = &engine.heap().array(handle)?.items;
            index_into(items, index).map(|v| v.clone())
        }),
    );
    registry.register_method(
        "Array",
        "set",
        advanced(|engine, args| {
            let recv = arg(args, 0, "set")?;
            let handle = expect_array(&recv)?;
            let index = expect_int(&arg(args, 1, "set")?)?;
            let value = arg(args, 2, "set")?;
            let items = &mut engine.heap_mut().array_mut(handle)?.items;
            let len = items.len();
            let slot = items
                .get_mut(normalize_index(index, len).ok_or_else(|| VmError::index_error(index, len))?)
                .ok_or_else(|| VmError::index_error(index, len))?;
            *slot = value;
            Ok(Value::Null)
        }),
    );

    registry.register_getter(
        "String",
        "length",
        simple(|args| {
            let recv = arg(args, 0, "length")?;
            Ok(Value::Int(expect_string(&recv)?.chars().count() as i64))
        }),
    );
    registry.register_method(
        "String",
        "get",
        simple(|args| {
            let recv = arg(args, 0, "get")?;
            let s = expect_string(&recv)?;
            let index = expect_int(&arg(args, 1, "get")?)?;
            let chars: Vec<char> = s.chars().collect();
            let slot = index_into(&chars, index)?;
            Ok(Value::string(slot.to_string()))
        }),
    );

    registry.register_getter(
        "Object",
        "length",
        advanced(|engine, args| {
            let recv = arg(args, 0, "length")?;
            let handle = expect_hash(&recv)?;
            Ok(Value::Int(engine.heap().hash(handle)?.len() as i64))
        }),
    );
    registry.register_method(
        "Object",
        "keys",
        advanced(|engine, args| {
            let recv = arg(args, 0, "keys")?;
            let handle = expect_hash(&recv)?;
            let items: Vec<Value> = engine.heap().hash(handle)?.keys().map(|k| Value::string(k.clone())).collect();
            Ok(Value::Array(engine.heap_mut().register(crate::heap::Object::Array(crate::objects::ArrayObj::new(items)))))
        }),
    );

    registry.register_method(
        "Int",
        "to_string",
        simple(|args| {
            let recv = arg(args, 0, "to_string")?;
            match recv {
                Value::Int(i) => Ok(Value::string(i.to_string())),
                other => Err(VmError::unary_type_mismatch("to_string", other.type_name())),
            }
        }),
    );
    registry.register_method(
        "Real",
        "to_string",
        simple(|args| {
            let recv = arg(args, 0, "to_string")?;
            match recv {
                Value::Real(r) => Ok(Value::string(r.to_string())),
                other => Err(VmError::unary_type_mismatch("to_string", other.type_name())),
            }
        }),
    );
    registry.register_method(
        "Bool",
        "to_string",
        simple(|args| {
            let recv = arg(args, 0, "to_string")?;
            match recv {
                Value::Bool(b) => Ok(Value::string(b.to_string())),
                other => Err(VmError::unary_type_mismatch("to_string", other.type_name())),
            }
        }),
    );
}

fn expect_array(v: &Value) -> VmResult<crate::heap::Handle> {
    match v {
        Value::Array(h) => Ok(*h),
        other => Err(VmError::unary_type_mismatch("Array method", other.type_name())),
    }
}

fn expect_hash(v: &Value) -> VmResult<crate::heap::Handle> {
    match v {
        Value::Hash(h) => Ok(*h),
        other => Err(VmError::unary_type_mismatch("Object method", other.type_name())),
    }
}

fn expect_string(v: &Value) -> VmResult<&std::rc::Rc<str>> {
    match v {
        Value::String(s) => Ok(s),
        other => Err(VmError::unary_type_mismatch("String method", other.type_name())),
    }
}

fn expect_int(v: &Value) -> VmResult<i64> {
    match v {
        Value::Int(i) => Ok(*i),
        other => Err(VmError::unary_type_mismatch("index", other.type_name())),
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    if index < 0 || index as usize >= len {
        None
    } else {
        Some(index as usize)
    }
}

fn index_into<T>(items: &[T], index: i64) -> VmResult<&T> {
    let len = items.len();
    normalize_index(index, len)
        .map(|i| &items[i])
        .ok_or_else(|| VmError::index_error(index, len))
}
