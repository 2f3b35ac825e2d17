//! Method resolution (`getMagicMethod`): given a receiver value and a name,
//! decide what `receiver.name` means — absent, a bound callable, or a
//! plain value pass-through. Grounded per-kind in the resolution order
//! below; the receiver-prepending wrapper around a builtin `NativeFn` is
//! built once per resolution, never once per call on the wrapper.

use crate::engine::Engine;
use crate::error::VmResult;
use crate::heap::{Handle, Object};
use crate::objects::BoundMethodObj;
use crate::value::{NativeFn, Value};
use std::rc::Rc;

pub fn get_magic_method(engine: &mut Engine, receiver: &Value, name: &str) -> VmResult<Option<Value>> {
    match receiver {
        Value::Instance(h) => resolve_instance(engine, *h, receiver, name),
        Value::Hash(h) => resolve_hash(engine, *h, receiver, name),
        Value::Array(_) => resolve_builtin(engine, "Array", receiver, name),
        Value::String(_) => resolve_builtin(engine, "String", receiver, name),
        Value::Int(_) => resolve_builtin(engine, "Int", receiver, name),
        Value::Real(_) => resolve_builtin(engine, "Real", receiver, name),
        Value::Bool(_) => resolve_builtin(engine, "Bool", receiver, name),
        Value::Class(h) => resolve_class(engine, *h, name),
        _ => Ok(None),
    }
}

fn resolve_instance(engine: &mut Engine, handle: Handle, receiver: &Value, name: &str) -> VmResult<Option<Value>> {
    if let Some(value) = engine.heap().instance(handle)?.fields.get(name).cloned() {
        return Ok(Some(wrap_for_instance(engine, receiver, value)?));
    }

    let mut current = Some(engine.heap().instance(handle)?.class);
    while let Some(class_handle) = current {
        let class = engine.heap().class(class_handle)?;
        if let Some(value) = class.methods.get(name).cloned() {
            return Ok(Some(wrap_for_instance(engine, receiver, value)?));
        }
        current = class.superclass;
    }
    Ok(None)
}

fn resolve_class(engine: &mut Engine, handle: Handle, name: &str) -> VmResult<Option<Value>> {
    Ok(engine.heap().class(handle)?.methods.get(name).cloned())
}

fn resolve_hash(engine: &mut Engine, handle: Handle, receiver: &Value, name: &str) -> VmResult<Option<Value>> {
    if let Some(value) = engine.heap().hash(handle)?.get(name).cloned() {
        return Ok(Some(wrap_with_receiver(receiver.clone(), value)));
    }
    resolve_builtin(engine, "Object", receiver, name)
}

fn resolve_builtin(engine: &mut Engine, type_name: &str, receiver: &Value, name: &str) -> VmResult<Option<Value>> {
    if let Some(getter) = engine.builtins().getter(type_name, name).cloned() {
        return Ok(Some(engine.call(getter, &[receiver.clone()])?));
    }
    if let Some(method) = engine.builtins().method(type_name, name).cloned() {
        return Ok(Some(wrap_with_receiver(receiver.clone(), method)));
    }
    Ok(None)
}

/// Instance resolution wraps a Closure/BoundMethod as a fresh `BoundMethod`
/// object (so it can be called through the normal call-semantics path) and
/// a `NativeFn` as a receiver-prepending closure; anything else (a plain
/// field value) passes through unchanged.
fn wrap_for_instance(engine: &mut Engine, receiver: &Value, value: Value) -> VmResult<Value> {
    match value {
        Value::Function(_) => {
            let bound = BoundMethodObj {
                receiver: receiver.clone(),
                callable: value,
            };
            Ok(Value::BoundMethod(engine.heap_mut().register(Object::BoundMethod(bound))))
        }
        Value::BoundMethod(existing) => {
            let inner = engine.heap().bound_method(existing)?.callable.clone();
            let bound = BoundMethodObj {
                receiver: receiver.clone(),
                callable: inner,
            };
            Ok(Value::BoundMethod(engine.heap_mut().register(Object::BoundMethod(bound))))
        }
        Value::NativeFn(orig) => Ok(Value::NativeFn(wrap_native(orig, receiver.clone()))),
        other => Ok(other),
    }
}

/// Non-instance receivers (Hash/Array/String/Int/Real/Bool) never produce a
/// heap `BoundMethod` object — only builtin `NativeFn`s are wrapped.
fn wrap_with_receiver(receiver: Value, value: Value) -> Value {
    match value {
        Value::NativeFn(orig) => Value::NativeFn(wrap_native(orig, receiver)),
        other => other,
    }
}

fn wrap_native(orig: NativeFn, receiver: Value) -> NativeFn {
    NativeFn::Advanced(Rc::new(move |engine: &mut Engine, args: &[Value]| {
        let mut bound_args = Vec::with_capacity(args.len() + 1);
        bound_args.push(receiver.clone());
        bound_args.extend_from_slice(args);
        match &orig {
            NativeFn::Simple(f) => f(&bound_args),
            NativeFn::Advanced(f) => f(engine, &bound_args),
        }
    }))
}
