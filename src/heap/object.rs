//! The union of heap-allocated object kinds stored in the arena.

use crate::heap::Handle;
use crate::objects::{
    ArrayObj, BoundMethodObj, ClassObj, Closure, HashObj, InstanceObj, ModuleObj, Prototype,
    UpvalueObj,
};

#[derive(Debug, Clone)]
pub enum Object {
    Prototype(Prototype),
    Closure(Closure),
    Upvalue(UpvalueObj),
    Class(ClassObj),
    Instance(InstanceObj),
    BoundMethod(BoundMethodObj),
    Array(ArrayObj),
    Hash(HashObj),
    Module(ModuleObj),
}

impl Object {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Object::Prototype(_) => "Prototype",
            Object::Closure(_) => "Function",
            Object::Upvalue(_) => "Upvalue",
            Object::Class(_) => "Class",
            Object::Instance(_) => "Instance",
            Object::BoundMethod(_) => "BoundMethod",
            Object::Array(_) => "Array",
            Object::Hash(_) => "Object",
            Object::Module(_) => "Module",
        }
    }

    /// Appends every heap handle this object directly or transitively (via
    /// its own `Value` fields) refers to, for the mark phase.
    pub fn trace(&self, out: &mut Vec<Handle>) {
        match self {
            Object::Prototype(p) => p.trace(out),
            Object::Closure(c) => c.trace(out),
            Object::Upvalue(u) => u.trace(out),
            Object::Class(c) => c.trace(out),
            Object::Instance(i) => i.trace(out),
            Object::BoundMethod(b) => b.trace(out),
            Object::Array(a) => a.trace(out),
            Object::Hash(h) => h.trace(out),
            Object::Module(m) => m.trace(out),
        }
    }
}
