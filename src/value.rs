//! The runtime value domain: a tagged union unifying primitives with
//! non-owning handles into the GC heap.

use crate::engine::Engine;
use crate::error::VmResult;
use crate::heap::{Handle, Heap};
use std::rc::Rc;

/// Either a pure callable taking only the argument vector, or an
/// engine-aware callable that additionally receives a handle back into the
/// running VM (for `call`, `heap`, registering further builtins, etc).
#[derive(Clone)]
pub enum NativeFn {
    Simple(Rc<dyn Fn(&[Value]) -> VmResult<Value>>),
    Advanced(Rc<dyn Fn(&mut Engine, &[Value]) -> VmResult<Value>>),
}

impl std::fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NativeFn::Simple(_) => write!(f, "NativeFn::Simple(..)"),
            NativeFn::Advanced(_) => write!(f, "NativeFn::Advanced(..)"),
        }
    }
}

impl PartialEq for NativeFn {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NativeFn::Simple(a), NativeFn::Simple(b)) => Rc::ptr_eq(a, b),
            (NativeFn::Advanced(a), NativeFn::Advanced(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    /// Owned text. Value-equal rather than identity-based, unlike the other
    /// heap-adjacent kinds, but not itself tracked by the GC arena.
    String(Rc<str>),
    Array(Handle),
    Hash(Handle),
    Upvalue(Handle),
    /// Closure.
    Function(Handle),
    Class(Handle),
    Instance(Handle),
    BoundMethod(Handle),
    Prototype(Handle),
    NativeFn(NativeFn),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Bool,
    Int,
    Real,
    String,
    Array,
    Hash,
    Upvalue,
    Function,
    Class,
    Instance,
    BoundMethod,
    Prototype,
    NativeFn,
}

pub const NUM_VALUE_TYPES: usize = 14;

impl ValueType {
    pub const ALL: [ValueType; NUM_VALUE_TYPES] = [
        ValueType::Null,
        ValueType::Bool,
        ValueType::Int,
        ValueType::Real,
        ValueType::String,
        ValueType::Array,
        ValueType::Hash,
        ValueType::Upvalue,
        ValueType::Function,
        ValueType::Class,
        ValueType::Instance,
        ValueType::BoundMethod,
        ValueType::Prototype,
        ValueType::NativeFn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Null => "Null",
            ValueType::Bool => "Bool",
            ValueType::Int => "Int",
            ValueType::Real => "Real",
            ValueType::String => "String",
            ValueType::Array => "Array",
            ValueType::Hash => "Object",
            ValueType::Upvalue => "Upvalue",
            ValueType::Function => "Function",
            ValueType::Class => "Class",
            ValueType::Instance => "Instance",
            ValueType::BoundMethod => "BoundMethod",
            ValueType::Prototype => "Prototype",
            ValueType::NativeFn => "NativeFn",
        }
    }
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn type_of(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Real(_) => ValueType::Real,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Array,
            Value::Hash(_) => ValueType::Hash,
            Value::Upvalue(_) => ValueType::Upvalue,
            Value::Function(_) => ValueType::Function,
            Value::Class(_) => ValueType::Class,
            Value::Instance(_) => ValueType::Instance,
            Value::BoundMethod(_) => ValueType::BoundMethod,
            Value::Prototype(_) => ValueType::Prototype,
            Value::NativeFn(_) => ValueType::NativeFn,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_of().name()
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::BoundMethod(_) | Value::NativeFn(_) | Value::Class(_)
        )
    }

    /// Boolean coercion per the truthiness rules: Null is false, Bool is
    /// itself, numbers are nonzero (and not NaN for Real), String/Array/Hash
    /// are nonempty, every other heap kind is true.
    pub fn truthy(&self, heap: &Heap) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Real(r) => *r != 0.0 && !r.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(h) => !heap.array(*h).map(|a| a.items.is_empty()).unwrap_or(true),
            Value::Hash(h) => !heap.hash(*h).map(|o| o.is_empty()).unwrap_or(true),
            _ => true,
        }
    }

    /// Structural equality for primitives (Int/Real compare numerically
    /// across the mix, String compares by content, IEEE rules for Real so
    /// `NaN != NaN`); identity (handle equality) for heap kinds.
    pub fn loose_eq(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Real(a), Real(b)) => a == b,
            (Int(a), Real(b)) | (Real(b), Int(a)) => (*a as f64) == *b,
            (String(a), String(b)) => a == b,
            (Array(a), Array(b))
            | (Hash(a), Hash(b))
            | (Upvalue(a), Upvalue(b))
            | (Function(a), Function(b))
            | (Class(a), Class(b))
            | (Instance(a), Instance(b))
            | (BoundMethod(a), BoundMethod(b))
            | (Prototype(a), Prototype(b)) => a == b,
            (NativeFn(a), NativeFn(b)) => a == b,
            _ => false,
        }
    }
}
