//! The heap: object registration, root tracing, and mark-and-sweep
//! collection.
//!
//! Heap objects are never referenced by raw pointer or by `Rc`; every
//! reference is a [`Handle`], a stable arena index. This makes the
//! instance/class/closure cycles described in the object model trivially
//! representable — the GC owns the arena and traces over handles rather
//! than over a pointer graph (see the design notes on cyclic object graphs).

mod object;

pub use object::Object;

use crate::value::Value;

/// A stable, arena-relative identifier standing in for a heap object
/// reference. Two handles are equal iff they name the same arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    fn index(self) -> usize {
        self.0 as usize
    }
}

struct Entry {
    object: Object,
    marked: bool,
}

/// Owns every heap-allocated object and performs tracing mark-and-sweep.
pub struct Heap {
    entries: Vec<Option<Entry>>,
    free_list: Vec<u32>,
    /// Count of nested `disable()` calls not yet matched by `enable()`.
    /// The collector runs only when this is zero.
    disable_depth: u32,
    live_since_gc: usize,
    gc_threshold: usize,
}

const INITIAL_GC_THRESHOLD: usize = 128;

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_list: Vec::new(),
            disable_depth: 0,
            live_since_gc: 0,
            gc_threshold: INITIAL_GC_THRESHOLD,
        }
    }

    /// Registers an already-constructed object and returns its handle.
    /// Must be called immediately after allocation, before the handle is
    /// stored anywhere a caller can observe a half-initialised entry.
    pub fn register(&mut self, object: Object) -> Handle {
        let entry = Entry {
            object,
            marked: false,
        };
        let index = if let Some(i) = self.free_list.pop() {
            self.entries[i as usize] = Some(entry);
            i
        } else {
            self.entries.push(Some(entry));
            (self.entries.len() - 1) as u32
        };
        self.live_since_gc += 1;
        Handle(index)
    }

    pub fn get(&self, handle: Handle) -> &Object {
        self.entries[handle.index()]
            .as_ref()
            .map(|e| &e.object)
            .expect("dangling heap handle")
    }

    pub fn get_mut(&mut self, handle: Handle) -> &mut Object {
        self.entries[handle.index()]
            .as_mut()
            .map(|e| &mut e.object)
            .expect("dangling heap handle")
    }

    pub fn is_enabled(&self) -> bool {
        self.disable_depth == 0
    }

    pub fn enable(&mut self) {
        self.disable_depth = self.disable_depth.saturating_sub(1);
    }

    pub fn disable(&mut self) {
        self.disable_depth += 1;
    }

    /// Whether the live-object count has grown enough since the last
    /// collection to warrant running one (a doubling threshold, the
    /// classic mark-sweep allocation trigger).
    pub fn should_collect(&self) -> bool {
        self.is_enabled() && self.live_since_gc >= self.gc_threshold
    }

    /// Runs tracing mark-and-sweep given the full root set. Roots come from
    /// outside the heap (register stack, module cache, frames, open
    /// upvalues, builtin registries) so the caller assembles them; the heap
    /// itself only knows how to walk outgoing edges from an object already
    /// inside it.
    pub fn collect(&mut self, roots: Vec<Handle>) {
        if !self.is_enabled() {
            return;
        }

        let mut worklist = roots;
        while let Some(handle) = worklist.pop() {
            let index = handle.index();
            let Some(entry) = self.entries.get_mut(index).and_then(|e| e.as_mut()) else {
                continue;
            };
            if entry.marked {
                continue;
            }
            entry.marked = true;
            let mut children = Vec::new();
            entry.object.trace(&mut children);
            worklist.extend(children);
        }

        let mut live = 0usize;
        for (index, slot) in self.entries.iter_mut().enumerate() {
            match slot {
                Some(entry) if entry.marked => {
                    entry.marked = false;
                    live += 1;
                }
                Some(_) => {
                    *slot = None;
                    self.free_list.push(index as u32);
                }
                None => {}
            }
        }

        self.live_since_gc = 0;
        self.gc_threshold = (live * 2).max(INITIAL_GC_THRESHOLD);
    }
}

/// Extracts the heap handle out of a `Value`, if it carries one. Primitives
/// (`Null`/`Bool`/`Int`/`Real`/`String`) and `NativeFn` have no heap
/// out-edge and contribute nothing.
pub fn trace_value(value: &Value, out: &mut Vec<Handle>) {
    use Value::*;
    match value {
        Array(h) | Hash(h) | Upvalue(h) | Function(h) | Class(h) | Instance(h)
        | BoundMethod(h) | Prototype(h) => out.push(*h),
        Null | Bool(_) | Int(_) | Real(_) | String(_) | NativeFn(_) => {}
    }
}

macro_rules! typed_accessor {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty, $name:expr) => {
        impl Heap {
            pub fn $get(&self, handle: Handle) -> crate::error::VmResult<&$ty> {
                match self.get(handle) {
                    Object::$variant(v) => Ok(v),
                    other => Err(crate::error::VmError::internal(format!(
                        "expected heap object of kind {}, found {}",
                        $name,
                        other.kind_name()
                    ))),
                }
            }

            pub fn $get_mut(&mut self, handle: Handle) -> crate::error::VmResult<&mut $ty> {
                match self.get_mut(handle) {
                    Object::$variant(v) => Ok(v),
                    other => Err(crate::error::VmError::internal(format!(
                        "expected heap object of kind {}, found {}",
                        $name,
                        other.kind_name()
                    ))),
                }
            }
        }
    };
}

typed_accessor!(prototype, prototype_mut, Prototype, crate::objects::Prototype, "Prototype");
typed_accessor!(closure, closure_mut, Closure, crate::objects::Closure, "Function");
typed_accessor!(upvalue, upvalue_mut, Upvalue, crate::objects::UpvalueObj, "Upvalue");
typed_accessor!(class, class_mut, Class, crate::objects::ClassObj, "Class");
typed_accessor!(instance, instance_mut, Instance, crate::objects::InstanceObj, "Instance");
typed_accessor!(bound_method, bound_method_mut, BoundMethod, crate::objects::BoundMethodObj, "BoundMethod");
typed_accessor!(array, array_mut, Array, crate::objects::ArrayObj, "Array");
typed_accessor!(hash, hash_mut, Hash, crate::objects::HashObj, "Object");
typed_accessor!(module, module_mut, Module, crate::objects::ModuleObj, "Module");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ArrayObj;

    #[test]
    fn register_and_collect_unreferenced() {
        let mut heap = Heap::new();
        let h1 = heap.register(Object::Array(ArrayObj::new(vec![])));
        let _h2 = heap.register(Object::Array(ArrayObj::new(vec![])));

        heap.collect(vec![h1]);

        assert!(heap.array(h1).is_ok());
    }

    #[test]
    fn disable_enable_pairs_nest() {
        let mut heap = Heap::new();
        heap.disable();
        heap.disable();
        assert!(!heap.is_enabled());
        heap.enable();
        assert!(!heap.is_enabled());
        heap.enable();
        assert!(heap.is_enabled());
    }

    #[test]
    fn disabled_heap_skips_collection() {
        let mut heap = Heap::new();
        let h1 = heap.register(Object::Array(ArrayObj::new(vec![])));
        heap.disable();
        heap.collect(vec![]);
        assert!(heap.array(h1).is_ok());
    }

    #[test]
    fn cycle_is_collected_when_unreachable() {
        use crate::objects::InstanceObj;
        let mut heap = Heap::new();
        let class = heap.register(Object::Class(crate::objects::ClassObj::new("C")));
        let a = heap.register(Object::Instance(InstanceObj::new(class)));
        let b = heap.register(Object::Instance(InstanceObj::new(class)));
        heap.instance_mut(a)
            .unwrap()
            .fields
            .insert("peer".to_string(), Value::Instance(b));
        heap.instance_mut(b)
            .unwrap()
            .fields
            .insert("peer".to_string(), Value::Instance(a));

        // Neither instance is a root any more; only the class is.
        heap.collect(vec![class]);

        assert!(heap.instance(a).is_err());
        assert!(heap.instance(b).is_err());
        assert!(heap.class(class).is_ok());
    }
}
