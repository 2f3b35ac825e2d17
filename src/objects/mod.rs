//! Heap object kinds: function prototypes, closures, upvalues, classes,
//! instances, bound methods, arrays, hashes and modules.

pub mod array_obj;
pub mod bound_method;
pub mod class_obj;
pub mod closure;
pub mod hash_obj;
pub mod instance_obj;
pub mod module_obj;
pub mod prototype;
pub mod upvalue;

pub use array_obj::ArrayObj;
pub use bound_method::BoundMethodObj;
pub use class_obj::ClassObj;
pub use closure::Closure;
pub use hash_obj::HashObj;
pub use instance_obj::InstanceObj;
pub use module_obj::ModuleObj;
pub use prototype::{Prototype, UpvalueDesc};
pub use upvalue::{UpvalueObj, UpvalueState};
