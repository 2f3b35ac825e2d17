//! # meow-vm
//!
//! A register-based bytecode virtual machine core: a fetch/decode/dispatch
//! loop over a shared register stack, a tracing mark-and-sweep garbage
//! collector, type-indexed operator dispatch, and magic-method binding for
//! instances, hashes and the builtin primitive types.
//!
//! ## Architecture
//!
//! - [`Engine`] owns the heap, the call stack, the register stack, the
//!   handler table, the module cache and the builtin registries, and drives
//!   the interpreter loop.
//! - [`heap::Heap`] is the GC arena: every heap object (closures, classes,
//!   instances, arrays, hashes, modules, upvalues, prototypes) is addressed
//!   by a stable [`heap::Handle`], never by pointer or `Rc`.
//! - [`value::Value`] is the tagged runtime value — primitives inline,
//!   everything else a `Handle` into the heap.
//! - [`operators::OperatorDispatcher`] and [`binding`] implement `+`/`-`/...
//!   and `receiver.name` resolution as type-indexed lookup tables rather
//!   than long `match` chains.
//! - [`handlers`] holds one function per opcode, reached through an
//!   `OpCode`-indexed array of function pointers.
//! - [`loader::text_format`] and [`module_loader`] parse the bytecode text
//!   format and drive first-execution-only module loading.
//!
//! ## Example
//!
//! ```rust,no_run
//! use meow_vm::Engine;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut engine = Engine::new(Vec::new());
//! let result = engine.interpret("examples/hello.mvm", false)?;
//! println!("{result:?}");
//! # Ok(())
//! # }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

/// Method resolution (`receiver.name`) across instances, hashes and
/// builtin primitive types.
pub mod binding;
/// The builtin method/getter registries and the seed standard library.
pub mod builtins;
/// The VM proper: the interpreter loop, call semantics and exception unwind.
pub mod engine;
/// VM error types and result handling.
pub mod error;
/// Exception handler records and the handler stack.
pub mod exception;
/// Call frames: the activation record of one in-progress call.
pub mod frame;
/// One handler function per opcode, reached through a jump table.
pub mod handlers;
/// The GC arena: handles, objects, tracing mark-and-sweep.
pub mod heap;
/// Decoded instructions.
pub mod instruction;
/// The bytecode text loader.
pub mod loader;
/// `getOrLoadModule`: import path canonicalisation and first-execution-only
/// module loading.
pub mod module_loader;
/// Heap object kinds: prototypes, closures, upvalues, classes, instances,
/// bound methods, arrays, hashes and modules.
pub mod objects;
/// The fixed opcode set.
pub mod opcode;
/// The operator dispatch table.
pub mod operators;
/// The shared register stack.
pub mod register_stack;
/// The runtime value domain.
pub mod value;
/// VM execution state flags.
pub mod vm_state;

pub use engine::{CallDest, Engine};
pub use error::{VmError, VmResult};
pub use heap::{Handle, Heap, Object};
pub use instruction::Instruction;
pub use opcode::OpCode;
pub use value::{NativeFn, Value, ValueType};
pub use vm_state::VMState;
