//! The VM proper: owns the heap, the register stack, the call stack, the
//! handler stack, the module cache and the builtin registries, and drives
//! the fetch/decode/dispatch loop.

use crate::binding;
use crate::builtins::{self, BuiltinRegistry};
use crate::error::{VmError, VmResult};
use crate::exception::{ExceptionHandler, HandlerStack};
use crate::frame::CallFrame;
use crate::handlers::HandlerTable;
use crate::heap::{Handle, Heap, Object};
use crate::instruction::Instruction;
use crate::module_loader;
use crate::objects::{BoundMethodObj, InstanceObj, UpvalueObj};
use crate::operators::OperatorDispatcher;
use crate::register_stack::RegisterStack;
use crate::value::Value;
use crate::vm_state::VMState;
use log::{debug, trace, warn};

/// Where a call's result is delivered: a caller's register (the normal
/// CALL-opcode path, resolved only once the callee's frame eventually
/// RETURNs) or out-of-band (a reentrant call driven synchronously to
/// completion before the caller gets control back).
#[derive(Debug, Clone, Copy)]
pub enum CallDest {
    Register(u16),
    Synthetic,
}

pub struct Engine {
    heap: Heap,
    operators: OperatorDispatcher,
    builtins: BuiltinRegistry,
    handler_table: HandlerTable,
    regs: RegisterStack,
    frames: Vec<CallFrame>,
    handlers: HandlerStack,
    /// Handles of currently OPEN upvalues, kept sorted by descending slot
    /// index so `close_from` can stop early. At most one OPEN upvalue per
    /// slot is ever live at a time.
    open_upvalues: Vec<Handle>,
    modules: hashbrown::HashMap<String, Handle>,
    state: VMState,
    cli_args: Vec<String>,
    pending_result: Option<Value>,
}

impl Engine {
    pub fn new(cli_args: Vec<String>) -> Self {
        let mut builtins = BuiltinRegistry::new();
        builtins::install_seed_library(&mut builtins);
        Self {
            heap: Heap::new(),
            operators: OperatorDispatcher::new(),
            builtins,
            handler_table: HandlerTable::new(),
            regs: RegisterStack::new(),
            frames: Vec::new(),
            handlers: HandlerStack::new(),
            open_upvalues: Vec::new(),
            modules: hashbrown::HashMap::new(),
            state: VMState::NONE,
            cli_args,
            pending_result: None,
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn operators(&self) -> &OperatorDispatcher {
        &self.operators
    }

    pub fn builtins(&self) -> &BuiltinRegistry {
        &self.builtins
    }

    pub fn register_method(&mut self, type_name: impl Into<String>, name: impl Into<String>, value: Value) {
        self.builtins.register_method(type_name, name, value);
    }

    pub fn register_getter(&mut self, type_name: impl Into<String>, name: impl Into<String>, value: Value) {
        self.builtins.register_getter(type_name, name, value);
    }

    pub fn arguments(&self) -> &[String] {
        &self.cli_args
    }

    pub fn regs(&self) -> &RegisterStack {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut RegisterStack {
        &mut self.regs
    }

    pub fn modules(&self) -> &hashbrown::HashMap<String, Handle> {
        &self.modules
    }

    pub fn modules_mut(&mut self) -> &mut hashbrown::HashMap<String, Handle> {
        &mut self.modules
    }

    pub fn state(&self) -> VMState {
        self.state
    }

    /// Number of active exception handlers, exposed for tests checking
    /// that SETUP_TRY/POP_TRY/THROW keep the handler stack balanced.
    pub fn handler_depth(&self) -> usize {
        self.handlers.depth()
    }

    /// Number of live call frames, exposed for tests checking that CALL and
    /// RETURN leave the call stack exactly where they found it.
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Total register stack length, exposed for tests checking that a
    /// completed call leaves the register stack at its pre-call depth.
    pub fn register_depth(&self) -> usize {
        self.regs.len()
    }

    /// Whether the dispatch table has a handler registered for `op`,
    /// exposed for tests checking dispatch totality (every non-HALT opcode
    /// reaches a handler).
    pub fn has_handler(&self, op: crate::opcode::OpCode) -> bool {
        self.handler_table.get(op).is_some()
    }

    pub fn current_frame(&self) -> VmResult<&CallFrame> {
        self.frames.last().ok_or_else(|| VmError::internal("no active call frame"))
    }

    fn current_frame_mut(&mut self) -> VmResult<&mut CallFrame> {
        self.frames.last_mut().ok_or_else(|| VmError::internal("no active call frame"))
    }

    /// Sets the current frame's instruction pointer directly, used by the
    /// jump family (`JUMP`/`JUMP_IF_FALSE`/`JUMP_IF_TRUE`) to apply a
    /// resolved offset.
    pub fn set_ip(&mut self, ip: usize) -> VmResult<()> {
        self.current_frame_mut()?.ip = ip;
        Ok(())
    }

    /// Loads and runs the given entry file, returning the value the
    /// top-level module's main prototype returned (or `Null` if it fell
    /// through to `HALT` without an explicit `RETURN`).
    pub fn interpret(&mut self, entry_path: &str, is_binary: bool) -> VmResult<Value> {
        let (_module, result) = module_loader::get_or_load_module(self, entry_path, None, is_binary)?;
        Ok(result)
    }

    /// Runs a module's main prototype as a nullary synthetic call, the way
    /// `module_loader::get_or_load_module` drives first execution.
    pub fn run_module_main(&mut self, module: Handle) -> VmResult<Value> {
        let main_proto = self.heap.module(module)?.main_proto;
        let closure = self.heap.register(Object::Closure(crate::objects::Closure {
            proto: main_proto,
            upvalues: Vec::new(),
            module,
        }));
        self.invoke(Value::Function(closure), Vec::new(), CallDest::Synthetic)?;
        Ok(self.pending_result.take().unwrap_or(Value::Null))
    }

    // ---- calling ---------------------------------------------------

    /// The engine-interface `call(callee, args)` entry point: reenters the
    /// VM synchronously and returns the callee's result.
    pub fn call(&mut self, callee: Value, args: &[Value]) -> VmResult<Value> {
        self.invoke(callee, args.to_vec(), CallDest::Synthetic)?;
        Ok(self.pending_result.take().unwrap_or(Value::Null))
    }

    pub fn invoke(&mut self, callee: Value, args: Vec<Value>, dest: CallDest) -> VmResult<()> {
        match callee {
            Value::Function(closure_handle) => self.invoke_closure(closure_handle, args, dest),
            Value::BoundMethod(bound_handle) => {
                let bound = self.heap.bound_method(bound_handle)?.clone();
                let mut new_args = Vec::with_capacity(args.len() + 1);
                new_args.push(bound.receiver);
                new_args.extend(args);
                self.invoke(bound.callable, new_args, dest)
            }
            Value::Class(class_handle) => {
                let instance_handle = self.heap.register(Object::Instance(InstanceObj::new(class_handle)));
                let init = self.heap.class(class_handle)?.methods.get("init").cloned();
                if let Some(init_fn) = init {
                    let bound = Value::BoundMethod(self.heap.register(Object::BoundMethod(BoundMethodObj {
                        receiver: Value::Instance(instance_handle),
                        callable: init_fn,
                    })));
                    self.invoke(bound, args, CallDest::Synthetic)?;
                }
                self.write_result(Value::Instance(instance_handle), dest)
            }
            Value::NativeFn(native) => {
                let result = match native {
                    crate::value::NativeFn::Simple(f) => f(&args)?,
                    crate::value::NativeFn::Advanced(f) => f(self, &args)?,
                };
                self.write_result(result, dest)
            }
            other => Err(VmError::not_callable(other.type_name())),
        }
    }

    fn invoke_closure(&mut self, closure_handle: Handle, args: Vec<Value>, dest: CallDest) -> VmResult<()> {
        let closure = self.heap.closure(closure_handle)?.clone();
        let proto = self.heap.prototype(closure.proto)?;
        let name = proto.name.clone();
        let num_params = proto.num_params as usize;
        let num_registers = proto.num_registers as usize;
        if args.len() < num_params {
            return Err(VmError::arity_error(name, num_params, args.len()));
        }

        let base = self.regs.len();
        for value in &args {
            self.regs.push(value.clone());
        }
        self.regs.ensure(base, num_registers.max(args.len()));

        let ret_reg = match dest {
            CallDest::Register(r) => Some(r),
            CallDest::Synthetic => None,
        };
        trace!("call into {} (base {}, args {})", name, base, args.len());
        self.frames.push(CallFrame::new(closure_handle, base, closure.module, ret_reg));

        if let CallDest::Synthetic = dest {
            let depth_before = self.frames.len() - 1;
            self.run_until(depth_before)?;
        }
        Ok(())
    }

    /// Pops the active call frame, used by `RETURN` after it has copied the
    /// result value out of the frame's register window.
    pub fn pop_frame(&mut self) -> VmResult<CallFrame> {
        self.frames.pop().ok_or_else(|| VmError::internal("RETURN with no active frame"))
    }

    /// Delivers a value out-of-band to whichever synthetic call is waiting
    /// on it, the counterpart to `write_result`'s `CallDest::Synthetic` arm
    /// for callers (like `RETURN`) that already hold the popped frame.
    pub fn set_pending_result(&mut self, value: Value) {
        self.pending_result = Some(value);
    }

    fn write_result(&mut self, value: Value, dest: CallDest) -> VmResult<()> {
        match dest {
            CallDest::Register(reg) => {
                let base = self.current_frame()?.slot_start;
                self.regs.set(base + reg as usize, value)
            }
            CallDest::Synthetic => {
                self.pending_result = Some(value);
                Ok(())
            }
        }
    }

    /// Executes instructions until the call stack shrinks back to
    /// `min_depth` or the VM halts/faults. Used both by the top-level
    /// driver (`min_depth == 0`) and by any synthetic reentrant call.
    pub fn run_until(&mut self, min_depth: usize) -> VmResult<()> {
        while self.frames.len() > min_depth {
            if self.state.is_halt() || self.state.is_fault() {
                break;
            }
            if self.heap.should_collect() {
                self.collect();
            }
            if let Err(err) = self.step() {
                self.handle_error(err, min_depth)?;
            }
        }
        Ok(())
    }

    /// Executes a single instruction, advancing the current frame's `ip`
    /// first (per the loop's "ip already past the fetched instruction"
    /// convention), then dispatching through the handler table.
    fn step(&mut self) -> VmResult<()> {
        let (instr, frame_ip) = {
            let frame = self.current_frame()?;
            let proto = self.heap.closure(frame.closure)?.proto;
            let code = &self.heap.prototype(proto)?.code;
            let ip = frame.ip;
            let instr = code
                .get(ip)
                .cloned()
                .ok_or_else(|| VmError::internal(format!("instruction pointer {ip} out of range")))?;
            (instr, ip)
        };
        self.current_frame_mut()?.ip = frame_ip + 1;

        if matches!(instr, Instruction::Halt) {
            trace!("HALT");
            self.state = VMState::HALT;
            return Ok(());
        }

        let opcode = instr.opcode();
        let handler = self
            .handler_table
            .get(opcode)
            .ok_or_else(|| VmError::unsupported_op(opcode.mnemonic()))?;
        handler(self, &instr)
    }

    /// When a runtime error surfaces from `step`, either unwind to the
    /// nearest active handler (catchable errors) or propagate to the
    /// caller of `run_until` (load errors, internal faults, or an
    /// uncaught catchable error with no handler active).
    fn handle_error(&mut self, err: VmError, min_depth: usize) -> VmResult<()> {
        if !err.is_user_catchable() {
            self.state = VMState::FAULT;
            return Err(err);
        }
        let thrown = Value::string(err.to_string());
        match self.unwind_to_handler(thrown, min_depth) {
            Ok(()) => Ok(()),
            Err(uncaught) => {
                self.state = VMState::FAULT;
                Err(uncaught)
            }
        }
    }

    // ---- exceptions --------------------------------------------------

    pub fn setup_try(&mut self, catch_ip: u32) -> VmResult<()> {
        self.handlers.push(ExceptionHandler {
            catch_ip: catch_ip as usize,
            frame_depth: self.frames.len(),
            stack_depth: self.regs.len(),
        });
        Ok(())
    }

    pub fn pop_try(&mut self) -> VmResult<()> {
        self.handlers
            .pop()
            .map(|_| ())
            .ok_or_else(|| VmError::internal("POP_TRY with no active handler"))
    }

    pub fn throw(&mut self, value: Value) -> VmResult<()> {
        let min_depth = 0;
        self.unwind_to_handler(value, min_depth)
    }

    /// Implements §4.5: pop the nearest handler, unwind call/register
    /// stacks to its recorded depths, close upvalues above that point, and
    /// resume at `catch_ip` with the thrown value in the handling frame's
    /// lowest free register. Returns the thrown value as an error if no
    /// handler is active (the caller decides whether that is a host-fatal
    /// uncaught exception or something `run_until`'s caller should see).
    fn unwind_to_handler(&mut self, value: Value, min_depth: usize) -> VmResult<()> {
        let Some(handler) = self.handlers.pop() else {
            warn!("uncaught exception: {value:?}");
            return Err(VmError::uncaught(describe(&value)));
        };
        if handler.frame_depth <= min_depth {
            // Handler belongs to an outer synthetic call; not ours to honor.
            self.handlers.push(handler);
            warn!("uncaught exception escaping reentrant call: {value:?}");
            return Err(VmError::uncaught(describe(&value)));
        }
        self.frames.truncate(handler.frame_depth);
        self.close_upvalues_from(handler.stack_depth);
        self.regs.truncate(handler.stack_depth);

        let slot = handler.stack_depth;
        self.regs.ensure(0, slot + 1);
        self.regs.set(slot, value)?;

        let frame = self.current_frame_mut()?;
        frame.ip = handler.catch_ip;
        Ok(())
    }

    // ---- upvalues ------------------------------------------------------

    /// Finds an existing OPEN upvalue at `slot_index`, or allocates a new
    /// one, honouring "at most one OPEN upvalue per slot".
    pub fn capture_upvalue(&mut self, slot_index: usize) -> VmResult<Handle> {
        for &handle in &self.open_upvalues {
            if let crate::objects::UpvalueState::Open { slot_index: s } = self.heap.upvalue(handle)?.state {
                if s == slot_index {
                    return Ok(handle);
                }
            }
        }
        let handle = self.heap.register(Object::Upvalue(UpvalueObj::open(slot_index)));
        self.open_upvalues.push(handle);
        Ok(handle)
    }

    /// `CLOSE_UPVALUES fromSlot` and frame teardown on `RETURN`/unwind:
    /// every OPEN upvalue at or above `from_slot` is copied into its cell
    /// and transitions to CLOSED (a terminal, at-most-once transition).
    pub fn close_upvalues_from(&mut self, from_slot: usize) {
        let mut remaining = Vec::with_capacity(self.open_upvalues.len());
        for handle in self.open_upvalues.drain(..) {
            let slot_index = match self.heap.upvalue(handle).map(|u| u.state.clone()) {
                Ok(crate::objects::UpvalueState::Open { slot_index }) if slot_index >= from_slot => slot_index,
                _ => {
                    remaining.push(handle);
                    continue;
                }
            };
            let value = self.regs.get(slot_index).cloned().unwrap_or(Value::Null);
            if let Ok(u) = self.heap.upvalue_mut(handle) {
                u.state = crate::objects::UpvalueState::Closed { value };
            }
        }
        self.open_upvalues = remaining;
    }

    // ---- method binding -------------------------------------------------

    pub fn get_magic_method(&mut self, receiver: &Value, name: &str) -> VmResult<Option<Value>> {
        binding::get_magic_method(self, receiver, name)
    }

    // ---- GC --------------------------------------------------------------

    fn gc_roots(&self) -> Vec<Handle> {
        let mut roots = Vec::new();
        for value in self.regs.iter_from(0) {
            crate::heap::trace_value(value, &mut roots);
        }
        for &handle in self.modules.values() {
            roots.push(handle);
        }
        for frame in &self.frames {
            roots.push(frame.closure);
            roots.push(frame.module);
        }
        for &handle in &self.open_upvalues {
            roots.push(handle);
        }
        for value in self.builtins.values() {
            crate::heap::trace_value(value, &mut roots);
        }
        roots
    }

    pub fn collect(&mut self) {
        let roots = self.gc_roots();
        debug!("running GC with {} roots", roots.len());
        self.heap.collect(roots);
    }

    /// Disables collection until the returned guard drops, for a multi-step
    /// sequence (e.g. building a closure's upvalues, then registering the
    /// closure itself) that must not have a collection run between its
    /// allocations, while that sequence still needs full engine access (not
    /// just heap access) as it goes — `capture_upvalue` touches
    /// `open_upvalues`, not only the heap. The guard derefs to `Engine` so
    /// callers keep using ordinary engine methods through it.
    pub fn disable_gc_scoped(&mut self) -> GcScopeGuard<'_> {
        self.heap.disable();
        GcScopeGuard { engine: self }
    }
}

/// RAII guard returned by [`Engine::disable_gc_scoped`]; re-enables
/// collection when dropped, on every exit path including panics and
/// `?`-propagated errors.
pub struct GcScopeGuard<'a> {
    engine: &'a mut Engine,
}

impl std::ops::Deref for GcScopeGuard<'_> {
    type Target = Engine;
    fn deref(&self) -> &Engine {
        self.engine
    }
}

impl std::ops::DerefMut for GcScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Engine {
        self.engine
    }
}

impl Drop for GcScopeGuard<'_> {
    fn drop(&mut self) {
        self.engine.heap.enable();
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        other => format!("{other:?}"),
    }
}
