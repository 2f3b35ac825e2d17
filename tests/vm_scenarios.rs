//! End-to-end scenarios driving whole bytecode modules through `Engine`,
//! one per testable property in the design notes: arithmetic, closures,
//! exceptions, inheritance, module cycles, and cyclic-garbage collection.

use meow_vm::heap::Object;
use meow_vm::loader::text_format;
use meow_vm::objects::ModuleObj;
use meow_vm::opcode::OpCode;
use meow_vm::value::Value;
use meow_vm::Engine;

/// Parses and runs a single-file module straight from a source string, with
/// no filesystem involved — used by every scenario except the module-cycle
/// one, which genuinely needs two importable files.
fn run_source(source: &str) -> (Engine, Value) {
    let mut engine = Engine::new(Vec::new());
    let (main_proto, name) = text_format::parse_module(engine.heap_mut(), source, "<test>").expect("parse");
    let module = engine.heap_mut().register(Object::Module(ModuleObj::new(name, "<test>", main_proto)));
    let result = engine.run_module_main(module).expect("run");
    (engine, result)
}

fn assert_balanced(engine: &Engine) {
    assert_eq!(engine.frame_depth(), 0, "call stack must unwind back to empty");
    assert_eq!(engine.register_depth(), 0, "register stack must unwind back to empty");
    assert_eq!(engine.handler_depth(), 0, "handler stack must unwind back to empty");
}

#[test]
fn s1_arithmetic() {
    let source = r#"
.proto main 3 0 0
LOAD_INT 0 2
LOAD_INT 1 3
ADD 2 0 1
RETURN 2
.end
"#;
    let (engine, result) = run_source(source);
    assert!(matches!(result, Value::Int(5)));
    assert_balanced(&engine);
}

#[test]
fn s2_closure_counter() {
    let source = r#"
.proto main 8 0 0
.const proto make_counter
CLOSURE 0 0
CALL 1 1 0
MOVE 2 1
CALL 2 3 0
MOVE 3 1
CALL 3 4 0
MOVE 4 1
CALL 4 5 0
NEW_ARRAY 5 2 3
RETURN 5
.end

.proto make_counter 2 0 0
.const proto counter
LOAD_INT 0 0
CLOSURE 1 0 1 0
RETURN 1
.end

.proto counter 2 1 0
GET_UPVALUE 0 0
LOAD_INT 1 1
ADD 0 0 1
SET_UPVALUE 0 0
RETURN 0
.end
"#;
    let (engine, result) = run_source(source);
    let Value::Array(handle) = result else { panic!("expected an array, got {result:?}") };
    let items = engine.heap().array(handle).unwrap().items.clone();
    let counts: Vec<i64> = items
        .iter()
        .map(|v| match v {
            Value::Int(i) => *i,
            other => panic!("expected Int, got {other:?}"),
        })
        .collect();
    assert_eq!(counts, vec![1, 2, 3]);
    assert_balanced(&engine);
}

#[test]
fn s3_try_throw() {
    let source = r#"
.proto main 1 0 0
.const string "boom"
SETUP_TRY L_catch
LOAD_CONST 0 0
THROW 0
.label L_catch
RETURN 1
.end
"#;
    let (engine, result) = run_source(source);
    match result {
        Value::String(s) => assert_eq!(&*s, "boom"),
        other => panic!("expected a caught String, got {other:?}"),
    }
    assert_balanced(&engine);
}

#[test]
fn s3_uncaught_exception_propagates_as_an_error() {
    let source = r#"
.proto main 1 0 0
.const string "boom"
LOAD_CONST 0 0
THROW 0
.end
"#;
    let mut engine = Engine::new(Vec::new());
    let (main_proto, name) = text_format::parse_module(engine.heap_mut(), source, "<test>").unwrap();
    let module = engine.heap_mut().register(Object::Module(ModuleObj::new(name, "<test>", main_proto)));
    assert!(engine.run_module_main(module).is_err());
}

#[test]
fn s4_inheritance_and_super() {
    let source = r#"
.proto main 13 0 0
.const proto b_m
.const proto a_m
.const string "B"
.const string "A"
.const string "m"
NEW_CLASS 0 2
NEW_CLASS 1 3
INHERIT 1 0
CLOSURE 2 0
SET_METHOD 0 4 2
NEW_INSTANCE 3 1 0 0
GET_PROP 4 3 4
CALL 5 5 0
CLOSURE 6 1 1 0
SET_METHOD 1 4 6
NEW_INSTANCE 7 1 0 0
GET_PROP 8 7 4
CALL 9 9 0
MOVE 10 5
MOVE 11 9
NEW_ARRAY 12 10 2
RETURN 12
.end

.proto b_m 1 0 1
LOAD_INT 0 1
RETURN 0
.end

.proto a_m 3 1 1
.const string "m"
GET_UPVALUE 1 0
GET_SUPER 2 1 0
CALL 2 3 0
LOAD_INT 1 1
ADD 0 2 1
RETURN 0
.end
"#;
    let (engine, result) = run_source(source);
    let Value::Array(handle) = result else { panic!("expected an array, got {result:?}") };
    let items = engine.heap().array(handle).unwrap().items.clone();
    let values: Vec<i64> = items
        .iter()
        .map(|v| match v {
            Value::Int(i) => *i,
            other => panic!("expected Int, got {other:?}"),
        })
        .collect();
    // First instance calls the inherited method before the override exists;
    // the second calls it after SET_METHOD overrides A.m with a version that
    // adds 1 to whatever super.m() returns.
    assert_eq!(values, vec![1, 2]);
    assert_balanced(&engine);
}

#[test]
fn s5_module_cycle_breaks_and_partial_exports_are_visible() {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let entry = format!("{manifest_dir}/tests/fixtures/s5_x.vasm");
    let mut engine = Engine::new(Vec::new());
    let result = engine.interpret(&entry, false).expect("interpret s5_x");
    assert!(matches!(result, Value::Int(2)), "expected X to see Y's export, got {result:?}");

    let x_path = format!("{manifest_dir}/tests/fixtures/s5_x.vasm");
    let y_path = format!("{manifest_dir}/tests/fixtures/s5_y.vasm");
    let x_handle = *engine.modules().get(&x_path).expect("module X cached");
    let y_handle = *engine.modules().get(&y_path).expect("module Y cached");

    let x_module = engine.heap().module(x_handle).unwrap();
    match x_module.exports.get("from_x") {
        Some(Value::Int(1)) => {}
        other => panic!("expected X to export from_x = 1, got {other:?}"),
    }

    let y_module = engine.heap().module(y_handle).unwrap();
    match y_module.exports.get("from_y") {
        Some(Value::Int(2)) => {}
        other => panic!("expected Y to export from_y = 2, got {other:?}"),
    }
    match y_module.exports.get("y_saw_x") {
        Some(Value::Hash(h)) => {
            assert!(engine.heap().hash(*h).unwrap().is_empty(), "X hadn't exported anything yet when Y re-imported it");
        }
        other => panic!("expected Y to export y_saw_x as a Hash snapshot, got {other:?}"),
    }
}

#[test]
fn s6_unreachable_cycle_is_collected() {
    let source = r#"
.proto main 4 0 0
.const string "C"
.const string "peer"
NEW_CLASS 0 0
NEW_INSTANCE 1 0 0 0
NEW_INSTANCE 2 0 0 0
SET_PROP 1 1 2
SET_PROP 2 1 1
NEW_ARRAY 3 1 2
RETURN 3
.end
"#;
    let (mut engine, result) = run_source(source);
    let Value::Array(array_handle) = result else { panic!("expected an array, got {result:?}") };
    let items = engine.heap().array(array_handle).unwrap().items.clone();
    let (a, b) = match (&items[0], &items[1]) {
        (Value::Instance(a), Value::Instance(b)) => (*a, *b),
        other => panic!("expected two instances, got {other:?}"),
    };

    // Nothing in the VM still roots the array or either instance (the
    // register stack unwound back to empty when `main` returned); the
    // objects simply haven't been swept yet.
    assert!(engine.heap().instance(a).is_ok());
    assert!(engine.heap().instance(b).is_ok());

    engine.collect();

    assert!(engine.heap().instance(a).is_err(), "cyclic pair should have been collected");
    assert!(engine.heap().instance(b).is_err(), "cyclic pair should have been collected");
}

#[test]
fn dispatch_is_total_over_every_non_halt_opcode() {
    let engine = Engine::new(Vec::new());
    for op in OpCode::ALL {
        if op == OpCode::Halt {
            continue; // HALT is intercepted by Engine::step before dispatch.
        }
        assert!(engine.has_handler(op), "missing handler for {}", op.mnemonic());
    }
}
