//! The operator dispatch table: `binaryOps[op][leftType][rightType]` and
//! `unaryOps[op][operandType]`, each indexed in O(1). A missing entry means
//! "unsupported combination" and surfaces a typed runtime error rather than
//! a crash — populated once at VM construction, never mutated afterwards.

use crate::error::{VmError, VmResult};
use crate::heap::Heap;
use crate::objects::ArrayObj;
use crate::value::{NUM_VALUE_TYPES, Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

pub const NUM_BIN_OPS: usize = 11;

impl BinOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "ADD",
            BinOp::Sub => "SUB",
            BinOp::Mul => "MUL",
            BinOp::Div => "DIV",
            BinOp::Mod => "MOD",
            BinOp::Eq => "EQ",
            BinOp::Ne => "NE",
            BinOp::Lt => "LT",
            BinOp::Le => "LE",
            BinOp::Gt => "GT",
            BinOp::Ge => "GE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

pub const NUM_UN_OPS: usize = 2;

impl UnOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            UnOp::Neg => "NEG",
            UnOp::Not => "NOT",
        }
    }
}

type BinaryFn = fn(&Value, &Value, &mut Heap) -> VmResult<Value>;
type UnaryFn = fn(&Value, &Heap) -> VmResult<Value>;

pub struct OperatorDispatcher {
    binary: [[[Option<BinaryFn>; NUM_VALUE_TYPES]; NUM_VALUE_TYPES]; NUM_BIN_OPS],
    unary: [[Option<UnaryFn>; NUM_VALUE_TYPES]; NUM_UN_OPS],
}

impl Default for OperatorDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorDispatcher {
    pub fn new() -> Self {
        let mut d = Self {
            binary: [[[None; NUM_VALUE_TYPES]; NUM_VALUE_TYPES]; NUM_BIN_OPS],
            unary: [[None; NUM_VALUE_TYPES]; NUM_UN_OPS],
        };
        d.install_defaults();
        d
    }

    fn set_binary(&mut self, op: BinOp, left: ValueType, right: ValueType, f: BinaryFn) {
        self.binary[op as usize][left as usize][right as usize] = Some(f);
    }

    fn set_unary(&mut self, op: UnOp, ty: ValueType, f: UnaryFn) {
        self.unary[op as usize][ty as usize] = Some(f);
    }

    pub fn find_binary(&self, op: BinOp, left: &Value, right: &Value) -> Option<BinaryFn> {
        self.binary[op as usize][left.type_of() as usize][right.type_of() as usize]
    }

    pub fn find_unary(&self, op: UnOp, operand: &Value) -> Option<UnaryFn> {
        self.unary[op as usize][operand.type_of() as usize]
    }

    pub fn binary(&self, op: BinOp, left: &Value, right: &Value, heap: &mut Heap) -> VmResult<Value> {
        match self.find_binary(op, left, right) {
            Some(f) => f(left, right, heap),
            None => Err(VmError::type_mismatch(op.mnemonic(), left.type_name(), right.type_name())),
        }
    }

    pub fn unary(&self, op: UnOp, operand: &Value, heap: &Heap) -> VmResult<Value> {
        match self.find_unary(op, operand) {
            Some(f) => f(operand, heap),
            None => Err(VmError::unary_type_mismatch(op.mnemonic(), operand.type_name())),
        }
    }

    fn install_defaults(&mut self) {
        use ValueType::*;

        self.set_binary(BinOp::Add, Int, Int, |l, r, _| Ok(Value::Int(as_int(l).wrapping_add(as_int(r)))));
        self.set_binary(BinOp::Add, Int, Real, |l, r, _| Ok(Value::Real(as_int(l) as f64 + as_real(r))));
        self.set_binary(BinOp::Add, Real, Int, |l, r, _| Ok(Value::Real(as_real(l) + as_int(r) as f64)));
        self.set_binary(BinOp::Add, Real, Real, |l, r, _| Ok(Value::Real(as_real(l) + as_real(r))));
        self.set_binary(BinOp::Add, String, String, |l, r, _| {
            Ok(Value::string(format!("{}{}", as_str(l), as_str(r))))
        });
        self.set_binary(BinOp::Add, Array, Array, |l, r, heap| {
            let mut items = heap.array(as_handle(l))?.items.clone();
            items.extend(heap.array(as_handle(r))?.items.clone());
            Ok(Value::Array(heap.register(crate::heap::Object::Array(ArrayObj::new(items)))))
        });

        self.install_sub();
        self.install_mul();

        self.set_binary(BinOp::Div, Int, Int, |l, r, _| {
            let (a, b) = (as_int(l), as_int(r));
            if b == 0 {
                Err(VmError::division_by_zero("/"))
            } else {
                Ok(Value::Int(a.wrapping_div(b)))
            }
        });
        self.set_binary(BinOp::Div, Int, Real, |l, r, _| Ok(Value::Real(as_int(l) as f64 / as_real(r))));
        self.set_binary(BinOp::Div, Real, Int, |l, r, _| Ok(Value::Real(as_real(l) / as_int(r) as f64)));
        self.set_binary(BinOp::Div, Real, Real, |l, r, _| Ok(Value::Real(as_real(l) / as_real(r))));

        self.set_binary(BinOp::Mod, Int, Int, |l, r, _| {
            let (a, b) = (as_int(l), as_int(r));
            if b == 0 {
                Err(VmError::division_by_zero("%"))
            } else {
                Ok(Value::Int(a.wrapping_rem(b)))
            }
        });
        self.set_binary(BinOp::Mod, Int, Real, |l, r, _| Ok(Value::Real(as_int(l) as f64 % as_real(r))));
        self.set_binary(BinOp::Mod, Real, Int, |l, r, _| Ok(Value::Real(as_real(l) % as_int(r) as f64)));
        self.set_binary(BinOp::Mod, Real, Real, |l, r, _| Ok(Value::Real(as_real(l) % as_real(r))));

        // == / != are defined across every type pair, via Value::loose_eq.
        for l in ValueType::ALL {
            for r in ValueType::ALL {
                self.set_binary(BinOp::Eq, l, r, |l, r, _| Ok(Value::Bool(l.loose_eq(r))));
                self.set_binary(BinOp::Ne, l, r, |l, r, _| Ok(Value::Bool(!l.loose_eq(r))));
            }
        }

        self.install_ordering(BinOp::Lt);
        self.install_ordering(BinOp::Le);
        self.install_ordering(BinOp::Gt);
        self.install_ordering(BinOp::Ge);

        self.set_unary(UnOp::Neg, Int, |v, _| Ok(Value::Int(as_int(v).wrapping_neg())));
        self.set_unary(UnOp::Neg, Real, |v, _| Ok(Value::Real(-as_real(v))));
        for ty in ValueType::ALL {
            self.set_unary(UnOp::Not, ty, |v, heap| Ok(Value::Bool(!v.truthy(heap))));
        }
    }

    fn install_sub(&mut self) {
        use ValueType::*;
        self.set_binary(BinOp::Sub, Int, Int, |l, r, _| Ok(Value::Int(as_int(l).wrapping_sub(as_int(r)))));
        self.set_binary(BinOp::Sub, Int, Real, |l, r, _| Ok(Value::Real(as_int(l) as f64 - as_real(r))));
        self.set_binary(BinOp::Sub, Real, Int, |l, r, _| Ok(Value::Real(as_real(l) - as_int(r) as f64)));
        self.set_binary(BinOp::Sub, Real, Real, |l, r, _| Ok(Value::Real(as_real(l) - as_real(r))));
    }

    fn install_mul(&mut self) {
        use ValueType::*;
        self.set_binary(BinOp::Mul, Int, Int, |l, r, _| Ok(Value::Int(as_int(l).wrapping_mul(as_int(r)))));
        self.set_binary(BinOp::Mul, Int, Real, |l, r, _| Ok(Value::Real(as_int(l) as f64 * as_real(r))));
        self.set_binary(BinOp::Mul, Real, Int, |l, r, _| Ok(Value::Real(as_real(l) * as_int(r) as f64)));
        self.set_binary(BinOp::Mul, Real, Real, |l, r, _| Ok(Value::Real(as_real(l) * as_real(r))));
    }

    /// Int/Real/String ordering cells for one of Lt/Le/Gt/Ge. The fn items
    /// differ per `op` only in which Rust operator they apply, so each is
    /// spelled out rather than threaded through as a closure parameter
    /// (cells need a plain `fn`, not a capturing closure).
    fn install_ordering(&mut self, op: BinOp) {
        use ValueType::*;
        match op {
            BinOp::Lt => {
                self.set_binary(op, Int, Int, |l, r, _| Ok(Value::Bool(as_int(l) < as_int(r))));
                self.set_binary(op, Int, Real, |l, r, _| Ok(Value::Bool((as_int(l) as f64) < as_real(r))));
                self.set_binary(op, Real, Int, |l, r, _| Ok(Value::Bool(as_real(l) < as_int(r) as f64)));
                self.set_binary(op, Real, Real, |l, r, _| Ok(Value::Bool(as_real(l) < as_real(r))));
                self.set_binary(op, String, String, |l, r, _| Ok(Value::Bool(as_str(l) < as_str(r))));
            }
            BinOp::Le => {
                self.set_binary(op, Int, Int, |l, r, _| Ok(Value::Bool(as_int(l) <= as_int(r))));
                self.set_binary(op, Int, Real, |l, r, _| Ok(Value::Bool((as_int(l) as f64) <= as_real(r))));
                self.set_binary(op, Real, Int, |l, r, _| Ok(Value::Bool(as_real(l) <= as_int(r) as f64)));
                self.set_binary(op, Real, Real, |l, r, _| Ok(Value::Bool(as_real(l) <= as_real(r))));
                self.set_binary(op, String, String, |l, r, _| Ok(Value::Bool(as_str(l) <= as_str(r))));
            }
            BinOp::Gt => {
                self.set_binary(op, Int, Int, |l, r, _| Ok(Value::Bool(as_int(l) > as_int(r))));
                self.set_binary(op, Int, Real, |l, r, _| Ok(Value::Bool((as_int(l) as f64) > as_real(r))));
                self.set_binary(op, Real, Int, |l, r, _| Ok(Value::Bool(as_real(l) > as_int(r) as f64)));
                self.set_binary(op, Real, Real, |l, r, _| Ok(Value::Bool(as_real(l) > as_real(r))));
                self.set_binary(op, String, String, |l, r, _| Ok(Value::Bool(as_str(l) > as_str(r))));
            }
            BinOp::Ge => {
                self.set_binary(op, Int, Int, |l, r, _| Ok(Value::Bool(as_int(l) >= as_int(r))));
                self.set_binary(op, Int, Real, |l, r, _| Ok(Value::Bool((as_int(l) as f64) >= as_real(r))));
                self.set_binary(op, Real, Int, |l, r, _| Ok(Value::Bool(as_real(l) >= as_int(r) as f64)));
                self.set_binary(op, Real, Real, |l, r, _| Ok(Value::Bool(as_real(l) >= as_real(r))));
                self.set_binary(op, String, String, |l, r, _| Ok(Value::Bool(as_str(l) >= as_str(r))));
            }
            _ => unreachable!("install_ordering only used for Lt/Le/Gt/Ge"),
        }
    }
}

fn as_int(v: &Value) -> i64 {
    match v {
        Value::Int(i) => *i,
        _ => unreachable!("dispatch cell type mismatch"),
    }
}

fn as_real(v: &Value) -> f64 {
    match v {
        Value::Real(r) => *r,
        _ => unreachable!("dispatch cell type mismatch"),
    }
}

fn as_str(v: &Value) -> &str {
    match v {
        Value::String(s) => s,
        _ => unreachable!("dispatch cell type mismatch"),
    }
}

fn as_handle(v: &Value) -> crate::heap::Handle {
    match v {
        Value::Array(h) => *h,
        _ => unreachable!("dispatch cell type mismatch"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_add_wraps() {
        let d = OperatorDispatcher::new();
        let mut heap = Heap::new();
        let result = d.binary(BinOp::Add, &Value::Int(i64::MAX), &Value::Int(1), &mut heap).unwrap();
        assert!(matches!(result, Value::Int(n) if n == i64::MIN));
    }

    #[test]
    fn int_div_by_zero_errors() {
        let d = OperatorDispatcher::new();
        let mut heap = Heap::new();
        let err = d.binary(BinOp::Div, &Value::Int(1), &Value::Int(0), &mut heap).unwrap_err();
        assert!(matches!(err, VmError::DivisionByZero { .. }));
    }

    #[test]
    fn mixed_int_real_promotes() {
        let d = OperatorDispatcher::new();
        let mut heap = Heap::new();
        let result = d.binary(BinOp::Add, &Value::Int(2), &Value::Real(0.5), &mut heap).unwrap();
        assert!(matches!(result, Value::Real(r) if r == 2.5));
    }

    #[test]
    fn unsupported_combination_is_type_mismatch() {
        let d = OperatorDispatcher::new();
        let mut heap = Heap::new();
        let err = d
            .binary(BinOp::Sub, &Value::string("a"), &Value::Int(1), &mut heap)
            .unwrap_err();
        assert!(matches!(err, VmError::TypeMismatch { .. }));
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        let d = OperatorDispatcher::new();
        let mut heap = Heap::new();
        let result = d
            .binary(BinOp::Eq, &Value::Real(f64::NAN), &Value::Real(f64::NAN), &mut heap)
            .unwrap();
        assert!(matches!(result, Value::Bool(false)));
    }
}
