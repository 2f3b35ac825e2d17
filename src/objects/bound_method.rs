//! Pairs a receiver instance with a callable, produced by method binding.

use crate::heap::Handle;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct BoundMethodObj {
    pub receiver: Value,
    pub callable: Value,
}

impl BoundMethodObj {
    pub fn trace(&self, out: &mut Vec<Handle>) {
        crate::heap::trace_value(&self.receiver, out);
        crate::heap::trace_value(&self.callable, out);
    }
}
