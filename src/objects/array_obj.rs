//! Arrays: an ordered, growable sequence of values.

use crate::heap::Handle;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct ArrayObj {
    pub items: Vec<Value>,
}

impl ArrayObj {
    pub fn new(items: Vec<Value>) -> Self {
        Self { items }
    }

    pub fn trace(&self, out: &mut Vec<Handle>) {
        for value in &self.items {
            crate::heap::trace_value(value, out);
        }
    }
}
