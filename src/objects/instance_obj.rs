//! Instances: a class reference and a field table.

use crate::heap::Handle;
use crate::value::Value;
use hashbrown::HashMap;

#[derive(Debug, Clone)]
pub struct InstanceObj {
    pub class: Handle,
    pub fields: HashMap<String, Value>,
}

impl InstanceObj {
    pub fn new(class: Handle) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn trace(&self, out: &mut Vec<Handle>) {
        out.push(self.class);
        for value in self.fields.values() {
            crate::heap::trace_value(value, out);
        }
    }
}
