//! Classes: a name, optional superclass, and a method table.

use crate::heap::Handle;
use crate::value::Value;
use hashbrown::HashMap;

#[derive(Debug, Clone)]
pub struct ClassObj {
    pub name: String,
    pub superclass: Option<Handle>,
    pub methods: HashMap<String, Value>,
}

impl ClassObj {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            methods: HashMap::new(),
        }
    }

    pub fn trace(&self, out: &mut Vec<Handle>) {
        if let Some(sup) = self.superclass {
            out.push(sup);
        }
        for value in self.methods.values() {
            crate::heap::trace_value(value, out);
        }
    }
}
