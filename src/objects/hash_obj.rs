//! Hashes (the `Object` builtin type): string-keyed maps. Insertion order is
//! kept for deterministic debug output but is not a guarantee exposed to
//! user code (`GET_KEYS`/`GET_VALUES` make no ordering promise).

use crate::heap::Handle;
use crate::value::Value;
use hashbrown::HashMap;

#[derive(Debug, Clone, Default)]
pub struct HashObj {
    index: HashMap<String, usize>,
    entries: Vec<(String, Value)>,
}

impl HashObj {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn insert(&mut self, key: String, value: Value) {
        if let Some(&i) = self.index.get(&key) {
            self.entries[i].1 = value;
        } else {
            self.index.insert(key.clone(), self.entries.len());
            self.entries.push((key, value));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn trace(&self, out: &mut Vec<Handle>) {
        for (_, value) in &self.entries {
            crate::heap::trace_value(value, out);
        }
    }
}
