//! Two-state upvalue cells: OPEN (borrows a live register) or CLOSED (owns
//! its value). The OPEN -> CLOSED transition happens at most once.

use crate::value::Value;
use crate::heap::Handle;

#[derive(Debug, Clone)]
pub enum UpvalueState {
    Open { slot_index: usize },
    Closed { value: Value },
}

#[derive(Debug, Clone)]
pub struct UpvalueObj {
    pub state: UpvalueState,
}

impl UpvalueObj {
    pub fn open(slot_index: usize) -> Self {
        Self {
            state: UpvalueState::Open { slot_index },
        }
    }

    pub fn is_open_at_or_after(&self, from_slot: usize) -> bool {
        matches!(self.state, UpvalueState::Open { slot_index } if slot_index >= from_slot)
    }

    pub fn trace(&self, out: &mut Vec<Handle>) {
        if let UpvalueState::Closed { value } = &self.state {
            crate::heap::trace_value(value, out);
        }
    }
}
