//! VM execution state flags.

use bitflags::bitflags;

bitflags! {
    /// Indicates the status of the virtual machine's run loop.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct VMState: u8 {
        /// Execution has not started or is currently running.
        const NONE = 0;
        /// Execution completed successfully (`HALT` opcode reached).
        const HALT = 1 << 0;
        /// Execution terminated because of an uncaught exception.
        const FAULT = 1 << 1;
    }
}

impl VMState {
    pub fn is_halt(self) -> bool {
        self.contains(VMState::HALT)
    }

    pub fn is_fault(self) -> bool {
        self.contains(VMState::FAULT)
    }

    pub fn is_running(self) -> bool {
        self == VMState::NONE
    }
}
