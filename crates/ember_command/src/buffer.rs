//! A single command buffer: one ring slot's worth of recorded commands.

use ember_driver::DriverApi;

/// A single recorded GPU command: a deferred call into the backend.
pub type Command = Box<dyn FnOnce(&mut dyn DriverApi) + Send>;

/// One ring slot. The producer appends into it with [`CommandBuffer::push`];
/// the consumer drains it in order with [`CommandBuffer::execute_all`].
///
/// `byte_budget` estimates the footprint of each record the way the
/// original's 8-byte-aligned POD records did, so the same budget
/// (`per_frame_commands_bytes`, §4.4.3) gates both representations.
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    bytes_used: usize,
}

/// Conservative estimate of a boxed command's on-the-wire footprint: enough
/// to make the byte budget mean something without requiring callers to
/// size their closures precisely.
const ESTIMATED_RECORD_OVERHEAD_BYTES: usize = 64;

impl CommandBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[must_use]
    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.bytes_used = 0;
    }

    /// Appends a command, accounting `extra_payload_bytes` (e.g. an inline
    /// matrix or debug-marker string) on top of the fixed record overhead.
    ///
    /// # Panics
    /// Panics if `budget_bytes` would be exceeded — per §7, running out of
    /// command-buffer space is a contract/configuration bug, not a
    /// recoverable error.
    pub fn push(&mut self, command: Command, extra_payload_bytes: usize, budget_bytes: usize) {
        let record_bytes = ESTIMATED_RECORD_OVERHEAD_BYTES + extra_payload_bytes;
        assert!(
            self.bytes_used + record_bytes <= budget_bytes,
            "command buffer budget exceeded: {} + {} > {budget_bytes}",
            self.bytes_used,
            record_bytes,
        );
        self.bytes_used += record_bytes;
        self.commands.push(command);
    }

    /// Drains and executes every command in append order against `driver`.
    pub fn execute_all(&mut self, driver: &mut dyn DriverApi) {
        for command in self.commands.drain(..) {
            command(driver);
        }
        self.bytes_used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_driver::NullDriver;

    #[test]
    fn push_then_execute_runs_in_order() {
        let mut buffer = CommandBuffer::new();
        let order = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let order = order.clone();
            buffer.push(
                Box::new(move |_driver| order.lock().push(label)),
                0,
                1024,
            );
        }

        let mut driver = NullDriver::new();
        buffer.execute_all(&mut driver);
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
        assert!(buffer.is_empty());
    }

    #[test]
    #[should_panic(expected = "command buffer budget exceeded")]
    fn push_past_budget_panics() {
        let mut buffer = CommandBuffer::new();
        buffer.push(Box::new(|_| {}), 0, 32);
    }
}
