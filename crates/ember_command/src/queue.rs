//! The mutex+condvar ring (§4.4.2): producer appends lock-free into its own
//! owned slot; only `flush` (publish) and the full-ring wait path touch the
//! shared mutex. `parking_lot::{Mutex, Condvar}` is used throughout, the
//! same primitive the teacher workspace reaches for everywhere it needs a
//! lock (`myth_resources`, `myth_scene`, `myth_app`, `myth_dev_utils`).

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use ember_driver::DriverApi;

use crate::buffer::{Command, CommandBuffer};

struct State {
    free: VecDeque<CommandBuffer>,
    published: VecDeque<CommandBuffer>,
    paused: bool,
    exit_requested: bool,
}

struct Shared {
    state: Mutex<State>,
    /// Signaled when a buffer is published (consumer wakes).
    not_empty: Condvar,
    /// Signaled when a drained buffer is returned to the free list
    /// (producer wakes if it was blocked in `flush`).
    not_full: Condvar,
}

/// Entry point: builds the ring and splits it into its producer/consumer
/// halves. `num_slots` is the ring's concurrent-frame capacity (default 3,
/// §4.4.3); `per_frame_commands_bytes` is the producer's per-buffer budget.
pub struct CommandQueue;

impl CommandQueue {
    #[must_use]
    pub fn new(num_slots: usize, per_frame_commands_bytes: usize) -> (Producer, Consumer) {
        assert!(num_slots >= 2, "a ring needs at least 2 slots to make progress");
        let mut free = VecDeque::with_capacity(num_slots);
        for _ in 0..num_slots {
            free.push_back(CommandBuffer::new());
        }
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                free,
                published: VecDeque::new(),
                paused: false,
                exit_requested: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        });
        let current = shared
            .state
            .lock()
            .free
            .pop_front()
            .expect("ring was just seeded with num_slots buffers");
        (
            Producer {
                shared: shared.clone(),
                current,
                budget_bytes: per_frame_commands_bytes,
            },
            Consumer { shared },
        )
    }
}

/// The producer half: owned by the application thread.
pub struct Producer {
    shared: Arc<Shared>,
    current: CommandBuffer,
    budget_bytes: usize,
}

impl Producer {
    /// Reserves room for one command in the producer's currently-owned
    /// buffer. Lock-free: no contention with the consumer while appending.
    ///
    /// # Panics
    /// Panics if the per-frame command budget would be exceeded (§7,
    /// "Resource exhaustion" is a bug, not a recoverable error).
    pub fn push(&mut self, command: Command, extra_payload_bytes: usize) {
        self.current.push(command, extra_payload_bytes, self.budget_bytes);
    }

    #[must_use]
    pub fn current_len(&self) -> usize {
        self.current.len()
    }

    /// Publishes the current buffer to the consumer and starts filling the
    /// next free one, blocking if the ring is momentarily full (every slot
    /// either published-and-undrained or in flight).
    pub fn flush(&mut self) {
        let finished = std::mem::replace(&mut self.current, CommandBuffer::new());
        let mut state = self.shared.state.lock();
        state.published.push_back(finished);
        self.shared.not_empty.notify_one();
        loop {
            if let Some(buffer) = state.free.pop_front() {
                self.current = buffer;
                return;
            }
            if state.exit_requested {
                // Shutdown in progress; hand back an empty scratch buffer
                // rather than deadlock waiting for a slot nobody will free.
                self.current = CommandBuffer::new();
                return;
            }
            log::debug!("command ring full, application thread waiting on backend to drain a slot");
            self.shared.not_full.wait(&mut state);
        }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.state.lock().paused
    }

    pub fn set_paused(&self, paused: bool) {
        self.shared.state.lock().paused = paused;
    }

    /// Signals the consumer loop to drain whatever is already published and
    /// return from [`Consumer::wait_for_commands`] with an empty result.
    pub fn request_exit(&self) {
        let mut state = self.shared.state.lock();
        state.exit_requested = true;
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
    }
}

/// The consumer half: owned by the backend thread.
pub struct Consumer {
    shared: Arc<Shared>,
}

impl Consumer {
    /// Blocks until at least one published buffer is available, or returns
    /// an empty `Vec` once [`Producer::request_exit`] has been called and
    /// nothing remains to drain.
    pub fn wait_for_commands(&mut self) -> Vec<CommandBuffer> {
        let mut state = self.shared.state.lock();
        while state.published.is_empty() && !state.exit_requested {
            self.shared.not_empty.wait(&mut state);
        }
        state.published.drain(..).collect()
    }

    /// Returns a drained buffer to the free list, waking a producer blocked
    /// in [`Producer::flush`] on a full ring.
    pub fn release_buffer(&mut self, mut buffer: CommandBuffer) {
        buffer.clear();
        let mut state = self.shared.state.lock();
        state.free.push_back(buffer);
        self.shared.not_full.notify_one();
    }

    #[must_use]
    pub fn exit_requested(&self) -> bool {
        self.shared.state.lock().exit_requested
    }
}

/// Runs the consumer side to completion: repeatedly drains published
/// buffers and executes them against `driver`, until [`Producer::request_exit`]
/// has been observed with nothing left published. This is the backend
/// thread's `loop()` from §4.8.1.
pub fn run_backend_loop(consumer: &mut Consumer, driver: &mut dyn DriverApi) {
    loop {
        let buffers = consumer.wait_for_commands();
        if buffers.is_empty() {
            if consumer.exit_requested() {
                return;
            }
            continue;
        }
        for mut buffer in buffers {
            buffer.execute_all(driver);
            consumer.release_buffer(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_driver::NullDriver;
    use std::sync::Arc as StdArc;

    #[test]
    fn fifo_order_within_one_flush() {
        let (mut producer, mut consumer) = CommandQueue::new(3, 1 << 20);
        let order = StdArc::new(Mutex::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let order = order.clone();
            producer.push(Box::new(move |_d| order.lock().push(label)), 0);
        }
        producer.flush();
        producer.request_exit();

        let mut driver = NullDriver::new();
        run_backend_loop(&mut consumer, &mut driver);
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn request_exit_unblocks_waiting_consumer() {
        let (producer, mut consumer) = CommandQueue::new(2, 4096);
        let handle = std::thread::spawn(move || consumer.wait_for_commands());
        std::thread::sleep(std::time::Duration::from_millis(20));
        producer.request_exit();
        let result = handle.join().expect("consumer thread should not panic");
        assert!(result.is_empty());
    }

    #[test]
    fn pause_flag_round_trips() {
        let (producer, _consumer) = CommandQueue::new(2, 4096);
        assert!(!producer.is_paused());
        producer.set_paused(true);
        assert!(producer.is_paused());
    }

    #[test]
    fn ring_backpressure_blocks_producer_until_consumer_drains() {
        let (mut producer, mut consumer) = CommandQueue::new(2, 4096);
        // Fill and flush twice: with 2 slots total and 1 already owned by the
        // producer, the second flush must wait for the consumer to release one.
        producer.flush();
        let blocked = std::thread::spawn(move || {
            producer.flush();
            producer
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        let buffers = consumer.wait_for_commands();
        for buffer in buffers {
            consumer.release_buffer(buffer);
        }
        let _producer = blocked.join().expect("producer thread should not panic");
    }
}
