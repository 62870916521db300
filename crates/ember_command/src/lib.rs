//! The Command Stream (§3.5, §4.4, §5).
//!
//! A single-producer/single-consumer FIFO of GPU commands. The application
//! thread (producer) records commands while building and executing frame
//! graphs; a dedicated backend thread (consumer) drains them in strict
//! append order and calls into the concrete [`DriverApi`](ember_driver::DriverApi).
//!
//! Each command buffer is represented as a `Vec<Command>` of boxed closures
//! over `&mut dyn DriverApi` rather than raw byte records with a function
//! pointer + inline arguments: the source's POD record is exactly a
//! deferred call into the backend, and `Box<dyn FnOnce(&mut dyn DriverApi)>`
//! is the safe-Rust rendering of that (§9, "Dynamic dispatch for pass
//! executors" generalizes naturally to command records). A byte-budget
//! counter still enforces `per_frame_commands_bytes` so the ring-exhaustion
//! contract (§7, "Resource exhaustion" → panic) is preserved.

mod buffer;
mod queue;

pub use buffer::{Command, CommandBuffer};
pub use queue::{run_backend_loop, CommandQueue, Consumer, Producer};
