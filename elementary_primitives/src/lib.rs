//! Leaf crate of the elementary runtime: the tagged dynamic [`Value`] and the
//! lock-free block-rate building blocks ([`SpscQueue`], [`RingBuffer`]) that
//! everything above this crate is built from.
//!
//! Mirrors `knaster_primitives` in scope: no graph, no operators, just the
//! vocabulary shared by the control and audio threads.

mod ring_buffer;
mod spsc;
mod value;

pub use ring_buffer::RingBuffer;
pub use spsc::{SpscConsumer, SpscProducer, SpscQueue};
pub use value::{FloatArray, Name, Value};

/// One block of audio samples processed together. Chosen freely by the host;
/// the runtime places no upper bound beyond what fits in memory.
pub type BlockSize = usize;
