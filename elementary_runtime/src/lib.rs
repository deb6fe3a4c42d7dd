//! Instruction reconciler, render-sequence compiler, and block-rate
//! scheduler: the control-thread/audio-thread split described in spec §5,
//! exposed as one [`Runtime`] handle.

mod compiler;
mod diagnostics;
mod events;
mod instruction;
mod options;
mod reconciler;
mod runtime;

pub use diagnostics::Diagnostics;
pub use options::RuntimeOptions;
pub use runtime::Runtime;
