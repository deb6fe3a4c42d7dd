//! Public facade over the instruction reconciler, render-sequence compiler,
//! and block-rate scheduler that make up the engine (spec §2, §6.2): a host
//! only ever needs [`Runtime`] plus the [`Value`] wire type to drive it.

pub use elementary_core::{
    ErrorCode, Event, GraphNode, NodeContext, NodeFactory, NodeId, NodeRegistry, PropertyContext, PropertyMap,
    RtLogMessage, RtLogReceiver, RtLogSender, SharedResourceMap, TapBus,
};
pub use elementary_primitives::{BlockSize, FloatArray, Name, Value};
pub use elementary_runtime::{Diagnostics, Runtime, RuntimeOptions};
