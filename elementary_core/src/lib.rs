//! The `GraphNode` operator contract and the built-in elementary operator
//! set, generalized from `knaster_core`'s `UGen` trait and `knaster_core_dsp`'s
//! ugen library (see the root `DESIGN.md` for the full grounding ledger).

pub mod error;
pub mod log;
pub mod node;
pub mod ops;
pub mod pool;
pub mod registry;
pub mod resource;

pub use error::ErrorCode;
pub use log::{RtLogMessage, RtLogReceiver, RtLogSender};
pub use node::{format_node_id, Event, GraphNode, NodeContext, PropertyContext, PropertyMap};
pub use pool::RefCountedPool;
pub use registry::{NodeFactory, NodeRegistry};
pub use resource::{SharedResourceMap, TapBus};

/// Node identity as used on the wire (spec §3): client-assigned, unique for
/// the lifetime of the runtime. A plain `i32` rather than a generational key
/// because the wire protocol already guarantees uniqueness; see `DESIGN.md`.
pub type NodeId = i32;
