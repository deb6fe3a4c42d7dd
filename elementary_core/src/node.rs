//! The operator contract (spec §2 `GraphNode`, §4.3) and its supporting
//! context/property-map types.

use std::collections::BTreeMap;

use elementary_primitives::{Name, Value};

use crate::error::ErrorCode;
use crate::log::RtLogSender;
use crate::resource::TapBus;

/// Renders a node id as the eight-hex-digit zero-padded diagnostic form
/// (spec §3: "Rendered textually as eight-hex-digit zero-padded for
/// diagnostics"), used by `snapshot()` and by event `source` stamping.
pub fn format_node_id(id: crate::NodeId) -> String {
    format!("{:08x}", id as u32)
}

/// Metadata about the block currently being processed, handed to every
/// [`GraphNode::process`] call. The analogue of `knaster_core::AudioCtx`.
pub struct NodeContext<'a> {
    pub sample_rate: u32,
    pub block_size: usize,
    /// Monotonically increasing count of samples processed before this block.
    pub frame_clock: u64,
    pub logger: &'a mut RtLogSender,
    /// The feedback tap bus (spec §4.4). Only `tapIn`/`tapOut` touch this;
    /// every other node ignores it.
    pub tap_bus: &'a mut TapBus,
}
impl<'a> NodeContext<'a> {
    pub fn new(
        sample_rate: u32,
        block_size: usize,
        frame_clock: u64,
        logger: &'a mut RtLogSender,
        tap_bus: &'a mut TapBus,
    ) -> Self {
        Self {
            sample_rate,
            block_size,
            frame_clock,
            logger,
            tap_bus,
        }
    }
}

/// Context available to [`GraphNode::set_property`], called only on the
/// control thread (spec §4.1, §5). Carries read access to the shared
/// resource map so properties that reference buffers by name (e.g.
/// `sample`'s `path`) can resolve them immediately, per spec §6.1's
/// requirement that "those buffers [must] have already been inserted".
pub struct PropertyContext<'a> {
    pub sample_rate: u32,
    pub block_size: usize,
    pub resources: &'a crate::resource::SharedResourceMap,
}

/// An event published by an analyzer node (spec §4.6) and drained by
/// [`crate::node::GraphNode::process_events`] on the control thread.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: Name,
    pub source: Option<Name>,
    pub data: Value,
}

/// A node's property map (string → [`Value`]), owned exclusively by the node
/// and mutated only on the control thread (spec §3). Kept as a `BTreeMap` so
/// `Runtime::snapshot` produces a deterministic ordering.
#[derive(Debug, Default, Clone)]
pub struct PropertyMap(BTreeMap<Name, Value>);
impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(Name::from(key), value);
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
    pub fn as_map(&self) -> &BTreeMap<Name, Value> {
        &self.0
    }
    pub fn to_value(&self) -> Value {
        Value::Map(self.0.clone())
    }
}

/// Abstract operator: the unit of computation in the node graph (spec §2, §4.3).
///
/// Every concrete node kind (`cycle`, `delay`, `tapOut`, the arithmetic set,
/// ...) implements this trait. Positional inputs are the node's children in
/// edge-table order (spec §3); if fewer inputs are provided than an operator
/// requires, it must write silence and return, never panic.
pub trait GraphNode: Send {
    /// The wire-format kind string this node was constructed from (e.g. `"cycle"`).
    fn kind(&self) -> &'static str;

    /// Number of positional audio inputs this node's current configuration
    /// expects. Operators that can't get by with fewer connected children
    /// report that here so the compiler can warn, but the contract (silence
    /// on missing input) holds regardless of what's reported.
    fn min_inputs(&self) -> usize {
        0
    }

    /// Apply a single property change, validating type and range (spec §4.1,
    /// §4.3). Must leave state unchanged and return an error on any
    /// violation — setters are not partially applied.
    fn set_property(&mut self, ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode>;

    /// The node's current properties, for `Runtime::snapshot` (spec §6.2).
    fn properties(&self) -> &PropertyMap;

    /// Process one block. `inputs[i]` is `None` when fewer children are wired
    /// than the operator uses positionally; implementations must treat a
    /// missing input as silence.
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]);

    /// Drain any pending analyzer readouts (spec §4.6). Called from the
    /// control thread via `Runtime::processEvents`; most nodes do nothing.
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}

    /// Reset transient state (stop sample readers, clear delay lines, zero
    /// phase accumulators). Does not touch properties.
    fn reset(&mut self);

    /// `(active, silent)` for a `root` node, used by the render-sequence
    /// compiler to pick the active-then-fading root set (spec §4.2, §4.3).
    /// `None` for every non-root kind.
    fn root_state(&self) -> Option<(bool, bool)> {
        None
    }
}

/// Read input `index`, or an all-silence slice of `len` samples if absent or
/// too short. A small helper every operator's `process` uses to honor the
/// "fewer inputs than required ⇒ silence" contract (spec §4.3) without
/// repeating the same branch in every node.
pub fn input_or_silence<'a>(inputs: &'a [Option<&'a [f32]>], index: usize, silence: &'a [f32]) -> &'a [f32] {
    inputs
        .get(index)
        .and_then(|o| *o)
        .filter(|s| s.len() >= silence.len())
        .unwrap_or(silence)
}
