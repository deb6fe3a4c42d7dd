//! Sample-and-hold style gates: `latch`, `snapshot`, `maxhold`, `once`
//! (spec §4.3, §4.6).
//!
//! `snapshot` plays a dual role: at audio rate it behaves like `latch`
//! (holding the sampled value at its output), and on every capture it also
//! emits a control-thread event carrying that value, which is why it shares
//! this module with the other gate-style sample holders rather than living
//! in `analyzers.rs` — the audio-rate behavior and the analyzer behavior are
//! the same capture, not two independent pieces of state.

use elementary_primitives::{Name, Value};

use crate::error::ErrorCode;
use crate::node::{input_or_silence, Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

/// `latch(trig, value)`: holds the value of input1 sampled on each rising
/// edge of input0.
pub struct LatchNode {
    held: f32,
    last_trigger: f32,
    props: PropertyMap,
}
impl LatchNode {
    pub fn new() -> Self {
        Self {
            held: 0.0,
            last_trigger: 0.0,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for LatchNode {
    fn kind(&self) -> &'static str {
        "latch"
    }
    fn min_inputs(&self) -> usize {
        2
    }
    fn set_property(&mut self, _ctx: &PropertyContext, _key: &str, _value: &Value) -> Result<(), ErrorCode> {
        Err(ErrorCode::InvalidPropertyValue)
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let trig = input_or_silence(inputs, 0, &silence);
        let value = input_or_silence(inputs, 1, &silence);
        for i in 0..output.len() {
            if trig[i] > 0.0 && self.last_trigger <= 0.0 {
                self.held = value[i];
            }
            self.last_trigger = trig[i];
            output[i] = self.held;
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.held = 0.0;
        self.last_trigger = 0.0;
    }
}

/// `snapshot(trig, value)`: like `latch`, but each capture also enqueues a
/// `"snapshot"` event for the control thread to drain (spec §4.6).
pub struct SnapshotNode {
    held: f32,
    last_trigger: f32,
    pending: Vec<f32>,
    props: PropertyMap,
}
impl SnapshotNode {
    pub fn new() -> Self {
        Self {
            held: 0.0,
            last_trigger: 0.0,
            pending: Vec::new(),
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for SnapshotNode {
    fn kind(&self) -> &'static str {
        "snapshot"
    }
    fn min_inputs(&self) -> usize {
        2
    }
    fn set_property(&mut self, _ctx: &PropertyContext, _key: &str, _value: &Value) -> Result<(), ErrorCode> {
        Err(ErrorCode::InvalidPropertyValue)
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let trig = input_or_silence(inputs, 0, &silence);
        let value = input_or_silence(inputs, 1, &silence);
        for i in 0..output.len() {
            if trig[i] > 0.0 && self.last_trigger <= 0.0 {
                self.held = value[i];
                self.pending.push(self.held);
            }
            self.last_trigger = trig[i];
            output[i] = self.held;
        }
    }
    fn process_events(&mut self, emit: &mut dyn FnMut(Event)) {
        for value in self.pending.drain(..) {
            emit(Event {
                kind: Name::from("snapshot"),
                source: None,
                data: Value::Number(value as f64),
            });
        }
    }
    fn reset(&mut self) {
        self.held = 0.0;
        self.last_trigger = 0.0;
        self.pending.clear();
    }
}

/// `maxhold(value, reset)`: running maximum of input0, clearable by a rising
/// edge on input1.
pub struct MaxHoldNode {
    max: f32,
    last_reset: f32,
    props: PropertyMap,
}
impl MaxHoldNode {
    pub fn new() -> Self {
        Self {
            max: f32::NEG_INFINITY,
            last_reset: 0.0,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for MaxHoldNode {
    fn kind(&self) -> &'static str {
        "maxhold"
    }
    fn min_inputs(&self) -> usize {
        1
    }
    fn set_property(&mut self, _ctx: &PropertyContext, _key: &str, _value: &Value) -> Result<(), ErrorCode> {
        Err(ErrorCode::InvalidPropertyValue)
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let value = input_or_silence(inputs, 0, &silence);
        let reset = input_or_silence(inputs, 1, &silence);
        for i in 0..output.len() {
            if reset[i] > 0.0 && self.last_reset <= 0.0 {
                self.max = f32::NEG_INFINITY;
            }
            self.last_reset = reset[i];
            self.max = self.max.max(value[i]);
            output[i] = if self.max.is_finite() { self.max } else { 0.0 };
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.max = f32::NEG_INFINITY;
        self.last_reset = 0.0;
    }
}

/// `once(value)`: passes input0 through on the very first sample after
/// construction or reset, then emits silence forever after.
pub struct OnceNode {
    fired: bool,
    props: PropertyMap,
}
impl OnceNode {
    pub fn new() -> Self {
        Self {
            fired: false,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for OnceNode {
    fn kind(&self) -> &'static str {
        "once"
    }
    fn min_inputs(&self) -> usize {
        1
    }
    fn set_property(&mut self, _ctx: &PropertyContext, _key: &str, _value: &Value) -> Result<(), ErrorCode> {
        Err(ErrorCode::InvalidPropertyValue)
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let value = input_or_silence(inputs, 0, &silence);
        for i in 0..output.len() {
            if !self.fired {
                output[i] = value[i];
                self.fired = true;
            } else {
                output[i] = 0.0;
            }
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_parts() -> (crate::log::RtLogSender, crate::resource::TapBus) {
        (crate::log::RtLogSender::non_rt(), crate::resource::TapBus::new())
    }

    #[test]
    fn latch_holds_value_at_rising_edge() {
        let mut node = LatchNode::new();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 4, 0, &mut logger, &mut tap);
        let trig = [0.0, 1.0, 0.0, 1.0];
        let value = [1.0, 2.0, 3.0, 4.0];
        let mut out = vec![0.0; 4];
        node.process(&mut ctx, &[Some(&trig), Some(&value)], &mut out);
        assert_eq!(out, vec![0.0, 2.0, 2.0, 4.0]);
    }

    #[test]
    fn snapshot_emits_one_event_per_capture() {
        let mut node = SnapshotNode::new();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 4, 0, &mut logger, &mut tap);
        let trig = [1.0, 0.0, 1.0, 0.0];
        let value = [5.0, 5.0, 9.0, 9.0];
        let mut out = vec![0.0; 4];
        node.process(&mut ctx, &[Some(&trig), Some(&value)], &mut out);
        let mut events = Vec::new();
        node.process_events(&mut |e| events.push(e));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn once_fires_a_single_sample() {
        let mut node = OnceNode::new();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 3, 0, &mut logger, &mut tap);
        let value = [7.0, 7.0, 7.0];
        let mut out = vec![0.0; 3];
        node.process(&mut ctx, &[Some(&value)], &mut out);
        assert_eq!(out, vec![7.0, 0.0, 0.0]);
    }
}
