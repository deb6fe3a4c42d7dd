//! `seq`/`seq2`: step sequencers driven by a trigger input (spec §4.3).
//!
//! The `sequence` property can be replaced wholesale at any time; the actual
//! control-thread → audio-thread handoff for that replacement is generic
//! (every property write is marshalled through the same per-node queue in
//! `elementary_runtime`'s reconciler), so these nodes just hold the array
//! directly and trust it's only ever swapped between blocks.

use elementary_primitives::{Name, Value};

use crate::error::ErrorCode;
use crate::node::{input_or_silence, Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

fn read_sequence(value: &Value) -> Option<Vec<f32>> {
    let arr = value.as_array()?;
    arr.iter().map(Value::as_f32).collect()
}

/// `seq(trig)`: steps one index forward on each rising edge of input0,
/// wrapping at the end of `sequence`. With `hold` set, the stepped-to value
/// is held until the next edge; otherwise it's emitted only on the trigger
/// sample and silence fills the rest.
pub struct SeqNode {
    sequence: Vec<f32>,
    hold: bool,
    index: usize,
    last_trigger: f32,
    props: PropertyMap,
}
impl SeqNode {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("sequence", Value::Array(Vec::new()));
        props.set("hold", Value::Bool(true));
        Self {
            sequence: Vec::new(),
            hold: true,
            index: 0,
            last_trigger: 0.0,
            props,
        }
    }

    fn step(&mut self) -> f32 {
        if self.sequence.is_empty() {
            return 0.0;
        }
        let value = self.sequence[self.index];
        self.index = (self.index + 1) % self.sequence.len();
        value
    }
}
impl GraphNode for SeqNode {
    fn kind(&self) -> &'static str {
        "seq"
    }
    fn min_inputs(&self) -> usize {
        1
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        match key {
            "sequence" => {
                let seq = read_sequence(value).ok_or(ErrorCode::InvalidPropertyType)?;
                self.sequence = seq;
                self.index = 0;
                self.props.set("sequence", value.clone());
                Ok(())
            }
            "hold" => {
                let hold = value.as_bool().ok_or(ErrorCode::InvalidPropertyType)?;
                self.hold = hold;
                self.props.set("hold", value.clone());
                Ok(())
            }
            _ => Err(ErrorCode::InvalidPropertyValue),
        }
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let trig = input_or_silence(inputs, 0, &silence);
        let mut held = 0.0;
        for i in 0..output.len() {
            if trig[i] > 0.0 && self.last_trigger <= 0.0 {
                held = self.step();
                output[i] = held;
            } else {
                output[i] = if self.hold { held } else { 0.0 };
            }
            self.last_trigger = trig[i];
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.index = 0;
        self.last_trigger = 0.0;
    }
}

/// `seq2(trig)`: like `seq`, but also emits a `"seq2"` event carrying
/// `{value, index}` on every advance, so control-thread listeners can track
/// sequence position without polling the audio output.
pub struct Seq2Node {
    sequence: Vec<f32>,
    hold: bool,
    index: usize,
    last_trigger: f32,
    pending: Vec<(usize, f32)>,
    props: PropertyMap,
}
impl Seq2Node {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("sequence", Value::Array(Vec::new()));
        props.set("hold", Value::Bool(true));
        Self {
            sequence: Vec::new(),
            hold: true,
            index: 0,
            last_trigger: 0.0,
            pending: Vec::new(),
            props,
        }
    }
}
impl GraphNode for Seq2Node {
    fn kind(&self) -> &'static str {
        "seq2"
    }
    fn min_inputs(&self) -> usize {
        1
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        match key {
            "sequence" => {
                let seq = read_sequence(value).ok_or(ErrorCode::InvalidPropertyType)?;
                self.sequence = seq;
                self.index = 0;
                self.props.set("sequence", value.clone());
                Ok(())
            }
            "hold" => {
                let hold = value.as_bool().ok_or(ErrorCode::InvalidPropertyType)?;
                self.hold = hold;
                self.props.set("hold", value.clone());
                Ok(())
            }
            _ => Err(ErrorCode::InvalidPropertyValue),
        }
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let trig = input_or_silence(inputs, 0, &silence);
        let mut held = 0.0;
        for i in 0..output.len() {
            if trig[i] > 0.0 && self.last_trigger <= 0.0 && !self.sequence.is_empty() {
                let idx = self.index;
                held = self.sequence[idx];
                self.index = (self.index + 1) % self.sequence.len();
                self.pending.push((idx, held));
                output[i] = held;
            } else {
                output[i] = if self.hold { held } else { 0.0 };
            }
            self.last_trigger = trig[i];
        }
    }
    fn process_events(&mut self, emit: &mut dyn FnMut(Event)) {
        for (index, value) in self.pending.drain(..) {
            let mut data = std::collections::BTreeMap::new();
            data.insert(Name::from("index"), Value::Number(index as f64));
            data.insert(Name::from("value"), Value::Number(value as f64));
            emit(Event {
                kind: Name::from("seq2"),
                source: None,
                data: Value::Map(data),
            });
        }
    }
    fn reset(&mut self) {
        self.index = 0;
        self.last_trigger = 0.0;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_parts() -> (crate::log::RtLogSender, crate::resource::TapBus) {
        (crate::log::RtLogSender::non_rt(), crate::resource::TapBus::new())
    }

    fn set_sequence(node: &mut SeqNode, values: &[f32]) {
        let resources = crate::resource::SharedResourceMap::new();
        let pctx = PropertyContext {
            sample_rate: 48_000,
            block_size: 4,
            resources: &resources,
        };
        let arr = Value::Array(values.iter().map(|v| Value::Number(*v as f64)).collect());
        node.set_property(&pctx, "sequence", &arr).unwrap();
    }

    #[test]
    fn seq_advances_on_rising_edges_and_wraps() {
        let mut node = SeqNode::new();
        set_sequence(&mut node, &[1.0, 2.0, 3.0]);
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 5, 0, &mut logger, &mut tap);
        let trig = [1.0, 0.0, 1.0, 0.0, 1.0];
        let mut out = vec![0.0; 5];
        node.process(&mut ctx, &[Some(&trig)], &mut out);
        assert_eq!(out, vec![1.0, 1.0, 2.0, 2.0, 3.0]);
    }

    #[test]
    fn seq2_emits_index_and_value_events() {
        let mut node = Seq2Node::new();
        let resources = crate::resource::SharedResourceMap::new();
        let pctx = PropertyContext {
            sample_rate: 48_000,
            block_size: 4,
            resources: &resources,
        };
        let arr = Value::Array(vec![Value::Number(9.0), Value::Number(8.0)]);
        node.set_property(&pctx, "sequence", &arr).unwrap();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 2, 0, &mut logger, &mut tap);
        let trig = [1.0, 1.0];
        let mut out = vec![0.0; 2];
        node.process(&mut ctx, &[Some(&trig)], &mut out);
        let mut events = Vec::new();
        node.process_events(&mut |e| events.push(e));
        assert_eq!(events.len(), 2);
    }
}
