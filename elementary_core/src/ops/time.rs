//! Clock and accumulator utilities: `sr`, `time`, `counter`, `accum`, `z`
//! (spec §4.3).

use elementary_primitives::Value;

use crate::error::ErrorCode;
use crate::node::{input_or_silence, Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

/// `sr`: emits the sample rate as a constant block.
pub struct SampleRateNode {
    props: PropertyMap,
}
impl SampleRateNode {
    pub fn new() -> Self {
        Self {
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for SampleRateNode {
    fn kind(&self) -> &'static str {
        "sr"
    }
    fn set_property(&mut self, _ctx: &PropertyContext, _key: &str, _value: &Value) -> Result<(), ErrorCode> {
        Err(ErrorCode::InvalidPropertyValue)
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, _inputs: &[Option<&[f32]>], output: &mut [f32]) {
        output.fill(ctx.sample_rate as f32);
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {}
}

/// `time`: emits the running time in seconds, sample-accurate within the block.
pub struct TimeNode {
    props: PropertyMap,
}
impl TimeNode {
    pub fn new() -> Self {
        Self {
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for TimeNode {
    fn kind(&self) -> &'static str {
        "time"
    }
    fn set_property(&mut self, _ctx: &PropertyContext, _key: &str, _value: &Value) -> Result<(), ErrorCode> {
        Err(ErrorCode::InvalidPropertyValue)
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, _inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let sr = ctx.sample_rate as f64;
        for (i, out) in output.iter_mut().enumerate() {
            *out = ((ctx.frame_clock + i as u64) as f64 / sr) as f32;
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {}
}

/// `counter`: counts rising-edge triggers on input0, emitting the running count.
pub struct CounterNode {
    count: f32,
    last_trigger: f32,
    props: PropertyMap,
}
impl CounterNode {
    pub fn new() -> Self {
        Self {
            count: 0.0,
            last_trigger: 0.0,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for CounterNode {
    fn kind(&self) -> &'static str {
        "counter"
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
        let trig = input_or_silence(inputs, 0, &silence);
        for i in 0..output.len() {
            if trig[i] > 0.0 && self.last_trigger <= 0.0 {
                self.count += 1.0;
            }
            self.last_trigger = trig[i];
            output[i] = self.count;
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.count = 0.0;
        self.last_trigger = 0.0;
    }
}

/// `accum`: integrates input0, optionally reset by a rising edge on input1.
pub struct AccumNode {
    sum: f32,
    last_reset: f32,
    props: PropertyMap,
}
impl AccumNode {
    pub fn new() -> Self {
        Self {
            sum: 0.0,
            last_reset: 0.0,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for AccumNode {
    fn kind(&self) -> &'static str {
        "accum"
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
        let delta = input_or_silence(inputs, 0, &silence);
        let reset = input_or_silence(inputs, 1, &silence);
        for i in 0..output.len() {
            if reset[i] > 0.0 && self.last_reset <= 0.0 {
                self.sum = 0.0;
            }
            self.last_reset = reset[i];
            self.sum += delta[i];
            output[i] = self.sum;
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.sum = 0.0;
        self.last_reset = 0.0;
    }
}

/// `z`: a one-sample delay (feeds input0's previous sample forward).
pub struct ZNode {
    last: f32,
    props: PropertyMap,
}
impl ZNode {
    pub fn new() -> Self {
        Self {
            last: 0.0,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for ZNode {
    fn kind(&self) -> &'static str {
        "z"
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
        let input = input_or_silence(inputs, 0, &silence);
        for i in 0..output.len() {
            output[i] = self.last;
            self.last = input[i];
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.last = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_parts() -> (crate::log::RtLogSender, crate::resource::TapBus) {
        (crate::log::RtLogSender::non_rt(), crate::resource::TapBus::new())
    }

    #[test]
    fn counter_counts_rising_edges_only() {
        let mut node = CounterNode::new();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 5, 0, &mut logger, &mut tap);
        let trig = [0.0, 1.0, 1.0, 0.0, 1.0];
        let mut out = vec![0.0; 5];
        node.process(&mut ctx, &[Some(&trig)], &mut out);
        assert_eq!(out, vec![0.0, 1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn z_delays_by_one_sample() {
        let mut node = ZNode::new();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 4, 0, &mut logger, &mut tap);
        let input = [1.0, 2.0, 3.0, 4.0];
        let mut out = vec![0.0; 4];
        node.process(&mut ctx, &[Some(&input)], &mut out);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0]);
    }
}
