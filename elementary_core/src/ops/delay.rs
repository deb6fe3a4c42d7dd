//! `delay`/`sdelay`: ring-buffer delay lines (spec §4.3).
//!
//! `delay`'s maximum length (the `size` property) can change after the node
//! is already live on the audio thread, so a resize is not applied in
//! place — it's handed off through an internal SPSC queue the same way
//! `elementary_runtime`'s render-sequence swap hands off a whole new
//! `Task` (see `elementary_primitives::spsc`); the audio thread adopts the
//! newest pending buffer at the top of the next `process` call rather than
//! reallocating mid-block.

use elementary_primitives::{SpscConsumer, SpscProducer, SpscQueue, Value};

use crate::error::ErrorCode;
use crate::node::{input_or_silence, Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

struct Ring {
    data: Vec<f32>,
    write: usize,
}
impl Ring {
    fn new(len: usize) -> Self {
        Self {
            data: vec![0.0; len.max(1)],
            write: 0,
        }
    }
    fn read(&self, delay_samples: usize) -> f32 {
        let len = self.data.len();
        let read = (self.write + len - delay_samples.min(len - 1)) % len;
        self.data[read]
    }
    fn write_sample(&mut self, input: f32) {
        let len = self.data.len();
        self.data[self.write] = input;
        self.write = (self.write + 1) % len;
    }
}

/// `delay(length, feedback, x)`: a feedback comb delay line. `size` sets the
/// ring's capacity in samples; input0 is the read offset within that ring
/// (so the delay time can itself be modulated up to the current capacity),
/// input1 is the feedback coefficient, and input2 is the signal to delay.
pub struct DelayNode {
    ring: Ring,
    resize_tx: SpscProducer<usize>,
    resize_rx: SpscConsumer<usize>,
    props: PropertyMap,
}
impl DelayNode {
    pub fn new() -> Self {
        let (resize_tx, resize_rx) = SpscQueue::new::<usize>(4);
        let mut props = PropertyMap::new();
        props.set("size", Value::Number(0.0));
        Self {
            ring: Ring::new(1),
            resize_tx,
            resize_rx,
            props,
        }
    }
}
impl GraphNode for DelayNode {
    fn kind(&self) -> &'static str {
        "delay"
    }
    fn min_inputs(&self) -> usize {
        3
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "size" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        let size = value.as_usize().ok_or(ErrorCode::InvalidPropertyType)?;
        let _ = self.resize_tx.push(size.max(1));
        self.props.set("size", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        if let Some(new_len) = self.resize_rx.pop_latest() {
            self.ring = Ring::new(new_len);
        }
        let silence = vec![0.0f32; ctx.block_size];
        let length = input_or_silence(inputs, 0, &silence);
        let feedback = input_or_silence(inputs, 1, &silence);
        let x = input_or_silence(inputs, 2, &silence);
        for i in 0..output.len() {
            let samples = length[i].max(0.0) as usize;
            let delayed = self.ring.read(samples);
            self.ring.write_sample(x[i] + feedback[i] * delayed);
            output[i] = delayed;
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.ring.data.fill(0.0);
        self.ring.write = 0;
    }
}

/// `sdelay(x)`: a fixed, sample-accurate single-sample-per-block delay
/// buffer whose length is set once at construction time via `size` and never
/// reallocated — the simple counterpart to [`DelayNode`] for callers who
/// don't need runtime resizing.
pub struct SDelayNode {
    ring: Vec<f32>,
    write: usize,
    props: PropertyMap,
}
impl SDelayNode {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("size", Value::Number(1.0));
        Self {
            ring: vec![0.0; 1],
            write: 0,
            props,
        }
    }
}
impl GraphNode for SDelayNode {
    fn kind(&self) -> &'static str {
        "sdelay"
    }
    fn min_inputs(&self) -> usize {
        1
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "size" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        let size = value.as_usize().ok_or(ErrorCode::InvalidPropertyType)?;
        self.ring = vec![0.0; size.max(1)];
        self.write = 0;
        self.props.set("size", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let x = input_or_silence(inputs, 0, &silence);
        let len = self.ring.len();
        for i in 0..output.len() {
            output[i] = self.ring[self.write];
            self.ring[self.write] = x[i];
            self.write = (self.write + 1) % len;
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.ring.fill(0.0);
        self.write = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_parts() -> (crate::log::RtLogSender, crate::resource::TapBus) {
        (crate::log::RtLogSender::non_rt(), crate::resource::TapBus::new())
    }

    #[test]
    fn delay_resize_takes_effect_on_next_block() {
        let mut node = DelayNode::new();
        let resources = crate::resource::SharedResourceMap::new();
        let pctx = PropertyContext {
            sample_rate: 48_000,
            block_size: 4,
            resources: &resources,
        };
        node.set_property(&pctx, "size", &Value::Number(4.0)).unwrap();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 4, 0, &mut logger, &mut tap);
        let delay_time = [2.0, 2.0, 2.0, 2.0];
        let feedback = [0.0, 0.0, 0.0, 0.0];
        let x = [1.0, 2.0, 3.0, 4.0];
        let mut out = vec![0.0; 4];
        node.process(&mut ctx, &[Some(&delay_time), Some(&feedback), Some(&x)], &mut out);
        assert_eq!(out, vec![0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn sdelay_round_trips_after_full_buffer_length() {
        let mut node = SDelayNode::new();
        let resources = crate::resource::SharedResourceMap::new();
        let pctx = PropertyContext {
            sample_rate: 48_000,
            block_size: 3,
            resources: &resources,
        };
        node.set_property(&pctx, "size", &Value::Number(3.0)).unwrap();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 3, 0, &mut logger, &mut tap);
        let x = [1.0, 2.0, 3.0];
        let mut out = vec![0.0; 3];
        node.process(&mut ctx, &[Some(&x)], &mut out);
        assert_eq!(out, vec![0.0, 0.0, 0.0]);
        let mut out2 = vec![0.0; 3];
        node.process(&mut ctx, &[Some(&x)], &mut out2);
        assert_eq!(out2, vec![1.0, 2.0, 3.0]);
    }
}
