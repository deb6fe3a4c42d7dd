//! Analyzer nodes: `meter`, `scope`, `fft`, `capture` (spec §4.6). Each
//! passes its input through unchanged on the audio output and separately
//! accumulates readout data that `process_events` drains as control-thread
//! events — analyzers never block or allocate inside `process` itself; the
//! readout buffers are preallocated at construction.

use std::sync::Arc;

use elementary_primitives::{Name, Value};
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::error::ErrorCode;
use crate::node::{Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

/// `meter(x)`: emits a `"meter"` event once per block carrying the block's
/// minimum and maximum sample value (spec §4.6).
pub struct MeterNode {
    pending: Option<(f32, f32)>,
    props: PropertyMap,
}
impl MeterNode {
    pub fn new() -> Self {
        Self {
            pending: None,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for MeterNode {
    fn kind(&self) -> &'static str {
        "meter"
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
    fn process(&mut self, _ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let x = inputs.get(0).and_then(|o| *o).unwrap_or(&[]);
        if !x.is_empty() {
            let min = x.iter().cloned().fold(f32::INFINITY, f32::min);
            let max = x.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            self.pending = Some((min, max));
        }
        if x.len() == output.len() {
            output.copy_from_slice(x);
        } else {
            output.fill(0.0);
        }
    }
    fn process_events(&mut self, emit: &mut dyn FnMut(Event)) {
        if let Some((min, max)) = self.pending.take() {
            let mut data = std::collections::BTreeMap::new();
            data.insert(Name::from("min"), Value::Number(min as f64));
            data.insert(Name::from("max"), Value::Number(max as f64));
            emit(Event {
                kind: Name::from("meter"),
                source: None,
                data: Value::Map(data),
            });
        }
    }
    fn reset(&mut self) {
        self.pending = None;
    }
}

/// `scope(x)`: accumulates a fixed-size window of raw samples and emits a
/// `"scope"` event with the full window once it fills.
pub struct ScopeNode {
    window: Vec<f32>,
    capacity: usize,
    pending: Option<Vec<f32>>,
    props: PropertyMap,
}
impl ScopeNode {
    pub fn new(capacity: usize) -> Self {
        let mut props = PropertyMap::new();
        props.set("size", Value::Number(capacity as f64));
        Self {
            window: Vec::with_capacity(capacity),
            capacity,
            pending: None,
            props,
        }
    }
}
impl GraphNode for ScopeNode {
    fn kind(&self) -> &'static str {
        "scope"
    }
    fn min_inputs(&self) -> usize {
        1
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "size" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        let size = value.as_usize().ok_or(ErrorCode::InvalidPropertyType)?;
        self.capacity = size.max(1);
        self.window.clear();
        self.props.set("size", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, _ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let x = inputs.get(0).and_then(|o| *o).unwrap_or(&[]);
        for &s in x {
            self.window.push(s);
            if self.window.len() >= self.capacity {
                self.pending = Some(std::mem::take(&mut self.window));
                self.window.reserve(self.capacity);
            }
        }
        if x.len() == output.len() {
            output.copy_from_slice(x);
        } else {
            output.fill(0.0);
        }
    }
    fn process_events(&mut self, emit: &mut dyn FnMut(Event)) {
        if let Some(window) = self.pending.take() {
            emit(Event {
                kind: Name::from("scope"),
                source: None,
                data: Value::Array(window.into_iter().map(|s| Value::Number(s as f64)).collect()),
            });
        }
    }
    fn reset(&mut self) {
        self.window.clear();
        self.pending = None;
    }
}

/// `fft(x)`: a windowed magnitude-spectrum analyzer, emitting an `"fft"`
/// event with the magnitude bins each time its input window fills.
pub struct FftNode {
    fft: Arc<dyn Fft<f32>>,
    size: usize,
    window: Vec<f32>,
    pending: Option<Vec<f32>>,
    props: PropertyMap,
}
impl FftNode {
    pub fn new(size: usize) -> Self {
        let size = size.next_power_of_two().max(64);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let mut props = PropertyMap::new();
        props.set("size", Value::Number(size as f64));
        Self {
            fft,
            size,
            window: Vec::with_capacity(size),
            pending: None,
            props,
        }
    }
}
impl GraphNode for FftNode {
    fn kind(&self) -> &'static str {
        "fft"
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
    fn process(&mut self, _ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let x = inputs.get(0).and_then(|o| *o).unwrap_or(&[]);
        for &s in x {
            self.window.push(s);
            if self.window.len() >= self.size {
                let mut spectrum: Vec<Complex32> = self.window.drain(..).map(|s| Complex32::new(s, 0.0)).collect();
                self.fft.process(&mut spectrum);
                let bins = self.size / 2 + 1;
                let magnitudes: Vec<f32> = spectrum[..bins].iter().map(|c| c.norm() / self.size as f32).collect();
                self.pending = Some(magnitudes);
            }
        }
        if x.len() == output.len() {
            output.copy_from_slice(x);
        } else {
            output.fill(0.0);
        }
    }
    fn process_events(&mut self, emit: &mut dyn FnMut(Event)) {
        if let Some(magnitudes) = self.pending.take() {
            emit(Event {
                kind: Name::from("fft"),
                source: None,
                data: Value::Array(magnitudes.into_iter().map(|m| Value::Number(m as f64)).collect()),
            });
        }
    }
    fn reset(&mut self) {
        self.window.clear();
        self.pending = None;
    }
}

/// `capture(trig, x)`: records samples into a growable buffer while input0
/// is nonzero, emitting a `"capture"` event with the full recording on the
/// falling edge.
pub struct CaptureNode {
    recording: bool,
    buffer: Vec<f32>,
    pending: Option<Vec<f32>>,
    last_trigger: f32,
    props: PropertyMap,
}
impl CaptureNode {
    pub fn new() -> Self {
        Self {
            recording: false,
            buffer: Vec::new(),
            pending: None,
            last_trigger: 0.0,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for CaptureNode {
    fn kind(&self) -> &'static str {
        "capture"
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
        let trig = crate::node::input_or_silence(inputs, 0, &silence);
        let x = crate::node::input_or_silence(inputs, 1, &silence);
        for i in 0..output.len() {
            let on = trig[i] > 0.0;
            if on && self.last_trigger <= 0.0 {
                self.recording = true;
                self.buffer.clear();
            } else if !on && self.last_trigger > 0.0 {
                self.recording = false;
                self.pending = Some(std::mem::take(&mut self.buffer));
            }
            self.last_trigger = trig[i];
            if self.recording {
                self.buffer.push(x[i]);
            }
            output[i] = x[i];
        }
    }
    fn process_events(&mut self, emit: &mut dyn FnMut(Event)) {
        if let Some(recording) = self.pending.take() {
            emit(Event {
                kind: Name::from("capture"),
                source: None,
                data: Value::Array(recording.into_iter().map(|s| Value::Number(s as f64)).collect()),
            });
        }
    }
    fn reset(&mut self) {
        self.recording = false;
        self.buffer.clear();
        self.pending = None;
        self.last_trigger = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_parts() -> (crate::log::RtLogSender, crate::resource::TapBus) {
        (crate::log::RtLogSender::non_rt(), crate::resource::TapBus::new())
    }

    #[test]
    fn meter_reports_min_and_max_per_block() {
        let mut node = MeterNode::new();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 4, 0, &mut logger, &mut tap);
        let x = [0.1, -0.9, 0.3, 0.2];
        let mut out = vec![0.0; 4];
        node.process(&mut ctx, &[Some(&x)], &mut out);
        let mut events = Vec::new();
        node.process_events(&mut |e| events.push(e));
        assert_eq!(events.len(), 1);
        let map = events[0].data.as_map().unwrap();
        assert!((map.get("min").unwrap().as_f64().unwrap() - (-0.9)).abs() < 1e-6);
        assert!((map.get("max").unwrap().as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn fft_emits_once_window_fills() {
        let mut node = FftNode::new(64);
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 64, 0, &mut logger, &mut tap);
        let x: Vec<f32> = (0..64).map(|i| (i as f32 * 0.3).sin()).collect();
        let mut out = vec![0.0; 64];
        node.process(&mut ctx, &[Some(&x)], &mut out);
        let mut events = Vec::new();
        node.process_events(&mut |e| events.push(e));
        assert_eq!(events.len(), 1);
    }
}
