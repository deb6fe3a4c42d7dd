//! Time-indexed sequencers: `sparseq`/`sparseq2` (sparse event lists keyed by
//! time offset) and `sampleseq`/`sampleseq2` (dense per-sample playback of a
//! shared buffer at a variable rate) (spec §4.3, §4.5).

use elementary_primitives::{Name, Value};

use crate::error::ErrorCode;
use crate::node::{input_or_silence, Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

#[derive(Clone, Copy)]
struct SparseEvent {
    time: f64,
    value: f32,
}

fn read_sparse_events(value: &Value) -> Option<Vec<SparseEvent>> {
    let arr = value.as_array()?;
    let mut events = Vec::with_capacity(arr.len());
    for entry in arr {
        let map = entry.as_map()?;
        let time = map.get("time").and_then(Value::as_f64)?;
        let value = map.get("value").and_then(Value::as_f32)?;
        events.push(SparseEvent { time, value });
    }
    events.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap());
    Some(events)
}

/// `sparseq(trig)`: a time-indexed (seconds, relative to the last reset
/// trigger) list of values. Resets its internal clock and event cursor on a
/// rising edge of input0 and walks forward through `sequence` as time passes.
pub struct SparSeqNode {
    events: Vec<SparseEvent>,
    cursor: usize,
    elapsed: f64,
    last_trigger: f32,
    held: f32,
    props: PropertyMap,
}
impl SparSeqNode {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("sequence", Value::Array(Vec::new()));
        Self {
            events: Vec::new(),
            cursor: 0,
            elapsed: 0.0,
            last_trigger: 0.0,
            held: 0.0,
            props,
        }
    }
}
impl GraphNode for SparSeqNode {
    fn kind(&self) -> &'static str {
        "sparseq"
    }
    fn min_inputs(&self) -> usize {
        1
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "sequence" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        let events = read_sparse_events(value).ok_or(ErrorCode::InvalidPropertyType)?;
        self.events = events;
        self.props.set("sequence", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let trig = input_or_silence(inputs, 0, &silence);
        let dt = 1.0 / ctx.sample_rate as f64;
        for i in 0..output.len() {
            if trig[i] > 0.0 && self.last_trigger <= 0.0 {
                self.elapsed = 0.0;
                self.cursor = 0;
            }
            self.last_trigger = trig[i];
            while self.cursor < self.events.len() && self.events[self.cursor].time <= self.elapsed {
                self.held = self.events[self.cursor].value;
                self.cursor += 1;
            }
            output[i] = self.held;
            self.elapsed += dt;
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.cursor = 0;
        self.elapsed = 0.0;
        self.last_trigger = 0.0;
        self.held = 0.0;
    }
}

/// `sparseq2(trig)`: like `sparseq`, but also emits a `"sparseq2"` event
/// carrying `{time, value}` on every event it crosses.
pub struct SparSeq2Node {
    events: Vec<SparseEvent>,
    cursor: usize,
    elapsed: f64,
    last_trigger: f32,
    held: f32,
    pending: Vec<SparseEvent>,
    props: PropertyMap,
}
impl SparSeq2Node {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("sequence", Value::Array(Vec::new()));
        Self {
            events: Vec::new(),
            cursor: 0,
            elapsed: 0.0,
            last_trigger: 0.0,
            held: 0.0,
            pending: Vec::new(),
            props,
        }
    }
}
impl GraphNode for SparSeq2Node {
    fn kind(&self) -> &'static str {
        "sparseq2"
    }
    fn min_inputs(&self) -> usize {
        1
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "sequence" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        let events = read_sparse_events(value).ok_or(ErrorCode::InvalidPropertyType)?;
        self.events = events;
        self.props.set("sequence", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let trig = input_or_silence(inputs, 0, &silence);
        let dt = 1.0 / ctx.sample_rate as f64;
        for i in 0..output.len() {
            if trig[i] > 0.0 && self.last_trigger <= 0.0 {
                self.elapsed = 0.0;
                self.cursor = 0;
            }
            self.last_trigger = trig[i];
            while self.cursor < self.events.len() && self.events[self.cursor].time <= self.elapsed {
                let ev = self.events[self.cursor];
                self.held = ev.value;
                self.pending.push(ev);
                self.cursor += 1;
            }
            output[i] = self.held;
            self.elapsed += dt;
        }
    }
    fn process_events(&mut self, emit: &mut dyn FnMut(Event)) {
        for ev in self.pending.drain(..) {
            let mut data = std::collections::BTreeMap::new();
            data.insert(Name::from("time"), Value::Number(ev.time));
            data.insert(Name::from("value"), Value::Number(ev.value as f64));
            emit(Event {
                kind: Name::from("sparseq2"),
                source: None,
                data: Value::Map(data),
            });
        }
    }
    fn reset(&mut self) {
        self.cursor = 0;
        self.elapsed = 0.0;
        self.last_trigger = 0.0;
        self.held = 0.0;
        self.pending.clear();
    }
}

/// `sampleseq(trig)`: plays back a shared float buffer (named by the `path`
/// property, resolved through [`crate::resource::SharedResourceMap`] at
/// property-set time) starting from sample zero on every rising edge,
/// advancing one frame per sample.
pub struct SampleSeqNode {
    buffer: Option<std::sync::Arc<[f32]>>,
    position: usize,
    playing: bool,
    last_trigger: f32,
    props: PropertyMap,
}
impl SampleSeqNode {
    pub fn new() -> Self {
        Self {
            buffer: None,
            position: 0,
            playing: false,
            last_trigger: 0.0,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for SampleSeqNode {
    fn kind(&self) -> &'static str {
        "sampleseq"
    }
    fn min_inputs(&self) -> usize {
        1
    }
    fn set_property(&mut self, ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "path" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        let name = value.as_str().ok_or(ErrorCode::InvalidPropertyType)?;
        let buf = ctx.resources.get(name).ok_or(ErrorCode::InvalidPropertyValue)?;
        self.buffer = Some(buf);
        self.props.set("path", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let trig = input_or_silence(inputs, 0, &silence);
        for i in 0..output.len() {
            if trig[i] > 0.0 && self.last_trigger <= 0.0 {
                self.position = 0;
                self.playing = true;
            }
            self.last_trigger = trig[i];
            output[i] = match (&self.buffer, self.playing) {
                (Some(buf), true) if self.position < buf.len() => {
                    let s = buf[self.position];
                    self.position += 1;
                    if self.position >= buf.len() {
                        self.playing = false;
                    }
                    s
                }
                _ => 0.0,
            };
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.position = 0;
        self.playing = false;
        self.last_trigger = 0.0;
    }
}

/// `sampleseq2(trig, rate)`: like `sampleseq`, but reads continuously at a
/// (possibly time-varying, possibly non-unity) rate given by input1, using a
/// phase vocoder so pitch and playback speed can be changed independently of
/// each other (spec §4.5).
pub struct SampleSeq2Node {
    buffer: Option<std::sync::Arc<[f32]>>,
    vocoder: super::pitch::PhaseVocoder,
    playing: bool,
    last_trigger: f32,
    props: PropertyMap,
}
impl SampleSeq2Node {
    pub fn new() -> Self {
        Self {
            buffer: None,
            vocoder: super::pitch::PhaseVocoder::new(),
            playing: false,
            last_trigger: 0.0,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for SampleSeq2Node {
    fn kind(&self) -> &'static str {
        "sampleseq2"
    }
    fn min_inputs(&self) -> usize {
        2
    }
    fn set_property(&mut self, ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "path" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        let name = value.as_str().ok_or(ErrorCode::InvalidPropertyType)?;
        let buf = ctx.resources.get(name).ok_or(ErrorCode::InvalidPropertyValue)?;
        self.buffer = Some(buf);
        self.props.set("path", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let trig = input_or_silence(inputs, 0, &silence);
        let ones = vec![1.0f32; ctx.block_size];
        let rate = inputs.get(1).and_then(|o| *o).filter(|s| s.len() >= ctx.block_size).unwrap_or(&ones);
        for i in 0..output.len() {
            if trig[i] > 0.0 && self.last_trigger <= 0.0 {
                self.vocoder.reset();
                self.playing = true;
            }
            self.last_trigger = trig[i];
            output[i] = match (&self.buffer, self.playing) {
                (Some(buf), true) => self.vocoder.next_sample(buf, rate[i]),
                _ => 0.0,
            };
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.vocoder.reset();
        self.playing = false;
        self.last_trigger = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_parts() -> (crate::log::RtLogSender, crate::resource::TapBus) {
        (crate::log::RtLogSender::non_rt(), crate::resource::TapBus::new())
    }

    fn sparse_value(pairs: &[(f64, f32)]) -> Value {
        Value::Array(
            pairs
                .iter()
                .map(|(t, v)| {
                    let mut m = std::collections::BTreeMap::new();
                    m.insert(Name::from("time"), Value::Number(*t));
                    m.insert(Name::from("value"), Value::Number(*v as f64));
                    Value::Map(m)
                })
                .collect(),
        )
    }

    #[test]
    fn sparseq_emits_values_as_time_crosses_event_boundaries() {
        let mut node = SparSeqNode::new();
        let resources = crate::resource::SharedResourceMap::new();
        let pctx = PropertyContext {
            sample_rate: 4,
            block_size: 4,
            resources: &resources,
        };
        node.set_property(&pctx, "sequence", &sparse_value(&[(0.0, 1.0), (0.5, 2.0)]))
            .unwrap();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(4, 4, 0, &mut logger, &mut tap);
        let trig = [1.0, 0.0, 0.0, 0.0];
        let mut out = vec![0.0; 4];
        node.process(&mut ctx, &[Some(&trig)], &mut out);
        assert_eq!(out, vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn sampleseq2_produces_finite_output_while_playing() {
        let mut node = SampleSeq2Node::new();
        let mut resources = crate::resource::SharedResourceMap::new();
        let tone: Vec<f32> = (0..4096).map(|i| (i as f32 * 0.05).sin()).collect();
        resources.insert(Name::from("tone"), std::sync::Arc::from(tone.into_boxed_slice()));
        let pctx = PropertyContext {
            sample_rate: 48_000,
            block_size: 16,
            resources: &resources,
        };
        node.set_property(&pctx, "path", &Value::String("tone".into())).unwrap();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 16, 0, &mut logger, &mut tap);
        let mut trig = vec![0.0f32; 16];
        trig[0] = 1.0;
        let rate = vec![1.2f32; 16];
        let mut out = vec![0.0; 16];
        node.process(&mut ctx, &[Some(&trig), Some(&rate)], &mut out);
        for s in out {
            assert!(s.is_finite());
        }
    }

    #[test]
    fn sampleseq_plays_through_buffer_then_stops() {
        let mut node = SampleSeqNode::new();
        let mut resources = crate::resource::SharedResourceMap::new();
        resources.insert(Name::from("buf"), std::sync::Arc::from(vec![1.0, 2.0, 3.0].into_boxed_slice()));
        let pctx = PropertyContext {
            sample_rate: 48_000,
            block_size: 5,
            resources: &resources,
        };
        node.set_property(&pctx, "path", &Value::String("buf".into())).unwrap();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 5, 0, &mut logger, &mut tap);
        let trig = [1.0, 0.0, 0.0, 0.0, 0.0];
        let mut out = vec![0.0; 5];
        node.process(&mut ctx, &[Some(&trig)], &mut out);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 0.0, 0.0]);
    }
}
