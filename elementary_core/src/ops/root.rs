//! `root`: the gain-faded output sink every render root resolves to (spec
//! §4.3, §4.7). Holds `active`, `channel`, `targetGain`, and `currentGain`;
//! `currentGain` slews toward `targetGain` at 20 gain-units/second
//! (`SPEC_FULL.md`'s resolution of the spec's unspecified fade slope),
//! enough to mute a root out over the 50ms the garbage collector gives a
//! fading-out render sequence before it's pruned.

use elementary_primitives::Value;

use crate::error::ErrorCode;
use crate::node::{input_or_silence, Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

const SLEW_PER_SECOND: f64 = 20.0;

pub struct RootNode {
    active: bool,
    channel: usize,
    target_gain: f32,
    current_gain: f32,
    props: PropertyMap,
}
impl RootNode {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("active", Value::Bool(true));
        props.set("channel", Value::Number(0.0));
        props.set("targetGain", Value::Number(1.0));
        Self {
            active: true,
            channel: 0,
            target_gain: 1.0,
            current_gain: 1.0,
            props,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_silent(&self) -> bool {
        !self.active && self.current_gain <= 1e-6
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn current_gain(&self) -> f32 {
        self.current_gain
    }
}
impl GraphNode for RootNode {
    fn kind(&self) -> &'static str {
        "root"
    }
    fn min_inputs(&self) -> usize {
        1
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        match key {
            "active" => {
                let active = value.as_bool().ok_or(ErrorCode::InvalidPropertyType)?;
                self.active = active;
                self.target_gain = if active { 1.0 } else { 0.0 };
                self.props.set("active", value.clone());
                Ok(())
            }
            "channel" => {
                let channel = value.as_usize().ok_or(ErrorCode::InvalidPropertyType)?;
                self.channel = channel;
                self.props.set("channel", value.clone());
                Ok(())
            }
            "targetGain" => {
                let gain = value.as_f32().ok_or(ErrorCode::InvalidPropertyType)?;
                self.target_gain = gain;
                self.props.set("targetGain", value.clone());
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
        let x = input_or_silence(inputs, 0, &silence);
        let step = (SLEW_PER_SECOND / ctx.sample_rate as f64) as f32;
        for i in 0..output.len() {
            if self.current_gain < self.target_gain {
                self.current_gain = (self.current_gain + step).min(self.target_gain);
            } else if self.current_gain > self.target_gain {
                self.current_gain = (self.current_gain - step).max(self.target_gain);
            }
            output[i] = x[i] * self.current_gain;
        }
        self.props.set("currentGain", Value::Number(self.current_gain as f64));
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.current_gain = self.target_gain;
    }
    fn root_state(&self) -> Option<(bool, bool)> {
        Some((self.active, self.is_silent()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_out_decays_monotonically_to_zero() {
        let mut node = RootNode::new();
        let resources = crate::resource::SharedResourceMap::new();
        let pctx = PropertyContext {
            sample_rate: 48_000,
            block_size: 48_000,
            resources: &resources,
        };
        node.set_property(&pctx, "active", &Value::Bool(false)).unwrap();
        let mut logger = crate::log::RtLogSender::non_rt();
        let mut tap = crate::resource::TapBus::new();
        let mut ctx = NodeContext::new(48_000, 48_000, 0, &mut logger, &mut tap);
        let x = vec![1.0f32; 48_000];
        let mut out = vec![0.0; 48_000];
        node.process(&mut ctx, &[Some(&x)], &mut out);
        let mut prev = f32::INFINITY;
        for sample in &out {
            assert!(*sample <= prev + 1e-6);
            prev = *sample;
        }
        assert!(out[out.len() - 1].abs() < 1e-5);
    }
}
