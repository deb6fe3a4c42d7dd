//! Filters: `pole`, `env`, `biquad`, `prewarp`, `mm1p`, `svf`, `svfshelf`
//! (spec §4.3). Every coefficient input is audio-rate, so filters recompute
//! their coefficients every sample rather than caching block-rate snapshots
//! — the same tradeoff `knaster_core_dsp`'s biquad ugens make for
//! modulatable cutoff.

use std::f32::consts::PI;

use elementary_primitives::Value;

use crate::error::ErrorCode;
use crate::node::{input_or_silence, Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

/// `pole(a, x)`: a one-pole filter, `y[n] = x[n]*(1-|a|) + y[n-1]*a`.
pub struct PoleNode {
    last: f32,
    props: PropertyMap,
}
impl PoleNode {
    pub fn new() -> Self {
        Self {
            last: 0.0,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for PoleNode {
    fn kind(&self) -> &'static str {
        "pole"
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
        let a = input_or_silence(inputs, 0, &silence);
        let x = input_or_silence(inputs, 1, &silence);
        for i in 0..output.len() {
            let coeff = a[i].clamp(-0.999, 0.999);
            self.last = x[i] * (1.0 - coeff.abs()) + self.last * coeff;
            output[i] = self.last;
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.last = 0.0;
    }
}

/// `env(attack, release, x)`: a classic attack/release envelope follower
/// over the rectified signal.
pub struct EnvNode {
    level: f32,
    props: PropertyMap,
}
impl EnvNode {
    pub fn new() -> Self {
        Self {
            level: 0.0,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for EnvNode {
    fn kind(&self) -> &'static str {
        "env"
    }
    fn min_inputs(&self) -> usize {
        3
    }
    fn set_property(&mut self, _ctx: &PropertyContext, _key: &str, _value: &Value) -> Result<(), ErrorCode> {
        Err(ErrorCode::InvalidPropertyValue)
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let attack = input_or_silence(inputs, 0, &silence);
        let release = input_or_silence(inputs, 1, &silence);
        let x = input_or_silence(inputs, 2, &silence);
        let sr = ctx.sample_rate as f32;
        for i in 0..output.len() {
            let rectified = x[i].abs();
            let coeff = if rectified > self.level {
                (-1.0 / (attack[i].max(1e-6) * sr)).exp()
            } else {
                (-1.0 / (release[i].max(1e-6) * sr)).exp()
            };
            self.level = rectified + coeff * (self.level - rectified);
            output[i] = self.level;
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.level = 0.0;
    }
}

/// `prewarp(freq)`: bilinear-transform frequency prewarping, used by callers
/// building their own biquad coefficients from a cutoff.
pub struct PrewarpNode {
    props: PropertyMap,
}
impl PrewarpNode {
    pub fn new() -> Self {
        Self {
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for PrewarpNode {
    fn kind(&self) -> &'static str {
        "prewarp"
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
        let freq = input_or_silence(inputs, 0, &silence);
        let sr = ctx.sample_rate as f32;
        for i in 0..output.len() {
            output[i] = (PI * freq[i] / sr).tan() * sr / PI;
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {}
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum BiquadMode {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
    Allpass,
}

fn rbj_coeffs(mode: BiquadMode, freq: f32, q: f32, sr: f32) -> ([f32; 3], [f32; 2]) {
    let w0 = 2.0 * PI * freq.max(1.0) / sr;
    let (sin_w0, cos_w0) = w0.sin_cos();
    let alpha = sin_w0 / (2.0 * q.max(0.01));
    let (b0, b1, b2, a0, a1, a2) = match mode {
        BiquadMode::Lowpass => {
            let b1 = 1.0 - cos_w0;
            (b1 / 2.0, b1, b1 / 2.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
        }
        BiquadMode::Highpass => {
            let b1 = 1.0 + cos_w0;
            (b1 / 2.0, -b1, b1 / 2.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
        }
        BiquadMode::Bandpass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
        BiquadMode::Notch => (1.0, -2.0 * cos_w0, 1.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
        BiquadMode::Allpass => (1.0 - alpha, -2.0 * cos_w0, 1.0 + alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
    };
    ([b0 / a0, b1 / a0, b2 / a0], [a1 / a0, a2 / a0])
}

/// `biquad(freq, q, x)`: a direct-form-I biquad with coefficients recomputed
/// every sample from the RBJ cookbook formulas, selected by the `mode`
/// property.
pub struct BiquadNode {
    mode: BiquadMode,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
    props: PropertyMap,
}
impl BiquadNode {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("mode", Value::String("lowpass".into()));
        Self {
            mode: BiquadMode::Lowpass,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
            props,
        }
    }
}
impl GraphNode for BiquadNode {
    fn kind(&self) -> &'static str {
        "biquad"
    }
    fn min_inputs(&self) -> usize {
        3
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "mode" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        let mode = match value.as_str().ok_or(ErrorCode::InvalidPropertyType)? {
            "lowpass" => BiquadMode::Lowpass,
            "highpass" => BiquadMode::Highpass,
            "bandpass" => BiquadMode::Bandpass,
            "notch" => BiquadMode::Notch,
            "allpass" => BiquadMode::Allpass,
            _ => return Err(ErrorCode::InvalidPropertyValue),
        };
        self.mode = mode;
        self.props.set("mode", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let freq = input_or_silence(inputs, 0, &silence);
        let q = input_or_silence(inputs, 1, &silence);
        let x = input_or_silence(inputs, 2, &silence);
        let sr = ctx.sample_rate as f32;
        for i in 0..output.len() {
            let ([b0, b1, b2], [a1, a2]) = rbj_coeffs(self.mode, freq[i], q[i], sr);
            let y = b0 * x[i] + b1 * self.x1 + b2 * self.x2 - a1 * self.y1 - a2 * self.y2;
            self.x2 = self.x1;
            self.x1 = x[i];
            self.y2 = self.y1;
            self.y1 = y;
            output[i] = y;
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// `mm1p(freq, x)`: a multi-mode one-pole filter exposing lowpass or
/// highpass via the `mode` property (Zavalishin's topology-preserving form).
pub struct Mm1pNode {
    lowpass: bool,
    state: f32,
    props: PropertyMap,
}
impl Mm1pNode {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("mode", Value::String("lowpass".into()));
        Self {
            lowpass: true,
            state: 0.0,
            props,
        }
    }
}
impl GraphNode for Mm1pNode {
    fn kind(&self) -> &'static str {
        "mm1p"
    }
    fn min_inputs(&self) -> usize {
        2
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "mode" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        self.lowpass = match value.as_str().ok_or(ErrorCode::InvalidPropertyType)? {
            "lowpass" => true,
            "highpass" => false,
            _ => return Err(ErrorCode::InvalidPropertyValue),
        };
        self.props.set("mode", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let freq = input_or_silence(inputs, 0, &silence);
        let x = input_or_silence(inputs, 1, &silence);
        let sr = ctx.sample_rate as f32;
        for i in 0..output.len() {
            let g = (PI * freq[i].max(1.0) / sr).tan();
            let a = g / (1.0 + g);
            let lp = self.state + a * (x[i] - self.state);
            self.state = lp + a * (x[i] - lp);
            output[i] = if self.lowpass { lp } else { x[i] - lp };
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.state = 0.0;
    }
}

/// `svf(freq, q, x)`: a two-pole topology-preserving state variable filter,
/// selectable between lowpass/highpass/bandpass/notch via `mode`.
pub struct SvfNode {
    mode: BiquadMode,
    ic1eq: f32,
    ic2eq: f32,
    props: PropertyMap,
}
impl SvfNode {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("mode", Value::String("lowpass".into()));
        Self {
            mode: BiquadMode::Lowpass,
            ic1eq: 0.0,
            ic2eq: 0.0,
            props,
        }
    }

    fn step(&mut self, freq: f32, q: f32, x: f32, sr: f32) -> f32 {
        let g = (PI * freq.max(1.0) / sr).tan();
        let k = 1.0 / q.max(0.01);
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;
        let v3 = x - self.ic2eq;
        let v1 = a1 * self.ic1eq + a2 * v3;
        let v2 = self.ic2eq + a2 * self.ic1eq + a3 * v3;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;
        match self.mode {
            BiquadMode::Lowpass => v2,
            BiquadMode::Bandpass => v1,
            BiquadMode::Highpass => x - k * v1 - v2,
            BiquadMode::Notch => x - k * v1,
            BiquadMode::Allpass => x - 2.0 * k * v1,
        }
    }
}
impl GraphNode for SvfNode {
    fn kind(&self) -> &'static str {
        "svf"
    }
    fn min_inputs(&self) -> usize {
        3
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "mode" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        self.mode = match value.as_str().ok_or(ErrorCode::InvalidPropertyType)? {
            "lowpass" => BiquadMode::Lowpass,
            "highpass" => BiquadMode::Highpass,
            "bandpass" => BiquadMode::Bandpass,
            "notch" => BiquadMode::Notch,
            "allpass" => BiquadMode::Allpass,
            _ => return Err(ErrorCode::InvalidPropertyValue),
        };
        self.props.set("mode", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let freq = input_or_silence(inputs, 0, &silence);
        let q = input_or_silence(inputs, 1, &silence);
        let x = input_or_silence(inputs, 2, &silence);
        let sr = ctx.sample_rate as f32;
        for i in 0..output.len() {
            output[i] = self.step(freq[i], q[i], x[i], sr);
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

/// `svfshelf(freq, q, gainDb, x)`: a state-variable shelving filter built on
/// the same topology as [`SvfNode`], selectable between low-shelf and
/// high-shelf via `mode`.
pub struct SvfShelfNode {
    low_shelf: bool,
    ic1eq: f32,
    ic2eq: f32,
    props: PropertyMap,
}
impl SvfShelfNode {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("mode", Value::String("low".into()));
        Self {
            low_shelf: true,
            ic1eq: 0.0,
            ic2eq: 0.0,
            props,
        }
    }
}
impl GraphNode for SvfShelfNode {
    fn kind(&self) -> &'static str {
        "svfshelf"
    }
    fn min_inputs(&self) -> usize {
        4
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "mode" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        self.low_shelf = match value.as_str().ok_or(ErrorCode::InvalidPropertyType)? {
            "low" => true,
            "high" => false,
            _ => return Err(ErrorCode::InvalidPropertyValue),
        };
        self.props.set("mode", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let freq = input_or_silence(inputs, 0, &silence);
        let q = input_or_silence(inputs, 1, &silence);
        let gain_db = input_or_silence(inputs, 2, &silence);
        let x = input_or_silence(inputs, 3, &silence);
        let sr = ctx.sample_rate as f32;
        for i in 0..output.len() {
            let a = 10f32.powf(gain_db[i] / 40.0);
            let g = (PI * freq[i].max(1.0) / sr).tan() / a.sqrt();
            let k = 1.0 / q[i].max(0.01);
            let a1 = 1.0 / (1.0 + g * (g + k));
            let a2 = g * a1;
            let a3 = g * a2;
            let v3 = x[i] - self.ic2eq;
            let v1 = a1 * self.ic1eq + a2 * v3;
            let v2 = self.ic2eq + a2 * self.ic1eq + a3 * v3;
            self.ic1eq = 2.0 * v1 - self.ic1eq;
            self.ic2eq = 2.0 * v2 - self.ic2eq;
            let lp = v2;
            let hp = x[i] - k * v1 - v2;
            output[i] = if self.low_shelf {
                x[i] + (a * a - 1.0) * lp
            } else {
                x[i] + (a * a - 1.0) * hp
            };
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_parts() -> (crate::log::RtLogSender, crate::resource::TapBus) {
        (crate::log::RtLogSender::non_rt(), crate::resource::TapBus::new())
    }

    #[test]
    fn pole_smooths_a_step() {
        let mut node = PoleNode::new();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 4, 0, &mut logger, &mut tap);
        let a = [0.9, 0.9, 0.9, 0.9];
        let x = [1.0, 1.0, 1.0, 1.0];
        let mut out = vec![0.0; 4];
        node.process(&mut ctx, &[Some(&a), Some(&x)], &mut out);
        assert!(out[0] < out[3]);
        assert!(out[3] <= 1.0);
    }

    #[test]
    fn svf_lowpass_is_stable_for_dc_input() {
        let mut node = SvfNode::new();
        let (mut logger, mut tap) = ctx_parts();
        let mut ctx = NodeContext::new(48_000, 256, 0, &mut logger, &mut tap);
        let freq = vec![500.0f32; 256];
        let q = vec![0.707f32; 256];
        let x = vec![1.0f32; 256];
        let mut out = vec![0.0; 256];
        node.process(&mut ctx, &[Some(&freq), Some(&q), Some(&x)], &mut out);
        assert!((out[255] - 1.0).abs() < 0.1);
    }
}
