//! Oscillators: `cycle` (sine), `phasor`/`sphasor` (ramps), and the
//! band-limited `blepsaw`/`blepsquare`/`bleptriangle` family (spec §4.3).
//!
//! The polyBLEP correction is ported the same way `knaster_core_dsp`'s
//! `ugens::polyblep` ports it: from Martin Finke's C++ port of the PolyBLEP
//! generator by Tale (Jesusonic), released under the WDL/IPlug license.

use std::f32::consts::TAU;

use elementary_primitives::Value;

use crate::error::ErrorCode;
use crate::node::{input_or_silence, Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

fn blep(t: f32, dt: f32) -> f32 {
    if t < dt {
        let t = t / dt - 1.0;
        -(t * t)
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt + 1.0;
        t * t
    } else {
        0.0
    }
}

/// `cycle`: a sine oscillator driven by a frequency input (Hz), as used by
/// the "Hello sine" scenario in spec §8.
pub struct CycleNode {
    phase: f32,
    props: PropertyMap,
}
impl CycleNode {
    pub fn new() -> Self {
        Self {
            phase: 0.0,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for CycleNode {
    fn kind(&self) -> &'static str {
        "cycle"
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
            output[i] = (self.phase * TAU).sin();
            self.phase += freq[i] / sr;
            self.phase -= self.phase.floor();
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// `phasor`: a ramp from 0 to 1 at the frequency given by input0, wrapping.
pub struct PhasorNode {
    phase: f32,
    signed: bool,
    props: PropertyMap,
}
impl PhasorNode {
    pub fn new(signed: bool) -> Self {
        Self {
            phase: 0.0,
            signed,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for PhasorNode {
    fn kind(&self) -> &'static str {
        if self.signed {
            "sphasor"
        } else {
            "phasor"
        }
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
            output[i] = if self.signed {
                self.phase * 2.0 - 1.0
            } else {
                self.phase
            };
            self.phase += freq[i] / sr;
            self.phase -= self.phase.floor();
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// One of the three band-limited waveforms backed by the same phase
/// accumulator + polyBLEP correction.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum BlepShape {
    Saw,
    Square,
    Triangle,
}

pub struct BlepNode {
    shape: BlepShape,
    phase: f32,
    last_out: f32,
    integrator: f32,
    props: PropertyMap,
}
impl BlepNode {
    pub fn new(shape: BlepShape) -> Self {
        Self {
            shape,
            phase: 0.0,
            last_out: 0.0,
            integrator: 0.0,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for BlepNode {
    fn kind(&self) -> &'static str {
        match self.shape {
            BlepShape::Saw => "blepsaw",
            BlepShape::Square => "blepsquare",
            BlepShape::Triangle => "bleptriangle",
        }
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
            let dt = (freq[i] / sr).abs().max(1e-9);
            let raw = match self.shape {
                BlepShape::Saw => 2.0 * self.phase - 1.0,
                BlepShape::Square | BlepShape::Triangle => {
                    if self.phase < 0.5 {
                        1.0
                    } else {
                        -1.0
                    }
                }
            };
            let mut y = raw;
            match self.shape {
                BlepShape::Saw => {
                    y -= blep(self.phase, dt);
                }
                BlepShape::Square => {
                    y += blep(self.phase, dt);
                    let shifted = (self.phase + 0.5).fract();
                    y -= blep(shifted, dt);
                }
                BlepShape::Triangle => {
                    y += blep(self.phase, dt);
                    let shifted = (self.phase + 0.5).fract();
                    y -= blep(shifted, dt);
                    // Leaky integrator turns the band-limited square into a triangle.
                    self.integrator = self.integrator * 0.999 + y * dt * 4.0;
                    y = self.integrator;
                }
            }
            self.last_out = y;
            output[i] = y;
            self.phase += freq[i] / sr;
            self.phase -= self.phase.floor();
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {
        self.phase = 0.0;
        self.last_out = 0.0;
        self.integrator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_parts() -> (crate::log::RtLogSender, crate::resource::TapBus) {
        (crate::log::RtLogSender::non_rt(), crate::resource::TapBus::new())
    }

    #[test]
    fn cycle_produces_bounded_sine() {
        let mut node = CycleNode::new();
        let (mut logger, mut tap) = ctx_parts();
        let n = 4410;
        let freq = vec![440.0f32; n];
        let mut out = vec![0.0; n];
        let mut ctx = NodeContext::new(44_100, n, 0, &mut logger, &mut tap);
        node.process(&mut ctx, &[Some(&freq)], &mut out);
        for s in &out {
            assert!(s.abs() <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn phasor_wraps_between_zero_and_one() {
        let mut node = PhasorNode::new(false);
        let (mut logger, mut tap) = ctx_parts();
        let n = 100;
        let freq = vec![100.0f32; n];
        let mut out = vec![0.0; n];
        let mut ctx = NodeContext::new(1000, n, 0, &mut logger, &mut tap);
        node.process(&mut ctx, &[Some(&freq)], &mut out);
        for s in &out {
            assert!(*s >= 0.0 && *s < 1.0);
        }
    }
}
