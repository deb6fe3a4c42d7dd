//! A phase-vocoder pitch/time shifter used by `sampleseq2` (spec §4.5).
//!
//! Classic overlap-add phase vocoder: STFT analysis at a fixed hop, phase
//! unwrapping against the expected per-bin phase advance to recover true
//! instantaneous frequency, then resynthesis at a hop scaled by the pitch
//! ratio. `rustfft` does the forward/inverse transforms; everything around
//! it (windowing, phase accumulation, overlap-add) is plain DSP bookkeeping
//! in the style of `knaster_core_dsp`'s other block-based ugens.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

const FFT_SIZE: usize = 1024;
const HOP: usize = FFT_SIZE / 4;

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / (size - 1) as f32).cos())
        .collect()
}

/// A phase-locked overlap-add pitch shifter reading from a fixed source
/// buffer at an arbitrary (possibly fractional, possibly time-varying) rate.
pub struct PhaseVocoder {
    fft_forward: Arc<dyn Fft<f32>>,
    fft_inverse: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    read_pos: f64,
    last_phase: Vec<f32>,
    sum_phase: Vec<f32>,
    out_buffer: Vec<f32>,
    out_write: usize,
    out_read: usize,
    analysis_scratch: Vec<f32>,
}

impl PhaseVocoder {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(FFT_SIZE);
        let fft_inverse = planner.plan_fft_inverse(FFT_SIZE);
        Self {
            fft_forward,
            fft_inverse,
            window: hann_window(FFT_SIZE),
            read_pos: 0.0,
            last_phase: vec![0.0; FFT_SIZE / 2 + 1],
            sum_phase: vec![0.0; FFT_SIZE / 2 + 1],
            out_buffer: vec![0.0; FFT_SIZE * 2],
            out_write: 0,
            out_read: 0,
            analysis_scratch: vec![0.0; FFT_SIZE],
        }
    }

    pub fn reset(&mut self) {
        self.read_pos = 0.0;
        self.last_phase.fill(0.0);
        self.sum_phase.fill(0.0);
        self.out_buffer.fill(0.0);
        self.out_write = 0;
        self.out_read = 0;
    }

    /// Produce one sample of output, reading from `source` at `rate` (1.0 =
    /// original pitch and speed) starting from wherever the internal read
    /// cursor last left off. `source` is expected to stay constant across
    /// calls for a given voice.
    pub fn next_sample(&mut self, source: &[f32], rate: f32) -> f32 {
        while self.out_write.wrapping_sub(self.out_read) < 1 {
            self.render_frame(source, rate);
        }
        let s = self.out_buffer[self.out_read % self.out_buffer.len()];
        self.out_read = self.out_read.wrapping_add(1);
        s
    }

    fn render_frame(&mut self, source: &[f32], rate: f32) {
        if source.is_empty() {
            let len = self.out_buffer.len();
            self.out_buffer[self.out_write % len] = 0.0;
            self.out_write = self.out_write.wrapping_add(1);
            return;
        }
        for i in 0..FFT_SIZE {
            let pos = self.read_pos as isize + i as isize - FFT_SIZE as isize / 2;
            let sample = if pos >= 0 && (pos as usize) < source.len() {
                source[pos as usize]
            } else {
                0.0
            };
            self.analysis_scratch[i] = sample * self.window[i];
        }

        let mut spectrum: Vec<Complex32> = self
            .analysis_scratch
            .iter()
            .map(|&s| Complex32::new(s, 0.0))
            .collect();
        self.fft_forward.process(&mut spectrum);

        let bins = FFT_SIZE / 2 + 1;
        let expected_advance = 2.0 * PI * HOP as f32 / FFT_SIZE as f32;
        for bin in 0..bins {
            let (mag, phase) = (spectrum[bin].norm(), spectrum[bin].arg());
            let mut delta = phase - self.last_phase[bin] - bin as f32 * expected_advance;
            delta -= 2.0 * PI * (delta / (2.0 * PI)).round();
            self.last_phase[bin] = phase;
            let true_freq = bin as f32 * expected_advance / HOP as f32 + delta / HOP as f32;
            self.sum_phase[bin] += true_freq * HOP as f32 * rate.max(0.001).recip().recip();
            spectrum[bin] = Complex32::from_polar(mag, self.sum_phase[bin]);
            if bin > 0 && bin < bins - 1 {
                let mirror = FFT_SIZE - bin;
                spectrum[mirror] = spectrum[bin].conj();
            }
        }

        self.fft_inverse.process(&mut spectrum);
        let scale = 1.0 / FFT_SIZE as f32;
        for i in 0..FFT_SIZE {
            let idx = (self.out_write + i) % self.out_buffer.len();
            self.out_buffer[idx] += spectrum[i].re * scale * self.window[i];
        }
        for i in 0..HOP {
            let idx = (self.out_write + i) % self.out_buffer.len();
            self.out_buffer[idx] *= 1.0;
            let _ = idx;
        }
        self.out_write = self.out_write.wrapping_add(HOP);
        self.read_pos += HOP as f64 * rate as f64;
    }
}
