//! Convolution reverb: uniformly partitioned FFT convolution.
//!
//! The first `BLOCK` taps of the impulse response run in direct form, so the
//! wet signal has no added latency. The remaining taps are split into
//! `BLOCK`-sized partitions. Once per block their spectra are multiplied
//! against the spectra of past input blocks, summed, transformed back and
//! overlap-added into the next output block.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use log::warn;
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use super::buffer::AudioBuffer;

/// Scale applied when normalizing, chosen so an impulse response with unit
/// energy passes through at roughly unit gain.
const NORMALIZE_TARGET: f32 = 1.0;

/// Partition length, and the number of direct-form taps.
const BLOCK: usize = 256;

#[derive(Clone)]
pub struct Convolver {
    taps: usize,
    /// First `BLOCK` taps of the scaled impulse response.
    head: Vec<f32>,
    /// Spectra of the later partitions; `partitions[p]` covers taps
    /// `(p + 1) * BLOCK..(p + 2) * BLOCK`.
    partitions: Vec<Vec<Complex<f32>>>,
    /// Spectra of past input blocks, newest first, one per partition.
    spectra: VecDeque<Vec<Complex<f32>>>,
    /// Ring of the last `BLOCK` inputs; `pos` is both the write index and the
    /// offset into the current block.
    block: Vec<f32>,
    pos: usize,
    /// Partitioned contribution to the current output block.
    tail: Vec<f32>,
    /// Second half of the last inverse transform.
    overlap: Vec<f32>,
    frame: Vec<f32>,
    acc: Vec<Complex<f32>>,
    /// Samples left until the output decays to silence.
    ringing: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    ifft: Arc<dyn ComplexToReal<f32>>,
    pub normalize: bool,
}

impl fmt::Debug for Convolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Convolver")
            .field("taps", &self.taps)
            .field("partitions", &self.partitions.len())
            .field("ringing", &self.ringing)
            .field("normalize", &self.normalize)
            .finish()
    }
}

impl Convolver {
    pub fn new() -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(2 * BLOCK);
        let ifft = planner.plan_fft_inverse(2 * BLOCK);
        Convolver {
            taps: 0,
            head: Vec::new(),
            partitions: Vec::new(),
            spectra: VecDeque::new(),
            block: vec![0.0; BLOCK],
            pos: 0,
            tail: vec![0.0; BLOCK],
            overlap: vec![0.0; BLOCK],
            frame: fft.make_input_vec(),
            acc: fft.make_output_vec(),
            ringing: 0,
            fft,
            ifft,
            normalize: true,
        }
    }

    /// Load an impulse response, mixing it down to mono and resampling it to
    /// `output_sample_rate`. Clears all pending output.
    pub fn set_impulse_response(&mut self, ir: &AudioBuffer, output_sample_rate: f64) {
        let ratio = ir.sample_rate() as f64 / output_sample_rate;
        let len = (ir.len() as f64 / ratio).round() as usize;
        let mut kernel: Vec<f32> = (0..len)
            .map(|i| ir.read_interpolated(i as f64 * ratio) as f32)
            .collect();

        if self.normalize {
            let energy: f32 = kernel.iter().map(|s| s * s).sum();
            if energy > 0.0 {
                let scale = NORMALIZE_TARGET / energy.sqrt();
                kernel.iter_mut().for_each(|s| *s *= scale);
            }
        }

        let split = kernel.len().min(BLOCK);
        let partitions: Vec<_> = kernel[split..]
            .chunks(BLOCK)
            .map(|chunk| self.spectrum_of(chunk))
            .collect();

        self.taps = kernel.len();
        self.head = kernel[..split].to_vec();
        self.spectra = partitions
            .iter()
            .map(|_| vec![Complex::default(); BLOCK + 1])
            .collect();
        self.partitions = partitions;
        self.block.fill(0.0);
        self.tail.fill(0.0);
        self.overlap.fill(0.0);
        self.pos = 0;
        self.ringing = 0;
    }

    pub fn has_impulse_response(&self) -> bool {
        self.taps > 0
    }

    /// Length of the loaded impulse response at the output rate.
    pub fn taps(&self) -> usize {
        self.taps
    }

    /// Whether past input can still produce non-zero output.
    pub fn is_ringing(&self) -> bool {
        self.ringing > 0
    }

    /// Push one input sample and return one output sample. Without an
    /// impulse response the convolver outputs silence.
    pub fn process(&mut self, input: f32) -> f32 {
        if self.taps == 0 {
            return 0.0;
        }
        if input != 0.0 {
            self.ringing = self.taps + BLOCK;
        } else {
            self.ringing = self.ringing.saturating_sub(1);
        }

        self.block[self.pos] = input;
        let mut out = self.tail[self.pos];
        for (k, &h) in self.head.iter().enumerate() {
            // block[pos - k] is the input from k samples ago
            out += h * self.block[(self.pos + BLOCK - k) % BLOCK];
        }

        self.pos += 1;
        if self.pos == BLOCK {
            self.pos = 0;
            self.advance_block();
        }
        out
    }

    /// Fold the completed input block into the frequency-domain delay line and
    /// compute the partitioned part of the next output block.
    fn advance_block(&mut self) {
        if self.partitions.is_empty() {
            return;
        }

        self.frame[..BLOCK].copy_from_slice(&self.block);
        self.frame[BLOCK..].fill(0.0);
        let mut spectrum = self
            .spectra
            .pop_back()
            .unwrap_or_else(|| self.fft.make_output_vec());
        if let Err(e) = self.fft.process(&mut self.frame, &mut spectrum) {
            warn!("forward FFT failed: {e}");
        }
        self.spectra.push_front(spectrum);

        self.acc.fill(Complex::default());
        for (x, h) in self.spectra.iter().zip(&self.partitions) {
            for ((a, &x), &h) in self.acc.iter_mut().zip(x).zip(h) {
                *a += x * h;
            }
        }
        // DC and Nyquist bins of a real signal have no imaginary part.
        let last = self.acc.len() - 1;
        self.acc[0].im = 0.0;
        self.acc[last].im = 0.0;
        if let Err(e) = self.ifft.process(&mut self.acc, &mut self.frame) {
            warn!("inverse FFT failed: {e}");
        }

        let scale = 1.0 / (2 * BLOCK) as f32;
        for i in 0..BLOCK {
            self.tail[i] = self.frame[i] * scale + self.overlap[i];
            self.overlap[i] = self.frame[BLOCK + i] * scale;
        }
    }

    fn spectrum_of(&self, taps: &[f32]) -> Vec<Complex<f32>> {
        let mut frame = self.fft.make_input_vec();
        frame[..taps.len()].copy_from_slice(taps);
        let mut spectrum = self.fft.make_output_vec();
        if let Err(e) = self.fft.process(&mut frame, &mut spectrum) {
            warn!("forward FFT failed: {e}");
        }
        spectrum
    }
}

impl Default for Convolver {
    fn default() -> Self {
        Self::new()
    }
}
