//! Spectral analysis of one window
//!
//! Each block is FFT'd, the power spectra of all `number_of_fft` blocks are averaged,
//! and the result is reordered so bins run from `center - rate/2` up to `center + rate/2`.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner, Length};

use crate::{
    collaborators::{Analysis, Analyzer, Coordinates, Samples},
    complex::ComplexByte,
    error::BoxError,
};

// Full scale of one 8-bit component
const FULL_SCALE: f32 = 127.0;

/// Center frequency of every bin of an `n` point spectrum, lowest first
pub fn frequency_axis(center_frequency: f64, sample_rate: f64, n: usize) -> Vec<f64> {
    let step = sample_rate / n as f64;
    let half = (n / 2) as f64;
    (0..n)
        .map(|k| center_frequency + (k as f64 - half) * step)
        .collect()
}

/// Averages power spectra, reusing FFT plans across windows
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f32>,
    fft: Option<Arc<dyn Fft<f32>>>,
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            fft: None,
        }
    }

    fn fft_for(&mut self, n: usize) -> Arc<dyn Fft<f32>> {
        match &self.fft {
            Some(fft) if fft.len() == n => fft.clone(),
            _ => {
                let fft = self.planner.plan_fft_forward(n);
                self.fft = Some(fft.clone());
                fft
            }
        }
    }

    /// Mean power spectrum over `blocks`, in FFT order (DC first).
    /// Each bin is `|X_k|^2 / n^2` so the bins sum to the mean sample power.
    pub fn average_spectrum(&mut self, blocks: &[Vec<ComplexByte>]) -> Result<Vec<f64>, BoxError> {
        let n = blocks.first().map(Vec::len).unwrap_or(0);
        if n == 0 {
            return Err("no samples were acquired".into());
        }
        if blocks.iter().any(|b| b.len() != n) {
            return Err(format!("blocks differ in length, expected {} samples each", n).into());
        }
        let fft = self.fft_for(n);
        let mut buffer = vec![Complex::<f32>::default(); n];
        let mut scratch = vec![Complex::<f32>::default(); fft.get_inplace_scratch_len()];
        let mut accum = vec![0f64; n];
        let norm = (n as f64 * n as f64) * blocks.len() as f64;
        for block in blocks {
            for (out, s) in buffer.iter_mut().zip(block) {
                *out = Complex::new(s.re as f32 / FULL_SCALE, s.im as f32 / FULL_SCALE);
            }
            fft.process_with_scratch(&mut buffer, &mut scratch);
            for (acc, x) in accum.iter_mut().zip(&buffer) {
                *acc += x.norm_sqr() as f64 / norm;
            }
        }
        Ok(accum)
    }
}

/// Move the negative frequencies in front of DC
fn fft_shift(spectrum: &mut [f64]) {
    let half = spectrum.len() / 2;
    spectrum.rotate_left(spectrum.len() - half);
}

impl Analyzer for SpectrumAnalyzer {
    fn analyze(
        &mut self,
        samples: Samples,
        coordinates: &Coordinates,
    ) -> Result<Analysis, BoxError> {
        let mut spectrum = self.average_spectrum(&samples.blocks)?;
        fft_shift(&mut spectrum);
        let frequencies =
            frequency_axis(samples.center_frequency, samples.sample_rate, spectrum.len());
        let total_power = spectrum.iter().sum();
        Ok(Analysis {
            coordinates: *coordinates,
            frequencies,
            spectrum,
            total_power,
        })
    }
}
