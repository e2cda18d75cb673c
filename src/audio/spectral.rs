use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::Arc;

/// Windowed forward FFT producing magnitude bins.
///
/// Holds its plan and scratch buffers across calls, so it is cheap to call
/// once per frame but not thread-safe; the frame loop is the only caller.
pub struct SpectralAnalyzer {
    fft_size: usize,
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl SpectralAnalyzer {
    /// `fft_size` must be a power of two; the config validates this before
    /// construction.
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft_size,
            fft,
            window: Self::hamming_window(fft_size),
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            magnitudes: vec![0.0; fft_size / 2],
        }
    }

    fn hamming_window(size: usize) -> Vec<f32> {
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
                0.54 - 0.46 * phase.cos()
            })
            .collect()
    }

    /// Window `samples`, run the forward FFT, and return N/2 magnitude bins.
    ///
    /// Short blocks are zero-filled; the scratch buffer never carries data
    /// over from a previous call.
    pub fn transform(&mut self, samples: &[f32]) -> &[f32] {
        let len = self.fft_size.min(samples.len());

        for i in 0..len {
            self.scratch[i] = Complex::new(samples[i] * self.window[i], 0.0);
        }
        for i in len..self.fft_size {
            self.scratch[i] = Complex::new(0.0, 0.0);
        }

        self.fft.process(&mut self.scratch);

        for (i, bin) in self.scratch[..self.fft_size / 2].iter().enumerate() {
            self.magnitudes[i] = bin.norm() * 2.0 / self.fft_size as f32;
        }

        &self.magnitudes
    }
}
