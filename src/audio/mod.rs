pub mod capture;
pub mod features;
pub mod spectral;

pub use capture::{CpalSource, SampleSource, SilenceSource};
pub use features::FeatureExtractor;
pub use spectral::SpectralAnalyzer;

/// One frame's worth of extracted audio features.
///
/// Created fresh every frame and valid only for that frame: `waveform`
/// borrows the raw sample block, so consumers that need longer retention
/// must copy. All normalized fields are clamped into their documented
/// ranges before the snapshot is published.
#[derive(Debug, Clone)]
pub struct AudioFeatures<'a> {
    /// Smoothed RMS amplitude, 0..1.
    pub volume: f32,
    /// Smoothed volume rescaled to 0..100 and low-pass filtered again.
    pub loudness: f32,
    /// Largest absolute sample in the block, 0..1.
    pub peak: f32,
    /// Mean absolute sample in the block, 0..1.
    pub average: f32,
    /// `peak - average`; crude crest factor.
    pub dynamics: f32,

    /// Normalized band energies, 0..1 each.
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,

    /// Magnitude bins from the most recent transform (N/2 entries).
    pub spectrum: Vec<f32>,
    /// Energy-weighted mean bin index; proxy for brightness.
    pub spectrum_centroid: f32,
    /// Bin with the largest magnitude (DC excluded).
    pub dominant_band: usize,
    /// Raw magnitude sum, unnormalized. Used by trend/mood logic.
    pub energy: f32,

    pub beat_detected: bool,
    pub bpm: f32,
    /// Running count of beats that carried significant bass.
    pub bass_hits: u32,

    pub noise_floor: f32,
    pub signal_presence: bool,

    /// Read-only view of the raw sample block; do not retain past the frame.
    pub waveform: &'a [f32],
}

impl Default for AudioFeatures<'static> {
    fn default() -> Self {
        Self {
            volume: 0.0,
            loudness: 0.0,
            peak: 0.0,
            average: 0.0,
            dynamics: 0.0,
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
            spectrum: Vec::new(),
            spectrum_centroid: 0.0,
            dominant_band: 0,
            energy: 0.0,
            beat_detected: false,
            bpm: 0.0,
            bass_hits: 0,
            noise_floor: 0.0,
            signal_presence: false,
            waveform: &[],
        }
    }
}
