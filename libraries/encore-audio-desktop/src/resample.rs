//! Sample rate conversion with Rubato

use crate::decode::DecodedAudio;
use crate::error::{AudioError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use serde::{Deserialize, Serialize};

/// Input frames per resampler call
const CHUNK_FRAMES: usize = 1024;

/// Resampling quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplingQuality {
    /// Fast - Low CPU, good for older hardware
    /// 64 taps, 0.90 cutoff
    Fast,
    /// Balanced - Good quality with moderate CPU
    /// 128 taps, 0.95 cutoff
    #[default]
    Balanced,
    /// High - Excellent quality for critical listening
    /// 256 taps, 0.99 cutoff
    High,
}

impl ResamplingQuality {
    /// Sinc filter length
    pub fn sinc_len(self) -> usize {
        match self {
            Self::Fast => 64,
            Self::Balanced => 128,
            Self::High => 256,
        }
    }

    /// Frequency cutoff relative to Nyquist
    pub fn f_cutoff(self) -> f32 {
        match self {
            Self::Fast => 0.90,
            Self::Balanced => 0.95,
            Self::High => 0.99,
        }
    }

    /// Oversampling factor
    pub fn oversampling_factor(self) -> usize {
        match self {
            Self::Fast => 128,
            Self::Balanced => 256,
            Self::High => 512,
        }
    }

    fn parameters(self) -> SincInterpolationParameters {
        SincInterpolationParameters {
            sinc_len: self.sinc_len(),
            f_cutoff: self.f_cutoff(),
            interpolation: match self {
                Self::Fast => SincInterpolationType::Linear,
                _ => SincInterpolationType::Cubic,
            },
            oversampling_factor: self.oversampling_factor(),
            window: WindowFunction::BlackmanHarris2,
        }
    }
}

/// Convert stereo audio to `target_rate`; a no-op when the rates match
pub fn resample(audio: DecodedAudio, target_rate: u32, quality: ResamplingQuality) -> Result<DecodedAudio> {
    if audio.sample_rate == target_rate || audio.samples.is_empty() {
        return Ok(audio);
    }

    let ratio = f64::from(target_rate) / f64::from(audio.sample_rate);
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, quality.parameters(), CHUNK_FRAMES, 2)
        .map_err(|e| AudioError::ResampleError(e.to_string()))?;

    let frames = audio.frames();
    let expected = (frames as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected * 2 + CHUNK_FRAMES * 4);
    let mut chunk = vec![Vec::with_capacity(CHUNK_FRAMES); 2];

    let mut offset = 0;
    while offset < frames {
        let end = (offset + CHUNK_FRAMES).min(frames);
        for channel in &mut chunk {
            channel.clear();
        }
        for frame in audio.samples[offset * 2..end * 2].chunks_exact(2) {
            chunk[0].push(frame[0]);
            chunk[1].push(frame[1]);
        }
        // Last chunk: pad with silence to the fixed input size
        for channel in &mut chunk {
            channel.resize(CHUNK_FRAMES, 0.0);
        }

        let resampled = resampler
            .process(&chunk, None)
            .map_err(|e| AudioError::ResampleError(e.to_string()))?;
        for (l, r) in resampled[0].iter().zip(&resampled[1]) {
            output.push(*l);
            output.push(*r);
        }
        offset = end;
    }

    // Drop the filter delay at the start and the padding at the end
    let delay = resampler.output_delay();
    let start = (delay * 2).min(output.len());
    let end = (start + expected * 2).min(output.len());
    let samples = output[start..end].to_vec();

    Ok(DecodedAudio {
        samples,
        sample_rate: target_rate,
    })
}
