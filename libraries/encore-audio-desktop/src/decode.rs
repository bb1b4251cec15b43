//! Whole-file decoding with Symphonia
//!
//! Every container and sample type Symphonia knows is decoded into one
//! interleaved stereo `f32` buffer:
//! - Float formats pass through (F32) or are cast (F64)
//! - Signed integers are divided by their MAX
//! - Unsigned integers are normalized to [0, 1] and scaled to [-1, 1]
//! - Mono is duplicated to both channels; extra channels are dropped

use crate::error::{AudioError, Result};
use std::io::Cursor;
use std::time::Duration;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Decoded audio, interleaved stereo
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved L/R samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate of `samples`
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Playing time at `sample_rate`
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }
}

/// Decode an in-memory file; `extension` helps format detection
pub fn decode(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::UnsupportedFormat("no audio track".into()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::UnsupportedFormat("unknown sample rate".into()))?;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => append_stereo_f32(decoded, &mut samples),
            // Corrupt packet: skip it and keep going
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!(error = %e, "skipping undecodable packet");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if samples.is_empty() {
        return Err(AudioError::Decode("no audio frames decoded".into()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Extension of the last path segment of a file path or URL
pub fn extension_of(resource: &str) -> Option<&str> {
    let path = resource.split(['?', '#']).next().unwrap_or(resource);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = file.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}

fn interleave_stereo<T, F>(buf: &AudioBuffer<T>, normalize: F, out: &mut Vec<f32>)
where
    T: Sample,
    F: Fn(T) -> f32,
{
    let channels = buf.spec().channels.count();
    if channels == 0 {
        return;
    }
    let left = buf.chan(0);
    let right = if channels > 1 { buf.chan(1) } else { left };

    out.reserve(buf.frames() * 2);
    for (l, r) in left.iter().zip(right) {
        out.push(normalize(*l));
        out.push(normalize(*r));
    }
}

fn append_stereo_f32(decoded: AudioBufferRef, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => interleave_stereo(&buf, |s| s, out),
        AudioBufferRef::F64(buf) => interleave_stereo(&buf, |s| s as f32, out),

        AudioBufferRef::S8(buf) => interleave_stereo(&buf, |s| s as f32 / i8::MAX as f32, out),
        AudioBufferRef::S16(buf) => interleave_stereo(&buf, |s| s as f32 / i16::MAX as f32, out),
        AudioBufferRef::S24(buf) => {
            interleave_stereo(&buf, |s| s.inner() as f32 / 8388607.0, out);
        }
        AudioBufferRef::S32(buf) => interleave_stereo(&buf, |s| s as f32 / i32::MAX as f32, out),

        AudioBufferRef::U8(buf) => {
            interleave_stereo(&buf, |s| (s as f32 / u8::MAX as f32) * 2.0 - 1.0, out);
        }
        AudioBufferRef::U16(buf) => {
            interleave_stereo(&buf, |s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0, out);
        }
        AudioBufferRef::U24(buf) => {
            interleave_stereo(&buf, |s| (s.inner() as f32 / 16777215.0) * 2.0 - 1.0, out);
        }
        AudioBufferRef::U32(buf) => {
            interleave_stereo(&buf, |s| (s as f32 / u32::MAX as f32) * 2.0 - 1.0, out);
        }
    }
}
