//! Voices mixed by the output callback
//!
//! One voice per loaded sound. The session keeps at most one sound audible,
//! but a retiring sound may still be fading while nothing else plays, so the
//! mixer simply sums whatever is attached.

use encore_playback::{FadeCurve, FadeRamp, SoundNotifier};
use std::sync::Arc;
use std::time::Duration;

/// One loaded sound at the device sample rate
pub(crate) struct Voice {
    samples: Arc<Vec<f32>>,
    cursor: usize,
    playing: bool,
    gain: f32,
    fade: Option<FadeRamp>,
    notifier: SoundNotifier,
}

impl Voice {
    pub(crate) fn new(samples: Arc<Vec<f32>>, gain: f32, notifier: SoundNotifier) -> Self {
        Self {
            samples,
            cursor: 0,
            playing: false,
            gain,
            fade: None,
            notifier,
        }
    }

    fn frames(&self) -> usize {
        self.samples.len() / 2
    }
}

/// Attached voices plus the device format
pub(crate) struct Mixer {
    voices: Vec<(u64, Voice)>,
    sample_rate: u32,
}

impl Mixer {
    pub(crate) fn new(sample_rate: u32) -> Self {
        Self {
            voices: Vec::new(),
            sample_rate,
        }
    }

    pub(crate) fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub(crate) fn attach(&mut self, generation: u64, voice: Voice) {
        self.detach(generation);
        self.voices.push((generation, voice));
    }

    pub(crate) fn detach(&mut self, generation: u64) -> bool {
        let before = self.voices.len();
        self.voices.retain(|(g, _)| *g != generation);
        before != self.voices.len()
    }

    pub(crate) fn is_attached(&self, generation: u64) -> bool {
        self.voices.iter().any(|(g, _)| *g == generation)
    }

    fn voice_mut(&mut self, generation: u64) -> Option<&mut Voice> {
        self.voices
            .iter_mut()
            .find(|(g, _)| *g == generation)
            .map(|(_, v)| v)
    }

    fn voice(&self, generation: u64) -> Option<&Voice> {
        self.voices.iter().find(|(g, _)| *g == generation).map(|(_, v)| v)
    }

    pub(crate) fn set_playing(&mut self, generation: u64, playing: bool) -> bool {
        match self.voice_mut(generation) {
            Some(voice) => {
                // A finished voice restarts from the top
                if playing && voice.cursor >= voice.frames() {
                    voice.cursor = 0;
                }
                voice.playing = playing;
                true
            }
            None => false,
        }
    }

    pub(crate) fn seek(&mut self, generation: u64, position: Duration) -> bool {
        let rate = self.sample_rate;
        match self.voice_mut(generation) {
            Some(voice) => {
                let frame = (position.as_secs_f64() * f64::from(rate)) as usize;
                voice.cursor = frame.min(voice.frames());
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_gain(&mut self, generation: u64, gain: f32) {
        if let Some(voice) = self.voice_mut(generation) {
            voice.gain = gain;
        }
    }

    pub(crate) fn position(&self, generation: u64) -> Option<Duration> {
        self.voice(generation)
            .map(|v| Duration::from_secs_f64(v.cursor as f64 / f64::from(self.sample_rate)))
    }

    pub(crate) fn duration(&self, generation: u64) -> Option<Duration> {
        self.voice(generation)
            .map(|v| Duration::from_secs_f64(v.frames() as f64 / f64::from(self.sample_rate)))
    }

    /// Start fading; false if the voice is not audible
    pub(crate) fn start_fade(&mut self, generation: u64, duration: Duration, curve: FadeCurve) -> bool {
        let frames = FadeRamp::frames_for(duration, self.sample_rate);
        match self.voice_mut(generation) {
            Some(voice) if voice.playing && frames > 0 => {
                voice.fade = Some(FadeRamp::new(curve, frames));
                true
            }
            _ => false,
        }
    }

    /// Fill `output` (interleaved, `channels` wide) with the mix
    pub(crate) fn render(&mut self, output: &mut [f32], channels: usize) {
        output.fill(0.0);
        if channels == 0 {
            return;
        }

        for (_, voice) in &mut self.voices {
            if !voice.playing {
                continue;
            }

            for frame in output.chunks_exact_mut(channels) {
                if voice.cursor >= voice.frames() {
                    voice.playing = false;
                    // A retiring voice that runs out mid-fade has finished fading
                    if voice.fade.take().is_some() {
                        voice.notifier.fade_complete();
                    } else {
                        voice.notifier.ended();
                    }
                    break;
                }

                let mut gain = voice.gain;
                if let Some(ramp) = voice.fade.as_mut() {
                    gain *= ramp.next_gain();
                    if ramp.is_complete() {
                        voice.fade = None;
                        voice.playing = false;
                        voice.notifier.fade_complete();
                        break;
                    }
                }

                let left = voice.samples[voice.cursor * 2] * gain;
                let right = voice.samples[voice.cursor * 2 + 1] * gain;
                voice.cursor += 1;

                match frame {
                    [mono] => *mono += (left + right) * 0.5,
                    [l, r, ..] => {
                        *l += left;
                        *r += right;
                    }
                    [] => {}
                }
            }
        }

        for sample in output.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}
