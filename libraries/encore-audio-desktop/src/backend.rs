//! CPAL sound backend
//!
//! **Architecture**: a dedicated output thread owns the CPAL stream (streams
//! are not `Send` on every platform) and renders the shared [`Mixer`] from the
//! audio callback. Loads go to the [`TrackLoader`] thread. Sounds handed to
//! the session only touch the mixer through its mutex.

use crate::error::{AudioError, Result};
use crate::loader::{LoadJob, SoundSlot, TrackLoader};
use crate::mixer::Mixer;
use crate::resample::ResamplingQuality;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};
use encore_playback::{FadeCurve, FadeStart, LoadRequest, PlaybackError, Sound, SoundBackend};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Output configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Quality used when a file's rate differs from the device rate
    pub resampling: ResamplingQuality,
}

type SharedMixer = Arc<Mutex<Mixer>>;

fn lock(mixer: &SharedMixer) -> MutexGuard<'_, Mixer> {
    mixer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sound backend playing through the default output device
pub struct DesktopBackend {
    mixer: SharedMixer,
    loader: TrackLoader,
    sample_rate: u32,
    shutdown_tx: Sender<()>,
    _output_thread: JoinHandle<()>,
}

impl DesktopBackend {
    /// Open the default output device
    ///
    /// # Errors
    /// Returns an error if no device is found or the stream cannot start
    pub fn new(settings: OutputSettings) -> Result<Self> {
        let (ready_tx, ready_rx) = bounded::<Result<SharedMixer>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let output_thread = thread::Builder::new()
            .name("encore-output".to_string())
            .spawn(move || output_thread_run(&ready_tx, &shutdown_rx))
            .map_err(|e| AudioError::DeviceError(e.to_string()))?;

        let mixer = ready_rx
            .recv()
            .map_err(|_| AudioError::ThreadGone("output"))??;
        let sample_rate = lock(&mixer).sample_rate();

        let loader = TrackLoader::spawn(Arc::clone(&mixer), settings.resampling)
            .map_err(|e| AudioError::DeviceError(e.to_string()))?;

        tracing::info!(sample_rate, resampling = ?settings.resampling, "audio output ready");

        Ok(Self {
            mixer,
            loader,
            sample_rate,
            shutdown_tx,
            _output_thread: output_thread,
        })
    }

    /// Device sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for DesktopBackend {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Output thread main loop
///
/// Builds the stream, reports readiness, then parks until shutdown.
fn output_thread_run(ready: &Sender<Result<SharedMixer>>, shutdown: &Receiver<()>) {
    let stream = match open_stream() {
        Ok((stream, mixer)) => {
            let _ = ready.send(Ok(mixer));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Either a shutdown message or the backend being dropped ends the thread
    let _ = shutdown.recv();
    drop(stream);
    tracing::debug!("audio output stopped");
}

fn open_stream() -> Result<(cpal::Stream, SharedMixer)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioError::DeviceNotFound)?;

    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate();
    let channels = usize::from(config.channels());
    let config = config.config();

    let mixer: SharedMixer = Arc::new(Mutex::new(Mixer::new(sample_rate)));
    let callback_mixer = Arc::clone(&mixer);

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            // Never block the audio callback; a contended frame plays silence
            match callback_mixer.try_lock() {
                Ok(mut mixer) => mixer.render(data, channels),
                Err(_) => data.fill(0.0),
            }
        },
        |err| tracing::error!(error = %err, "audio stream error"),
        None,
    )?;
    stream.play()?;

    Ok((stream, mixer))
}

impl SoundBackend for DesktopBackend {
    fn load(&mut self, request: LoadRequest) -> encore_playback::Result<Box<dyn Sound>> {
        let generation = request.generation.get();
        let slot = Arc::new(SoundSlot::new(request.volume));

        let submitted = self.loader.submit(LoadJob {
            generation,
            resource: request.resource,
            notifier: request.notifier,
            slot: Arc::clone(&slot),
        });
        if !submitted {
            return Err(AudioError::ThreadGone("loader").into());
        }

        Ok(Box::new(DesktopSound {
            generation,
            slot,
            mixer: Arc::clone(&self.mixer),
        }))
    }
}

/// A sound loaded (or loading) on the desktop backend
pub struct DesktopSound {
    generation: u64,
    slot: Arc<SoundSlot>,
    mixer: SharedMixer,
}

impl DesktopSound {
    fn not_loaded(&self) -> PlaybackError {
        PlaybackError::Backend(format!("sound #{} is not loaded", self.generation))
    }
}

impl Sound for DesktopSound {
    fn play(&mut self) -> encore_playback::Result<()> {
        if lock(&self.mixer).set_playing(self.generation, true) {
            Ok(())
        } else {
            Err(self.not_loaded())
        }
    }

    fn pause(&mut self) -> encore_playback::Result<()> {
        if lock(&self.mixer).set_playing(self.generation, false) {
            Ok(())
        } else {
            Err(self.not_loaded())
        }
    }

    fn seek(&mut self, position: Duration) -> encore_playback::Result<()> {
        if lock(&self.mixer).seek(self.generation, position) {
            Ok(())
        } else {
            Err(self.not_loaded())
        }
    }

    fn position(&self) -> Duration {
        lock(&self.mixer)
            .position(self.generation)
            .unwrap_or(Duration::ZERO)
    }

    fn duration(&self) -> Option<Duration> {
        lock(&self.mixer).duration(self.generation)
    }

    fn set_volume(&mut self, volume: f32) {
        self.slot.set_gain(volume);
        lock(&self.mixer).set_gain(self.generation, volume);
    }

    fn fade_out(&mut self, duration: Duration, curve: FadeCurve) -> encore_playback::Result<FadeStart> {
        if lock(&self.mixer).start_fade(self.generation, duration, curve) {
            Ok(FadeStart::Started)
        } else {
            Ok(FadeStart::Immediate)
        }
    }

    fn unload(&mut self) {
        // Flag first: the loader checks it under the mixer lock
        self.slot.release();
        if lock(&self.mixer).detach(self.generation) {
            tracing::trace!(generation = self.generation, "voice detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_playback::{Generation, SoundNotifier};

    #[test]
    fn backend_opens_or_reports_missing_device() {
        // Headless CI has no output device
        match DesktopBackend::new(OutputSettings::default()) {
            Ok(backend) => assert!(backend.sample_rate() > 0),
            Err(
                AudioError::DeviceNotFound
                | AudioError::DeviceError(_)
                | AudioError::StreamBuildError(_)
                | AudioError::PlayError(_),
            ) => {}
            Err(e) => panic!("Unexpected error: {}", e),
        }
    }

    #[test]
    fn unloaded_sound_rejects_controls() {
        let Ok(mut backend) = DesktopBackend::new(OutputSettings::default()) else {
            return; // Skip test if no device
        };
        let (tx, _rx) = crossbeam_channel::unbounded();
        let generation = Generation::from_raw(9);
        let mut sound = backend
            .load(LoadRequest {
                generation,
                track_id: "t".into(),
                resource: "/no/such/file.mp3".into(),
                volume: 0.5,
                notifier: SoundNotifier::new(generation, tx),
            })
            .unwrap();

        sound.unload();
        assert!(sound.play().is_err());
        assert_eq!(sound.position(), Duration::ZERO);
        assert_eq!(
            sound.fade_out(Duration::from_millis(100), FadeCurve::Linear).unwrap(),
            FadeStart::Immediate
        );
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: OutputSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, OutputSettings::default());
        let settings: OutputSettings = serde_json::from_str(r#"{"resampling":"high"}"#).unwrap();
        assert_eq!(settings.resampling, ResamplingQuality::High);
    }
}
