//! Background track loader
//!
//! Fetching and decoding take anywhere from milliseconds (local WAV) to
//! seconds (remote MP3), so they run on a dedicated thread. The session gets
//! its answer through the sound's notifier.
//!
//! ```text
//! Session thread                 Loader thread
//!      │  LoadJob                     │
//!      │─────────────────────────────>│ fetch → decode → resample
//!      │                              │ attach voice to mixer
//!      │  SoundEvent::Loaded / Failed │
//!      │<─────────────────────────────│
//! ```

use crate::decode::{decode, extension_of};
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::mixer::{Mixer, Voice};
use crate::resample::{resample, ResamplingQuality};
use crossbeam_channel::{unbounded, Receiver, Sender};
use encore_playback::SoundNotifier;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// State shared by a sound and its load job
#[derive(Debug)]
pub(crate) struct SoundSlot {
    released: AtomicBool,
    gain_bits: AtomicU32,
}

impl SoundSlot {
    pub(crate) fn new(gain: f32) -> Self {
        Self {
            released: AtomicBool::new(false),
            gain_bits: AtomicU32::new(gain.to_bits()),
        }
    }

    pub(crate) fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub(crate) fn set_gain(&self, gain: f32) {
        self.gain_bits.store(gain.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn gain(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::Relaxed))
    }
}

/// One sound to load
pub(crate) struct LoadJob {
    pub generation: u64,
    pub resource: String,
    pub notifier: SoundNotifier,
    pub slot: Arc<SoundSlot>,
}

/// Handle to the loader thread; dropping it stops the thread
pub(crate) struct TrackLoader {
    jobs: Sender<LoadJob>,
    _thread: JoinHandle<()>,
}

impl TrackLoader {
    pub(crate) fn spawn(mixer: Arc<Mutex<Mixer>>, quality: ResamplingQuality) -> std::io::Result<Self> {
        let (jobs, rx) = unbounded::<LoadJob>();
        let thread = thread::Builder::new()
            .name("encore-loader".to_string())
            .spawn(move || loader_thread(&rx, &mixer, quality))?;
        Ok(Self {
            jobs,
            _thread: thread,
        })
    }

    /// Queue a job; false if the thread is gone
    pub(crate) fn submit(&self, job: LoadJob) -> bool {
        self.jobs.send(job).is_ok()
    }
}

fn loader_thread(jobs: &Receiver<LoadJob>, mixer: &Arc<Mutex<Mixer>>, quality: ResamplingQuality) {
    let fetcher = match Fetcher::new() {
        Ok(fetcher) => Some(fetcher),
        Err(e) => {
            tracing::error!(error = %e, "loader cannot fetch resources");
            None
        }
    };
    let target_rate = mixer.lock().unwrap_or_else(PoisonError::into_inner).sample_rate();

    while let Ok(job) = jobs.recv() {
        if job.slot.is_released() {
            tracing::debug!(generation = job.generation, "load skipped, sound released");
            continue;
        }

        let Some(fetcher) = fetcher.as_ref() else {
            job.notifier.failed("network client unavailable");
            continue;
        };

        match load_samples(fetcher, &job.resource, target_rate, quality) {
            Ok(samples) => {
                let mut mixer = mixer.lock().unwrap_or_else(PoisonError::into_inner);
                // Checked under the lock so a concurrent unload cannot miss the voice
                if job.slot.is_released() {
                    continue;
                }
                let voice = Voice::new(Arc::new(samples), job.slot.gain(), job.notifier.clone());
                mixer.attach(job.generation, voice);
                let duration = mixer.duration(job.generation);
                job.notifier.loaded(duration);
                drop(mixer);
                tracing::debug!(generation = job.generation, resource = %job.resource, ?duration, "sound loaded");
            }
            Err(e) => {
                tracing::warn!(generation = job.generation, resource = %job.resource, error = %e, "load failed");
                if !job.slot.is_released() {
                    job.notifier.failed(e.to_string());
                }
            }
        }
    }
}

fn load_samples(fetcher: &Fetcher, resource: &str, target_rate: u32, quality: ResamplingQuality) -> Result<Vec<f32>> {
    let bytes = fetcher.fetch(resource)?;
    let decoded = decode(bytes, extension_of(resource))?;
    tracing::trace!(
        resource,
        source_rate = decoded.sample_rate,
        target_rate,
        frames = decoded.frames(),
        "decoded"
    );
    Ok(resample(decoded, target_rate, quality)?.samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_playback::{Generation, SoundEventKind};
    use std::time::Duration;

    fn write_wav(dir: &tempfile::TempDir, name: &str, rate: u32, frames: usize) -> String {
        let path = dir.path().join(name);
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..frames * 2 {
            writer.write_sample(1000i16).unwrap();
        }
        writer.finalize().unwrap();
        path.to_string_lossy().into_owned()
    }

    fn job(generation: u64, resource: String) -> (LoadJob, Receiver<encore_playback::SoundEvent>) {
        let (tx, rx) = unbounded();
        let job = LoadJob {
            generation,
            resource,
            notifier: SoundNotifier::new(Generation::from_raw(generation), tx),
            slot: Arc::new(SoundSlot::new(0.5)),
        };
        (job, rx)
    }

    #[test]
    fn loads_and_attaches_voice() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(&dir, "a.wav", 8000, 8000);
        let mixer = Arc::new(Mutex::new(Mixer::new(8000)));
        let loader = TrackLoader::spawn(Arc::clone(&mixer), ResamplingQuality::Fast).unwrap();

        let (job, rx) = job(1, path);
        assert!(loader.submit(job));

        let event = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(
            event.kind,
            SoundEventKind::Loaded {
                duration: Some(Duration::from_secs(1))
            }
        );
        assert!(mixer.lock().unwrap().is_attached(1));
    }

    #[test]
    fn missing_file_reports_failure() {
        let mixer = Arc::new(Mutex::new(Mixer::new(8000)));
        let loader = TrackLoader::spawn(Arc::clone(&mixer), ResamplingQuality::Fast).unwrap();

        let (job, rx) = job(2, "/no/such/file.wav".into());
        loader.submit(job);

        let event = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(matches!(event.kind, SoundEventKind::LoadFailed { .. }));
        assert!(!mixer.lock().unwrap().is_attached(2));
    }

    #[test]
    fn released_job_is_dropped_silently() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(&dir, "b.wav", 8000, 800);
        let mixer = Arc::new(Mutex::new(Mixer::new(8000)));
        let loader = TrackLoader::spawn(Arc::clone(&mixer), ResamplingQuality::Fast).unwrap();

        let (job, rx) = job(3, path);
        job.slot.release();
        loader.submit(job);

        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert!(!mixer.lock().unwrap().is_attached(3));
    }
}
