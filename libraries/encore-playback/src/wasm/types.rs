//! WASM-compatible type definitions

use crate::types::{Track, TrackKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use wasm_bindgen::prelude::*;

/// JS-friendly track (seconds as `f64`, kind as a string)
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
#[wasm_bindgen]
pub struct WasmTrack {
    id: String,
    title: String,
    artist: String,
    thumbnail: Option<String>,
    resource: String,
    duration_secs: Option<f64>,
    start_offset_secs: Option<f64>,
    #[serde(default)]
    audiobook: bool,
}

#[wasm_bindgen]
impl WasmTrack {
    /// Create a song track
    #[wasm_bindgen(constructor)]
    pub fn new(id: String, title: String, artist: String, resource: String) -> Self {
        Self {
            id,
            title,
            artist,
            thumbnail: None,
            resource,
            duration_secs: None,
            start_offset_secs: None,
            audiobook: false,
        }
    }

    #[wasm_bindgen(getter)]
    pub fn id(&self) -> String {
        self.id.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn title(&self) -> String {
        self.title.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn artist(&self) -> String {
        self.artist.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn thumbnail(&self) -> Option<String> {
        self.thumbnail.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn resource(&self) -> String {
        self.resource.clone()
    }

    #[wasm_bindgen(getter, js_name = durationSecs)]
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    #[wasm_bindgen(getter, js_name = startOffsetSecs)]
    pub fn start_offset_secs(&self) -> Option<f64> {
        self.start_offset_secs
    }
}

fn secs(value: Option<f64>) -> Option<Duration> {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(Duration::from_secs_f64)
}

impl From<WasmTrack> for Track {
    fn from(track: WasmTrack) -> Self {
        Track {
            id: track.id,
            title: track.title,
            artist: track.artist,
            thumbnail: track.thumbnail,
            resource: track.resource,
            duration: secs(track.duration_secs),
            start_offset: secs(track.start_offset_secs),
            kind: if track.audiobook {
                TrackKind::Audiobook
            } else {
                TrackKind::Song
            },
        }
    }
}

impl From<&Track> for WasmTrack {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            thumbnail: track.thumbnail.clone(),
            resource: track.resource.clone(),
            duration_secs: track.duration.map(|d| d.as_secs_f64()),
            start_offset_secs: track.start_offset.map(|d| d.as_secs_f64()),
            audiobook: track.kind == TrackKind::Audiobook,
        }
    }
}
