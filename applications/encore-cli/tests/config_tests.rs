//! Configuration loading from files

use encore_audio_desktop::ResamplingQuality;
use encore_cli::{AppConfig, CliError};
use encore_playback::FadeCurve;
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_file() {
    let file = write_config(
        r#"
[server]
url = "https://music.example.com"
token = "abc"
save_audiobook_progress = false

[playback]
volume = 0.8
fade_out_ms = 300
fade_curve = "s_curve"

[output]
resampling = "high"
"#,
    );

    let config = AppConfig::load(Some(file.path())).unwrap();
    config.validate().unwrap();

    assert_eq!(config.server.url, "https://music.example.com");
    assert_eq!(config.server.token.as_deref(), Some("abc"));
    assert!(!config.server.save_audiobook_progress);
    assert_eq!(config.playback.volume, 0.8);
    assert_eq!(config.playback.fade_out_ms, 300);
    assert_eq!(config.playback.fade_curve, FadeCurve::SCurve);
    assert_eq!(config.output.resampling, ResamplingQuality::High);
}

#[test]
fn test_missing_sections_use_defaults() {
    let file = write_config("[server]\nurl = \"http://10.0.0.2:8000\"\n");

    let config = AppConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.server.url, "http://10.0.0.2:8000");
    assert!(config.server.token.is_none());
    assert!(config.server.save_audiobook_progress);
    assert_eq!(config.playback.volume, 0.5);
    assert_eq!(config.playback.fade_out_ms, 100);
    assert!(config.playback.autoplay_on_select);
    assert_eq!(config.output.resampling, ResamplingQuality::Balanced);
}

#[test]
fn test_invalid_volume_fails_validation() {
    let file = write_config("[playback]\nvolume = 3.0\n");

    let config = AppConfig::load(Some(file.path())).unwrap();
    assert!(matches!(config.validate(), Err(CliError::Config(_))));
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let result = AppConfig::load(Some(std::path::Path::new("/no/such/encore.toml")));
    assert!(matches!(result, Err(CliError::Config(_))));
}
