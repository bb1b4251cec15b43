//! Environment overrides (own test binary: variables are process-wide)

use encore_cli::AppConfig;
use std::io::Write;

#[test]
fn test_environment_overrides_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(b"[server]\nurl = \"http://from-file:8000\"\n\n[playback]\nvolume = 0.2\n")
        .unwrap();

    std::env::set_var("ENCORE_SERVER__TOKEN", "from-env");
    std::env::set_var("ENCORE_PLAYBACK__VOLUME", "0.9");

    let config = AppConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.server.url, "http://from-file:8000");
    assert_eq!(config.server.token.as_deref(), Some("from-env"));
    assert_eq!(config.playback.volume, 0.9);
}
