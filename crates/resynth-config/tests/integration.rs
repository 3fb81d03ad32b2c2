//! Integration tests for resynth-config.
//!
//! These tests verify file round trips and the mapping onto core settings.

use resynth_config::{
    CaptureConfig, ConfigError, InputConfig, ResynthConfig, ValidationError, Waveform,
};
use resynth_core::{ChannelState, OscillatorWaveform};
use std::path::PathBuf;
use tempfile::TempDir;

/// Save a config, load it back, and check nothing was lost.
#[test]
fn test_save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("resynth.toml");

    let config = ResynthConfig {
        input: InputConfig::Stream {
            path: PathBuf::from("drums.wav"),
            buffer_len: 4096,
        },
        capture: Some(CaptureConfig {
            path: PathBuf::from("out.wav"),
            seconds: Some(3.0),
            frames: None,
            bits_per_sample: 24,
        }),
        waveform: Waveform::Sine,
        diagnostic_interval: 250,
        ..ResynthConfig::default()
    };

    config.save(&path).unwrap();
    let loaded = ResynthConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

/// A missing file surfaces as a ReadFile error with the path attached.
#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nope.toml");
    match ResynthConfig::load(&path) {
        Err(ConfigError::ReadFile { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected ReadFile, got {other:?}"),
    }
}

/// A malformed file surfaces as a parse error.
#[test]
fn test_load_malformed_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[pitch\nmin_hz = ").unwrap();
    assert!(matches!(
        ResynthConfig::load(&path),
        Err(ConfigError::TomlParse(_))
    ));
}

/// Values that parse but fail validation are rejected on load.
#[test]
fn test_load_rejects_invalid_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("invalid.toml");
    std::fs::write(&path, "[pitch]\nmin_hz = 300.0\nmax_hz = 200.0\n").unwrap();

    match ResynthConfig::load(&path) {
        Err(ConfigError::Validation(ValidationError::InvalidBounds { min_hz, max_hz })) => {
            assert_eq!(min_hz, 300.0);
            assert_eq!(max_hz, 200.0);
        }
        other => panic!("expected InvalidBounds, got {other:?}"),
    }
}

/// Loaded settings build a working channel voice.
#[test]
fn test_config_drives_channel_state() {
    let config = ResynthConfig::from_toml(
        r#"
waveform = "saw"

[pitch]
min_hz = 80.0
max_hz = 400.0
threshold_db = -50.0

[envelope]
attack_ms = 1.0
release_ms = 200.0
"#,
    )
    .unwrap();

    let settings = config.channel_settings();
    assert_eq!(settings.waveform, OscillatorWaveform::Saw);

    let mut voice = ChannelState::new(48000.0, &settings);
    assert_eq!(voice.pitch().settings().min_hz, 80.0);
    assert_eq!(voice.pitch().settings().max_hz, 400.0);

    for n in 0..9600 {
        let x = 0.5 * sine_sample(150.0, n);
        assert!(voice.process(x).is_finite());
    }
    assert!((voice.frequency() - 150.0).abs() < 2.0);
}

fn sine_sample(freq: f32, n: usize) -> f32 {
    (std::f32::consts::TAU * freq * n as f32 / 48000.0).sin()
}
