//! Integration tests: setup files on disk driving real engines.

use std::path::Path;

use rivulet_config::{ConfigError, OperatorRegistry, SetupFile};
use rivulet_core::{AudioBuffer, AudioObject};
use rivulet_engine::{EngineContext, Mixmode, RunState};
use rivulet_io::{ToneSource, WavSink, read_wav_info};

/// Writes one second of a 22.05 kHz mono tone.
fn write_take(path: &Path) {
    let mut tone = ToneSource::new("take", 1, 22_050, 220.0, 0.5).with_length(22_050);
    tone.set_buffersize(22_050, 22_050);
    let mut buf = AudioBuffer::default();
    tone.read_buffer(&mut buf).unwrap();
    let mut sink = WavSink::create(path, 1, 22_050, 16).unwrap();
    sink.write_buffer(&buf).unwrap();
    sink.finalize().unwrap();
}

fn setup_text(dir: &Path) -> String {
    format!(
        r#"
[engine]
sample_rate = 44100
buffersize = 512

[[input]]
kind = "wav"
path = '{take}'

[[output]]
kind = "wav"
path = '{wav}'
channels = 1
bits = 24

[[output]]
kind = "raw"
path = '{raw}'
format = "s16_le"
channels = 1

[[chain]]
name = "dry"
input = 1
output = 1

[[chain]]
name = "quiet"
input = 1
output = 2
operators = [{{ kind = "amplify", params = [25] }}]
"#,
        take = dir.join("take.wav").display(),
        wav = dir.join("out.wav").display(),
        raw = dir.join("out.raw").display(),
    )
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[test]
fn wav_take_is_resampled_and_written_twice() {
    let dir = tempfile::tempdir().unwrap();
    write_take(&dir.path().join("take.wav"));
    let setup_path = dir.path().join("setup.toml");
    std::fs::write(&setup_path, setup_text(dir.path())).unwrap();

    let file = SetupFile::load(&setup_path).unwrap();
    let report = {
        let mut engine = file
            .into_engine(&OperatorRegistry::new(), EngineContext::new("it"))
            .unwrap();
        assert_eq!(engine.mixmode(), Mixmode::Normal);
        engine.run_to_completion().unwrap()
    };
    assert_eq!(report.state, RunState::Finished);
    assert!((44_000..=44_100).contains(&report.frames), "frames = {}", report.frames);

    let info = read_wav_info(dir.path().join("out.wav")).unwrap();
    assert_eq!(info.sample_rate, 44_100);
    assert_eq!(info.bits_per_sample, 24);
    assert_eq!(info.frames, report.frames);

    let raw_len = std::fs::metadata(dir.path().join("out.raw")).unwrap().len();
    assert_eq!(raw_len, report.frames * 2);
}

#[test]
fn engine_overrides_apply_before_build() {
    let dir = tempfile::tempdir().unwrap();
    write_take(&dir.path().join("take.wav"));
    let mut file = SetupFile::from_toml(&setup_text(dir.path())).unwrap();
    file.engine.length = Some(0.25);
    file.engine.buffersize = 1000;

    let mut engine = file
        .into_engine(&OperatorRegistry::new(), EngineContext::new("it"))
        .unwrap();
    let report = engine.run_to_completion().unwrap();
    assert_eq!(report.frames, 11_025);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn missing_take_names_the_input() {
    let dir = tempfile::tempdir().unwrap();
    let file = SetupFile::from_toml(&setup_text(dir.path())).unwrap();
    let err = file.build(&OperatorRegistry::new()).unwrap_err();
    assert!(matches!(&err, ConfigError::Object { entry, .. } if entry == "input 1"));
    assert!(err.to_string().starts_with("input 1: "));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = SetupFile::from_toml("[[chain]\nname = 1").unwrap_err();
    assert!(matches!(err, ConfigError::TomlParse(_)));
}
