//! End-to-end engine runs over in-memory and virtual realtime objects.

use std::thread;
use std::time::Duration;

use rivulet_core::operator::ParamSpec;
use rivulet_core::ops::Amplify;
use rivulet_core::{AudioBuffer, AudioObject, Chain, ChainOperator, ObjectError, OperatorError};
use rivulet_engine::{
    Command, EndCause, Engine, EngineConfig, EngineContext, EngineError, EngineHandle, Mixmode,
    MixmodeRequest, RunState, SetupError,
};
use rivulet_io::{DeviceEvent, MemorySink, MemorySource, SinkTap, VirtualDevice, WavSink, read_wav_info};

const RATE: u32 = 8_000;

fn config(buffersize: usize, mixmode: MixmodeRequest) -> EngineConfig {
    EngineConfig {
        buffersize,
        sample_rate: RATE,
        mixmode,
        ..EngineConfig::default()
    }
}

fn constant(label: &str, value: f32, frames: usize) -> MemorySource {
    MemorySource::from_channels(label, vec![vec![value; frames]], RATE)
}

fn ramp(label: &str, frames: usize, offset: f32) -> MemorySource {
    let samples = (0..frames)
        .map(|i| ((i % 97) as f32 / 97.0) - offset)
        .collect();
    MemorySource::from_channels(label, vec![samples], RATE)
}

fn chain(name: &str, input: usize, output: usize, gain: f64) -> Chain {
    let mut chain = Chain::new(name);
    chain.connect_input(input);
    chain.connect_output(output);
    chain.add_operator(Box::new(Amplify::new(gain))).unwrap();
    chain
}

/// Sends `exit` once the engine reports it has finished.
fn exit_when_finished(handle: EngineHandle) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !handle.is_finished() {
            thread::sleep(Duration::from_millis(1));
        }
        handle.send(Command::Exit).unwrap();
    })
}

// ---------------------------------------------------------------------------
// Passive runs
// ---------------------------------------------------------------------------

#[test]
fn five_seconds_through_one_chain_in_normal_mode() {
    let frames = 5 * RATE as usize;
    let mut setup = rivulet_engine::Setup::new();
    let input = setup.add_input(constant("in", 0.5, frames));
    let (sink, tap) = MemorySink::new("out", 1, RATE);
    let output = setup.add_output(sink);
    setup.add_chain(chain("main", input, output, 100.0));

    let mut engine = Engine::new(setup, config(256, MixmodeRequest::Normal), EngineContext::default()).unwrap();
    assert_eq!(engine.mixmode(), Mixmode::Normal);
    let report = engine.run_to_completion().unwrap();

    assert!(report.is_success());
    assert_eq!(report.status_code(), 0);
    assert_eq!(report.state, RunState::Finished);
    assert_eq!(report.cause, EndCause::Completed);
    assert!(tap.frames().abs_diff(frames) <= 256);
    assert!(tap.channel(0).iter().all(|&s| s == 0.5));
    assert!((engine.current_position() - 5.0).abs() < 256.0 / f64::from(RATE));
}

#[test]
fn two_chains_sharing_input_and_output_are_averaged() {
    let mut setup = rivulet_engine::Setup::new();
    let input = setup.add_input(constant("in", 0.8, 1_000));
    let (sink, tap) = MemorySink::new("out", 1, RATE);
    let output = setup.add_output(sink);
    setup.add_chain(chain("dry", input, output, 100.0));
    setup.add_chain(chain("half", input, output, 50.0));

    let mut engine = Engine::new(setup, config(128, MixmodeRequest::Auto), EngineContext::default()).unwrap();
    let report = engine.run_to_completion().unwrap();

    assert_eq!(report.state, RunState::Finished);
    assert_eq!(tap.frames(), 1_000);
    for s in tap.channel(0) {
        assert!((s - 0.6).abs() < 1e-6, "sample {s}");
    }
}

#[test]
fn simple_topology_runs_in_simple_mode() {
    let mut setup = rivulet_engine::Setup::new();
    let input = setup.add_input(ramp("in", 1_000, 0.0));
    let (sink, tap) = MemorySink::new("out", 1, RATE);
    let output = setup.add_output(sink);
    setup.add_chain(chain("main", input, output, 200.0));

    let mut engine = Engine::new(setup, config(100, MixmodeRequest::Auto), EngineContext::default()).unwrap();
    assert_eq!(engine.mixmode(), Mixmode::Simple);
    let report = engine.run_to_completion().unwrap();

    assert_eq!(report.mixmode, Mixmode::Simple);
    assert_eq!(report.cycles, 10);
    assert_eq!(report.frames, 1_000);
    assert!((tap.channel(0)[5] - 2.0 * 5.0 / 97.0).abs() < 1e-6);
}

fn mixing_setup() -> (rivulet_engine::Setup, SinkTap, SinkTap) {
    let mut setup = rivulet_engine::Setup::new();
    let shared = setup.add_input(ramp("shared", 3_000, 0.5));
    let solo = setup.add_input(ramp("solo", 2_500, 0.25));
    let (bus, bus_tap) = MemorySink::new("bus", 1, RATE);
    let (aux, aux_tap) = MemorySink::new("aux", 1, RATE);
    let bus = setup.add_output(bus);
    let aux = setup.add_output(aux);
    setup.add_chain(chain("a", shared, bus, 70.0));
    setup.add_chain(chain("b", shared, aux, 130.0));
    setup.add_chain(chain("c", solo, bus, 90.0));
    setup.add_chain(chain("d", solo, bus, 40.0));
    (setup, bus_tap, aux_tap)
}

#[test]
fn multithreaded_output_matches_normal_exactly() {
    let (setup, normal_bus, normal_aux) = mixing_setup();
    let mut engine = Engine::new(setup, config(256, MixmodeRequest::Normal), EngineContext::default()).unwrap();
    engine.run_to_completion().unwrap();

    let (setup, mt_bus, mt_aux) = mixing_setup();
    let mut engine = Engine::new(
        setup,
        config(256, MixmodeRequest::Multithreaded),
        EngineContext::new("mt"),
    )
    .unwrap();
    assert_eq!(engine.mixmode(), Mixmode::Multithreaded);
    let report = engine.run_to_completion().unwrap();

    assert_eq!(report.state, RunState::Finished);
    assert_eq!(normal_bus.frames(), 3_000);
    assert_eq!(normal_bus.buffer(), mt_bus.buffer());
    assert_eq!(normal_aux.buffer(), mt_aux.buffer());
}

#[test]
fn length_bound_truncates_the_run() {
    let mut setup = rivulet_engine::Setup::new();
    let input = setup.add_input(constant("in", 0.1, 1_000));
    let (sink, tap) = MemorySink::new("out", 1, RATE);
    let output = setup.add_output(sink);
    setup.add_chain(chain("main", input, output, 100.0));

    let cfg = EngineConfig {
        length: Some(0.1),
        ..config(300, MixmodeRequest::Auto)
    };
    let mut engine = Engine::new(setup, cfg, EngineContext::default()).unwrap();
    assert_eq!(engine.length_frames(), Some(800));
    let report = engine.run_to_completion().unwrap();

    assert_eq!(report.state, RunState::Finished);
    assert_eq!(tap.frames(), 800);
    assert_eq!(engine.position_frames(), 800);
}

#[test]
fn looping_run_wraps_until_quit() {
    let mut setup = rivulet_engine::Setup::new();
    let input = setup.add_input(ramp("in", 400, 0.0));
    let (sink, tap) = MemorySink::new("out", 1, RATE);
    let output = setup.add_output(sink);
    setup.add_chain(chain("main", input, output, 100.0));

    let cfg = EngineConfig {
        looping: true,
        ..config(100, MixmodeRequest::Auto)
    };
    let mut engine = Engine::new(setup, cfg, EngineContext::default()).unwrap();
    assert!(engine.is_looping());
    assert_eq!(engine.length_frames(), Some(400));

    let handle = engine.handle();
    let runner = thread::spawn(move || {
        let report = engine.run_to_completion().unwrap();
        (engine, report)
    });
    thread::sleep(Duration::from_millis(50));
    handle.request_quit();
    let (engine, report) = runner.join().unwrap();

    assert_eq!(report.cause, EndCause::Quit);
    assert!(report.cycles > 8, "only {} cycles", report.cycles);
    assert!(engine.position_frames() < 400);
    // Every pass rewrites the same region of the output.
    assert_eq!(tap.frames(), 400);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn failing_output_fails_the_run() {
    let mut setup = rivulet_engine::Setup::new();
    let input = setup.add_input(constant("in", 0.2, 2_000));
    let (sink, tap) = MemorySink::new("broken", 1, RATE);
    let output = setup.add_output(sink.with_write_error_at(500));
    setup.add_chain(chain("main", input, output, 100.0));

    let mut engine = Engine::new(setup, config(100, MixmodeRequest::Normal), EngineContext::default()).unwrap();
    let handle = engine.handle();
    let report = engine.run_to_completion().unwrap();

    assert_eq!(report.state, RunState::Failed);
    assert_eq!(report.status_code(), 1);
    assert!(report.error.as_deref().unwrap().contains("broken"));
    assert_eq!(tap.frames(), 500);
    assert_eq!(handle.state(), RunState::Failed);
    assert!(handle.last_error().is_some());
}

#[test]
fn failed_flush_at_stop_fails_the_run() {
    let mut setup = rivulet_engine::Setup::new();
    let input = setup.add_input(constant("in", 0.2, 1_000));
    let (sink, tap) = MemorySink::new("full-disk", 1, RATE);
    let output = setup.add_output(sink.with_flush_error());
    setup.add_chain(chain("main", input, output, 100.0));

    let mut engine = Engine::new(setup, config(100, MixmodeRequest::Normal), EngineContext::default()).unwrap();
    let report = engine.run_to_completion().unwrap();

    assert_eq!(tap.frames(), 1_000);
    assert_eq!(report.state, RunState::Failed);
    assert_eq!(report.status_code(), 1);
    assert!(report.error.as_deref().unwrap().contains("full-disk"));
}

#[test]
fn wav_output_is_complete_while_the_engine_lives() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("render.wav");
    let mut setup = rivulet_engine::Setup::new();
    let input = setup.add_input(constant("in", 0.25, 1_234));
    let output = setup.add_output(WavSink::create(&path, 1, RATE, 16).unwrap());
    setup.add_chain(chain("main", input, output, 100.0));

    let mut engine = Engine::new(setup, config(100, MixmodeRequest::Multithreaded), EngineContext::default()).unwrap();
    let report = engine.run_to_completion().unwrap();
    assert_eq!(report.state, RunState::Finished);

    let info = read_wav_info(&path).unwrap();
    assert_eq!(info.frames, report.frames);
    assert_eq!(info.frames, 1_234);
    drop(engine);
}

#[test]
fn failing_input_ends_only_its_chain() {
    let mut setup = rivulet_engine::Setup::new();
    let flaky = setup.add_input(constant("flaky", 0.3, 1_000).with_read_error_at(300));
    let steady = setup.add_input(constant("steady", 0.3, 1_000));
    let (out_a, tap_a) = MemorySink::new("a", 1, RATE);
    let (out_b, tap_b) = MemorySink::new("b", 1, RATE);
    let out_a = setup.add_output(out_a);
    let out_b = setup.add_output(out_b);
    setup.add_chain(chain("flaky", flaky, out_a, 100.0));
    setup.add_chain(chain("steady", steady, out_b, 100.0));

    let mut engine = Engine::new(setup, config(100, MixmodeRequest::Normal), EngineContext::default()).unwrap();
    let report = engine.run_to_completion().unwrap();

    assert_eq!(report.state, RunState::Finished);
    assert!(report.error.as_deref().unwrap().contains("flaky"));
    assert_eq!(tap_a.frames(), 300);
    assert_eq!(tap_b.frames(), 1_000);
}

/// Holds the worker long enough to miss any sane handshake.
struct Stall;

impl ChainOperator for Stall {
    fn name(&self) -> &str {
        "stall"
    }

    fn process(&mut self, _buffer: &mut AudioBuffer) {
        thread::sleep(Duration::from_millis(200));
    }

    fn parameter_count(&self) -> usize {
        0
    }

    fn parameter_spec(&self, _index: usize) -> Option<ParamSpec> {
        None
    }

    fn get_parameter(&self, _index: usize) -> Option<f64> {
        None
    }

    fn set_parameter(&mut self, index: usize, _value: f64) -> Result<(), OperatorError> {
        Err(OperatorError::NoSuchParameter {
            operator: "stall".into(),
            index,
        })
    }
}

#[test]
fn stalled_worker_is_a_concurrency_fault() {
    let mut setup = rivulet_engine::Setup::new();
    let input = setup.add_input(constant("in", 0.1, 10_000));
    let (sink, _tap) = MemorySink::new("out", 1, RATE);
    let output = setup.add_output(sink);
    let mut slow = chain("slow", input, output, 100.0);
    slow.add_operator(Box::new(Stall)).unwrap();
    setup.add_chain(slow);

    let cfg = EngineConfig {
        handshake_timeout_ms: 20,
        ..config(100, MixmodeRequest::Multithreaded)
    };
    let mut engine = Engine::new(setup, cfg, EngineContext::default()).unwrap();
    let handle = engine.handle();
    let err = engine.run_to_completion().unwrap_err();

    assert!(matches!(err, EngineError::ConcurrencyFault { chain: 0, .. }));
    assert!(err.is_fatal());
    assert_eq!(handle.state(), RunState::Failed);
    assert!(!engine.is_running());
}

#[test]
fn missing_device_is_a_setup_error_at_start() {
    let mut setup = rivulet_engine::Setup::new();
    let (device, _log) = VirtualDevice::source("mic", 1, RATE);
    let input = setup.add_input(device.with_prepare_error());
    let (sink, _tap) = MemorySink::new("out", 1, RATE);
    let output = setup.add_output(sink);
    setup.add_chain(chain("main", input, output, 100.0));

    let mut engine = Engine::new(setup, config(64, MixmodeRequest::Auto), EngineContext::default()).unwrap();
    let err = engine.run_to_completion().unwrap_err();
    assert!(matches!(err, EngineError::Setup(SetupError::Device { ref label, .. }) if label == "mic"));
}

#[test]
fn empty_setup_is_rejected() {
    let setup = rivulet_engine::Setup::new();
    let err = Engine::new(setup, EngineConfig::default(), EngineContext::default()).unwrap_err();
    assert!(matches!(err, SetupError::NoChains));
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[test]
fn chain_seek_moves_only_that_chains_objects() {
    let mut setup = rivulet_engine::Setup::new();
    let first = setup.add_input(ramp("first", 8_000, 0.0));
    let second = setup.add_input(ramp("second", 8_000, 0.0));
    let (out_a, tap_a) = MemorySink::new("a", 1, RATE);
    let (out_b, tap_b) = MemorySink::new("b", 1, RATE);
    let out_a = setup.add_output(out_a);
    let out_b = setup.add_output(out_b);
    setup.add_chain(chain("a", first, out_a, 100.0));
    setup.add_chain(chain("b", second, out_b, 100.0));

    let mut engine = Engine::new(setup, config(500, MixmodeRequest::Normal), EngineContext::default()).unwrap();
    let seek = engine.chain_seek_to(1, 0.5).unwrap();
    assert_eq!(seek.attempted, 2);
    assert!(seek.is_complete());
    engine.run_to_completion().unwrap();

    let a = tap_a.channel(0);
    let b = tap_b.channel(0);
    assert_eq!(a.len(), 8_000);
    assert_eq!(b.len(), 8_000);
    assert!((a[4_001] - (4_001 % 97) as f32 / 97.0).abs() < 1e-6);
    assert!(b[..4_000].iter().all(|&s| s == 0.0));
    assert_eq!(&a[4_000..], &b[4_000..]);
}

/// A source whose position cannot be changed.
struct Unseekable(MemorySource);

impl AudioObject for Unseekable {
    fn label(&self) -> &str {
        self.0.label()
    }
    fn channels(&self) -> usize {
        self.0.channels()
    }
    fn sample_rate(&self) -> u32 {
        self.0.sample_rate()
    }
    fn set_buffersize(&mut self, frames: usize, sample_rate: u32) {
        self.0.set_buffersize(frames, sample_rate);
    }
    fn read_buffer(&mut self, buffer: &mut AudioBuffer) -> Result<usize, ObjectError> {
        self.0.read_buffer(buffer)
    }
    fn position(&self) -> u64 {
        self.0.position()
    }
    fn length(&self) -> Option<u64> {
        self.0.length()
    }
    fn finished(&self) -> bool {
        self.0.finished()
    }
    fn seek(&mut self, frame: u64) -> Result<(), ObjectError> {
        Err(ObjectError::Seek {
            label: self.label().to_string(),
            frame,
        })
    }
}

#[test]
fn partial_seek_failure_is_counted() {
    let mut setup = rivulet_engine::Setup::new();
    let fixed = setup.add_input(Unseekable(constant("fixed", 0.1, 1_000)));
    let movable = setup.add_input(constant("movable", 0.1, 1_000));
    let (out, _tap) = MemorySink::new("out", 1, RATE);
    let out = setup.add_output(out);
    setup.add_chain(chain("a", fixed, out, 100.0));
    setup.add_chain(chain("b", movable, out, 100.0));

    let mut engine = Engine::new(setup, config(100, MixmodeRequest::Normal), EngineContext::default()).unwrap();
    let report = engine.seek_to(0.05).unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.repositioned(), 2);
    assert_eq!(engine.position_frames(), 400);
    assert!(matches!(
        report.into_result(),
        Err(EngineError::Transport {
            failed: 1,
            attempted: 3
        })
    ));
}

// ---------------------------------------------------------------------------
// Control queue
// ---------------------------------------------------------------------------

fn interactive_engine() -> (Engine, SinkTap) {
    let mut setup = rivulet_engine::Setup::new();
    let input = setup.add_input(constant("in", 0.5, 2_000));
    let (sink, tap) = MemorySink::new("out", 1, RATE);
    let output = setup.add_output(sink);
    setup.add_chain(chain("main", input, output, 100.0));
    let cfg = EngineConfig {
        interactive: true,
        poll_interval_ms: 5,
        ..config(100, MixmodeRequest::Normal)
    };
    let engine = Engine::new(setup, cfg, EngineContext::default()).unwrap();
    (engine, tap)
}

fn parameter_edit_then_exit() -> Vec<Command> {
    vec![
        Command::SelectChain(0),
        Command::SelectOperator(1),
        Command::SelectParameter(1),
        Command::SetParameter(250.0),
        Command::Exit,
    ]
}

#[test]
fn start_queued_after_exit_is_discarded() {
    let (mut engine, tap) = interactive_engine();
    for command in parameter_edit_then_exit() {
        engine.push_command(command);
    }
    engine.push_command(Command::Start);

    let report = engine.run_to_completion().unwrap();
    assert_eq!(report.cause, EndCause::Exit);
    assert_eq!(report.cycles, 0);
    assert!(!engine.is_running());
    assert_eq!(tap.frames(), 0);
    let gain = engine.chain(0).unwrap().operator(1).unwrap().get_parameter(1);
    assert_eq!(gain, Some(250.0));
}

#[test]
fn start_queued_before_exit_does_not_leave_engine_running() {
    let (mut engine, tap) = interactive_engine();
    engine.push_command(Command::Start);
    for command in parameter_edit_then_exit() {
        engine.push_command(command);
    }

    let report = engine.run_to_completion().unwrap();
    assert_eq!(report.cause, EndCause::Exit);
    assert_eq!(report.state, RunState::Stopped);
    assert_eq!(report.cycles, 0);
    assert!(!engine.is_running());
    assert_eq!(tap.frames(), 0);
}

#[test]
fn start_in_a_later_batch_is_refused_after_exit() {
    let (mut engine, _tap) = interactive_engine();
    engine.push_command(Command::Exit);
    let outcome = engine.drain_commands().unwrap();
    assert!(outcome.exited);

    engine.push_command(Command::Start);
    engine.drain_commands().unwrap();
    assert!(!engine.is_running());
}

#[test]
fn interactive_run_applies_commands_and_waits_for_exit() {
    let (mut engine, tap) = interactive_engine();
    engine.push_command(Command::SelectChain(0));
    engine.push_command(Command::ToggleMute);
    engine.push_command(Command::Start);
    let watcher = exit_when_finished(engine.handle());

    let report = engine.run_to_completion().unwrap();
    watcher.join().unwrap();

    assert_eq!(report.cause, EndCause::Exit);
    assert_eq!(report.state, RunState::Finished);
    assert_eq!(tap.frames(), 2_000);
    assert!(tap.buffer().is_silent());
}

#[test]
fn handle_commands_cross_threads() {
    let (mut engine, tap) = interactive_engine();
    let handle = engine.handle();
    let driver = thread::spawn(move || {
        handle
            .push_command(rivulet_engine::CommandKind::Start, None)
            .unwrap();
        while !handle.is_finished() {
            thread::sleep(Duration::from_millis(1));
        }
        assert!((handle.current_position() - 0.25).abs() < 1e-9);
        handle.send(Command::Exit).unwrap();
    });

    let report = engine.run_to_completion().unwrap();
    driver.join().unwrap();
    assert_eq!(report.cause, EndCause::Exit);
    assert_eq!(tap.frames(), 2_000);
}

// ---------------------------------------------------------------------------
// Realtime objects
// ---------------------------------------------------------------------------

#[test]
fn realtime_output_starts_after_two_prefilled_cycles() {
    let mut setup = rivulet_engine::Setup::new();
    let input = setup.add_input(constant("in", 0.1, 1_000));
    let (card, log) = VirtualDevice::sink("card", 1, RATE);
    let output = setup.add_output(card);
    setup.add_chain(chain("main", input, output, 100.0));

    let mut engine = Engine::new(setup, config(100, MixmodeRequest::Auto), EngineContext::default()).unwrap();
    let report = engine.run_to_completion().unwrap();

    assert_eq!(report.state, RunState::Finished);
    assert_eq!(log.prefill(), 200);
    assert_eq!(log.frames(), 1_000);
    assert_eq!(
        log.events(),
        vec![
            DeviceEvent::Prepared,
            DeviceEvent::Started(0),
            DeviceEvent::Stopped(800)
        ]
    );
}

#[test]
fn multitrack_sync_prefills_devices_and_aligns_takes() {
    let mut setup = rivulet_engine::Setup::new();
    let (mic, mic_log) = VirtualDevice::source("mic", 1, RATE);
    let mic = setup.add_input(mic.with_level(0.25));
    let backing = setup.add_input(constant("backing", 0.5, 10_000));
    let (take, take_tap) = MemorySink::new("take", 1, RATE);
    let take = setup.add_output(take);
    let (card, card_log) = VirtualDevice::sink("card", 1, RATE);
    let card = setup.add_output(card);
    setup.add_chain(chain("record", mic, take, 100.0));
    setup.add_chain(chain("monitor", backing, card, 100.0));

    let cfg = EngineConfig {
        interactive: true,
        length: Some(0.1),
        poll_interval_ms: 5,
        ..config(100, MixmodeRequest::Multithreaded)
    };
    let mut engine = Engine::new(setup, cfg, EngineContext::default()).unwrap();
    assert!(engine.is_multitrack());
    assert_eq!(engine.mixmode(), Mixmode::Normal);

    engine.start().unwrap();
    // The card is primed with two cycles of backing before it starts; the
    // take has not been written yet.
    assert!(card_log.is_started());
    assert_eq!(card_log.prefill(), 200);
    assert_eq!(
        card_log.events(),
        vec![DeviceEvent::Prepared, DeviceEvent::Started(0)]
    );
    assert_eq!(take_tap.frames(), 0);

    let watcher = exit_when_finished(engine.handle());
    let report = engine.run_to_completion().unwrap();
    watcher.join().unwrap();

    assert_eq!(report.state, RunState::Finished);
    assert!(!mic_log.is_started());
    assert_eq!(card_log.frames(), 800);
    // The take starts at the sync offset, then records the remaining cycles.
    let take = take_tap.channel(0);
    assert_eq!(take.len(), 800);
    assert!(take[..200].iter().all(|&s| s == 0.0));
    assert!(take[200..].iter().all(|&s| s == 0.25));
}

#[test]
fn file_outputs_fed_by_files_are_written_during_sync() {
    let mut setup = rivulet_engine::Setup::new();
    let (mic, _mic_log) = VirtualDevice::source("mic", 1, RATE);
    let mic = setup.add_input(mic.with_level(0.25));
    let backing = setup.add_input(constant("backing", 0.5, 10_000));
    let (take, take_tap) = MemorySink::new("take", 1, RATE);
    let take = setup.add_output(take);
    let (card, _card_log) = VirtualDevice::sink("card", 1, RATE);
    let card = setup.add_output(card);
    let (bounce, bounce_tap) = MemorySink::new("bounce", 1, RATE);
    let bounce = setup.add_output(bounce);
    setup.add_chain(chain("record", mic, take, 100.0));
    setup.add_chain(chain("monitor", backing, card, 100.0));
    setup.add_chain(chain("bounce", backing, bounce, 100.0));

    let cfg = EngineConfig {
        interactive: true,
        ..config(100, MixmodeRequest::Normal)
    };
    let mut engine = Engine::new(setup, cfg, EngineContext::default()).unwrap();
    engine.start().unwrap();

    assert_eq!(take_tap.frames(), 0);
    assert_eq!(bounce_tap.frames(), 200);
    assert!(bounce_tap.channel(0).iter().all(|&s| s == 0.5));
    engine.stop().unwrap();
}

#[test]
fn realtime_devices_can_be_halted_immediately() {
    let mut setup = rivulet_engine::Setup::new();
    let (mic, log) = VirtualDevice::source("mic", 1, RATE);
    let input = setup.add_input(mic);
    let (sink, _tap) = MemorySink::new("out", 1, RATE);
    let output = setup.add_output(sink);
    setup.add_chain(chain("main", input, output, 100.0));

    let mut engine = Engine::new(setup, config(64, MixmodeRequest::Auto), EngineContext::default()).unwrap();
    engine.start().unwrap();
    assert!(log.is_started());
    engine.stop_realtime_devices().unwrap();
    assert!(!log.is_started());
    engine.stop().unwrap();
    assert_eq!(engine.state(), RunState::Stopped);
}
