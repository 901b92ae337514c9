//! The engine: cycle loop, mixing strategies and transport.
//!
//! One cycle is: apply queued commands (interactive engines), read inputs
//! into chain buffers, process chains, mix into outputs, start deferred
//! realtime outputs, advance the position. How chains are scheduled depends
//! on the [`Mixmode`]:
//!
//! - **simple**: the single chain reads, processes and writes directly.
//! - **normal**: inputs shared by several chains are read once into a
//!   staging buffer and copied to each consumer; outputs shared by several
//!   chains are averaged before the write.
//! - **multithreaded**: inputs are staged on the engine thread and chains are
//!   handed to the [submix worker](crate::submix) for processing and mixing.
//!
//! Transport operations (seek, rewind, loop) stop the engine, reposition the
//! non-realtime objects and restart it if it was running. A failed seek on
//! one object is counted in the returned [`SeekReport`]; the others still
//! move.

use std::sync::Arc;

use rivulet_core::{AudioBuffer, AudioObject, Chain};
use tracing::{debug, error, info, trace, warn};

use crate::command::Command;
use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::error::{EngineError, Result, SetupError};
use crate::mixmode::{Mixmode, select_mixmode};
use crate::queue::{BatchOutcome, CommandTarget, ControlQueue};
use crate::setup::Setup;
use crate::sinks::SinkBank;
use crate::status::{EndCause, EngineHandle, RunReport, RunState, SharedStatus};
use crate::submix::{ChainSlot, SubmixWorker};
use crate::transport::{Boundary, Transport};

/// Number of cycles run before realtime outputs start in multitrack mode.
const SYNC_CYCLES: usize = 2;

/// Outcome of a batch reposition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekReport {
    /// Objects a seek was attempted on.
    pub attempted: usize,
    /// Objects whose seek failed.
    pub failed: usize,
}

impl SeekReport {
    /// Objects that moved.
    pub fn repositioned(&self) -> usize {
        self.attempted - self.failed
    }

    /// Whether every object moved.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    /// Turns a partial failure into [`EngineError::Transport`].
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(EngineError::Transport {
                failed: self.failed,
                attempted: self.attempted,
            })
        }
    }
}

struct Input {
    object: Box<dyn AudioObject>,
    consumers: Vec<usize>,
    staging: AudioBuffer,
    failed: bool,
    start_offset: u64,
}

impl Input {
    fn is_done(&self) -> bool {
        self.failed || self.object.finished()
    }
}

#[derive(Debug, Clone, Copy)]
struct Route {
    input: usize,
    output: Option<usize>,
}

/// Reads one buffer, turning an I/O error into a finished object.
fn read_object(
    object: &mut dyn AudioObject,
    failed: &mut bool,
    buffer: &mut AudioBuffer,
    status: &SharedStatus,
) -> usize {
    if *failed || object.finished() {
        buffer.resize(0);
        return 0;
    }
    match object.read_buffer(buffer) {
        Ok(frames) => frames,
        Err(err) => {
            warn!("input '{}' failed, treating it as finished: {err}", object.label());
            status.record_error(format!("input '{}': {err}", object.label()));
            *failed = true;
            buffer.resize(0);
            0
        }
    }
}

fn seek_object(object: &mut dyn AudioObject, frame: u64, report: &mut SeekReport, status: &SharedStatus) {
    report.attempted += 1;
    if let Err(err) = object.seek(frame) {
        warn!("cannot reposition '{}': {err}", object.label());
        status.record_error(format!("seek '{}': {err}", object.label()));
        report.failed += 1;
    }
}

fn seconds_at(object: &dyn AudioObject, seconds: f64) -> u64 {
    (seconds.max(0.0) * f64::from(object.sample_rate())).round() as u64
}

/// Processes chains between audio objects.
pub struct Engine {
    config: EngineConfig,
    ctx: EngineContext,
    mixmode: Mixmode,
    multitrack: bool,
    inputs: Vec<Input>,
    sinks: SinkBank,
    slave_outputs: Vec<bool>,
    chains: Vec<ChainSlot>,
    routes: Vec<Route>,
    operator_params: Vec<Vec<usize>>,
    queue: Option<ControlQueue>,
    handle: EngineHandle,
    status: Arc<SharedStatus>,
    transport: Transport,
    worker: Option<SubmixWorker>,
    state: RunState,
    prepared: bool,
    realtime_inputs_running: bool,
    inputs_shortened: bool,
    exit_requested: bool,
    effects_enabled: bool,
    fault: Option<EngineError>,
    cycles: u64,
    frames: u64,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("mixmode", &self.mixmode)
            .field("state", &self.state)
            .field("chains", &self.chains.len())
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.sinks.len())
            .field("position", &self.transport.position())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Validates the setup and prepares buffers and mixing state.
    pub fn new(setup: Setup, config: EngineConfig, ctx: EngineContext) -> std::result::Result<Self, SetupError> {
        config.validate()?;
        setup.validate()?;

        let summary = setup.summary();
        let multitrack = summary.needs_multitrack_sync(config.interactive);
        if multitrack && (summary.realtime_inputs > 1 || summary.realtime_outputs > 1) {
            return Err(SetupError::UnsupportedRealtimeTopology {
                inputs: summary.realtime_inputs,
                outputs: summary.realtime_outputs,
            });
        }
        let mixmode = select_mixmode(&summary, &config);

        let Setup {
            inputs,
            mut outputs,
            chains,
        } = setup;
        let (buffersize, rate) = (config.buffersize, config.sample_rate);

        let mut consumers = vec![Vec::new(); inputs.len()];
        let mut feeders = vec![0; outputs.len()];
        let mut routes = Vec::with_capacity(chains.len());
        for (index, chain) in chains.iter().enumerate() {
            let input = chain.input().unwrap_or_default();
            consumers[input].push(index);
            if let Some(output) = chain.output() {
                feeders[output] += 1;
            }
            routes.push(Route {
                input,
                output: chain.output(),
            });
        }

        // Non-realtime outputs recording a realtime input; held back while
        // multitrack sync primes the devices.
        let mut slave_outputs = vec![false; outputs.len()];
        for route in &routes {
            if let Some(output) = route.output
                && inputs[route.input].is_realtime()
                && !outputs[output].is_realtime()
            {
                slave_outputs[output] = true;
            }
        }

        let inputs: Vec<Input> = inputs
            .into_iter()
            .zip(consumers)
            .map(|(mut object, consumers)| {
                object.set_buffersize(buffersize, rate);
                Input {
                    staging: AudioBuffer::with_capacity(object.channels(), buffersize, rate),
                    start_offset: object.position(),
                    object,
                    consumers,
                    failed: false,
                }
            })
            .collect();
        for output in &mut outputs {
            output.set_buffersize(buffersize, rate);
        }
        let sinks = SinkBank::new(outputs, &feeders, buffersize);

        let chains: Vec<ChainSlot> = chains
            .into_iter()
            .zip(&routes)
            .map(|(mut chain, route)| {
                chain.init(inputs[route.input].object.channels(), rate, buffersize);
                ChainSlot::Home(Box::new(chain))
            })
            .collect();

        let length = config.length_frames().or_else(|| {
            config
                .looping
                .then(|| {
                    inputs
                        .iter()
                        .filter(|i| !i.consumers.is_empty() && !i.object.is_realtime())
                        .filter_map(|i| i.object.length())
                        .max()
                })
                .flatten()
        });
        if config.looping && length.is_none() {
            warn!("looping needs a known length; no input reports one, looping disabled");
        }
        let transport = Transport::new(buffersize, length, config.looping);

        let status = Arc::new(SharedStatus::new(rate));
        status.set_length(length);
        let queue = ControlQueue::new();
        let handle = EngineHandle::new(Arc::clone(&status), queue.sender(), ctx.shutdown().clone());

        info!(
            "engine ready: {mixmode} mixmode, {} chains, {} inputs, {} outputs{}",
            chains.len(),
            inputs.len(),
            sinks.len(),
            if multitrack { ", multitrack sync" } else { "" }
        );

        let mut engine = Self {
            config,
            ctx,
            mixmode,
            multitrack,
            inputs,
            sinks,
            slave_outputs,
            chains,
            routes,
            operator_params: Vec::new(),
            queue: Some(queue),
            handle,
            status,
            transport,
            worker: None,
            state: RunState::Stopped,
            prepared: false,
            realtime_inputs_running: false,
            inputs_shortened: false,
            exit_requested: false,
            effects_enabled: true,
            fault: None,
            cycles: 0,
            frames: 0,
        };
        engine.refresh_operator_params();
        Ok(engine)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// A cloneable control surface for other threads.
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// The mixmode chosen at construction.
    pub fn mixmode(&self) -> Mixmode {
        self.mixmode
    }

    /// Whether multitrack sync runs at start.
    pub fn is_multitrack(&self) -> bool {
        self.multitrack
    }

    /// The configuration the engine runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Transport state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Whether cycles are being processed.
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// Whether the run reached its end.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, RunState::Finished | RunState::Failed)
    }

    /// Global position in seconds.
    pub fn current_position(&self) -> f64 {
        self.config.frames_to_seconds(self.transport.position())
    }

    /// Global position in frames.
    pub fn position_frames(&self) -> u64 {
        self.transport.position()
    }

    /// Processing length in frames, when bounded.
    pub fn length_frames(&self) -> Option<u64> {
        self.transport.length()
    }

    /// Whether the engine loops at the end of its range.
    pub fn is_looping(&self) -> bool {
        self.transport.is_looping()
    }

    /// Number of chains.
    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// A chain, when it is not with the submix worker.
    pub fn chain(&self, index: usize) -> Option<&Chain> {
        match self.chains.get(index)? {
            ChainSlot::Home(chain) => Some(&**chain),
            ChainSlot::Away => None,
        }
    }

    /// Mutable chain access, when it is not with the submix worker.
    pub fn chain_mut(&mut self, index: usize) -> Option<&mut Chain> {
        match self.chains.get_mut(index)? {
            ChainSlot::Home(chain) => Some(&mut **chain),
            ChainSlot::Away => None,
        }
    }

    /// Queues a command from the engine's own thread.
    pub fn push_command(&self, command: Command) {
        if let Some(queue) = &self.queue {
            queue.push(command);
        }
    }

    fn set_state(&mut self, state: RunState) {
        self.state = state;
        self.status.set_state(state);
    }

    fn refresh_operator_params(&mut self) {
        self.operator_params = self
            .chains
            .iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                ChainSlot::Home(chain) => (1..=chain.operator_count())
                    .map(|op| chain.operator(op).map_or(0, |o| o.parameter_count()))
                    .collect(),
                ChainSlot::Away => self.operator_params.get(index).cloned().unwrap_or_default(),
            })
            .collect();
    }

    /// Brings chain `index` home, waiting for the worker if needed.
    fn home_chain(&mut self, index: usize) -> Result<&mut Chain> {
        if matches!(self.chains[index], ChainSlot::Away) {
            let worker = self.worker.as_ref().ok_or_else(|| EngineError::ConcurrencyFault {
                chain: index,
                detail: "chain is away but no submix worker is running".into(),
            })?;
            let chain = worker.reclaim(index)?;
            self.chains[index] = ChainSlot::Home(chain);
        }
        match &mut self.chains[index] {
            ChainSlot::Home(chain) => Ok(&mut **chain),
            ChainSlot::Away => Err(EngineError::ConcurrencyFault {
                chain: index,
                detail: "chain could not be reclaimed".into(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Start / stop
    // -----------------------------------------------------------------------

    fn prepare_realtime(&mut self) -> std::result::Result<(), SetupError> {
        if self.prepared {
            return Ok(());
        }
        for input in self.inputs.iter_mut().filter(|i| i.object.is_realtime()) {
            input.object.prepare().map_err(|source| SetupError::Device {
                label: input.object.label().to_string(),
                source,
            })?;
        }
        for sink in self.sinks.iter_mut().filter(|s| s.is_realtime()) {
            sink.object.prepare().map_err(|source| SetupError::Device {
                label: sink.object.label().to_string(),
                source,
            })?;
        }
        self.prepared = true;
        Ok(())
    }

    fn start_realtime_inputs(&mut self) -> Result<()> {
        for input in self.inputs.iter_mut().filter(|i| i.object.is_realtime()) {
            input.object.start()?;
        }
        self.realtime_inputs_running = true;
        Ok(())
    }

    fn halt_realtime(&mut self) {
        if self.realtime_inputs_running {
            for input in self.inputs.iter_mut().filter(|i| i.object.is_realtime()) {
                if let Err(err) = input.object.stop() {
                    warn!("failed to stop '{}': {err}", input.object.label());
                }
            }
            self.realtime_inputs_running = false;
        }
        self.sinks.stop_realtime();
    }

    fn spawn_worker(&mut self) -> Result<()> {
        let sinks = std::mem::take(&mut self.sinks);
        let worker = SubmixWorker::spawn(
            self.chains.len(),
            sinks,
            Arc::clone(&self.status),
            self.ctx.span().clone(),
            self.config.handshake_timeout(),
        )?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Brings every chain home and takes the sinks back from the worker.
    fn suspend_worker(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        for index in 0..self.chains.len() {
            if matches!(self.chains[index], ChainSlot::Away) {
                let chain = worker.reclaim(index)?;
                self.chains[index] = ChainSlot::Home(chain);
            }
        }
        self.sinks = worker.join()?;
        Ok(())
    }

    /// Starts processing. Realtime devices are prepared on first start.
    ///
    /// Ignored once `exit` has been applied.
    pub fn start(&mut self) -> Result<()> {
        if self.state == RunState::Running {
            return Ok(());
        }
        if self.exit_requested {
            debug!("start ignored: exit already requested");
            return Ok(());
        }
        self.prepare_realtime()?;
        for slot in &mut self.chains {
            if let ChainSlot::Home(chain) = slot {
                chain.set_connected(true);
            }
        }
        self.refresh_operator_params();

        if self.multitrack {
            self.multitrack_sync()?;
        } else {
            self.start_realtime_inputs()?;
            self.sinks.arm_trigger();
        }
        if self.mixmode == Mixmode::Multithreaded {
            self.spawn_worker()?;
        }
        self.set_state(RunState::Running);
        debug!("started at frame {}", self.transport.position());
        Ok(())
    }

    /// Stops processing at the cycle boundary, stops realtime devices and
    /// flushes every output so files on disk are complete. A failed flush
    /// counts as a failed output.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != RunState::Running {
            return Ok(());
        }
        self.suspend_worker()?;
        self.halt_realtime();
        self.sinks.flush(&self.status);
        for slot in &mut self.chains {
            if let ChainSlot::Home(chain) = slot {
                chain.set_connected(false);
            }
        }
        self.set_state(RunState::Stopped);
        debug!("stopped at frame {}", self.transport.position());
        Ok(())
    }

    /// Halts realtime devices now, without waiting for the run to stop.
    ///
    /// In multithreaded mode the worker first returns the outputs it holds
    /// and is restarted afterwards.
    pub fn stop_realtime_devices(&mut self) -> Result<()> {
        let resume = self.worker.is_some();
        self.suspend_worker()?;
        self.halt_realtime();
        if resume {
            self.spawn_worker()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.stop()?;
        let state = if self.sinks.any_failed() {
            RunState::Failed
        } else {
            RunState::Finished
        };
        self.set_state(state);
        info!(
            "run {}: {} frames in {} cycles",
            if state == RunState::Failed { "failed" } else { "finished" },
            self.frames,
            self.cycles
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    fn reposition_globally(&mut self, seconds: f64) -> SeekReport {
        let mut report = SeekReport::default();
        for input in self.inputs.iter_mut().filter(|i| !i.object.is_realtime()) {
            let frame = input.start_offset + seconds_at(input.object.as_ref(), seconds);
            seek_object(input.object.as_mut(), frame, &mut report, &self.status);
        }
        for sink in self.sinks.iter_mut().filter(|s| !s.is_realtime()) {
            let frame = sink.start_offset + seconds_at(sink.object.as_ref(), seconds);
            seek_object(sink.object.as_mut(), frame, &mut report, &self.status);
        }
        self.sinks.reset_mixes();
        report
    }

    /// Moves every non-realtime object to `seconds` past its start offset.
    pub fn seek_to(&mut self, seconds: f64) -> Result<SeekReport> {
        let seconds = seconds.max(0.0);
        let was_running = self.is_running();
        self.stop()?;
        let report = self.reposition_globally(seconds);
        self.transport
            .set_position(self.config.seconds_to_frames(seconds));
        self.status.set_position(self.transport.position());
        if self.state == RunState::Finished {
            self.set_state(RunState::Stopped);
        }
        debug!(
            "seek to {seconds:.3}s: {}/{} objects repositioned",
            report.repositioned(),
            report.attempted
        );
        if was_running {
            self.start()?;
        }
        Ok(report)
    }

    /// Moves every non-realtime object by `seconds` (negative rewinds).
    pub fn seek_by(&mut self, seconds: f64) -> Result<SeekReport> {
        self.seek_to((self.current_position() + seconds).max(0.0))
    }

    /// Moves every non-realtime object back to its start offset.
    pub fn rewind_to_start(&mut self) -> Result<SeekReport> {
        self.seek_to(0.0)
    }

    fn reposition_chain(&mut self, chain: usize, target: impl Fn(&dyn AudioObject, u64) -> u64) -> Result<SeekReport> {
        let Some(route) = self.routes.get(chain).copied() else {
            return Ok(SeekReport::default());
        };
        let was_running = self.is_running();
        self.stop()?;
        let mut report = SeekReport::default();
        let input = &mut self.inputs[route.input];
        if !input.object.is_realtime() {
            let frame = target(input.object.as_ref(), input.start_offset);
            seek_object(input.object.as_mut(), frame, &mut report, &self.status);
        }
        if let Some(output) = route.output {
            for (index, sink) in self.sinks.iter_mut().enumerate() {
                if index == output && !sink.is_realtime() {
                    let frame = target(sink.object.as_ref(), sink.start_offset);
                    seek_object(sink.object.as_mut(), frame, &mut report, &self.status);
                }
            }
        }
        self.sinks.reset_mixes();
        if was_running {
            self.start()?;
        }
        Ok(report)
    }

    /// Moves only chain `chain`'s objects to `seconds` past their start.
    pub fn chain_seek_to(&mut self, chain: usize, seconds: f64) -> Result<SeekReport> {
        self.reposition_chain(chain, |object, start| start + seconds_at(object, seconds))
    }

    /// Moves only chain `chain`'s objects by `seconds` (negative rewinds).
    pub fn chain_seek_by(&mut self, chain: usize, seconds: f64) -> Result<SeekReport> {
        self.reposition_chain(chain, |object, _| {
            let delta = seconds * f64::from(object.sample_rate());
            (object.position() as f64 + delta).max(0.0).round() as u64
        })
    }

    fn set_input_buffersize(&mut self, frames: usize) {
        for input in &mut self.inputs {
            input.object.set_buffersize(frames, self.config.sample_rate);
        }
        self.inputs_shortened = frames != self.config.buffersize;
    }

    fn loop_to_start(&mut self) -> Result<()> {
        let resume = self.worker.is_some();
        self.suspend_worker()?;
        let report = self.reposition_globally(0.0);
        if !report.is_complete() {
            warn!("loop rewind left {} objects in place", report.failed);
        }
        if self.inputs_shortened {
            self.set_input_buffersize(self.config.buffersize);
        }
        if resume {
            self.spawn_worker()?;
        }
        debug!("looped back to start");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cycles
    // -----------------------------------------------------------------------

    fn inputs_to_chains(&mut self) -> usize {
        let mut longest = 0;
        for input in &mut self.inputs {
            match input.consumers.as_slice() {
                [] => {}
                [only] => {
                    if let ChainSlot::Home(chain) = &mut self.chains[*only] {
                        let read = read_object(
                            input.object.as_mut(),
                            &mut input.failed,
                            chain.buffer_mut(),
                            &self.status,
                        );
                        longest = longest.max(read);
                    }
                }
                many => {
                    let read = read_object(
                        input.object.as_mut(),
                        &mut input.failed,
                        &mut input.staging,
                        &self.status,
                    );
                    longest = longest.max(read);
                    for &index in many {
                        if let ChainSlot::Home(chain) = &mut self.chains[index] {
                            chain.buffer_mut().assign(&input.staging);
                        }
                    }
                }
            }
        }
        longest
    }

    fn cycle_simple(&mut self) -> usize {
        let (Some(input), Some(ChainSlot::Home(chain))) = (self.inputs.first_mut(), self.chains.first_mut()) else {
            return 0;
        };
        let read = read_object(
            input.object.as_mut(),
            &mut input.failed,
            chain.buffer_mut(),
            &self.status,
        );
        chain.process();
        if let Some(output) = chain.output() {
            self.sinks.deliver(output, chain.buffer(), &self.status);
        }
        self.sinks.end_cycle(&self.status);
        read
    }

    /// Normal-mode cycle. While `syncing`, slave outputs are left unwritten
    /// and realtime outputs are prefilled.
    fn cycle_normal(&mut self, syncing: bool) -> usize {
        let read = self.inputs_to_chains();
        for slot in &mut self.chains {
            if let ChainSlot::Home(chain) = slot {
                chain.process();
            }
        }
        for slot in &self.chains {
            if let ChainSlot::Home(chain) = slot
                && let Some(output) = chain.output()
            {
                if syncing && self.slave_outputs[output] {
                    continue;
                }
                self.sinks.deliver(output, chain.buffer(), &self.status);
            }
        }
        if !syncing {
            self.sinks.end_cycle(&self.status);
        }
        read
    }

    fn cycle_multithreaded(&mut self) -> Result<usize> {
        let mut longest = 0;
        for input in self.inputs.iter_mut().filter(|i| !i.consumers.is_empty()) {
            let read = read_object(
                input.object.as_mut(),
                &mut input.failed,
                &mut input.staging,
                &self.status,
            );
            longest = longest.max(read);
        }
        let worker = self.worker.as_ref().ok_or_else(|| EngineError::ConcurrencyFault {
            chain: 0,
            detail: "multithreaded cycle without a submix worker".into(),
        })?;
        for index in 0..self.chains.len() {
            let mut chain = match std::mem::replace(&mut self.chains[index], ChainSlot::Away) {
                ChainSlot::Home(chain) => chain,
                ChainSlot::Away => worker.reclaim(index)?,
            };
            chain
                .buffer_mut()
                .assign(&self.inputs[self.routes[index].input].staging);
            worker.hand_off(index, chain)?;
        }
        Ok(longest)
    }

    fn cycle(&mut self) -> Result<()> {
        let frames = self.transport.frames_for_cycle();
        if frames != self.config.buffersize || self.inputs_shortened {
            self.set_input_buffersize(frames);
        }
        let read = match self.mixmode {
            Mixmode::Simple => self.cycle_simple(),
            Mixmode::Normal => self.cycle_normal(false),
            Mixmode::Multithreaded => self.cycle_multithreaded()?,
        };
        self.cycles += 1;
        self.frames += read as u64;
        trace!("cycle {}: read {read} frames", self.cycles);

        match self.transport.advance(frames) {
            Boundary::Inside => {}
            Boundary::Wrap => self.loop_to_start()?,
            Boundary::End => {
                debug!("end of processing range");
                self.finish()?;
            }
        }
        self.status.set_position(self.transport.position());
        Ok(())
    }

    fn multitrack_sync(&mut self) -> Result<()> {
        self.start_realtime_inputs()?;
        for _ in 0..SYNC_CYCLES {
            let frames = self.transport.frames_for_cycle();
            let read = self.cycle_normal(true);
            self.cycles += 1;
            self.frames += read as u64;
            if self.transport.advance(frames) != Boundary::Inside {
                debug!("processing range ended during multitrack sync");
            }
        }
        self.sinks.start_realtime(&self.status);

        let input_position = self
            .inputs
            .iter()
            .find(|i| i.object.is_realtime())
            .map_or(0, |i| i.object.position());
        let output_position = self
            .sinks
            .iter()
            .find(|s| s.is_realtime())
            .map_or(0, |s| s.object.position());
        let offset = input_position as i64 - output_position as i64;
        if offset < 0 {
            return Err(SetupError::NegativeSyncOffset(offset).into());
        }
        let mut report = SeekReport::default();
        if offset > 0 {
            for sink in self.sinks.iter_mut().filter(|s| !s.is_realtime()) {
                let frame = sink.object.position() + offset as u64;
                seek_object(sink.object.as_mut(), frame, &mut report, &self.status);
            }
        }
        debug!(
            "multitrack sync: non-realtime outputs advanced by {offset} frames ({} moved)",
            report.repositioned()
        );
        Ok(())
    }

    fn update_engine_state(&mut self) -> Result<()> {
        if self.state != RunState::Running {
            return Ok(());
        }
        let live = self
            .inputs
            .iter()
            .any(|i| !i.consumers.is_empty() && !i.is_done());
        if !live {
            debug!("all inputs finished");
            self.finish()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    /// Applies every queued command now.
    ///
    /// Called once per cycle by interactive runs; hosts driving the engine
    /// by hand can call it directly.
    pub fn drain_commands(&mut self) -> Result<BatchOutcome> {
        let Some(mut queue) = self.queue.take() else {
            return Ok(BatchOutcome::default());
        };
        let outcome = queue.drain_and_apply(self);
        self.queue = Some(queue);
        match self.fault.take() {
            Some(err) => Err(err),
            None => Ok(outcome),
        }
    }

    fn absorb(&mut self, result: Result<()>) {
        if let Err(err) = result {
            if err.is_fatal() {
                self.fault.get_or_insert(err);
            } else {
                warn!("control: {err}");
                self.status.record_error(err.to_string());
            }
        }
    }

    fn absorb_seek(&mut self, result: Result<SeekReport>) {
        let result = result.and_then(SeekReport::into_result).map(|_| ());
        self.absorb(result);
    }

    // -----------------------------------------------------------------------
    // Run
    // -----------------------------------------------------------------------

    fn run_loop(&mut self) -> Result<EndCause> {
        if !self.config.interactive {
            self.start()?;
        }
        let poll = self.config.poll_interval();
        loop {
            if self.ctx.shutdown().is_requested() {
                debug!("quit requested");
                return Ok(EndCause::Quit);
            }
            if self.config.interactive {
                self.drain_commands()?;
                if self.exit_requested {
                    return Ok(EndCause::Exit);
                }
            }
            if self.state != RunState::Running {
                if self.config.interactive {
                    if let Some(queue) = self.queue.as_mut() {
                        queue.wait(poll);
                    }
                    continue;
                }
                return Ok(if self.state == RunState::Stopped {
                    EndCause::Stopped
                } else {
                    EndCause::Completed
                });
            }
            self.cycle()?;
            self.update_engine_state()?;
        }
    }

    fn abort(&mut self, err: EngineError) -> EngineError {
        error!("run aborted: {err}");
        if err.is_fatal() {
            // The worker may be stuck; detach it instead of joining.
            self.worker = None;
            self.halt_realtime();
        } else if let Err(stop_err) = self.stop() {
            warn!("stop after failure also failed: {stop_err}");
            self.worker = None;
            self.halt_realtime();
        }
        self.status.record_error(err.to_string());
        self.set_state(RunState::Failed);
        err
    }

    /// Runs until the inputs end, the length bound is reached, `exit` is
    /// applied or quit is requested.
    ///
    /// Passive engines start immediately and never look at the control
    /// queue. Interactive engines wait for commands while stopped or
    /// finished. Runtime I/O failures do not end the run; they show up in
    /// [`RunReport::error`] and make the run fail when an output was lost.
    /// Outputs are flushed when the engine stops, so files are complete
    /// when this returns and a failed flush also fails the run.
    pub fn run_to_completion(&mut self) -> Result<RunReport> {
        let span = self.ctx.span().clone();
        let _guard = span.enter();
        info!(
            "run started: {} mixmode, {} chains, {}",
            self.mixmode,
            self.chains.len(),
            if self.config.interactive {
                "interactive"
            } else {
                "passive"
            }
        );

        let cause = match self.run_loop() {
            Ok(cause) => cause,
            Err(err) => return Err(self.abort(err)),
        };
        if let Err(err) = self.stop() {
            return Err(self.abort(err));
        }
        if self.sinks.any_failed() && self.state != RunState::Failed {
            self.set_state(RunState::Failed);
        }

        let report = RunReport {
            state: self.state,
            cause,
            mixmode: self.mixmode,
            cycles: self.cycles,
            frames: self.frames,
            error: self.status.last_error(),
        };
        info!(
            "run ended ({:?}): {} frames, {} cycles",
            report.cause, report.frames, report.cycles
        );
        Ok(report)
    }
}

impl CommandTarget for Engine {
    fn chain_count(&self) -> usize {
        self.chains.len()
    }

    fn operator_count(&self, chain: usize) -> usize {
        match self.chains.get(chain) {
            Some(ChainSlot::Home(c)) => c.operator_count(),
            _ => self.operator_params.get(chain).map_or(0, Vec::len),
        }
    }

    fn parameter_count(&self, chain: usize, operator: usize) -> usize {
        match self.chains.get(chain) {
            Some(ChainSlot::Home(c)) => c.operator(operator).map_or(0, |o| o.parameter_count()),
            _ => operator
                .checked_sub(1)
                .and_then(|op| self.operator_params.get(chain)?.get(op).copied())
                .unwrap_or(0),
        }
    }

    fn exit(&mut self) {
        debug!("control: exit");
        self.exit_requested = true;
    }

    fn start(&mut self) {
        let result = Engine::start(self);
        self.absorb(result);
    }

    fn stop(&mut self) {
        let result = Engine::stop(self);
        self.absorb(result);
    }

    fn toggle_effects(&mut self) {
        self.effects_enabled = !self.effects_enabled;
        let enabled = self.effects_enabled;
        for index in 0..self.chains.len() {
            let result = self.home_chain(index).map(|c| c.set_effects_enabled(enabled));
            if let Err(err) = result {
                self.absorb(Err(err));
                return;
            }
        }
        info!("effects {}", if enabled { "enabled" } else { "disabled" });
    }

    fn seek_by(&mut self, seconds: f64) {
        let result = Engine::seek_by(self, seconds);
        self.absorb_seek(result);
    }

    fn seek_to(&mut self, seconds: f64) {
        let result = Engine::seek_to(self, seconds);
        self.absorb_seek(result);
    }

    fn toggle_mute(&mut self, chain: usize) {
        let result = self.home_chain(chain).map(|c| {
            c.toggle_mute();
            debug!("chain '{}' muted: {}", c.name(), c.is_muted());
        });
        self.absorb(result);
    }

    fn toggle_bypass(&mut self, chain: usize) {
        let result = self.home_chain(chain).map(|c| {
            c.toggle_bypass();
            debug!("chain '{}' bypassed: {}", c.name(), c.is_bypassed());
        });
        self.absorb(result);
    }

    fn chain_seek_by(&mut self, chain: usize, seconds: f64) {
        let result = Engine::chain_seek_by(self, chain, seconds);
        self.absorb_seek(result);
    }

    fn chain_seek_to(&mut self, chain: usize, seconds: f64) {
        let result = Engine::chain_seek_to(self, chain, seconds);
        self.absorb_seek(result);
    }

    fn set_parameter(&mut self, chain: usize, operator: usize, parameter: usize, value: f64) {
        let result = self
            .home_chain(chain)
            .map(|c| c.operator_mut(operator).map(|op| op.set_parameter(parameter, value)));
        match result {
            Ok(Some(Ok(()))) => {
                trace!("chain {chain} operator {operator} parameter {parameter} = {value}");
            }
            Ok(Some(Err(err))) => {
                warn!("control: {err}");
                self.status.record_error(err.to_string());
            }
            Ok(None) => {}
            Err(err) => self.absorb(Err(err)),
        }
    }
}
