//! Run state shared with control surfaces.
//!
//! The engine thread publishes its state and position into a
//! [`SharedStatus`] after every cycle; an [`EngineHandle`] reads it from any
//! thread and feeds commands back through the control queue. Front ends
//! (console, network server, GUI) only ever see the handle.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::command::{Command, CommandKind};
use crate::context::ShutdownFlag;
use crate::error::CommandError;
use crate::mixmode::Mixmode;
use crate::queue::ControlSender;

/// Transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// Not processing; can be started.
    Stopped = 0,
    /// Processing cycles.
    Running = 1,
    /// All inputs ended or the length bound was reached.
    Finished = 2,
    /// Ended because a sink failed or the submix handshake broke.
    Failed = 3,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Finished,
            3 => Self::Failed,
            _ => Self::Stopped,
        }
    }
}

const UNKNOWN_LENGTH: u64 = u64::MAX;

#[derive(Debug)]
pub(crate) struct SharedStatus {
    state: AtomicU8,
    position: AtomicU64,
    length: AtomicU64,
    sample_rate: u32,
    last_error: Mutex<Option<String>>,
}

impl SharedStatus {
    pub(crate) fn new(sample_rate: u32) -> Self {
        Self {
            state: AtomicU8::new(RunState::Stopped as u8),
            position: AtomicU64::new(0),
            length: AtomicU64::new(UNKNOWN_LENGTH),
            sample_rate,
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn set_state(&self, state: RunState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_position(&self, frames: u64) {
        self.position.store(frames, Ordering::Release);
    }

    pub(crate) fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    pub(crate) fn set_length(&self, frames: Option<u64>) {
        self.length
            .store(frames.unwrap_or(UNKNOWN_LENGTH), Ordering::Release);
    }

    fn length(&self) -> Option<u64> {
        let frames = self.length.load(Ordering::Acquire);
        (frames != UNKNOWN_LENGTH).then_some(frames)
    }

    pub(crate) fn record_error(&self, message: impl Into<String>) {
        let mut slot = self.last_error.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(message.into());
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Thread-safe control surface for a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    status: Arc<SharedStatus>,
    commands: ControlSender,
    shutdown: ShutdownFlag,
}

impl EngineHandle {
    pub(crate) fn new(
        status: Arc<SharedStatus>,
        commands: ControlSender,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            status,
            commands,
            shutdown,
        }
    }

    /// Queues a command built from its kind and optional payload.
    pub fn push_command(&self, kind: CommandKind, value: Option<f64>) -> Result<(), CommandError> {
        self.send(Command::new(kind, value)?)
    }

    /// Queues an already-built command.
    pub fn send(&self, command: Command) -> Result<(), CommandError> {
        self.commands.push(command)
    }

    /// Current transport state.
    pub fn state(&self) -> RunState {
        self.status.state()
    }

    /// Whether cycles are being processed.
    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Whether the run reached its natural end.
    pub fn is_finished(&self) -> bool {
        matches!(self.state(), RunState::Finished | RunState::Failed)
    }

    /// Global position in seconds.
    pub fn current_position(&self) -> f64 {
        self.status.position() as f64 / f64::from(self.status.sample_rate)
    }

    /// Global position in frames.
    pub fn position_frames(&self) -> u64 {
        self.status.position()
    }

    /// Processing length in seconds, when bounded.
    pub fn length(&self) -> Option<f64> {
        self.status
            .length()
            .map(|frames| frames as f64 / f64::from(self.status.sample_rate))
    }

    /// Most recent runtime error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.status.last_error()
    }

    /// Asks the engine to quit at the next cycle boundary.
    pub fn request_quit(&self) {
        self.shutdown.request();
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCause {
    /// Inputs exhausted or the length bound reached.
    Completed,
    /// `exit` command.
    Exit,
    /// Shutdown flag raised.
    Quit,
    /// Passive run stopped by a `stop` outside the cycle loop.
    Stopped,
}

/// Summary returned by [`Engine::run_to_completion`](crate::Engine::run_to_completion).
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Final transport state.
    pub state: RunState,
    /// What ended the run.
    pub cause: EndCause,
    /// Mixmode the run used.
    pub mixmode: Mixmode,
    /// Cycles processed.
    pub cycles: u64,
    /// Frames processed (longest read per cycle, summed).
    pub frames: u64,
    /// Most recent runtime error message.
    pub error: Option<String>,
}

impl RunReport {
    /// Whether the run ended without failure.
    pub fn is_success(&self) -> bool {
        self.state != RunState::Failed
    }

    /// Process exit status: 0 on success, 1 on failure.
    pub fn status_code(&self) -> i32 {
        i32::from(!self.is_success())
    }
}
