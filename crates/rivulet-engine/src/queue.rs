//! Ordered control queue with queue-local selection.
//!
//! Any number of [`ControlSender`]s push [`Command`]s from any thread. The
//! engine drains the queue once per cycle, before I/O, through
//! [`ControlQueue::drain_and_apply`], which applies entries strictly in
//! insertion order against a [`CommandTarget`].
//!
//! Which chain, operator and parameter a command addresses is tracked here
//! in a [`Selection`], not on the engine. Selecting an out-of-range target
//! clears the selection below it, and commands that need a target are no-ops
//! while it is cleared.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};

use crate::command::Command;
use crate::error::CommandError;

/// The operations a drained command can invoke.
///
/// The engine implements this; tests can substitute a recorder.
pub trait CommandTarget {
    /// Number of chains.
    fn chain_count(&self) -> usize;
    /// Number of operators in chain `chain`.
    fn operator_count(&self, chain: usize) -> usize;
    /// Number of parameters of operator `operator` (1-based) in `chain`.
    fn parameter_count(&self, chain: usize, operator: usize) -> usize;

    /// End the run.
    fn exit(&mut self);
    /// Start processing.
    fn start(&mut self);
    /// Stop processing.
    fn stop(&mut self);
    /// Flip engine-wide operator processing.
    fn toggle_effects(&mut self);
    /// Relative global seek; negative rewinds.
    fn seek_by(&mut self, seconds: f64);
    /// Absolute global seek.
    fn seek_to(&mut self, seconds: f64);
    /// Flip mute on `chain`.
    fn toggle_mute(&mut self, chain: usize);
    /// Flip bypass on `chain`.
    fn toggle_bypass(&mut self, chain: usize);
    /// Relative seek of `chain`'s objects; negative rewinds.
    fn chain_seek_by(&mut self, chain: usize, seconds: f64);
    /// Absolute seek of `chain`'s objects.
    fn chain_seek_to(&mut self, chain: usize, seconds: f64);
    /// Write a parameter (operator and parameter 1-based).
    fn set_parameter(&mut self, chain: usize, operator: usize, parameter: usize, value: f64);
}

/// Current command target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    /// Selected chain (0-based).
    pub chain: Option<usize>,
    /// Selected operator (1-based).
    pub operator: Option<usize>,
    /// Selected parameter (1-based).
    pub parameter: Option<usize>,
}

/// Result of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Commands applied, including `exit`.
    pub applied: usize,
    /// Whether `exit` ended the batch.
    pub exited: bool,
    /// Entries discarded after `exit`.
    pub discarded: usize,
}

/// Cloneable producer side of a [`ControlQueue`].
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: Sender<Command>,
}

impl ControlSender {
    /// Queues a command.
    pub fn push(&self, command: Command) -> Result<(), CommandError> {
        self.tx.send(command).map_err(|_| CommandError::Disconnected)
    }
}

/// Consumer side of the control queue, owned by the engine.
#[derive(Debug)]
pub struct ControlQueue {
    tx: Sender<Command>,
    rx: Receiver<Command>,
    held: Option<Command>,
    selection: Selection,
}

impl Default for ControlQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            held: None,
            selection: Selection::default(),
        }
    }

    /// A producer handle for other threads.
    pub fn sender(&self) -> ControlSender {
        ControlSender {
            tx: self.tx.clone(),
        }
    }

    /// Queues a command from the owning thread.
    pub fn push(&self, command: Command) {
        // The queue holds its own receiver, so sending cannot fail.
        let _ = self.tx.send(command);
    }

    /// Entries waiting to be drained.
    pub fn len(&self) -> usize {
        self.rx.len() + usize::from(self.held.is_some())
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current selection.
    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Blocks until a command is queued or `timeout` passes. Returns true
    /// when a command is ready; it is kept for the next drain.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if self.held.is_some() || !self.rx.is_empty() {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(command) => {
                self.held = Some(command);
                true
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }

    fn next(&mut self) -> Option<Command> {
        if let Some(command) = self.held.take() {
            return Some(command);
        }
        match self.rx.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Removes and applies every queued command in order.
    ///
    /// `exit` is applied and then everything still queued is discarded.
    pub fn drain_and_apply(&mut self, target: &mut impl CommandTarget) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        while let Some(command) = self.next() {
            outcome.applied += 1;
            tracing::trace!("control: {command}");
            if self.apply(command, target) {
                outcome.exited = true;
                outcome.discarded = self.rx.try_iter().count();
                if outcome.discarded > 0 {
                    tracing::debug!("control: exit discarded {} queued commands", outcome.discarded);
                }
                break;
            }
        }
        outcome
    }

    /// Applies one command; returns true for `exit`.
    fn apply(&mut self, command: Command, target: &mut impl CommandTarget) -> bool {
        let sel = self.selection;
        match command {
            Command::Exit => {
                target.exit();
                return true;
            }
            Command::Start => target.start(),
            Command::Stop => target.stop(),
            Command::ToggleEffects => target.toggle_effects(),
            Command::Rewind(secs) => target.seek_by(-secs),
            Command::Forward(secs) => target.seek_by(secs),
            Command::SetPosition(secs) => target.seek_to(secs),
            Command::SelectChain(index) => {
                self.selection = if index < target.chain_count() {
                    Selection {
                        chain: Some(index),
                        ..Selection::default()
                    }
                } else {
                    tracing::warn!("control: no chain {index}, selection cleared");
                    Selection::default()
                };
            }
            Command::SelectOperator(index) => {
                self.selection.parameter = None;
                self.selection.operator = match sel.chain {
                    Some(chain) if (1..=target.operator_count(chain)).contains(&index) => {
                        Some(index)
                    }
                    _ => None,
                };
            }
            Command::SelectParameter(index) => {
                self.selection.parameter = match (sel.chain, sel.operator) {
                    (Some(chain), Some(op))
                        if (1..=target.parameter_count(chain, op)).contains(&index) =>
                    {
                        Some(index)
                    }
                    _ => None,
                };
            }
            Command::ToggleMute => {
                if let Some(chain) = sel.chain {
                    target.toggle_mute(chain);
                }
            }
            Command::ToggleBypass => {
                if let Some(chain) = sel.chain {
                    target.toggle_bypass(chain);
                }
            }
            Command::ChainRewind(secs) => {
                if let Some(chain) = sel.chain {
                    target.chain_seek_by(chain, -secs);
                }
            }
            Command::ChainForward(secs) => {
                if let Some(chain) = sel.chain {
                    target.chain_seek_by(chain, secs);
                }
            }
            Command::ChainSetPosition(secs) => {
                if let Some(chain) = sel.chain {
                    target.chain_seek_to(chain, secs);
                }
            }
            Command::SetParameter(value) => {
                if let Selection {
                    chain: Some(chain),
                    operator: Some(op),
                    parameter: Some(param),
                } = sel
                {
                    target.set_parameter(chain, op, param, value);
                } else {
                    tracing::trace!("control: no parameter selected, set ignored");
                }
            }
        }
        false
    }
}
