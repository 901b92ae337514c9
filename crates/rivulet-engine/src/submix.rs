//! Submix worker thread for multithreaded mode.
//!
//! Chains move between the engine thread and the worker by ownership. Each
//! chain has its own lane: a capacity-1 channel towards the worker and a
//! capacity-1 channel back. A chain is therefore either *home* (the engine
//! may fill its buffer or change its flags) or *away* (the worker is
//! processing it), never both.
//!
//! Per cycle the engine hands chains over in list order without waiting for
//! them to be processed; the worker takes them in the same order, processes,
//! mixes into the sink bank it owns, and sends each one back. The engine
//! reclaims a chain right before it needs it again, with a bounded wait:
//! a chain that does not come back in time is a concurrency fault.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use rivulet_core::Chain;
use tracing::{debug, trace};

use crate::error::EngineError;
use crate::sinks::SinkBank;
use crate::status::SharedStatus;

/// Where a chain currently lives.
pub(crate) enum ChainSlot {
    /// On the engine thread.
    Home(Box<Chain>),
    /// Handed to the submix worker.
    Away,
}

struct Lane {
    to_worker: Sender<Box<Chain>>,
    from_worker: Receiver<Box<Chain>>,
}

pub(crate) struct SubmixWorker {
    lanes: Vec<Lane>,
    thread: JoinHandle<SinkBank>,
    timeout: Duration,
}

impl SubmixWorker {
    /// Spawns the worker with ownership of the sinks.
    pub(crate) fn spawn(
        chain_count: usize,
        sinks: SinkBank,
        status: Arc<SharedStatus>,
        span: tracing::Span,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let mut lanes = Vec::with_capacity(chain_count);
        let mut worker_lanes = Vec::with_capacity(chain_count);
        for _ in 0..chain_count {
            let (to_worker, worker_rx) = bounded(1);
            let (worker_tx, from_worker) = bounded(1);
            lanes.push(Lane {
                to_worker,
                from_worker,
            });
            worker_lanes.push((worker_rx, worker_tx));
        }
        let thread = thread::Builder::new()
            .name("rivulet-submix".into())
            .spawn(move || {
                let _guard = span.enter();
                worker_loop(&worker_lanes, sinks, &status)
            })
            .map_err(EngineError::Spawn)?;
        debug!("submix worker started for {chain_count} chains");
        Ok(Self {
            lanes,
            thread,
            timeout,
        })
    }

    /// Passes a filled chain to the worker.
    pub(crate) fn hand_off(&self, index: usize, chain: Box<Chain>) -> Result<(), EngineError> {
        self.lanes[index]
            .to_worker
            .send_timeout(chain, self.timeout)
            .map_err(|_| EngineError::ConcurrencyFault {
                chain: index,
                detail: "submix worker is not accepting chains".into(),
            })
    }

    /// Waits for the worker to release a chain.
    pub(crate) fn reclaim(&self, index: usize) -> Result<Box<Chain>, EngineError> {
        match self.lanes[index].from_worker.recv_timeout(self.timeout) {
            Ok(chain) => Ok(chain),
            Err(RecvTimeoutError::Timeout) => Err(EngineError::ConcurrencyFault {
                chain: index,
                detail: format!("not released within {} ms", self.timeout.as_millis()),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::ConcurrencyFault {
                chain: index,
                detail: "submix worker terminated".into(),
            }),
        }
    }

    /// Closes the lanes and takes the sinks back. Every chain must be home.
    pub(crate) fn join(self) -> Result<SinkBank, EngineError> {
        drop(self.lanes);
        self.thread.join().map_err(|_| EngineError::ConcurrencyFault {
            chain: 0,
            detail: "submix worker panicked".into(),
        })
    }
}

fn worker_loop(
    lanes: &[(Receiver<Box<Chain>>, Sender<Box<Chain>>)],
    mut sinks: SinkBank,
    status: &Arc<SharedStatus>,
) -> SinkBank {
    loop {
        for (index, (rx, tx)) in lanes.iter().enumerate() {
            let Ok(mut chain) = rx.recv() else {
                debug!("submix worker exiting");
                return sinks;
            };
            chain.process();
            if let Some(output) = chain.output() {
                sinks.deliver(output, chain.buffer(), status);
            }
            trace!("submix: chain {index} released");
            if tx.send(chain).is_err() {
                return sinks;
            }
        }
        sinks.end_cycle(status);
    }
}
