//! Mixmode selection.
//!
//! The strategy is chosen once, from the topology and the configuration, and
//! never changes while the engine lives.

use std::fmt;

use crate::config::{EngineConfig, MixmodeRequest};

/// Orchestration strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mixmode {
    /// One chain, one input, one output: read, process, write.
    Simple,
    /// Any topology on the engine thread.
    Normal,
    /// Chain processing on a submix worker thread.
    Multithreaded,
}

impl fmt::Display for Mixmode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::Normal => "normal",
            Self::Multithreaded => "multithreaded",
        })
    }
}

/// Counts describing a topology.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopologySummary {
    /// Chains.
    pub chains: usize,
    /// Input objects.
    pub inputs: usize,
    /// Output objects.
    pub outputs: usize,
    /// Inputs driven by a device clock.
    pub realtime_inputs: usize,
    /// Outputs driven by a device clock.
    pub realtime_outputs: usize,
}

impl TopologySummary {
    /// One chain between one input and one output.
    pub fn is_simple(&self) -> bool {
        self.chains == 1 && self.inputs == 1 && self.outputs == 1
    }

    /// Realtime and non-realtime objects on both sides, several chains, and
    /// an interactive engine: non-realtime positions must be aligned to the
    /// devices at start.
    pub fn needs_multitrack_sync(&self, interactive: bool) -> bool {
        interactive
            && self.chains > 1
            && self.realtime_inputs > 0
            && self.realtime_outputs > 0
            && self.inputs > self.realtime_inputs
            && self.outputs > self.realtime_outputs
    }
}

/// Chooses the mixmode for a topology.
///
/// Multitrack sync runs on the engine thread, so a topology that needs it
/// always gets `normal`. A forced `simple` on a topology that is not simple
/// falls back to `normal`. `auto` picks `simple` when possible,
/// `multithreaded` when the chain count and buffersize reach the configured
/// thresholds, and `normal` otherwise.
pub fn select_mixmode(summary: &TopologySummary, config: &EngineConfig) -> Mixmode {
    if summary.needs_multitrack_sync(config.interactive) {
        if !matches!(config.mixmode, MixmodeRequest::Auto | MixmodeRequest::Normal) {
            tracing::warn!("{} mixmode requested, using normal for multitrack sync", config.mixmode);
        }
        return Mixmode::Normal;
    }
    match config.mixmode {
        MixmodeRequest::Simple if summary.is_simple() => Mixmode::Simple,
        MixmodeRequest::Simple => {
            tracing::warn!(
                "simple mixmode needs one chain, input and output; using normal instead"
            );
            Mixmode::Normal
        }
        MixmodeRequest::Normal => Mixmode::Normal,
        MixmodeRequest::Multithreaded => Mixmode::Multithreaded,
        MixmodeRequest::Auto if summary.is_simple() => Mixmode::Simple,
        MixmodeRequest::Auto
            if summary.chains >= config.multithread_min_chains
                && config.buffersize >= config.multithread_min_buffersize =>
        {
            Mixmode::Multithreaded
        }
        MixmodeRequest::Auto => Mixmode::Normal,
    }
}
