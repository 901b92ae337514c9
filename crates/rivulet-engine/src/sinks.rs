//! Output objects with their mixing state.
//!
//! A sink fed by one chain is written straight from that chain's buffer. A
//! sink fed by N chains accumulates each contribution with weight N into a
//! scratch buffer and is written once the N-th contribution arrives, so the
//! write always sees every chain of the cycle.
//!
//! The bank travels as one unit: the engine thread owns it in simple and
//! normal mode, the submix worker owns it while a multithreaded run is
//! active.

use std::sync::Arc;

use rivulet_core::{AudioBuffer, AudioObject, ObjectError};
use tracing::{debug, warn};

use crate::status::SharedStatus;

/// Cycles processed before deferred realtime outputs are started.
const TRIGGER_AFTER_CYCLES: u32 = 2;

pub(crate) struct Sink {
    pub(crate) object: Box<dyn AudioObject>,
    feeders: usize,
    pending: usize,
    mix: AudioBuffer,
    failed: bool,
    pub(crate) start_offset: u64,
}

impl Sink {
    pub(crate) fn is_realtime(&self) -> bool {
        self.object.is_realtime()
    }
}

#[derive(Default)]
pub(crate) struct SinkBank {
    sinks: Vec<Sink>,
    trigger_countdown: Option<u32>,
    realtime_running: bool,
}

impl SinkBank {
    /// Builds the bank; `feeders[i]` is the number of chains writing sink `i`.
    pub(crate) fn new(objects: Vec<Box<dyn AudioObject>>, feeders: &[usize], buffersize: usize) -> Self {
        let sinks = objects
            .into_iter()
            .zip(feeders)
            .map(|(object, &feeders)| {
                let mix = AudioBuffer::with_capacity(object.channels(), buffersize, object.sample_rate());
                Sink {
                    start_offset: object.position(),
                    object,
                    feeders,
                    pending: 0,
                    mix,
                    failed: false,
                }
            })
            .collect();
        Self {
            sinks,
            trigger_countdown: None,
            realtime_running: false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.sinks.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Sink> {
        self.sinks.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Sink> {
        self.sinks.iter_mut()
    }

    pub(crate) fn any_failed(&self) -> bool {
        self.sinks.iter().any(|s| s.failed)
    }

    pub(crate) fn has_realtime(&self) -> bool {
        self.sinks.iter().any(Sink::is_realtime)
    }

    /// Hands one chain's buffer to sink `index`.
    pub(crate) fn deliver(&mut self, index: usize, buffer: &AudioBuffer, status: &Arc<SharedStatus>) {
        let sink = &mut self.sinks[index];
        if sink.failed {
            return;
        }
        let result = if sink.feeders <= 1 {
            sink.object.write_buffer(buffer)
        } else {
            if sink.pending == 0 {
                sink.mix.set_channel_count(sink.object.channels());
                sink.mix.set_sample_rate(buffer.sample_rate());
                sink.mix.resize(0);
            }
            sink.mix.add_weighted(buffer, sink.feeders);
            sink.pending += 1;
            if sink.pending < sink.feeders {
                return;
            }
            sink.pending = 0;
            sink.object.write_buffer(&sink.mix)
        };
        if let Err(err) = result {
            Self::fail(sink, &err, status);
        }
    }

    fn fail(sink: &mut Sink, err: &ObjectError, status: &Arc<SharedStatus>) {
        warn!("output '{}' failed, treating it as finished: {err}", sink.object.label());
        sink.failed = true;
        status.record_error(format!("output '{}': {err}", sink.object.label()));
    }

    /// Arms the deferred start of realtime outputs.
    pub(crate) fn arm_trigger(&mut self) {
        if self.has_realtime() && !self.realtime_running {
            self.trigger_countdown = Some(TRIGGER_AFTER_CYCLES);
        }
    }

    /// Ends a cycle; starts realtime outputs once enough data is queued.
    pub(crate) fn end_cycle(&mut self, status: &Arc<SharedStatus>) {
        let Some(remaining) = self.trigger_countdown.as_mut() else {
            return;
        };
        *remaining -= 1;
        if *remaining == 0 {
            self.trigger_countdown = None;
            debug!("starting deferred realtime outputs");
            self.start_realtime(status);
        }
    }

    /// Starts every realtime output.
    pub(crate) fn start_realtime(&mut self, status: &Arc<SharedStatus>) {
        for sink in self.sinks.iter_mut().filter(|s| s.is_realtime() && !s.failed) {
            if let Err(err) = sink.object.start() {
                Self::fail(sink, &err, status);
            }
        }
        self.realtime_running = true;
    }

    /// Stops every realtime output that was started.
    pub(crate) fn stop_realtime(&mut self) {
        self.trigger_countdown = None;
        if !self.realtime_running {
            return;
        }
        for sink in self.sinks.iter_mut().filter(|s| s.is_realtime()) {
            if let Err(err) = sink.object.stop() {
                warn!("failed to stop '{}': {err}", sink.object.label());
            }
        }
        self.realtime_running = false;
    }

    /// Flushes every healthy output. A failed flush fails the sink.
    pub(crate) fn flush(&mut self, status: &Arc<SharedStatus>) {
        for sink in self.sinks.iter_mut().filter(|s| !s.failed) {
            if let Err(err) = sink.object.flush() {
                Self::fail(sink, &err, status);
            }
        }
    }

    /// Drops partial mixes, e.g. after a seek.
    pub(crate) fn reset_mixes(&mut self) {
        for sink in &mut self.sinks {
            sink.pending = 0;
        }
    }
}
