//! Rivulet Engine - chain scheduling, mixing and transport
//!
//! The engine owns the audio objects and chains of a [`Setup`] and drives
//! them cycle by cycle: read inputs, process chains, mix and write outputs,
//! advance the position.
//!
//! # Pieces
//!
//! - [`Engine`] - the cycle loop, transport operations and run lifecycle
//! - [`EngineConfig`] - buffersize, sample rate, mixmode request, looping
//! - [`Mixmode`] / [`select_mixmode`] - simple, normal or multithreaded
//!   scheduling, picked once from the topology
//! - [`ControlQueue`] / [`Command`] - commands applied in order at the start
//!   of each cycle of an interactive run
//! - [`EngineHandle`] - cloneable status and control surface for other
//!   threads
//! - [`EngineContext`] - tracing span and shutdown flag for one engine
//!
//! # Example
//!
//! ```rust
//! use rivulet_core::{Chain, ops::Amplify};
//! use rivulet_engine::{Engine, EngineConfig, EngineContext, RunState, Setup};
//! use rivulet_io::{MemorySink, MemorySource};
//!
//! let mut setup = Setup::new();
//! let input = setup.add_input(MemorySource::silence("in", 2, 4_800, 48_000));
//! let (sink, tap) = MemorySink::new("out", 2, 48_000);
//! let output = setup.add_output(sink);
//!
//! let mut chain = Chain::new("main");
//! chain.connect_input(input);
//! chain.connect_output(output);
//! chain.add_operator(Box::new(Amplify::new(50.0))).unwrap();
//! setup.add_chain(chain);
//!
//! let config = EngineConfig { buffersize: 256, ..EngineConfig::default() };
//! let mut engine = Engine::new(setup, config, EngineContext::default()).unwrap();
//! let report = engine.run_to_completion().unwrap();
//!
//! assert_eq!(report.state, RunState::Finished);
//! assert_eq!(tap.frames(), 4_800);
//! ```

pub mod command;
pub mod config;
pub mod context;
mod engine;
pub mod error;
pub mod mixmode;
pub mod queue;
pub mod setup;
mod sinks;
pub mod status;
mod submix;
mod transport;

pub use command::{Command, CommandKind};
pub use config::{EngineConfig, MixmodeRequest};
pub use context::{EngineContext, ShutdownFlag};
pub use engine::{Engine, SeekReport};
pub use error::{CommandError, EngineError, Result, SetupError};
pub use mixmode::{Mixmode, TopologySummary, select_mixmode};
pub use queue::{BatchOutcome, CommandTarget, ControlQueue, ControlSender, Selection};
pub use setup::Setup;
pub use status::{EndCause, EngineHandle, RunReport, RunState};
