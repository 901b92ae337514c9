//! Core primitives for the rivulet audio chain engine.
//!
//! This crate holds everything the engine moves around each processing cycle
//! but nothing that decides *when* it moves:
//!
//! - [`AudioBuffer`]: multi-channel `f32` block with explicit length, channel
//!   count and sample rate; mixing, silence, resampling and PCM conversion.
//! - [`SampleFormat`]: interleaved fixed-width PCM encodings understood by
//!   [`AudioBuffer::decode_from`] and [`AudioBuffer::encode_to`].
//! - [`AudioObject`]: the source/sink contract implemented by files, memory
//!   stores and devices.
//! - [`ChainOperator`]: the in-place processing contract with 1-indexed
//!   numeric parameters.
//! - [`Chain`]: an ordered operator list with its own buffer, bound to one
//!   input and at most one output.
//!
//! A few small operators live in [`ops`] so that configurations and tests
//! have something deterministic to run.
//!
//! # Example
//!
//! ```rust
//! use rivulet_core::{AudioBuffer, Chain, ops::Amplify};
//!
//! let mut chain = Chain::new("lead");
//! chain.connect_input(0);
//! chain.add_operator(Box::new(Amplify::new(50.0))).unwrap();
//!
//! let mut input = AudioBuffer::new(2, 4, 48_000);
//! input.channel_mut(0).copy_from_slice(&[1.0, 0.5, -0.5, -1.0]);
//! chain.buffer_mut().assign(&input);
//! chain.process();
//!
//! assert_eq!(chain.buffer().channel(0), &[0.5, 0.25, -0.25, -0.5]);
//! ```

pub mod buffer;
pub mod chain;
pub mod error;
pub mod format;
pub mod object;
pub mod operator;
pub mod ops;
mod resample;

pub use buffer::AudioBuffer;
pub use chain::Chain;
pub use error::{ChainError, FormatError, ObjectError, OperatorError};
pub use format::{Endianness, SampleFormat};
pub use object::AudioObject;
pub use operator::ChainOperator;
