//! TOML setup files for the rivulet engine.
//!
//! A [`SetupFile`] describes engine settings, input and output objects and
//! the chains between them. Loading checks syntax; [`SetupFile::validate`]
//! checks meaning and names the offending table entry; [`SetupFile::build`]
//! opens files and instantiates operators through an [`OperatorRegistry`].
//!
//! # Example
//!
//! ```rust
//! use rivulet_config::{OperatorRegistry, SetupFile};
//! use rivulet_engine::{EngineContext, RunState};
//!
//! let file = SetupFile::from_toml(r#"
//!     [engine]
//!     sample_rate = 8000
//!     buffersize = 200
//!
//!     [[input]]
//!     kind = "tone"
//!     length = 0.25
//!
//!     [[output]]
//!     kind = "null"
//!
//!     [[chain]]
//!     name = "main"
//!     input = 1
//!     output = 1
//!     operators = [{ kind = "pan", params = [25] }]
//! "#).unwrap();
//!
//! let mut engine = file
//!     .into_engine(&OperatorRegistry::new(), EngineContext::new("doc"))
//!     .unwrap();
//! let report = engine.run_to_completion().unwrap();
//! assert_eq!(report.state, RunState::Finished);
//! assert_eq!(report.frames, 2000);
//! ```

mod build;
mod error;
mod registry;
mod setup_file;

pub use error::ConfigError;
pub use registry::{OperatorDescriptor, OperatorRegistry};
pub use setup_file::{ChainConfig, ObjectConfig, OperatorConfig, SetupFile};
