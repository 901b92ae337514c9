//! CLI command implementations.

pub mod common;
pub mod info;
pub mod operators;
pub mod run;
