//! Shared types for the AgentBay client SDK: the error taxonomy,
//! configuration resolution, and structured trace events used across every
//! other `ab-*` crate.

pub mod config;
pub mod error;
pub mod trace;

pub use error::{Error, Result};
