pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod fault;
pub mod runner;
pub mod sink;
pub mod transport;

pub use error::{SimError, SimResult, SinkError};
