//! Frequent substring mining for large binary files.
//!
//! A file is split into overlapping chunks, each chunk is scanned for
//! substrings whose byte entropy looks informative, the per-chunk counts are
//! folded into one bounded table, and the most frequent entries are reported
//! with near-duplicates suppressed.

pub mod accumulator;
pub mod config;
pub mod entropy;
pub mod error;
pub mod fastlog2;
pub mod matcher;
pub mod miner;
pub mod planner;
pub mod ranking;
pub mod scanner;
pub mod system;

pub use config::Params;
pub use error::{Error, Result};
pub use miner::Miner;
pub use ranking::{ResultEntry, TopK};
