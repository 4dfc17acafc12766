//! Run parameters.
//!
//! Defaults match the command-line defaults. A JSON file may supply any
//! subset of fields; the rest fall back to `Params::default()`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scanner::Scanner;

/// Shortest substring length worth mining.
pub const MIN_LEN_FLOOR: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Number of results to report.
    pub top: usize,
    pub min_len: usize,
    pub max_len: usize,
    /// Probe only lengths divisible by this.
    pub stride: usize,
    /// Local counts at or below this are not accumulated.
    pub drop: usize,
    pub ascii_only: bool,
    pub entropy_filter: bool,
    /// Chunks per worker; 0 derives it from file size and RAM.
    pub scale: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            top: 30,
            min_len: 15,
            max_len: 30,
            stride: 3,
            drop: 1,
            ascii_only: false,
            entropy_filter: true,
            scale: 0,
        }
    }
}

impl Params {
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Params> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject combinations the miner does not support.
    pub fn validate(&self) -> Result<()> {
        if self.top < 1 {
            return Err(Error::InvalidParams("top must be at least 1".into()));
        }
        if self.min_len < MIN_LEN_FLOOR {
            return Err(Error::InvalidParams(format!(
                "min length must be at least {MIN_LEN_FLOOR}, got {}",
                self.min_len
            )));
        }
        if self.max_len < self.min_len {
            return Err(Error::InvalidParams(format!(
                "max length {} is below min length {}",
                self.max_len, self.min_len
            )));
        }
        if self.stride < 1 {
            return Err(Error::InvalidParams("stride must be at least 1".into()));
        }
        Ok(())
    }

    pub fn scanner(&self) -> Scanner {
        Scanner::new(self.min_len, self.max_len, self.stride)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
