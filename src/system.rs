//! Host resource queries used to size the worker pool and memory budgets.

use sysinfo::{System, SystemExt};

/// Total physical memory in bytes, or 0 if the platform does not report it.
pub fn total_ram() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory()
}

/// Worker count for the chunk pool: one per logical core.
pub fn pool_size() -> usize {
    rayon::current_num_threads().max(1)
}
