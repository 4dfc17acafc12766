//! Table-driven base-2 logarithm for positive `f32` values.
//!
//! The float's exponent gives the integer part directly; the top
//! `PRECISION` mantissa bits index a precomputed table of `log2(1 + m)`.

use std::sync::OnceLock;

pub const PRECISION: u32 = 14;
pub const TABLE_SIZE: usize = 1 << PRECISION;

const MANTISSA_BITS: u32 = 23;
const EXPONENT_BIAS: i32 = 0x7f;

/// Precomputed `log2(1 + i / 2^PRECISION)` for every mantissa prefix.
pub struct Log2Table {
    table: Box<[f32]>,
}

impl Log2Table {
    pub fn new() -> Self {
        let table = (0..TABLE_SIZE)
            .map(|i| (1.0 + i as f64 / TABLE_SIZE as f64).log2() as f32)
            .collect();
        Self { table }
    }

    /// Approximate `log2(x)`. The result is meaningless for `x <= 0`.
    #[inline]
    pub fn log2(&self, x: f32) -> f32 {
        let bits = x.to_bits() as i32;
        let exponent = (bits >> MANTISSA_BITS) - EXPONENT_BIAS;
        let mantissa = (bits >> (MANTISSA_BITS - PRECISION)) as usize & (TABLE_SIZE - 1);
        exponent as f32 + self.table[mantissa]
    }
}

impl Default for Log2Table {
    fn default() -> Self {
        Self::new()
    }
}

fn shared() -> &'static Log2Table {
    static TABLE: OnceLock<Log2Table> = OnceLock::new();
    TABLE.get_or_init(Log2Table::new)
}

/// Approximate `log2(x)` using the process-wide table. Caller guarantees `x > 0`.
#[inline]
pub fn fast_log2(x: f32) -> f32 {
    shared().log2(x)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
