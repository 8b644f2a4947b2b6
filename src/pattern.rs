//! Deterministic contents of the write buffers.
//!
//! Each element's value depends only on its step, array and global position, so any rank
//! (or a test) can recompute what a hyperslab should hold after the write phase.

use ndarray::{Array2, Zip};

use crate::decomposition::LocalBlock;

const MANTISSA: u64 = (1 << f64::MANTISSA_DIGITS) - 1;

/// Value stored at global `(row, col)` of `array` in `step`.
///
/// Values are integers below 2^53, hence exact in a double, and distinct within a plane
/// as long as `col < 2^24` and `row < 2^29`.
pub fn value(step: u32, array: u32, row: u64, col: u64) -> f64 {
    let plane = (u64::from(step) << 32 | u64::from(array)).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    (((plane >> 11) ^ (row << 24 | col)) & MANTISSA) as f64
}

/// Fills `buf` with the contents of `block` for the given plane.
pub fn fill(buf: &mut Array2<f64>, step: u32, array: u32, block: &LocalBlock) {
    let (row0, col0) = (block.offset_row, block.offset_col);
    Zip::indexed(buf).for_each(|(i, j), x| {
        *x = value(step, array, row0 + i as u64, col0 + j as u64);
    });
}

/// A new buffer holding the contents of `block` for the given plane.
pub fn block(step: u32, array: u32, block: &LocalBlock) -> Array2<f64> {
    let mut buf = Array2::zeros(block.shape());
    fill(&mut buf, step, array, block);
    buf
}
