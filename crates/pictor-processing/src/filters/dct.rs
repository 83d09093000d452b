//! Orthonormal 8x8 DCT-II and its inverse.
//!
//! Blocks are indexed `[row][col]`; coefficient `[v][u]` pairs vertical
//! frequency `v` with horizontal frequency `u`.

use std::f64::consts::{FRAC_1_SQRT_2, PI};
use std::sync::LazyLock;

pub const N: usize = 8;

pub type Block = [[f64; N]; N];

/// `COS[x][u] = cos((2x + 1) * u * pi / 16)`
static COS: LazyLock<Block> = LazyLock::new(|| {
    let mut table = [[0.0; N]; N];
    for (x, row) in table.iter_mut().enumerate() {
        for (u, value) in row.iter_mut().enumerate() {
            *value = ((2 * x + 1) as f64 * u as f64 * PI / 16.0).cos();
        }
    }
    table
});

fn scale(k: usize) -> f64 {
    if k == 0 {
        FRAC_1_SQRT_2
    } else {
        1.0
    }
}

pub fn forward(block: &Block) -> Block {
    let cos = &*COS;
    let mut out = [[0.0; N]; N];

    for (v, out_row) in out.iter_mut().enumerate() {
        for (u, coeff) in out_row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for (y, row) in block.iter().enumerate() {
                for (x, sample) in row.iter().enumerate() {
                    sum += sample * cos[x][u] * cos[y][v];
                }
            }
            *coeff = 0.25 * scale(u) * scale(v) * sum;
        }
    }

    out
}

pub fn inverse(coeffs: &Block) -> Block {
    let cos = &*COS;
    let mut out = [[0.0; N]; N];

    for (y, out_row) in out.iter_mut().enumerate() {
        for (x, sample) in out_row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for (v, row) in coeffs.iter().enumerate() {
                for (u, coeff) in row.iter().enumerate() {
                    sum += scale(u) * scale(v) * coeff * cos[x][u] * cos[y][v];
                }
            }
            *sample = 0.25 * sum;
        }
    }

    out
}
