//! Invisible text watermark carried in the DCT domain of 8x8 luma blocks.
//!
//! Each bit of the text (MSB first) is written into one block by ordering the
//! mid-frequency coefficient pair `(3,4)` / `(4,3)`: a 1 makes the first larger
//! than the second by at least the strength, a 0 the reverse. The bit sequence
//! repeats across all whole blocks in row-major order. Extraction sums a signed,
//! magnitude-weighted vote per bit over every repetition, so a fraction of
//! damaged blocks does not flip the result.

use super::dct::{self, Block, N};
use super::{param_or, FilterContext, ImageFilter};
use anyhow::Result;
use image::{DynamicImage, Rgba, RgbaImage};

pub const DEFAULT_STRENGTH: f64 = 10.0;

/// Characters assumed when the caller does not know the text length.
pub const DEFAULT_TEXT_LEN: usize = 16;

const BLOCK: u32 = N as u32;
const MARGIN: f64 = 0.1;
const COEFF_A: (usize, usize) = (3, 4);
const COEFF_B: (usize, usize) = (4, 3);

/// BT.601 luma
fn luma(pixel: &Rgba<u8>) -> f64 {
    0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64
}

fn clip(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Zero-mean luma of the block whose top-left corner is `(x0, y0)`.
fn read_luma_block(img: &RgbaImage, x0: u32, y0: u32) -> Block {
    let mut block = [[0.0; N]; N];
    for (i, row) in block.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = luma(img.get_pixel(x0 + j as u32, y0 + i as u32)) - 128.0;
        }
    }
    block
}

/// Replace the luma of a block, keeping each pixel's chroma and alpha.
fn write_luma_block(img: &mut RgbaImage, x0: u32, y0: u32, block: &Block) {
    for (i, row) in block.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            let pixel = img.get_pixel_mut(x0 + j as u32, y0 + i as u32);
            let Rgba([r, g, b, a]) = *pixel;
            let (r, g, b) = (r as f64, g as f64, b as f64);

            let cb = -0.1687 * r - 0.3313 * g + 0.5 * b;
            let cr = 0.5 * r - 0.4187 * g - 0.0813 * b;
            let y = value + 128.0;

            *pixel = Rgba([
                clip(y + 1.402 * cr),
                clip(y - 0.34414 * cb - 0.71414 * cr),
                clip(y + 1.772 * cb),
                a,
            ]);
        }
    }
}

/// Top-left corners of every whole block, row-major.
fn block_origins(width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let cols = width / BLOCK;
    let rows = height / BLOCK;
    (0..rows).flat_map(move |r| (0..cols).map(move |c| (c * BLOCK, r * BLOCK)))
}

/// Text as a +1/-1 signal, eight symbols per byte, MSB first.
fn signal(text: &str) -> Vec<i8> {
    text.bytes()
        .flat_map(|byte| (0..8).rev().map(move |bit| if (byte >> bit) & 1 == 1 { 1 } else { -1 }))
        .collect()
}

fn bits_to_string(bits: &[bool]) -> String {
    let bytes: Vec<u8> = bits
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| if bit { acc | (1 << (7 - i)) } else { acc })
        })
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Embeds and extracts the DCT watermark.
#[derive(Debug, Clone, Copy)]
pub struct BlindWatermarkCodec {
    strength: f64,
}

impl Default for BlindWatermarkCodec {
    fn default() -> Self {
        Self::new(DEFAULT_STRENGTH)
    }
}

impl BlindWatermarkCodec {
    pub fn new(strength: f64) -> Self {
        Self { strength }
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    /// Force the coefficient pair to encode `bit`, moving both symmetrically.
    fn embed_bit(&self, coeffs: &mut Block, bit: i8) {
        let mut v1 = coeffs[COEFF_A.0][COEFF_A.1];
        let mut v2 = coeffs[COEFF_B.0][COEFF_B.1];

        if bit > 0 {
            if v1 <= v2 + self.strength {
                let delta = (v2 + self.strength - v1) / 2.0;
                v1 += delta + MARGIN;
                v2 -= delta + MARGIN;
            }
        } else if v1 >= v2 - self.strength {
            let delta = (v1 - (v2 - self.strength)) / 2.0;
            v1 -= delta + MARGIN;
            v2 += delta + MARGIN;
        }

        coeffs[COEFF_A.0][COEFF_A.1] = v1;
        coeffs[COEFF_B.0][COEFF_B.1] = v2;
    }

    /// Embed `text`. Empty text returns the image unchanged; partial edge
    /// blocks are never touched.
    pub fn embed(&self, img: DynamicImage, text: &str) -> DynamicImage {
        let signal = signal(text);
        if signal.is_empty() {
            return img;
        }

        let mut rgba = img.into_rgba8();
        let (width, height) = rgba.dimensions();

        for (index, (x, y)) in block_origins(width, height).enumerate() {
            let mut coeffs = dct::forward(&read_luma_block(&rgba, x, y));
            self.embed_bit(&mut coeffs, signal[index % signal.len()]);
            write_luma_block(&mut rgba, x, y, &dct::inverse(&coeffs));
        }

        DynamicImage::ImageRgba8(rgba)
    }

    /// Recover `length` bytes of text; 0 means [`DEFAULT_TEXT_LEN`].
    ///
    /// Invalid UTF-8 is replaced lossily and trailing NULs are kept.
    pub fn extract(img: &DynamicImage, length: usize) -> String {
        let length = if length == 0 { DEFAULT_TEXT_LEN } else { length };
        let bit_len = length * 8;
        let mut votes = vec![0.0f64; bit_len];

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        for (index, (x, y)) in block_origins(width, height).enumerate() {
            let coeffs = dct::forward(&read_luma_block(&rgba, x, y));
            let v1 = coeffs[COEFF_A.0][COEFF_A.1];
            let v2 = coeffs[COEFF_B.0][COEFF_B.1];
            let sign = if v1 >= v2 { 1.0 } else { -1.0 };
            votes[index % bit_len] += sign * (v1 - v2).abs();
        }

        let bits: Vec<bool> = votes.iter().map(|&v| v > 0.0).collect();
        bits_to_string(&bits)
    }
}

/// `blind_watermark(text, strength)`.
///
/// Missing text falls back to the configured text; an unparsable or
/// non-positive strength keeps the configured strength.
#[derive(Debug, Clone)]
pub struct BlindWatermarkFilter {
    text: String,
    strength: f64,
}

impl Default for BlindWatermarkFilter {
    fn default() -> Self {
        Self::new(String::new(), DEFAULT_STRENGTH)
    }
}

impl BlindWatermarkFilter {
    pub fn new(text: impl Into<String>, strength: f64) -> Self {
        Self {
            text: text.into(),
            strength,
        }
    }
}

impl ImageFilter for BlindWatermarkFilter {
    fn name(&self) -> &'static str {
        "blind_watermark"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let text = params
            .first()
            .map(String::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.text);

        let strength = param_or(params, 1, self.strength)
            .ok()
            .filter(|s| *s > 0.0)
            .unwrap_or(self.strength);

        Ok(BlindWatermarkCodec::new(strength).embed(img, text))
    }
}
