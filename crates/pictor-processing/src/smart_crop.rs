use anyhow::{anyhow, Result};
use image::{imageops, DynamicImage, GenericImageView, GrayImage};
use pictor_core::CropRect;

/// Longest side of the working copy used for saliency analysis.
const ANALYSIS_SIZE: u32 = 256;

pub struct SmartCrop;

impl SmartCrop {
    /// Calculate saliency map for smart cropping, row-major over `gray`.
    fn calculate_saliency_map(gray: &GrayImage) -> Vec<f64> {
        let (width, height) = gray.dimensions();
        let mut saliency = vec![0.0f64; (width * height) as usize];

        for y in 1..height.saturating_sub(1) {
            for x in 1..width.saturating_sub(1) {
                let right = gray.get_pixel(x + 1, y)[0] as i32;
                let left = gray.get_pixel(x - 1, y)[0] as i32;
                let bottom = gray.get_pixel(x, y + 1)[0] as i32;
                let top = gray.get_pixel(x, y - 1)[0] as i32;

                let gx = (right - left).abs();
                let gy = (bottom - top).abs();
                let edge_strength = ((gx * gx + gy * gy) as f64).sqrt();

                // Local variance over the 3x3 neighbourhood
                let mut sum = 0i32;
                let mut sum_sq = 0i32;
                for dy in 0..3 {
                    for dx in 0..3 {
                        let px = gray.get_pixel(x + dx - 1, y + dy - 1)[0] as i32;
                        sum += px;
                        sum_sq += px * px;
                    }
                }
                let mean = sum as f64 / 9.0;
                let variance = (sum_sq as f64 / 9.0) - (mean * mean);

                saliency[(y * width + x) as usize] = edge_strength * 0.6 + variance * 0.4;
            }
        }

        saliency
    }

    /// Summed-area table with one row and column of zero padding.
    fn integral(values: &[f64], width: u32, height: u32) -> Vec<f64> {
        let stride = (width + 1) as usize;
        let mut table = vec![0.0f64; stride * (height + 1) as usize];
        for y in 0..height as usize {
            let mut row = 0.0;
            for x in 0..width as usize {
                row += values[y * width as usize + x];
                table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row;
            }
        }
        table
    }

    fn window_sum(table: &[f64], stride: usize, x: usize, y: usize, w: usize, h: usize) -> f64 {
        table[(y + h) * stride + x + w] - table[y * stride + x + w] - table[(y + h) * stride + x]
            + table[y * stride + x]
    }

    /// Largest `target_width:target_height` window that fits inside the image.
    fn crop_size(width: u32, height: u32, target_width: u32, target_height: u32) -> (u32, u32) {
        let (w, h) = (width as u64, height as u64);
        let (tw, th) = (target_width as u64, target_height as u64);
        if w * th >= h * tw {
            let crop_w = ((h * tw) as f64 / th as f64).round() as u32;
            (crop_w.clamp(1, width), height)
        } else {
            let crop_h = ((w * th) as f64 / tw as f64).round() as u32;
            (width, crop_h.clamp(1, height))
        }
    }

    /// Find the most salient region with the aspect ratio of `target_width`x`target_height`.
    ///
    /// Ties resolve to the centred window, so flat images crop to the middle.
    pub fn find_best_crop(
        img: &DynamicImage,
        target_width: u32,
        target_height: u32,
    ) -> Result<CropRect> {
        let (orig_width, orig_height) = img.dimensions();

        if target_width == 0 || target_height == 0 {
            return Err(anyhow!(
                "Smart crop needs both target dimensions, got {}x{}",
                target_width,
                target_height
            ));
        }
        if orig_width == 0 || orig_height == 0 {
            return Err(anyhow!("Cannot smart crop an empty image"));
        }

        let (crop_w, crop_h) = Self::crop_size(orig_width, orig_height, target_width, target_height);
        if crop_w == orig_width && crop_h == orig_height {
            return Ok(CropRect {
                left: 0,
                top: 0,
                right: orig_width,
                bottom: orig_height,
            });
        }

        // Analyse a downscaled copy
        let scale = orig_width.max(orig_height).div_ceil(ANALYSIS_SIZE).max(1);
        let small_width = (orig_width / scale).max(1);
        let small_height = (orig_height / scale).max(1);
        let small_gray = imageops::resize(
            &img.to_luma8(),
            small_width,
            small_height,
            imageops::FilterType::Triangle,
        );

        let saliency = Self::calculate_saliency_map(&small_gray);
        let table = Self::integral(&saliency, small_width, small_height);
        let stride = (small_width + 1) as usize;

        let window_w = (crop_w / scale).clamp(1, small_width) as usize;
        let window_h = (crop_h / scale).clamp(1, small_height) as usize;
        let max_x = small_width as usize - window_w;
        let max_y = small_height as usize - window_h;

        let (mut best_x, mut best_y) = (max_x / 2, max_y / 2);
        let mut best_score = Self::window_sum(&table, stride, best_x, best_y, window_w, window_h);

        for y in 0..=max_y {
            for x in 0..=max_x {
                let score = Self::window_sum(&table, stride, x, y, window_w, window_h);
                if score > best_score {
                    best_score = score;
                    best_x = x;
                    best_y = y;
                }
            }
        }

        let left = (best_x as u32 * scale).min(orig_width - crop_w);
        let top = (best_y as u32 * scale).min(orig_height - crop_h);

        tracing::debug!(
            left = left,
            top = top,
            width = crop_w,
            height = crop_h,
            score = best_score,
            "Smart crop region selected"
        );

        Ok(CropRect {
            left,
            top,
            right: left + crop_w,
            bottom: top + crop_h,
        })
    }

    /// Smart crop image to the aspect ratio of the target dimensions
    pub fn crop(img: DynamicImage, target_width: u32, target_height: u32) -> Result<DynamicImage> {
        let rect = Self::find_best_crop(&img, target_width, target_height)?;
        if rect.width() == img.width() && rect.height() == img.height() {
            return Ok(img);
        }
        Ok(img.crop_imm(rect.left, rect.top, rect.width(), rect.height()))
    }
}
