use crate::format::OutputFormat;
use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use image::codecs::gif::GifEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::any::Any;
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};

/// AVIF encoder speed (1 slowest .. 10 fastest)
const AVIF_SPEED: u8 = 6;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Main compression service
pub struct ImageCompressor;

impl ImageCompressor {
    /// Encode `img` as `format` at `quality` (1-100; ignored for PNG and GIF).
    ///
    /// Returns the bytes together with the format actually produced, which differs
    /// from the requested one for formats without an encoder (see
    /// [`OutputFormat::encoded_as`]).
    pub fn compress(
        img: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<(Bytes, OutputFormat)> {
        let quality = quality.clamp(1, 100);
        let actual_format = format.encoded_as();

        if actual_format != format {
            tracing::debug!(
                requested = %format,
                actual = %actual_format,
                "No encoder for requested format, falling back"
            );
        }

        let data = match actual_format {
            OutputFormat::Png => Self::compress_png(img)?,
            OutputFormat::Gif => Self::compress_gif(img)?,
            OutputFormat::WebP => Self::compress_webp(img, quality)?,
            OutputFormat::Avif => Self::compress_avif(img, quality)?,
            _ => Self::compress_jpeg(img, quality)?,
        };

        Ok((data, actual_format))
    }

    /// Compress to JPEG using mozjpeg. mozjpeg reports libjpeg errors by
    /// panicking, so the whole encode runs under `catch_unwind`.
    fn compress_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let encoded = panic::catch_unwind(AssertUnwindSafe(|| -> Result<Vec<u8>> {
            let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
            comp.set_size(width as usize, height as usize);
            comp.set_quality(quality as f32);
            comp.set_progressive_mode();
            comp.set_optimize_coding(true);

            let mut comp = comp
                .start_compress(Vec::new())
                .context("Failed to start JPEG compression")?;
            comp.write_scanlines(&rgb_img)
                .context("Failed to write JPEG scanlines")?;
            comp.finish().context("Failed to finish JPEG compression")
        }))
        .map_err(|payload| {
            anyhow!(
                "JPEG encoder panicked on {}x{} image: {}",
                width,
                height,
                panic_message(payload.as_ref())
            )
        })??;

        Ok(Bytes::from(encoded))
    }

    fn compress_png(img: &DynamicImage) -> Result<Bytes> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .context("Failed to encode PNG")?;
        Ok(Bytes::from(buffer))
    }

    fn compress_gif(img: &DynamicImage) -> Result<Bytes> {
        let mut buffer = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut buffer);
            encoder
                .encode_frame(image::Frame::new(img.to_rgba8()))
                .context("Failed to encode GIF")?;
        }
        Ok(Bytes::from(buffer))
    }

    /// Compress to WebP
    fn compress_webp(img: &DynamicImage, quality: u8) -> Result<Bytes> {
        let (width, height) = img.dimensions();

        // Convert to RGBA for WebP encoding
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder.encode(quality as f32);

        Ok(Bytes::copy_from_slice(&webp_data))
    }

    /// Compress to AVIF, keeping the alpha channel when the source has one
    fn compress_avif(img: &DynamicImage, quality: u8) -> Result<Bytes> {
        let (width, height) = img.dimensions();
        let encoder = ravif::Encoder::new()
            .with_quality(quality as f32)
            .with_speed(AVIF_SPEED);

        let encoded = if img.color().has_alpha() {
            let rgba_img = img.to_rgba8();
            let pixels: Vec<rgb::RGBA8> = rgba_img
                .as_raw()
                .chunks_exact(4)
                .map(|c| rgb::RGBA8::new(c[0], c[1], c[2], c[3]))
                .collect();
            encoder.encode_rgba(ravif::Img::new(
                pixels.as_slice(),
                width as usize,
                height as usize,
            ))
        } else {
            let rgb_img = img.to_rgb8();
            let pixels: Vec<rgb::RGB8> = rgb_img
                .as_raw()
                .chunks_exact(3)
                .map(|c| rgb::RGB8::new(c[0], c[1], c[2]))
                .collect();
            encoder.encode_rgb(ravif::Img::new(
                pixels.as_slice(),
                width as usize,
                height as usize,
            ))
        };
        let encoded = encoded.context("Failed to encode AVIF")?;

        Ok(Bytes::from(encoded.avif_file))
    }
}
