//! Conversion of the trained UV texture to an RGB8 image.
//!
//! The trainer stores the texture channel-major as `[3][size][size]`, with
//! rows counted from the bottom of the UV square. Images are written with a
//! top-left origin, so output pixel `(x, y)` reads `channel[c][size-1-y][x]`.

use image::{Rgb, RgbImage};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TextureError {
    #[error("texture must have exactly 3 channels, got {0}")]
    ChannelCount(usize),

    #[error("texture has no pixels")]
    Empty,

    #[error("texture channel {channel} row {row} has {actual} texels, expected {expected}")]
    NotSquare {
        channel: usize,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("texture channel {channel} has {actual} rows, expected {expected}")]
    RowCount {
        channel: usize,
        expected: usize,
        actual: usize,
    },
}

fn to_u8(value: f32) -> u8 {
    // NaN clamps to black
    let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    (v * 255.0).round() as u8
}

/// Build a square RGB8 image from channel-major float data in [0, 1].
pub fn texture_from_channels(channels: &[Vec<Vec<f32>>]) -> Result<RgbImage, TextureError> {
    if channels.len() != 3 {
        return Err(TextureError::ChannelCount(channels.len()));
    }

    let size = channels[0].len();
    if size == 0 {
        return Err(TextureError::Empty);
    }

    for (channel, rows) in channels.iter().enumerate() {
        if rows.len() != size {
            return Err(TextureError::RowCount {
                channel,
                expected: size,
                actual: rows.len(),
            });
        }
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != size) {
            return Err(TextureError::NotSquare {
                channel,
                row,
                expected: size,
                actual: r.len(),
            });
        }
    }

    let image = RgbImage::from_fn(size as u32, size as u32, |x, y| {
        let row = size - 1 - y as usize;
        let col = x as usize;
        Rgb([
            to_u8(channels[0][row][col]),
            to_u8(channels[1][row][col]),
            to_u8(channels[2][row][col]),
        ])
    });

    Ok(image)
}

/// Save a texture as PNG.
pub fn save_texture_png<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<(), image::ImageError> {
    image.save_with_format(path, image::ImageFormat::Png)
}
