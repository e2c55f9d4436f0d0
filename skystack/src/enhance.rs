//! Fixed cosmetic finish applied to the composite: a slight contrast boost
//! around the mean luminance followed by a slight sharpening.
//!
//! Both steps extrapolate from a degenerate image (flat grey, or a 3x3
//! smoothed copy) towards the input by `factor`, then clamp and truncate.

use rayon::prelude::*;

use crate::frame::{Rgb8, RgbBuffer};

pub const CONTRAST_FACTOR: f32 = 1.1;
pub const SHARPNESS_FACTOR: f32 = 1.05;

/// 3x3 smoothing kernel, normalized by its sum of 13.
const SMOOTH_KERNEL: [[u32; 3]; 3] = [[1, 1, 1], [1, 5, 1], [1, 1, 1]];
const SMOOTH_SCALE: u32 = 13;

/// Contrast then sharpness with the fixed factors.
pub fn enhance(pixels: &RgbBuffer) -> RgbBuffer {
    adjust_sharpness(&adjust_contrast(pixels, CONTRAST_FACTOR), SHARPNESS_FACTOR)
}

/// Scale every channel's distance from the image's mean luminance by `factor`.
pub fn adjust_contrast(pixels: &RgbBuffer, factor: f32) -> RgbBuffer {
    if pixels.is_empty() {
        return pixels.clone();
    }

    let total: u64 = pixels.par_iter().map(|&p| integer_luma(p) as u64).sum();
    let mean = (total as f64 / pixels.len() as f64 + 0.5) as u8;

    pixels.map(|p| p.map(|v| blend(mean, v, factor)))
}

/// Extrapolate each pixel away from its 3x3 smoothed value by `factor`.
/// Border pixels are left unchanged.
pub fn adjust_sharpness(pixels: &RgbBuffer, factor: f32) -> RgbBuffer {
    let smoothed = smooth(pixels);
    let out: Vec<Rgb8> = pixels
        .par_iter()
        .zip(smoothed.par_iter())
        .map(|(p, s)| [0, 1, 2].map(|c| blend(s[c], p[c], factor)))
        .collect();
    RgbBuffer::new(pixels.width(), pixels.height(), out)
}

#[inline]
fn blend(degenerate: u8, value: u8, factor: f32) -> u8 {
    let v = degenerate as f32 + factor * (value as f32 - degenerate as f32);
    v.clamp(0.0, 255.0) as u8
}

/// ITU-R 601 luma in 16-bit fixed point, rounded.
#[inline]
fn integer_luma(p: Rgb8) -> u32 {
    (p[0] as u32 * 19595 + p[1] as u32 * 38470 + p[2] as u32 * 7471 + 0x8000) >> 16
}

fn smooth(pixels: &RgbBuffer) -> RgbBuffer {
    let (width, height) = pixels.dimensions();
    let mut out = pixels.clone();
    if width < 3 || height < 3 {
        return out;
    }

    out.pixels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .skip(1)
        .take(height - 2)
        .for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate().skip(1).take(width - 2) {
                let mut acc = [0u32; 3];
                for (ky, kernel_row) in SMOOTH_KERNEL.iter().enumerate() {
                    let src = pixels.row(y + ky - 1);
                    for (kx, &k) in kernel_row.iter().enumerate() {
                        let s = src[x + kx - 1];
                        for c in 0..3 {
                            acc[c] += k * s[c] as u32;
                        }
                    }
                }
                *px = acc.map(|a| ((a + SMOOTH_SCALE / 2) / SMOOTH_SCALE) as u8);
            }
        });

    out
}
