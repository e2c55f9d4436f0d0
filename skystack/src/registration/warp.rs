//! Resampling a frame into the reference coordinate space.

use glam::DVec2;
use rayon::prelude::*;

use crate::frame::{ImageDimensions, Rgb8, RgbBuffer};
use crate::registration::transform::Transform;

/// Warp `source` onto an `output` sized grid.
///
/// `transform` maps output (reference) coordinates to source coordinates.
/// Each output pixel is sampled bilinearly; samples outside the source
/// contribute black.
pub fn warp_bilinear(
    source: &RgbBuffer,
    transform: &Transform,
    output: ImageDimensions,
) -> RgbBuffer {
    let ImageDimensions { width, height } = output;
    let mut pixels = vec![[0u8; 3]; width * height];
    if width == 0 || height == 0 {
        return RgbBuffer::new(width, height, pixels);
    }

    pixels
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let src = transform.apply(DVec2::new(x as f64, y as f64));
                *out = sample_bilinear(source, src);
            }
        });

    RgbBuffer::new(width, height, pixels)
}

#[inline]
fn sample_bilinear(source: &RgbBuffer, p: DVec2) -> Rgb8 {
    if !p.is_finite() {
        return [0; 3];
    }

    let x0 = p.x.floor();
    let y0 = p.y.floor();
    let fx = p.x - x0;
    let fy = p.y - y0;
    let (x0, y0) = (x0 as isize, y0 as isize);

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let mut acc = [0.0f64; 3];
    for (tx, ty, w) in taps {
        if w == 0.0 {
            continue;
        }
        if let Some(px) = source.get_checked(tx, ty) {
            for c in 0..3 {
                acc[c] += w * px[c] as f64;
            }
        }
    }

    acc.map(|v| v.round().clamp(0.0, 255.0) as u8)
}
