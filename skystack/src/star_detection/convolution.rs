//! Separable Gaussian smoothing of luminance buffers.

use common::Buffer2;
use rayon::prelude::*;

/// Normalized 1D Gaussian kernel of radius `ceil(3 * sigma)`.
pub fn gaussian_kernel_1d(sigma: f32) -> Vec<f32> {
    assert!(sigma > 0.0, "Sigma must be positive");

    let radius = (3.0 * sigma).ceil() as usize;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }

    kernel
}

/// Reflect an out-of-range index back into `0..len` without repeating the
/// edge sample (`dcb|abcd|cba`).
#[inline]
pub(crate) fn mirror(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let m = i.rem_euclid(period);
    if m < len as isize {
        m as usize
    } else {
        (period - m) as usize
    }
}

/// Gaussian blur with standard deviation `sigma`, rows then columns.
///
/// A sigma that is not a positive finite number returns an unmodified copy.
pub fn gaussian_blur(image: &Buffer2<f32>, sigma: f32) -> Buffer2<f32> {
    let (width, height) = image.dimensions();
    if !(sigma.is_finite() && sigma > 0.0) || width == 0 || height == 0 {
        return image.clone();
    }

    let kernel = gaussian_kernel_1d(sigma);
    let radius = (kernel.len() / 2) as isize;

    let mut temp = vec![0.0f32; width * height];
    temp.par_chunks_mut(width)
        .zip(image.pixels().par_chunks(width))
        .for_each(|(out_row, in_row)| {
            for (x, out) in out_row.iter_mut().enumerate() {
                *out = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, &w)| in_row[mirror(x as isize + k as isize - radius, width)] * w)
                    .sum();
            }
        });

    let mut output = vec![0.0f32; width * height];
    output
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            for (k, &w) in kernel.iter().enumerate() {
                let sy = mirror(y as isize + k as isize - radius, height);
                let src = &temp[sy * width..(sy + 1) * width];
                for (out, &v) in out_row.iter_mut().zip(src) {
                    *out += v * w;
                }
            }
        });

    Buffer2::new(width, height, output)
}
