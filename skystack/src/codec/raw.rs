//! Camera RAW decoding through `rawloader`.
//!
//! Produces a deterministic 8-bit RGB frame: black/white level normalization,
//! crop to the active area, bilinear CFA demosaic, camera white balance
//! normalized to green, BT.709 transfer curve.

use std::path::Path;
use std::time::Instant;

use common::Buffer2;
use rayon::prelude::*;

use super::CodecError;
use crate::frame::{Frame, Rgb8};

/// Decode a camera RAW file into an RGB frame.
pub(crate) fn decode_raw(path: &Path) -> Result<Frame, CodecError> {
    let raw_err = |reason: String| CodecError::Raw {
        path: path.to_path_buf(),
        reason,
    };

    let raw = rawloader::decode_file(path).map_err(|e| raw_err(e.to_string()))?;

    let black = raw.blacklevels[0] as f32;
    let white = raw.whitelevels[0] as f32;
    let range = white - black;
    if range <= 0.0 {
        return Err(raw_err(format!(
            "invalid levels: black {black}, white {white}"
        )));
    }

    let normalized: Vec<f32> = match &raw.data {
        rawloader::RawImageData::Integer(data) => data
            .iter()
            .map(|&v| ((v as f32 - black) / range).clamp(0.0, 1.0))
            .collect(),
        rawloader::RawImageData::Float(data) => data
            .iter()
            .map(|&v| ((v - black) / range).clamp(0.0, 1.0))
            .collect(),
    };

    let sensor = Sensor {
        data: &normalized,
        width: raw.width,
        height: raw.height,
        cpp: raw.cpp,
        cfa: &raw.cfa,
    };
    if sensor.data.len() < sensor.width * sensor.height * sensor.cpp {
        return Err(raw_err(format!(
            "sensor data holds {} samples, expected {}x{}x{}",
            sensor.data.len(),
            sensor.width,
            sensor.height,
            sensor.cpp
        )));
    }

    let [top, right, bottom, left] = raw.crops;
    let width = raw.width.saturating_sub(left + right);
    let height = raw.height.saturating_sub(top + bottom);
    if width == 0 || height == 0 {
        return Err(raw_err(format!("crop leaves no pixels: {:?}", raw.crops)));
    }

    let wb = white_balance(raw.wb_coeffs);

    let start = Instant::now();
    let mut pixels = vec![[0u8; 3]; width * height];
    pixels
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let rgb = sensor.rgb_at(x + left, y + top);
                *out = to_display([rgb[0] * wb[0], rgb[1] * wb[1], rgb[2] * wb[2]]);
            }
        });

    tracing::info!(
        path = %path.display(),
        camera = %format!("{} {}", raw.clean_make, raw.clean_model),
        "Decoded raw {}x{} in {:.1}ms",
        width,
        height,
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(Frame::new(path, Buffer2::new(width, height, pixels)))
}

struct Sensor<'a> {
    data: &'a [f32],
    width: usize,
    height: usize,
    cpp: usize,
    cfa: &'a rawloader::CFA,
}

impl Sensor<'_> {
    /// Color index (0 = R, 1 = G, 2 = B) of the photosite at (x, y).
    #[inline]
    fn color_at(&self, x: usize, y: usize) -> usize {
        match self.cfa.color_at(y, x) {
            0 => 0,
            2 => 2,
            // second green and unknown sites count as green
            _ => 1,
        }
    }

    /// Linear RGB at a sensor position, interpolating missing channels from
    /// the 3x3 neighbourhood.
    fn rgb_at(&self, x: usize, y: usize) -> [f32; 3] {
        if self.cpp >= 3 {
            let idx = (y * self.width + x) * self.cpp;
            return [self.data[idx], self.data[idx + 1], self.data[idx + 2]];
        }
        if self.cfa.width == 0 {
            // monochrome sensor
            let v = self.data[y * self.width + x];
            return [v, v, v];
        }

        let mut sums = [0.0f32; 3];
        let mut counts = [0u32; 3];
        let own = self.color_at(x, y);

        for ny in y.saturating_sub(1)..=(y + 1).min(self.height - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(self.width - 1) {
                let c = self.color_at(nx, ny);
                if c == own && (nx != x || ny != y) {
                    continue;
                }
                sums[c] += self.data[ny * self.width + nx];
                counts[c] += 1;
            }
        }

        let mut rgb = [0.0f32; 3];
        for c in 0..3 {
            rgb[c] = if c == own {
                self.data[y * self.width + x]
            } else if counts[c] > 0 {
                sums[c] / counts[c] as f32
            } else {
                0.0
            };
        }
        rgb
    }
}

/// Camera white balance multipliers relative to green.
fn white_balance(coeffs: [f32; 4]) -> [f32; 3] {
    let green = coeffs[1];
    if !green.is_finite() || green <= 0.0 {
        return [1.0, 1.0, 1.0];
    }
    let mut wb = [1.0f32; 3];
    for (c, m) in wb.iter_mut().enumerate() {
        let v = coeffs[c] / green;
        if v.is_finite() && v > 0.0 {
            *m = v;
        }
    }
    wb
}

/// BT.709 transfer curve followed by 8-bit quantization.
fn to_display(linear: [f32; 3]) -> Rgb8 {
    linear.map(|v| {
        let v = v.clamp(0.0, 1.0);
        let encoded = if v < 0.018 {
            4.5 * v
        } else {
            1.099 * v.powf(0.45) - 0.099
        };
        (encoded * 255.0).round().clamp(0.0, 255.0) as u8
    })
}
