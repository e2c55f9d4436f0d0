//! Pixel-wise combination of aligned frames.
//!
//! All methods operate independently per pixel and per channel in `f64`,
//! then clamp to 0..=255 and truncate to 8 bits.


use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::frame::{ImageDimensions, RgbBuffer};
use crate::pipeline::InvalidParameter;

/// Method used to combine the aligned samples of one pixel.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum CombineMethod {
    /// Arithmetic mean.
    #[default]
    #[strum(to_string = "average", serialize = "mean")]
    #[serde(alias = "mean")]
    Average,
    /// Middle value; mean of the two middle values for even counts.
    #[strum(to_string = "median")]
    Median,
    /// Brightest sample. Keeps star trails and satellites.
    #[strum(to_string = "maximum", serialize = "max")]
    #[serde(alias = "max")]
    Maximum,
    /// Mean of the samples within `[mean - low*std, mean + high*std]`.
    #[strum(to_string = "sigma_clip", serialize = "sigma", serialize = "sigma-clip")]
    #[serde(alias = "sigma")]
    SigmaClip,
}

impl CombineMethod {
    /// Parse a method name, falling back to [`CombineMethod::Average`] for
    /// unknown names.
    pub fn from_name_or_default(name: &str) -> Self {
        name.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(method = name, "Unknown combination method, using average");
            CombineMethod::Average
        })
    }
}

/// Stacking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub method: CombineMethod,
    /// Lower rejection bound for [`CombineMethod::SigmaClip`], in standard deviations.
    pub sigma_low: f32,
    /// Upper rejection bound for [`CombineMethod::SigmaClip`], in standard deviations.
    pub sigma_high: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            method: CombineMethod::Average,
            sigma_low: 2.0,
            sigma_high: 2.0,
        }
    }
}

impl Config {
    pub fn with_method(method: CombineMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), InvalidParameter> {
        for (name, value) in [("sigma_low", self.sigma_low), ("sigma_high", self.sigma_high)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(InvalidParameter::new(
                    name,
                    format!("must be positive, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackingError {
    #[error("Nothing to combine")]
    Empty,

    #[error("Buffer {index} is {found}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: ImageDimensions,
        found: ImageDimensions,
    },
}

/// Frames resampled into the reference grid, reference first.
///
/// Never empty: it is created from the reference buffer.
#[derive(Debug, Clone)]
pub struct AlignedStack {
    dimensions: ImageDimensions,
    buffers: Vec<RgbBuffer>,
    sources: Vec<PathBuf>,
}

impl AlignedStack {
    pub fn new(reference: RgbBuffer, source: impl Into<PathBuf>) -> Self {
        let (width, height) = reference.dimensions();
        Self {
            dimensions: ImageDimensions::new(width, height),
            buffers: vec![reference],
            sources: vec![source.into()],
        }
    }

    /// Append an aligned buffer.
    ///
    /// # Panics
    /// If `buffer` does not match the reference dimensions.
    pub fn push(&mut self, buffer: RgbBuffer, source: impl Into<PathBuf>) {
        assert_eq!(
            buffer.dimensions(),
            (self.dimensions.width, self.dimensions.height),
            "aligned buffer must match the reference dimensions"
        );
        self.buffers.push(buffer);
        self.sources.push(source.into());
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn dimensions(&self) -> ImageDimensions {
        self.dimensions
    }

    pub fn buffers(&self) -> &[RgbBuffer] {
        &self.buffers
    }

    /// Source file of each buffer, in stack order.
    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        self.sources.iter().map(PathBuf::as_path)
    }

    pub fn combine(&self, config: &Config) -> RgbBuffer {
        combine_buffers(&self.buffers, config)
    }
}

/// Combine equally sized buffers into one.
pub fn combine(buffers: &[RgbBuffer], config: &Config) -> Result<RgbBuffer, StackingError> {
    let first = buffers.first().ok_or(StackingError::Empty)?;
    let expected = ImageDimensions::new(first.width(), first.height());
    for (index, buffer) in buffers.iter().enumerate().skip(1) {
        let found = ImageDimensions::new(buffer.width(), buffer.height());
        if found != expected {
            return Err(StackingError::DimensionMismatch {
                index,
                expected,
                found,
            });
        }
    }
    Ok(combine_buffers(buffers, config))
}

fn combine_buffers(buffers: &[RgbBuffer], config: &Config) -> RgbBuffer {
    let (width, height) = buffers[0].dimensions();
    let mut output = vec![[0u8; 3]; width * height];
    if width == 0 || height == 0 {
        return RgbBuffer::new(width, height, output);
    }

    let sigma_low = config.sigma_low as f64;
    let sigma_high = config.sigma_high as f64;

    output
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            let mut samples = Vec::with_capacity(buffers.len());
            let rows: Vec<&[[u8; 3]]> = buffers.iter().map(|b| b.row(y)).collect();
            for (x, out) in out_row.iter_mut().enumerate() {
                for c in 0..3 {
                    samples.clear();
                    samples.extend(rows.iter().map(|row| row[x][c] as f64));
                    let value = match config.method {
                        CombineMethod::Average => mean(&samples),
                        CombineMethod::Median => median(&mut samples),
                        CombineMethod::Maximum => samples.iter().copied().fold(0.0, f64::max),
                        CombineMethod::SigmaClip => sigma_clip(&samples, sigma_low, sigma_high),
                    };
                    out[c] = to_u8(value);
                }
            }
        });

    RgbBuffer::new(width, height, output)
}

#[inline]
fn to_u8(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}

#[inline]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[inline]
fn median(values: &mut [f64]) -> f64 {
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Mean of the samples within `[mean - low*std, mean + high*std]` (population
/// std, inclusive bounds). Falls back to the plain mean if nothing survives.
#[inline]
pub(crate) fn sigma_clip(values: &[f64], sigma_low: f64, sigma_high: f64) -> f64 {
    let mu = mean(values);
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    let std = variance.sqrt();
    let lo = mu - sigma_low * std;
    let hi = mu + sigma_high * std;

    let (sum, count) = values
        .iter()
        .filter(|&&v| v >= lo && v <= hi)
        .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));

    if count == 0 { mu } else { sum / count as f64 }
}
