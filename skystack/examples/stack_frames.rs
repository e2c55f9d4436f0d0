//! Example: stack every image in a directory into one composite.
//!
//! ```bash
//! cargo run --example stack_frames -- /path/to/frames [method] [output.jpg]
//! ```
//!
//! `method` is one of `average`, `median`, `maximum`, `sigma_clip`. Without an
//! output path the composite is written next to the first input as
//! `stacked_<unix seconds>.jpg`. Logs go to the console and `logs/`.

use std::env;
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, bail};
use skystack::{
    CancellationToken, CombineMethod, DEFAULT_QUALITY, FileCodec, LogProgress, Parameters,
    StackPipeline, default_output_path, estimate_processing_time, validate_inputs,
};

fn main() -> anyhow::Result<()> {
    common::log_setup::setup_logging("info", "logs")?;

    let mut args = env::args().skip(1);
    let Some(dir) = args.next().map(PathBuf::from) else {
        bail!("usage: stack_frames <directory> [method] [output]");
    };
    let method = args
        .next()
        .map(|name| CombineMethod::from_name_or_default(&name))
        .unwrap_or_default();

    let paths = common::file_utils::image_files(&dir)
        .with_context(|| format!("Failed to list images in {}", dir.display()))?;
    let dimensions = validate_inputs(&FileCodec, &paths)?;

    let output = match args.next() {
        Some(path) => PathBuf::from(path),
        None => {
            let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
            default_output_path(&paths[0], now)
        }
    };

    let estimate = estimate_processing_time(paths.len(), dimensions.width, dimensions.height);
    tracing::info!(
        frames = paths.len(),
        %dimensions,
        %method,
        estimate_secs = estimate.as_secs_f64(),
        "Stacking"
    );

    let start = Instant::now();
    let mut pipeline = StackPipeline::new(Parameters::default().with_method(method));
    let result = pipeline.run_to_file(
        &paths,
        &output,
        DEFAULT_QUALITY,
        &LogProgress,
        &CancellationToken::new(),
    )?;

    tracing::info!(
        output = %output.display(),
        stacked = result.summary.frames_stacked,
        dropped = result.summary.frames_dropped,
        elapsed_secs = start.elapsed().as_secs_f64(),
        "Done"
    );
    Ok(())
}
