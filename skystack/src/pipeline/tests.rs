use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use glam::DVec2;

use super::*;
use crate::codec::{CodecError, FileCodec, ImageCodec};
use crate::frame::{Frame, ImageDimensions};
use crate::stacking::CombineMethod;
use crate::testing::{MemoryCodec, StarField, background_std, grid_stars, init_tracing};

const WIDTH: usize = 100;
const HEIGHT: usize = 100;

fn star_positions() -> Vec<DVec2> {
    grid_stars(5, 4, DVec2::new(12.0, 14.0), DVec2::new(19.0, 22.0))
}

fn noisy_frame(name: &str, seed: u64) -> Frame {
    StarField::new(WIDTH, HEIGHT, star_positions())
        .with_noise(8.0)
        .render(name, seed)
}

fn shifted_frame(name: &str, shift: DVec2, seed: u64) -> Frame {
    let positions = star_positions().iter().map(|p| *p + shift).collect();
    StarField::new(WIDTH, HEIGHT, positions)
        .with_noise(8.0)
        .render(name, seed)
}

fn blank_frame(name: &str) -> Frame {
    StarField::new(WIDTH, HEIGHT, Vec::new()).render(name, 0)
}

fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}

/// Sink that records every event.
#[derive(Default)]
struct Recorder(Mutex<Vec<ProgressEvent>>);

impl ProgressSink for Recorder {
    fn report(&self, event: ProgressEvent) {
        self.0.lock().unwrap().push(event);
    }
}

impl Recorder {
    fn events(&self) -> Vec<ProgressEvent> {
        self.0.lock().unwrap().clone()
    }
}

fn three_frame_codec() -> MemoryCodec {
    MemoryCodec::new().with_frames([
        noisy_frame("f0.png", 1),
        noisy_frame("f1.png", 2),
        noisy_frame("f2.png", 3),
    ])
}

// ============================================================================
// Successful runs
// ============================================================================

#[test]
fn test_average_reduces_background_noise() {
    init_tracing();
    let frames = [
        noisy_frame("f0.png", 1),
        noisy_frame("f1.png", 2),
        noisy_frame("f2.png", 3),
    ];
    let input_noise: Vec<f64> = frames
        .iter()
        .map(|f| background_std(f.pixels(), &star_positions(), 6.0))
        .collect();
    let codec = MemoryCodec::new().with_frames(frames);

    let mut pipeline = StackPipeline::with_codec(codec, Parameters::default());
    let result = pipeline
        .run(
            &paths(&["f0.png", "f1.png", "f2.png"]),
            &NoProgress,
            &CancellationToken::new(),
        )
        .unwrap();

    let output_noise = background_std(result.pixels(), &star_positions(), 6.0);
    for input in input_noise {
        assert!(output_noise < input, "output {output_noise} >= input {input}");
    }
    assert_eq!(pipeline.state(), PipelineState::Done);
}

#[test]
fn test_summary_and_dimensions() {
    let codec = MemoryCodec::new().with_frames([
        noisy_frame("f0.png", 1),
        shifted_frame("f1.png", DVec2::new(1.5, -1.0), 2),
        shifted_frame("f2.png", DVec2::new(-2.0, 0.5), 3),
    ]);
    let mut pipeline = StackPipeline::with_codec(codec, Parameters::default());
    let result = pipeline
        .run(
            &paths(&["f0.png", "f1.png", "f2.png"]),
            &NoProgress,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(result.dimensions(), ImageDimensions::new(WIDTH, HEIGHT));
    assert_eq!(
        result.summary,
        StackSummary {
            frames_requested: 3,
            frames_loaded: 3,
            frames_stacked: 3,
            frames_dropped: 0,
            reference_stars: 20,
            method: CombineMethod::Average,
            dimensions: ImageDimensions::new(WIDTH, HEIGHT),
        }
    );
}

#[test]
fn test_every_method_runs() {
    for method in [
        CombineMethod::Average,
        CombineMethod::Median,
        CombineMethod::Maximum,
        CombineMethod::SigmaClip,
    ] {
        let params = Parameters::default().with_method(method);
        let mut pipeline = StackPipeline::with_codec(three_frame_codec(), params);
        let result = pipeline
            .run(
                &paths(&["f0.png", "f1.png", "f2.png"]),
                &NoProgress,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(result.summary.method, method);
        assert_eq!(result.summary.frames_stacked, 3);
    }
}

#[test]
fn test_progress_is_monotonic_and_completes() {
    let recorder = Recorder::default();
    let mut pipeline = StackPipeline::with_codec(three_frame_codec(), Parameters::default());
    pipeline
        .run(
            &paths(&["f0.png", "f1.png", "f2.png"]),
            &recorder,
            &CancellationToken::new(),
        )
        .unwrap();

    let events = recorder.events();
    assert_eq!(events.first().map(|e| e.percent), Some(0));
    assert_eq!(events.last().map(|e| e.percent), Some(100));
    assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
    assert!(events.iter().any(|e| e.message == "Found 20 stars in reference frame"));
}

#[test]
fn test_run_to_file_writes_once() {
    let mut pipeline = StackPipeline::with_codec(three_frame_codec(), Parameters::default());
    pipeline
        .run_to_file(
            &paths(&["f0.png", "f1.png", "f2.png"]),
            Path::new("out/stacked.jpg"),
            90,
            &NoProgress,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(
        pipeline.codec().written(),
        vec![(PathBuf::from("out/stacked.jpg"), 90)]
    );
}

// ============================================================================
// Dropped frames
// ============================================================================

#[test]
fn test_unreadable_frame_is_skipped() {
    let recorder = Recorder::default();
    let mut pipeline = StackPipeline::with_codec(three_frame_codec(), Parameters::default());
    let result = pipeline
        .run(
            &paths(&["f0.png", "missing.png", "f1.png", "f2.png"]),
            &recorder,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(result.summary.frames_requested, 4);
    assert_eq!(result.summary.frames_loaded, 3);
    assert_eq!(result.summary.frames_stacked, 3);
    assert!(
        recorder
            .events()
            .iter()
            .any(|e| e.message.starts_with("Skipped missing.png"))
    );
}

#[test]
fn test_unalignable_frame_is_dropped() {
    let codec = MemoryCodec::new().with_frames([
        noisy_frame("f0.png", 1),
        blank_frame("cloud.png"),
        shifted_frame("f2.png", DVec2::new(1.5, -1.0), 3),
    ]);
    let mut pipeline = StackPipeline::with_codec(codec, Parameters::default());
    let result = pipeline
        .run(
            &paths(&["f0.png", "cloud.png", "f2.png"]),
            &NoProgress,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(result.summary.frames_loaded, 3);
    assert_eq!(result.summary.frames_stacked, 2);
    assert_eq!(result.summary.frames_dropped, 1);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_not_enough_frames() {
    let codec = MemoryCodec::new().with_frame(noisy_frame("f0.png", 1));
    let mut pipeline = StackPipeline::with_codec(codec, Parameters::default());
    let err = pipeline
        .run(
            &paths(&["f0.png", "missing.png"]),
            &NoProgress,
            &CancellationToken::new(),
        )
        .unwrap_err();

    assert!(matches!(err, PipelineError::NotEnoughFrames { loaded: 1 }));
    assert_eq!(pipeline.state(), PipelineState::Failed);
}

#[test]
fn test_empty_input_list() {
    let mut pipeline = StackPipeline::with_codec(MemoryCodec::new(), Parameters::default());
    let err = pipeline
        .run::<PathBuf>(&[], &NoProgress, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, PipelineError::NotEnoughFrames { loaded: 0 }));
}

#[test]
fn test_too_few_reference_stars() {
    let codec = MemoryCodec::new().with_frames([blank_frame("dark.png"), noisy_frame("f1.png", 2)]);
    let mut pipeline = StackPipeline::with_codec(codec, Parameters::default());
    let err = pipeline
        .run(
            &paths(&["dark.png", "f1.png"]),
            &NoProgress,
            &CancellationToken::new(),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::TooFewReferenceStars {
            found: 0,
            required: 3
        }
    ));
    assert_eq!(pipeline.state(), PipelineState::Failed);
}

#[test]
fn test_not_enough_aligned_frames() {
    let codec = MemoryCodec::new().with_frames([
        noisy_frame("f0.png", 1),
        blank_frame("a.png"),
        blank_frame("b.png"),
    ]);
    let mut pipeline = StackPipeline::with_codec(codec, Parameters::default());
    let err = pipeline
        .run(
            &paths(&["f0.png", "a.png", "b.png"]),
            &NoProgress,
            &CancellationToken::new(),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::NotEnoughAlignedFrames { aligned: 1 }
    ));
}

#[test]
fn test_invalid_parameters_fail_before_loading() {
    let recorder = Recorder::default();
    let mut params = Parameters::default();
    params.detection.threshold = -1.0;
    let mut pipeline = StackPipeline::with_codec(three_frame_codec(), params);
    let err = pipeline
        .run(
            &paths(&["f0.png", "f1.png", "f2.png"]),
            &recorder,
            &CancellationToken::new(),
        )
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidParameters(ref p) if p.name == "threshold"));
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert!(recorder.events().iter().all(|e| !e.message.starts_with("Loaded")));
}

#[test]
fn test_pipeline_is_single_use() {
    let mut pipeline = StackPipeline::with_codec(three_frame_codec(), Parameters::default());
    let files = paths(&["f0.png", "f1.png", "f2.png"]);
    pipeline
        .run(&files, &NoProgress, &CancellationToken::new())
        .unwrap();

    let err = pipeline
        .run(&files, &NoProgress, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::AlreadyRun {
            state: PipelineState::Done
        }
    ));
    assert_eq!(pipeline.state(), PipelineState::Done);
}

#[test]
fn test_write_failure_returns_result() {
    let codec = three_frame_codec().failing_encode();
    let mut pipeline = StackPipeline::with_codec(codec, Parameters::default());
    let err = pipeline
        .run_to_file(
            &paths(&["f0.png", "f1.png", "f2.png"]),
            Path::new("stacked.jpg"),
            95,
            &NoProgress,
            &CancellationToken::new(),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Write {
            source: CodecError::Io { .. },
            ..
        }
    ));
    assert_eq!(pipeline.state(), PipelineState::Failed);
    let result = err.into_result().unwrap();
    assert_eq!(result.summary.frames_stacked, 3);
    assert_eq!(result.dimensions(), ImageDimensions::new(WIDTH, HEIGHT));
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_cancel_during_loading() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let sink = move |event: ProgressEvent| {
        if event.message == "Loaded f1.png" {
            trigger.cancel();
        }
    };

    let mut pipeline = StackPipeline::with_codec(three_frame_codec(), Parameters::default());
    let err = pipeline
        .run_to_file(
            &paths(&["f0.png", "f1.png", "f2.png"]),
            Path::new("stacked.jpg"),
            95,
            &sink,
            &cancel,
        )
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(pipeline.state(), PipelineState::Cancelled);
    assert!(pipeline.codec().written().is_empty());
}

#[test]
fn test_cancel_before_write() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let sink = move |event: ProgressEvent| {
        if event.message == "Enhanced composite" {
            trigger.cancel();
        }
    };

    let mut pipeline = StackPipeline::with_codec(three_frame_codec(), Parameters::default());
    let err = pipeline
        .run_to_file(
            &paths(&["f0.png", "f1.png", "f2.png"]),
            Path::new("stacked.jpg"),
            95,
            &sink,
            &cancel,
        )
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(pipeline.state(), PipelineState::Cancelled);
    assert!(pipeline.codec().written().is_empty());
}

#[test]
fn test_precancelled_token_stops_after_first_load() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let recorder = Recorder::default();
    let mut pipeline = StackPipeline::with_codec(three_frame_codec(), Parameters::default());
    let err = pipeline
        .run(&paths(&["f0.png", "f1.png", "f2.png"]), &recorder, &cancel)
        .unwrap_err();

    assert!(err.is_cancelled());
    let loaded = recorder
        .events()
        .iter()
        .filter(|e| e.message.starts_with("Loaded"))
        .count();
    assert_eq!(loaded, 1);
}

// ============================================================================
// Background worker
// ============================================================================

#[test]
fn test_spawn_and_join() {
    let (sink, events) = ChannelProgress::channel();
    let pipeline = StackPipeline::with_codec(three_frame_codec(), Parameters::default());
    let handle = pipeline
        .spawn(
            paths(&["f0.png", "f1.png", "f2.png"]),
            Some((PathBuf::from("stacked.jpg"), 80)),
            Arc::new(sink),
        )
        .unwrap();

    let result = handle.join().unwrap();
    assert_eq!(result.summary.frames_stacked, 3);

    let percents: Vec<u8> = events.try_iter().map(|e| e.percent).collect();
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_spawned_run_reports_failure() {
    let pipeline = StackPipeline::with_codec(MemoryCodec::new(), Parameters::default());
    let handle = pipeline
        .spawn(paths(&["a.png", "b.png"]), None, Arc::new(NoProgress))
        .unwrap();

    let err = handle.join().unwrap_err();
    assert!(matches!(err, PipelineError::NotEnoughFrames { loaded: 0 }));
}

// ============================================================================
// Input validation
// ============================================================================

#[test]
fn test_validate_inputs() {
    let codec = three_frame_codec().with_frame(StarField::new(50, 40, Vec::new()).render("small.png", 0));

    assert_eq!(
        validate_inputs(&codec, &paths(&["f0.png", "f1.png"])).unwrap(),
        ImageDimensions::new(WIDTH, HEIGHT)
    );
    assert!(matches!(
        validate_inputs(&codec, &paths(&["f0.png"])),
        Err(ValidationError::TooFewInputs { count: 1 })
    ));
    assert!(matches!(
        validate_inputs(&codec, &paths(&["f0.png", "missing.png"])),
        Err(ValidationError::Unreadable { ref path, .. }) if path == Path::new("missing.png")
    ));
    match validate_inputs(&codec, &paths(&["f0.png", "small.png"])) {
        Err(ValidationError::DimensionMismatch {
            expected, found, ..
        }) => {
            assert_eq!(expected, ImageDimensions::new(WIDTH, HEIGHT));
            assert_eq!(found, ImageDimensions::new(50, 40));
        }
        other => panic!("expected a dimension mismatch, got {other:?}"),
    }
}

// ============================================================================
// Filesystem round trip
// ============================================================================

#[test]
fn test_stack_png_files_to_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let inputs: Vec<PathBuf> = (0..3)
        .map(|i| {
            let path = dir.path().join(format!("light_{i}.png"));
            let frame = noisy_frame("unused", i as u64 + 10);
            FileCodec.encode(frame.pixels(), &path, 95).unwrap();
            path
        })
        .collect();
    let output = dir.path().join("stacked.jpg");

    let mut pipeline = StackPipeline::new(Parameters::default());
    let result = pipeline
        .run_to_file(&inputs, &output, 90, &NoProgress, &CancellationToken::new())
        .unwrap();

    assert_eq!(result.summary.frames_stacked, 3);
    assert_eq!(
        FileCodec.dimensions(&output).unwrap(),
        ImageDimensions::new(WIDTH, HEIGHT)
    );

    let preview = common::test_utils::test_output_path("pipeline_stacked.png");
    result.save(&FileCodec, &preview, 95).unwrap();
}
