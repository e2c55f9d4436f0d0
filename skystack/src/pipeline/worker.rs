//! Running a pipeline on a background thread.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::error::PipelineError;
use super::progress::{CancellationToken, ProgressSink};
use super::result::StackResult;
use super::StackPipeline;
use crate::codec::ImageCodec;

/// Handle to a run started with [`StackPipeline::spawn`].
#[derive(Debug)]
pub struct PipelineHandle {
    cancel: CancellationToken,
    thread: JoinHandle<Result<StackResult, PipelineError>>,
}

impl PipelineHandle {
    /// Ask the run to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the run ends.
    pub fn join(self) -> Result<StackResult, PipelineError> {
        self.thread
            .join()
            .map_err(|_| PipelineError::WorkerPanicked)?
    }
}

impl<C: ImageCodec + 'static> StackPipeline<C> {
    /// Move the pipeline onto a worker thread and start the run.
    ///
    /// With `output` set the composite is also written, as in
    /// [`StackPipeline::run_to_file`].
    pub fn spawn(
        mut self,
        paths: Vec<PathBuf>,
        output: Option<(PathBuf, u8)>,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<PipelineHandle, PipelineError> {
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();

        let thread = thread::Builder::new()
            .name("skystack-worker".into())
            .spawn(move || match output {
                Some((path, quality)) => {
                    self.run_to_file(&paths, &path, quality, progress.as_ref(), &worker_cancel)
                }
                None => self.run(&paths, progress.as_ref(), &worker_cancel),
            })
            .map_err(PipelineError::Spawn)?;

        tracing::debug!("Started stacking worker");
        Ok(PipelineHandle { cancel, thread })
    }
}
