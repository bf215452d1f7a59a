use std::path::{Path, PathBuf};

use crate::{
    composite::blend,
    core::StreamInfo,
    error::VidbadgeError,
    overlay::Overlay,
    placement::{DEFAULT_MARGIN, Placement, resolve_with_margin},
    sink::{Codec, FfmpegSink, FfmpegSinkOpts, FrameSink, SinkConfig},
    source::{FfmpegSource, FrameSource},
};

/// Lifecycle of one overlay pipeline run.
///
/// `Done`, `Aborted` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Opening,
    Streaming,
    Closing,
    Done,
    /// Stopped mid-stream; partial output was discarded.
    Aborted,
    /// Source or sink could not be opened; nothing was written.
    Failed,
}

#[derive(Clone, Debug)]
pub struct PipelineOpts {
    pub codec: Codec,
    pub margin: i64,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            codec: Codec::Mp4v,
            margin: DEFAULT_MARGIN,
        }
    }
}

/// Outcome of a pipeline run that reached `Done`.
#[derive(Clone, Debug, serde::Serialize)]
pub struct PipelineReport {
    pub state: PipelineState,
    pub info: StreamInfo,
    pub placement: Placement,
    pub frames_written: u64,
    pub output: Option<PathBuf>,
}

/// Outcome of a pipeline run that ended in `Aborted` or `Failed`.
#[derive(thiserror::Error, Debug)]
#[error("overlay pipeline {state:?} after {frames_written} frame(s): {error}")]
pub struct PipelineFailure {
    pub state: PipelineState,
    pub frames_written: u64,
    #[source]
    pub error: VidbadgeError,
}

impl PipelineFailure {
    fn failed(error: VidbadgeError) -> Self {
        Self {
            state: PipelineState::Failed,
            frames_written: 0,
            error,
        }
    }

    fn aborted(frames_written: u64, error: VidbadgeError) -> Self {
        Self {
            state: PipelineState::Aborted,
            frames_written,
            error,
        }
    }
}

/// Stream every frame of `source` through the compositor into `sink`.
///
/// Placement is resolved once from the source metadata. The first error of any kind stops the
/// run; the sink is aborted so no truncated output survives.
pub fn composite_stream(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    overlay: &Overlay,
    opts: &PipelineOpts,
) -> Result<PipelineReport, PipelineFailure> {
    let mut state = PipelineState::Opening;
    let info = source.info();
    let placement = resolve_with_margin(
        info.width,
        info.height,
        overlay.width(),
        overlay.height(),
        opts.margin,
    );

    sink.begin(SinkConfig {
        width: info.width,
        height: info.height,
        fps: info.fps,
        codec: opts.codec,
    })
    .map_err(PipelineFailure::failed)?;

    state = advance(state, PipelineState::Streaming);
    tracing::debug!(x = placement.x, y = placement.y, "placement resolved");

    let mut frames_written = 0u64;
    loop {
        let next = match source.next_frame() {
            Ok(next) => next,
            Err(e) => return Err(abort(sink, frames_written, e)),
        };
        let Some(mut frame) = next else {
            break;
        };
        if let Err(e) = blend(&mut frame, overlay, placement) {
            return Err(abort(sink, frames_written, e));
        }
        if let Err(e) = sink.push_frame(&frame) {
            return Err(abort(sink, frames_written, e));
        }
        frames_written += 1;
    }

    state = advance(state, PipelineState::Closing);
    if let Err(e) = sink.end() {
        return Err(abort(sink, frames_written, e));
    }
    state = advance(state, PipelineState::Done);

    Ok(PipelineReport {
        state,
        info,
        placement,
        frames_written,
        output: None,
    })
}

/// Overlay `overlay` onto the video at `video`, writing the result to `out`.
#[tracing::instrument(skip_all, fields(video = %video.display(), out = %out.display()))]
pub fn run_overlay_pipeline(
    video: &Path,
    overlay: &Overlay,
    out: &Path,
    opts: &PipelineOpts,
) -> Result<PipelineReport, PipelineFailure> {
    let mut source = FfmpegSource::open(video).map_err(|e| {
        tracing::warn!(error = %e, "failed to open video source");
        PipelineFailure::failed(e)
    })?;
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(out));

    let mut report = composite_stream(&mut source, &mut sink, overlay, opts)?;
    report.output = Some(out.to_path_buf());
    tracing::info!(frames = report.frames_written, "overlay video written");
    Ok(report)
}

fn advance(from: PipelineState, to: PipelineState) -> PipelineState {
    tracing::trace!(?from, ?to, "pipeline transition");
    to
}

fn abort(sink: &mut dyn FrameSink, frames_written: u64, error: VidbadgeError) -> PipelineFailure {
    tracing::warn!(frames_written, error = %error, "overlay pipeline aborted");
    sink.abort();
    PipelineFailure::aborted(frames_written, error)
}
