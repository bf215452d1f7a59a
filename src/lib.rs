//! Personalized before/after demo videos.
//!
//! A label badge is rendered once per request and burned into a "good" and a "bad" source video
//! at a fixed top-right position. The compositing engine streams frames through system
//! `ffmpeg`/`ffprobe`:
//!
//! - [`FrameSource`] decodes frames, [`placement::resolve`] anchors the overlay once per video
//! - [`composite::blend`] mixes the overlay into each frame
//! - [`FrameSink`] encodes the result at the source's resolution and frame rate
//! - [`run_overlay_pipeline`] ties the stages together for one video
//!
//! [`run_demo_job`] adds the collaborators around the engine: source selection, badge rendering
//! and publishing.
#![forbid(unsafe_code)]

pub mod badge;
pub mod composite;
pub mod config;
pub mod core;
pub mod error;
pub mod job;
pub mod overlay;
pub mod pipeline;
pub mod placement;
pub mod request;
pub mod select;
pub mod sink;
pub mod source;
pub mod store;

pub use badge::{BadgeStyle, LabelSet, render_labels, render_labels_to_png};
pub use config::{AppConfig, Prefixes, StorageConfig, Variant};
pub use self::core::{Fps, RgbFrame, StreamInfo};
pub use error::{VidbadgeError, VidbadgeResult};
pub use job::{DemoOutputs, PublishedVideo, run_demo_job};
pub use overlay::Overlay;
pub use pipeline::{
    PipelineFailure, PipelineOpts, PipelineReport, PipelineState, composite_stream,
    run_overlay_pipeline,
};
pub use placement::Placement;
pub use request::labels_from_fields;
pub use select::{FirstSelector, LocalVideo, RandomSelector, VideoSelector, select_video};
pub use sink::{Codec, FfmpegSink, FfmpegSinkOpts, FrameSink, InMemorySink, SinkConfig};
pub use source::{FfmpegSource, FrameSource, InMemorySource, count_frames, probe_video};
pub use store::{FsStore, VideoStore};
