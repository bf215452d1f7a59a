use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::{
    core::{Fps, RgbFrame},
    error::{VidbadgeError, VidbadgeResult},
};

/// Output video codec, identified by its four-character code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// MPEG-4 Part 2, tagged `mp4v`.
    #[default]
    Mp4v,
    /// H.264, tagged `avc1`.
    #[serde(alias = "h264")]
    Avc1,
}

impl Codec {
    pub fn fourcc(self) -> &'static str {
        match self {
            Self::Mp4v => "mp4v",
            Self::Avc1 => "avc1",
        }
    }

    fn ffmpeg_args(self) -> &'static [&'static str] {
        match self {
            Self::Mp4v => &["-c:v", "mpeg4", "-vtag", "mp4v", "-q:v", "3"],
            Self::Avc1 => &["-c:v", "libx264", "-tag:v", "avc1"],
        }
    }
}

impl std::str::FromStr for Codec {
    type Err = VidbadgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4v" => Ok(Self::Mp4v),
            "avc1" | "h264" => Ok(Self::Avc1),
            other => Err(VidbadgeError::validation(format!(
                "unsupported codec '{other}' (expected mp4v or avc1)"
            ))),
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.fourcc())
    }
}

/// Configuration provided to a [`FrameSink`] before any frame is pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub codec: Codec,
}

impl SinkConfig {
    pub fn validate(&self) -> VidbadgeResult<()> {
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(VidbadgeError::validation("fps must be non-zero"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(VidbadgeError::validation(
                "sink width/height must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Consumer of composited frames, in the order they are pushed.
pub trait FrameSink {
    /// Open the output. Called once before any frame is pushed.
    fn begin(&mut self, cfg: SinkConfig) -> VidbadgeResult<()>;
    /// Append one frame.
    fn push_frame(&mut self, frame: &RgbFrame) -> VidbadgeResult<()>;
    /// Flush and close the output.
    fn end(&mut self) -> VidbadgeResult<()>;
    /// Release the output without finalizing it. Partial output is discarded.
    fn abort(&mut self);
}

/// Options for [`FfmpegSink`].
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    pub out_path: PathBuf,
    pub overwrite: bool,
}

impl FfmpegSinkOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
        }
    }
}

/// Sink that spawns the system `ffmpeg` and streams raw `rgb24` frames to its stdin.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    cfg: Option<SinkConfig>,
    frames_written: u64,
}

impl FfmpegSink {
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            cfg: None,
            frames_written: 0,
        }
    }

    pub fn out_path(&self) -> &Path {
        &self.opts.out_path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn discard_output(&self) {
        if std::fs::remove_file(&self.opts.out_path).is_ok() {
            tracing::debug!(out = %self.opts.out_path.display(), "discarded partial output");
        }
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> VidbadgeResult<()> {
        cfg.validate()?;
        // libx264 rejects odd sizes for yuv420p; mpeg4 rounds the chroma planes up.
        if cfg.codec == Codec::Avc1
            && (!cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2))
        {
            return Err(VidbadgeError::validation(
                "avc1 output width/height must be even (required for yuv420p)",
            ));
        }
        if self.child.is_some() {
            return Err(VidbadgeError::validation("ffmpeg sink already started"));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(VidbadgeError::open(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(VidbadgeError::open(
                "ffmpeg is required for video encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if self.opts.overwrite { "-y" } else { "-n" });

        // Rate goes before `-i` so it applies to the raw input; the output inherits it unchanged.
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
        ]);
        cmd.args(cfg.codec.ffmpeg_args());
        cmd.args(["-pix_fmt", "yuv420p"]);
        cmd.arg(&self.opts.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            VidbadgeError::open(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VidbadgeError::open("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| VidbadgeError::open("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::debug!(
            out = %self.opts.out_path.display(),
            width = cfg.width,
            height = cfg.height,
            fps = %cfg.fps,
            codec = %cfg.codec,
            "opened video sink"
        );

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.frames_written = 0;
        Ok(())
    }

    fn push_frame(&mut self, frame: &RgbFrame) -> VidbadgeResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| VidbadgeError::write("ffmpeg sink not started"))?;
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(VidbadgeError::write(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.data.len() != cfg.width as usize * cfg.height as usize * 3 {
            return Err(VidbadgeError::write(
                "frame.data size mismatch with width*height*3",
            ));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(VidbadgeError::write("ffmpeg sink is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&frame.data).map_err(|e| {
            VidbadgeError::write(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames_written += 1;
        Ok(())
    }

    fn end(&mut self) -> VidbadgeResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| VidbadgeError::write("ffmpeg sink not started"))?;

        let status = child.wait().map_err(|e| {
            VidbadgeError::write(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| VidbadgeError::write("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| VidbadgeError::write(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        self.cfg = None;
        if !status.success() {
            self.discard_output();
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(VidbadgeError::write(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return;
        };
        let _ = child.kill();
        let _ = child.wait();
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
        self.cfg = None;
        self.discard_output();
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> VidbadgeResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<RgbFrame>,
    ended: bool,
    aborted: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    pub fn frames(&self) -> &[RgbFrame] {
        &self.frames
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> VidbadgeResult<()> {
        cfg.validate()?;
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        self.aborted = false;
        Ok(())
    }

    fn push_frame(&mut self, frame: &RgbFrame) -> VidbadgeResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| VidbadgeError::write("in-memory sink not started"))?;
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(VidbadgeError::write("frame size mismatch"));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn end(&mut self) -> VidbadgeResult<()> {
        self.ended = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.frames.clear();
        self.aborted = true;
    }
}
