use std::collections::VecDeque;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::{
    core::{Fps, RgbFrame, StreamInfo},
    error::{VidbadgeError, VidbadgeResult},
};

/// Forward-only producer of decoded frames.
///
/// `next_frame` returns `Ok(None)` once the stream is exhausted. A source cannot be rewound;
/// reopen the container to read it again.
pub trait FrameSource {
    /// Stream metadata, available right after opening.
    fn info(&self) -> StreamInfo;
    /// Decode the next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> VidbadgeResult<Option<RgbFrame>>;
}

/// Drain `source` and return the number of frames it produced.
pub fn count_frames(source: &mut dyn FrameSource) -> VidbadgeResult<u64> {
    let mut n = 0u64;
    while source.next_frame()?.is_some() {
        n += 1;
    }
    Ok(n)
}

/// Probe `path` with `ffprobe` and return the first video stream's metadata.
pub fn probe_video(path: &Path) -> VidbadgeResult<StreamInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
        avg_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
    }

    if !path.is_file() {
        return Err(VidbadgeError::open(format!(
            "video '{}' does not exist",
            path.display()
        )));
    }

    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-print_format",
            "json",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| VidbadgeError::open(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(VidbadgeError::open(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| VidbadgeError::open(format!("ffprobe json parse failed: {e}")))?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            VidbadgeError::open(format!("no video stream found in '{}'", path.display()))
        })?;

    let width = stream
        .width
        .filter(|w| *w > 0)
        .ok_or_else(|| VidbadgeError::open("missing video width from ffprobe"))?;
    let height = stream
        .height
        .filter(|h| *h > 0)
        .ok_or_else(|| VidbadgeError::open("missing video height from ffprobe"))?;

    // Some containers report `0/0` for r_frame_rate; fall back to the average.
    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(Fps::parse_ratio)
        .or_else(|| stream.avg_frame_rate.as_deref().and_then(Fps::parse_ratio))
        .ok_or_else(|| VidbadgeError::open("invalid video frame rate from ffprobe"))?;

    Ok(StreamInfo { width, height, fps })
}

/// Source that streams `rgb24` frames out of a system `ffmpeg` child process.
pub struct FfmpegSource {
    path: PathBuf,
    info: StreamInfo,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    frames_read: u64,
}

impl FfmpegSource {
    /// Probe and open `path` for decoding.
    ///
    /// Any failure here is reported as an open error, distinct from mid-stream decode errors.
    pub fn open(path: impl Into<PathBuf>) -> VidbadgeResult<Self> {
        let path = path.into();
        let info = probe_video(&path)?;

        let mut child = Command::new("ffmpeg")
            // Frames stay in coded orientation so their size matches the probed metadata.
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(&path)
            .args(["-an", "-sn", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                VidbadgeError::open(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VidbadgeError::open("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| VidbadgeError::open("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        tracing::debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = %info.fps,
            "opened video source"
        );

        Ok(Self {
            path,
            info,
            child: Some(child),
            stdout: Some(stdout),
            stderr_drain: Some(stderr_drain),
            frames_read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the decoder to exit and surface its stderr on failure.
    fn finish(&mut self) -> VidbadgeResult<()> {
        drop(self.stdout.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| VidbadgeError::decode(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| VidbadgeError::decode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| VidbadgeError::decode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        if !status.success() {
            return Err(VidbadgeError::decode(format!(
                "ffmpeg decode of '{}' exited with status {}: {}",
                self.path.display(),
                status,
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        Ok(())
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> VidbadgeResult<Option<RgbFrame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let frame_len = self.info.frame_len();
        let mut buf = vec![0u8; frame_len];
        let mut filled = 0usize;
        while filled < frame_len {
            match stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(VidbadgeError::decode(format!(
                        "failed to read frame {} from ffmpeg: {e}",
                        self.frames_read
                    )));
                }
            }
        }

        if filled == 0 {
            self.finish()?;
            tracing::debug!(frames = self.frames_read, "video source exhausted");
            return Ok(None);
        }
        if filled < frame_len {
            let _ = self.finish();
            return Err(VidbadgeError::decode(format!(
                "truncated frame {}: got {filled} bytes, expected {frame_len}",
                self.frames_read
            )));
        }

        self.frames_read += 1;
        Ok(Some(RgbFrame {
            width: self.info.width,
            height: self.info.height,
            data: buf,
        }))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        drop(self.stdout.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }
}

/// In-memory source for tests and debugging.
#[derive(Debug)]
pub struct InMemorySource {
    info: StreamInfo,
    frames: VecDeque<RgbFrame>,
}

impl InMemorySource {
    pub fn new(info: StreamInfo, frames: impl IntoIterator<Item = RgbFrame>) -> Self {
        Self {
            info,
            frames: frames.into_iter().collect(),
        }
    }

    /// `count` copies of a solid-color frame.
    pub fn solid(info: StreamInfo, rgb: [u8; 3], count: usize) -> Self {
        let frame = RgbFrame::filled(info.width, info.height, rgb);
        Self::new(info, std::iter::repeat_n(frame, count))
    }
}

impl FrameSource for InMemorySource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> VidbadgeResult<Option<RgbFrame>> {
        Ok(self.frames.pop_front())
    }
}
