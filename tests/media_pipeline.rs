use std::{path::Path, process::Command};

use vidbadge::{
    FfmpegSink, FfmpegSinkOpts, FfmpegSource, Fps, FrameSink, FrameSource, Overlay, PipelineOpts,
    PipelineState, SinkConfig, VidbadgeError, count_frames, probe_video, run_overlay_pipeline,
};

fn ffmpeg_tools_available() -> bool {
    let ok = |tool: &str| {
        Command::new(tool)
            .arg("-version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    };
    ok("ffmpeg") && ok("ffprobe")
}

/// 320x240 @ 10fps, exactly 10 frames.
fn synth_clip(path: &Path) -> anyhow::Result<()> {
    let status = Command::new("ffmpeg")
        .args([
            "-v",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            "testsrc=size=320x240:rate=10",
            "-frames:v",
            "10",
            "-pix_fmt",
            "yuv420p",
            "-c:v",
            "mpeg4",
        ])
        .arg(path)
        .status()?;
    anyhow::ensure!(status.success(), "ffmpeg failed creating test clip");
    Ok(())
}

fn solid_overlay(w: u32, h: u32, px: [u8; 4]) -> Overlay {
    let mut data = Vec::new();
    for _ in 0..(w * h) {
        data.extend_from_slice(&px);
    }
    Overlay::from_rgba8(w, h, &data).unwrap()
}

fn close(a: [u8; 3], b: [u8; 3], tol: i32) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| (i32::from(*x) - i32::from(*y)).abs() <= tol)
}

#[test]
fn source_sink_roundtrip_preserves_frame_count_and_metadata() {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    synth_clip(&clip).unwrap();

    let info = probe_video(&clip).unwrap();
    assert_eq!((info.width, info.height), (320, 240));
    assert_eq!(info.fps, Fps::new(10, 1).unwrap());

    let mut src = FfmpegSource::open(&clip).unwrap();
    let out = dir.path().join("copy.mp4");
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&out));
    sink.begin(SinkConfig {
        width: info.width,
        height: info.height,
        fps: info.fps,
        codec: vidbadge::Codec::Mp4v,
    })
    .unwrap();

    let mut n = 0u64;
    while let Some(frame) = src.next_frame().unwrap() {
        sink.push_frame(&frame).unwrap();
        n += 1;
    }
    sink.end().unwrap();
    assert_eq!(n, 10);

    let mut reread = FfmpegSource::open(&out).unwrap();
    assert_eq!(reread.info(), info);
    assert_eq!(count_frames(&mut reread).unwrap(), 10);
}

#[test]
fn overlay_pipeline_burns_badge_into_every_frame() {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    synth_clip(&clip).unwrap();

    let overlay = solid_overlay(80, 60, [255, 0, 0, 255]);
    let out = dir.path().join("out").join("badged.mp4");
    let report = run_overlay_pipeline(&clip, &overlay, &out, &PipelineOpts::default()).unwrap();

    assert_eq!(report.state, PipelineState::Done);
    assert_eq!(report.frames_written, 10);
    assert_eq!((report.placement.x, report.placement.y), (220, 20));
    assert_eq!(report.output.as_deref(), Some(out.as_path()));

    let mut src = FfmpegSource::open(&out).unwrap();
    assert_eq!((src.info().width, src.info().height), (320, 240));
    let mut frames = 0;
    while let Some(frame) = src.next_frame().unwrap() {
        // Badge interior is red regardless of the test pattern underneath.
        assert!(close(frame.pixel(260, 50), [255, 0, 0], 40), "{:?}", frame.pixel(260, 50));
        frames += 1;
    }
    assert_eq!(frames, 10);
}

#[test]
fn oversized_overlay_aborts_without_output() {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    synth_clip(&clip).unwrap();

    let overlay = solid_overlay(400, 300, [255, 255, 255, 100]);
    let out = dir.path().join("aborted.mp4");
    let failure =
        run_overlay_pipeline(&clip, &overlay, &out, &PipelineOpts::default()).unwrap_err();

    assert_eq!(failure.state, PipelineState::Aborted);
    assert_eq!(failure.frames_written, 0);
    assert!(matches!(failure.error, VidbadgeError::Geometry(_)));
    assert!(!out.exists(), "partial output must be discarded");
}

#[test]
fn failed_finalize_removes_output_file() {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    // ffmpeg cannot pick a muxer for this extension and exits non-zero.
    let out = dir.path().join("out.vidbadge-unknown");
    std::fs::write(&out, b"stale").unwrap();

    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&out));
    sink.begin(SinkConfig {
        width: 64,
        height: 48,
        fps: Fps::new(10, 1).unwrap(),
        codec: vidbadge::Codec::Mp4v,
    })
    .unwrap();

    let err = sink.end().unwrap_err();
    assert!(matches!(err, VidbadgeError::Write(_)), "{err}");
    assert!(!out.exists(), "output of a failed encode must be discarded");
}

/// Remux `src` with a 90 degree display rotation, using whichever option this ffmpeg supports.
fn rotate_clip(src: &Path, dst: &Path) -> anyhow::Result<()> {
    let display_rotation = Command::new("ffmpeg")
        .args(["-v", "error", "-y", "-display_rotation", "90", "-i"])
        .arg(src)
        .args(["-c", "copy"])
        .arg(dst)
        .status()?;
    if display_rotation.success() {
        return Ok(());
    }
    let metadata = Command::new("ffmpeg")
        .args(["-v", "error", "-y", "-i"])
        .arg(src)
        .args(["-c", "copy", "-metadata:s:v:0", "rotate=90"])
        .arg(dst)
        .status()?;
    anyhow::ensure!(metadata.success(), "ffmpeg failed rotating test clip");
    Ok(())
}

#[test]
fn rotated_source_decodes_in_coded_orientation() {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    let rotated = dir.path().join("rotated.mp4");
    synth_clip(&clip).unwrap();
    rotate_clip(&clip, &rotated).unwrap();

    let mut plain = FfmpegSource::open(&clip).unwrap();
    let mut turned = FfmpegSource::open(&rotated).unwrap();
    assert_eq!(turned.info(), plain.info());

    let mut frames = 0;
    while let Some(expected) = plain.next_frame().unwrap() {
        let got = turned.next_frame().unwrap().expect("rotated clip ended early");
        assert_eq!((got.width, got.height), (320, 240));
        // Same bitstream, so every pixel must land where it does in the unrotated decode.
        assert!(got == expected, "frame {frames} differs from the unrotated decode");
        frames += 1;
    }
    assert_eq!(frames, 10);
    assert!(turned.next_frame().unwrap().is_none());
}

#[test]
fn undecodable_input_fails_to_open() {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let junk = dir.path().join("junk.mp4");
    std::fs::write(&junk, b"not a video").unwrap();

    let overlay = solid_overlay(8, 8, [0, 0, 0, 255]);
    let failure = run_overlay_pipeline(
        &junk,
        &overlay,
        &dir.path().join("out.mp4"),
        &PipelineOpts::default(),
    )
    .unwrap_err();
    assert_eq!(failure.state, PipelineState::Failed);
    assert!(matches!(failure.error, VidbadgeError::Open(_)));
}
