use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "vidbadge", version)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Burn an overlay image into a video (requires `ffmpeg` and `ffprobe` on PATH).
    Overlay(OverlayArgs),
    /// Render a label badge as a PNG.
    Badge(BadgeArgs),
    /// Print a video's stream metadata as JSON.
    Probe(ProbeArgs),
    /// Run a full demo job: select, personalize and publish a good and a bad video.
    Demo(DemoArgs),
}

#[derive(Args, Debug)]
struct OverlayArgs {
    /// Input video.
    #[arg(long)]
    video: PathBuf,

    /// Overlay image (PNG with or without alpha).
    #[arg(long)]
    overlay: PathBuf,

    /// Output video path.
    #[arg(long)]
    out: PathBuf,

    /// Output codec four-character code (mp4v or avc1).
    #[arg(long, default_value = "mp4v")]
    codec: vidbadge::Codec,

    /// Distance between the overlay and the top/right frame edges.
    #[arg(long, default_value_t = vidbadge::placement::DEFAULT_MARGIN)]
    margin: i64,
}

#[derive(Args, Debug)]
struct FieldArgs {
    /// Request field as key=value (name, age, gender, nationality, blood_pressure, pulse,
    /// health_vitals_<Label>). Repeatable.
    #[arg(long = "field", value_parser = vidbadge::request::parse_field)]
    fields: Vec<(String, String)>,
}

#[derive(Args, Debug)]
struct BadgeArgs {
    #[command(flatten)]
    fields: FieldArgs,

    /// Optional JSON config providing the badge style.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Input video.
    #[arg(long)]
    video: PathBuf,
}

#[derive(Args, Debug)]
struct DemoArgs {
    #[command(flatten)]
    fields: FieldArgs,

    /// JSON config (storage layout, badge style, codec). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for source video selection.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Overlay(args) => cmd_overlay(args),
        Command::Badge(args) => cmd_badge(args),
        Command::Probe(args) => cmd_probe(args),
        Command::Demo(args) => cmd_demo(args),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<vidbadge::AppConfig> {
    match path {
        Some(p) => Ok(vidbadge::AppConfig::load(p)?),
        None => Ok(vidbadge::AppConfig::default()),
    }
}

fn labels(fields: &FieldArgs) -> vidbadge::LabelSet {
    vidbadge::labels_from_fields(fields.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

fn cmd_overlay(args: OverlayArgs) -> anyhow::Result<()> {
    let overlay = vidbadge::Overlay::load(&args.overlay)?;
    let opts = vidbadge::PipelineOpts {
        codec: args.codec,
        margin: args.margin,
    };

    let report = vidbadge::run_overlay_pipeline(&args.video, &overlay, &args.out, &opts)
        .with_context(|| format!("overlay '{}'", args.video.display()))?;

    eprintln!(
        "wrote {} ({} frames)",
        args.out.display(),
        report.frames_written
    );
    Ok(())
}

fn cmd_badge(args: BadgeArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_ref())?;
    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    let overlay = vidbadge::render_labels_to_png(&labels(&args.fields), &cfg.badge, &args.out)?;
    eprintln!(
        "wrote {} ({}x{})",
        args.out.display(),
        overlay.width(),
        overlay.height()
    );
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let info = vidbadge::probe_video(&args.video)?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn cmd_demo(args: DemoArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_ref())?;
    let store = cfg.storage.fs_store();
    let mut selector = match args.seed {
        Some(seed) => vidbadge::RandomSelector::seeded(seed),
        None => vidbadge::RandomSelector::from_entropy(),
    };

    let outputs = vidbadge::run_demo_job(&cfg, &store, &mut selector, &labels(&args.fields))?;
    println!("{}", serde_json::to_string_pretty(&outputs)?);
    Ok(())
}
