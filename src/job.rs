use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    badge::{LabelSet, render_labels},
    config::{AppConfig, Variant},
    error::{VidbadgeError, VidbadgeResult},
    overlay::Overlay,
    pipeline::{PipelineOpts, PipelineReport, run_overlay_pipeline},
    select::{LocalVideo, VideoSelector, select_video},
    store::VideoStore,
};

/// One published demo video.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PublishedVideo {
    pub source_key: String,
    pub key: String,
    pub url: String,
    pub frames: u64,
}

/// Result of a demo job: one personalized video per variant.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct DemoOutputs {
    pub job_id: String,
    #[serde(rename = "good_video")]
    pub good: PublishedVideo,
    #[serde(rename = "bad_video")]
    pub bad: PublishedVideo,
}

/// Personalize one good and one bad source video with `labels` and publish both.
///
/// Both sources are selected before anything is rendered; if either variant has no video the
/// job fails with a precondition error and no pipeline runs. Every downloaded and rendered file
/// lives in a scratch directory removed when the job returns, on success or failure.
#[tracing::instrument(skip_all)]
pub fn run_demo_job(
    cfg: &AppConfig,
    store: &dyn VideoStore,
    selector: &mut dyn VideoSelector,
    labels: &LabelSet,
) -> VidbadgeResult<DemoOutputs> {
    let work = tempfile::Builder::new()
        .prefix("vidbadge-")
        .tempdir()
        .context("create job scratch directory")?;

    let prefixes = &cfg.storage.input_prefixes;
    let good = select_video(store, prefixes.get(Variant::Good), selector, work.path())?;
    let bad = select_video(store, prefixes.get(Variant::Bad), selector, work.path())?;
    let (Some(good), Some(bad)) = (good, bad) else {
        return Err(VidbadgeError::precondition(
            "no videos available in the storage folders",
        ));
    };

    let job_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(%job_id, good = %good.key, bad = %bad.key, "starting demo job");

    let overlay = render_labels(labels, &cfg.badge)?;
    let opts = cfg.pipeline_opts();

    let good_run = render_variant(Variant::Good, &good, &overlay, work.path(), &job_id, &opts)?;
    let bad_run = render_variant(Variant::Bad, &bad, &overlay, work.path(), &job_id, &opts)?;

    let good = publish(cfg, store, Variant::Good, &good, good_run)?;
    let bad = publish(cfg, store, Variant::Bad, &bad, bad_run)?;

    tracing::info!(%job_id, good = %good.url, bad = %bad.url, "demo job published");
    Ok(DemoOutputs { job_id, good, bad })
}

struct RenderedVariant {
    name: String,
    out: PathBuf,
    report: PipelineReport,
}

fn render_variant(
    variant: Variant,
    source: &LocalVideo,
    overlay: &Overlay,
    work_dir: &Path,
    job_id: &str,
    opts: &PipelineOpts,
) -> VidbadgeResult<RenderedVariant> {
    let name = format!("{}_video_{job_id}.mp4", variant.as_str());
    let out = work_dir.join(&name);
    let report = run_overlay_pipeline(&source.path, overlay, &out, opts).map_err(|f| {
        tracing::warn!(
            variant = variant.as_str(),
            state = ?f.state,
            frames = f.frames_written,
            "demo pipeline did not complete"
        );
        VidbadgeError::pipeline(variant.as_str(), f)
    })?;
    Ok(RenderedVariant { name, out, report })
}

fn publish(
    cfg: &AppConfig,
    store: &dyn VideoStore,
    variant: Variant,
    source: &LocalVideo,
    rendered: RenderedVariant,
) -> VidbadgeResult<PublishedVideo> {
    let key = format!("{}{}", cfg.storage.output_prefixes.get(variant), rendered.name);
    let url = store.store(&rendered.out, &key)?;
    Ok(PublishedVideo {
        source_key: source.key.clone(),
        key,
        url,
        frames: rendered.report.frames_written,
    })
}
