use std::path::{Path, PathBuf};

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{error::VidbadgeResult, store::VideoStore};

/// Extension a key must carry to be considered a source video.
pub const VIDEO_EXTENSION: &str = ".mp4";

/// Strategy for picking one source video among candidates.
pub trait VideoSelector {
    /// Index into `candidates`, or `None` to decline. Never called with an empty slice.
    fn choose(&mut self, candidates: &[String]) -> Option<usize>;
}

/// Uniform random choice.
#[derive(Debug)]
pub struct RandomSelector<R = StdRng> {
    rng: R,
}

impl RandomSelector<StdRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> RandomSelector<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> VideoSelector for RandomSelector<R> {
    fn choose(&mut self, candidates: &[String]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        Some(self.rng.gen_range(0..candidates.len()))
    }
}

/// Always the first candidate in sorted key order.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstSelector;

impl VideoSelector for FirstSelector {
    fn choose(&mut self, candidates: &[String]) -> Option<usize> {
        if candidates.is_empty() { None } else { Some(0) }
    }
}

/// A source video downloaded for one job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVideo {
    pub key: String,
    pub path: PathBuf,
}

/// Pick one `.mp4` under `prefix` and download it into `dest_dir`.
///
/// Returns `Ok(None)` when the prefix holds no video or the selector declines.
pub fn select_video(
    store: &dyn VideoStore,
    prefix: &str,
    selector: &mut dyn VideoSelector,
    dest_dir: &Path,
) -> VidbadgeResult<Option<LocalVideo>> {
    let candidates: Vec<String> = store
        .list(prefix)?
        .into_iter()
        .filter(|k| k.ends_with(VIDEO_EXTENSION))
        .collect();
    if candidates.is_empty() {
        tracing::debug!(prefix, "no candidate videos");
        return Ok(None);
    }
    let Some(idx) = selector.choose(&candidates) else {
        return Ok(None);
    };
    let Some(key) = candidates.get(idx) else {
        return Ok(None);
    };

    let path = dest_dir.join(format!("downloaded_{}.mp4", uuid::Uuid::new_v4()));
    store.fetch(key, &path)?;
    tracing::debug!(prefix, key = %key, "selected source video");
    Ok(Some(LocalVideo {
        key: key.clone(),
        path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsStore;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("k{i}.mp4")).collect()
    }

    #[test]
    fn seeded_selector_is_deterministic_and_in_range() {
        let candidates = keys(7);
        let mut a = RandomSelector::seeded(42);
        let mut b = RandomSelector::seeded(42);
        for _ in 0..32 {
            let i = a.choose(&candidates).unwrap();
            assert!(i < candidates.len());
            assert_eq!(Some(i), b.choose(&candidates));
        }
        assert_eq!(a.choose(&[]), None);
    }

    #[test]
    fn select_skips_non_video_keys() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = dir.path().join("bucket");
        std::fs::create_dir_all(bucket.join("good")).unwrap();
        std::fs::write(bucket.join("good/readme.txt"), b"x").unwrap();
        std::fs::write(bucket.join("good/clip.mp4"), b"video").unwrap();

        let store = FsStore::new(&bucket, "b", "r");
        let got = select_video(&store, "good/", &mut FirstSelector, dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(got.key, "good/clip.mp4");
        assert_eq!(std::fs::read(&got.path).unwrap(), b"video");
        assert!(got.path.starts_with(dir.path()));
    }

    #[test]
    fn empty_prefix_selects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path(), "b", "r");
        let got = select_video(&store, "bad/", &mut RandomSelector::seeded(1), dir.path()).unwrap();
        assert!(got.is_none());
    }
}
