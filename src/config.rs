use std::{fs::File, io::BufReader, path::Path, path::PathBuf};

use anyhow::Context as _;

use crate::{
    badge::BadgeStyle,
    error::{VidbadgeError, VidbadgeResult},
    pipeline::PipelineOpts,
    placement::DEFAULT_MARGIN,
    sink::Codec,
    store::FsStore,
};

/// Which of the two demo variants a video belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Good,
    Bad,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Good, Variant::Bad];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Bad => "bad",
        }
    }
}

/// One key prefix per variant.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Prefixes {
    pub good: String,
    pub bad: String,
}

impl Prefixes {
    pub fn get(&self, variant: Variant) -> &str {
        match variant {
            Variant::Good => &self.good,
            Variant::Bad => &self.bad,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Local directory mirroring the bucket contents.
    pub root: PathBuf,
    pub bucket: String,
    pub region: String,
    pub input_prefixes: Prefixes,
    pub output_prefixes: Prefixes,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("bucket"),
            bucket: "videosshifthealth".to_string(),
            region: "ap-southeast-1".to_string(),
            input_prefixes: Prefixes {
                good: "sourcevideosgood/".to_string(),
                bad: "sourcevideosbad/".to_string(),
            },
            output_prefixes: Prefixes {
                good: "outputvideosgood/".to_string(),
                bad: "outputvideosbad/".to_string(),
            },
        }
    }
}

impl StorageConfig {
    pub fn fs_store(&self) -> FsStore {
        FsStore::new(&self.root, &self.bucket, &self.region)
    }
}

/// Everything a demo job needs, passed explicitly instead of living in globals.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub badge: BadgeStyle,
    pub codec: Codec,
    /// Overlay distance from the top and right frame edges.
    pub margin: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            badge: BadgeStyle::default(),
            codec: Codec::Mp4v,
            margin: DEFAULT_MARGIN,
        }
    }
}

impl AppConfig {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> VidbadgeResult<Self> {
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> VidbadgeResult<()> {
        let s = &self.storage;
        if s.bucket.trim().is_empty() {
            return Err(VidbadgeError::validation("storage.bucket must be set"));
        }
        if s.region.trim().is_empty() {
            return Err(VidbadgeError::validation("storage.region must be set"));
        }
        for variant in Variant::ALL {
            if s.input_prefixes.get(variant) == s.output_prefixes.get(variant) {
                return Err(VidbadgeError::validation(format!(
                    "storage input and output prefixes for '{}' must differ",
                    variant.as_str()
                )));
            }
        }
        if self.badge.width == 0 || self.badge.row_height == 0 {
            return Err(VidbadgeError::validation(
                "badge.width and badge.row_height must be non-zero",
            ));
        }
        if !(self.badge.font_size.is_finite() && self.badge.font_size > 0.0) {
            return Err(VidbadgeError::validation("badge.font_size must be positive"));
        }
        if self.margin < 0 {
            return Err(VidbadgeError::validation("margin must be >= 0"));
        }
        Ok(())
    }

    pub fn pipeline_opts(&self) -> PipelineOpts {
        PipelineOpts {
            codec: self.codec,
            margin: self.margin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demo_bucket_layout() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.storage.input_prefixes.get(Variant::Good), "sourcevideosgood/");
        assert_eq!(cfg.storage.output_prefixes.get(Variant::Bad), "outputvideosbad/");
        assert_eq!(cfg.codec, Codec::Mp4v);
        assert_eq!(cfg.margin, 20);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(
            &path,
            r#"{"storage": {"bucket": "demo", "root": "/data/demo"}, "codec": "avc1"}"#,
        )
        .unwrap();

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.storage.bucket, "demo");
        assert_eq!(cfg.storage.root, PathBuf::from("/data/demo"));
        assert_eq!(cfg.storage.region, "ap-southeast-1");
        assert_eq!(cfg.codec, Codec::Avc1);
        assert_eq!(cfg.badge, BadgeStyle::default());
    }

    #[test]
    fn validate_rejects_colliding_prefixes() {
        let mut cfg = AppConfig::default();
        cfg.storage.output_prefixes.good = cfg.storage.input_prefixes.good.clone();
        assert!(matches!(cfg.validate(), Err(VidbadgeError::Validation(_))));
    }

    #[test]
    fn load_reports_missing_file() {
        assert!(AppConfig::load(Path::new("no/such/config.json")).is_err());
    }
}
