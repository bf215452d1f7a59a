use std::path::{Path, PathBuf};

use crate::error::{VidbadgeError, VidbadgeResult};

/// Object storage holding source videos and receiving published outputs.
///
/// Keys are `/`-separated and matched by plain prefix, the way bucket listings work.
pub trait VideoStore {
    /// All keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> VidbadgeResult<Vec<String>>;
    /// Copy the object at `key` to the local file `dest`.
    fn fetch(&self, key: &str, dest: &Path) -> VidbadgeResult<()>;
    /// Upload `local` under `key` and return its public URL.
    fn store(&self, local: &Path, key: &str) -> VidbadgeResult<String>;
}

/// Public URL of an object in a virtual-hosted S3-style bucket.
pub fn public_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
}

/// Bucket mirrored on the local filesystem: object `key` lives at `root/key`.
#[derive(Clone, Debug)]
pub struct FsStore {
    root: PathBuf,
    bucket: String,
    region: String,
}

impl FsStore {
    pub fn new(
        root: impl Into<PathBuf>,
        bucket: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
            region: region.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> VidbadgeResult<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|c| c == "..") {
            return Err(VidbadgeError::storage(format!("invalid object key '{key}'")));
        }
        Ok(self.root.join(key))
    }
}

impl VideoStore for FsStore {
    fn list(&self, prefix: &str) -> VidbadgeResult<Vec<String>> {
        let mut keys = Vec::new();
        if self.root.is_dir() {
            collect_keys(&self.root, "", &mut keys)?;
        }
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn fetch(&self, key: &str, dest: &Path) -> VidbadgeResult<()> {
        let src = self.object_path(key)?;
        if !src.is_file() {
            return Err(VidbadgeError::storage(format!(
                "object '{key}' not found in bucket '{}'",
                self.bucket
            )));
        }
        std::fs::copy(&src, dest).map_err(|e| {
            VidbadgeError::storage(format!("download '{key}' to '{}': {e}", dest.display()))
        })?;
        tracing::debug!(key, dest = %dest.display(), "fetched object");
        Ok(())
    }

    fn store(&self, local: &Path, key: &str) -> VidbadgeResult<String> {
        let dst = self.object_path(key)?;
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                VidbadgeError::storage(format!(
                    "create bucket directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }
        std::fs::copy(local, &dst).map_err(|e| {
            VidbadgeError::storage(format!("upload '{}' as '{key}': {e}", local.display()))
        })?;
        let url = public_url(&self.bucket, &self.region, key);
        tracing::debug!(key, %url, "stored object");
        Ok(url)
    }
}

fn collect_keys(dir: &Path, prefix: &str, out: &mut Vec<String>) -> VidbadgeResult<()> {
    let list_err =
        |e: std::io::Error| VidbadgeError::storage(format!("list '{}': {e}", dir.display()));
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        let key = format!("{prefix}{name}");
        if path.is_dir() {
            collect_keys(&path, &format!("{key}/"), out)?;
        } else if path.is_file() {
            out.push(key);
        }
    }
    Ok(())
}
