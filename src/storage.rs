use crate::error::{BenchmarkError, Result};
use log::{debug, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Storage access used by the catalog reader and the batch pipelines.
///
/// `upload` has move semantics: the local file is gone once the call
/// returns successfully.
pub trait StorageIo: Send + Sync {
    fn read_text(&self, uri: &str) -> Result<String>;
    fn write_text(&self, uri: &str, text: &str) -> Result<()>;
    fn exists(&self, uri: &str) -> Result<bool>;
    fn upload(&self, local: &Path, uri: &str) -> Result<()>;
}

pub fn is_s3_uri(uri: &str) -> bool {
    uri.starts_with("s3://")
}

/// Pick a storage backend from the URI scheme.
pub fn storage_for(uri: &str) -> Box<dyn StorageIo> {
    if is_s3_uri(uri) {
        Box::new(S3Storage)
    } else {
        Box::new(LocalStorage)
    }
}

/// Plain filesystem storage.
pub struct LocalStorage;

impl StorageIo for LocalStorage {
    fn read_text(&self, uri: &str) -> Result<String> {
        Ok(fs::read_to_string(uri)?)
    }

    fn write_text(&self, uri: &str, text: &str) -> Result<()> {
        if let Some(parent) = Path::new(uri).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(uri, text)?;
        Ok(())
    }

    fn exists(&self, uri: &str) -> Result<bool> {
        Ok(Path::new(uri).exists())
    }

    fn upload(&self, local: &Path, uri: &str) -> Result<()> {
        let dest = PathBuf::from(uri);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        // copy + remove instead of rename: the work dir and the
        // destination may sit on different filesystems
        fs::copy(local, &dest)?;
        fs::remove_file(local)?;
        debug!("Moved {} -> {}", local.display(), uri);
        Ok(())
    }
}

/// S3 storage backed by the `aws` CLI.
pub struct S3Storage;

impl S3Storage {
    fn run(args: &[&str], uri: &str) -> Result<std::process::Output> {
        debug!("aws {}", args.join(" "));
        let output = Command::new("aws").args(args).output()?;
        if !output.status.success() {
            return Err(BenchmarkError::StorageFailed {
                uri: uri.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl StorageIo for S3Storage {
    fn read_text(&self, uri: &str) -> Result<String> {
        let output = Self::run(&["s3", "cp", uri, "-"], uri)?;
        String::from_utf8(output.stdout).map_err(|e| BenchmarkError::StorageFailed {
            uri: uri.to_string(),
            reason: format!("response is not UTF-8: {}", e),
        })
    }

    fn write_text(&self, uri: &str, text: &str) -> Result<()> {
        let mut child = Command::new("aws")
            .args(["s3", "cp", "-", uri])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        child
            .stdin
            .take()
            .ok_or_else(|| BenchmarkError::StorageFailed {
                uri: uri.to_string(),
                reason: "could not open stdin of aws subprocess".to_string(),
            })?
            .write_all(text.as_bytes())?;
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(BenchmarkError::StorageFailed {
                uri: uri.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn exists(&self, uri: &str) -> Result<bool> {
        // `aws s3 ls` on a missing key exits non-zero with empty output;
        // only that case maps to "absent"
        let output = Command::new("aws").args(["s3", "ls", uri]).output()?;
        if output.status.success() && !output.stdout.is_empty() {
            return Ok(true);
        }
        if output.stderr.is_empty() {
            return Ok(false);
        }
        Err(BenchmarkError::StorageFailed {
            uri: uri.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn upload(&self, local: &Path, uri: &str) -> Result<()> {
        let local_str = local.to_string_lossy();
        Self::run(&["s3", "mv", &local_str, uri], uri)?;
        info!("Uploaded {}", uri);
        Ok(())
    }
}

/// In-memory storage, used by unit tests and dry runs.
#[derive(Default)]
pub struct MemoryStorage {
    entries: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let storage = Self::new();
        {
            let mut map = storage.entries.lock().expect("storage lock");
            for (k, v) in entries {
                map.insert(k.into(), v.into());
            }
        }
        storage
    }
}

impl StorageIo for MemoryStorage {
    fn read_text(&self, uri: &str) -> Result<String> {
        self.entries
            .lock()
            .expect("storage lock")
            .get(uri)
            .cloned()
            .ok_or_else(|| BenchmarkError::StorageFailed {
                uri: uri.to_string(),
                reason: "not found".to_string(),
            })
    }

    fn write_text(&self, uri: &str, text: &str) -> Result<()> {
        self.entries
            .lock()
            .expect("storage lock")
            .insert(uri.to_string(), text.to_string());
        Ok(())
    }

    fn exists(&self, uri: &str) -> Result<bool> {
        Ok(self.entries.lock().expect("storage lock").contains_key(uri))
    }

    fn upload(&self, local: &Path, uri: &str) -> Result<()> {
        let contents = fs::read_to_string(local).unwrap_or_default();
        self.entries
            .lock()
            .expect("storage lock")
            .insert(uri.to_string(), contents);
        fs::remove_file(local)?;
        Ok(())
    }
}

/// Strip the last path segment: `s3://b/area/id/cat.json` -> `s3://b/area/id`.
pub fn parent_uri(uri: &str) -> String {
    match uri.rfind('/') {
        Some(idx) => uri[..idx].to_string(),
        None => String::new(),
    }
}

/// Append a relative path to a base URI, normalizing `./` prefixes and
/// duplicate slashes at the join point.
pub fn join_uri(base: &str, rel: &str) -> String {
    let base = base.trim_end_matches('/');
    let mut rel = rel;
    while let Some(stripped) = rel.strip_prefix("./") {
        rel = stripped;
    }
    format!("{}/{}", base, rel)
}

/// Last path segment of a URI.
pub fn basename(uri: &str) -> &str {
    match uri.rfind('/') {
        Some(idx) => &uri[idx + 1..],
        None => uri,
    }
}

/// Derive `(area, image_id)` from an image URI: the third-from-last and
/// second-from-last path segments, e.g.
/// `s3://bucket/acc/665946/665946.tif` -> `("acc", "665946")`.
pub fn area_and_image_id(uri: &str) -> Result<(String, String)> {
    let segments: Vec<&str> = uri.split('/').collect();
    if segments.len() < 3 {
        return Err(BenchmarkError::MalformedImageUri(uri.to_string()));
    }
    let area = segments[segments.len() - 3];
    let image_id = segments[segments.len() - 2];
    if area.is_empty() || image_id.is_empty() || area.contains(':') {
        return Err(BenchmarkError::MalformedImageUri(uri.to_string()));
    }
    Ok((area.to_string(), image_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_uri() {
        assert_eq!(
            parent_uri("s3://bucket/train/catalog.json"),
            "s3://bucket/train"
        );
        assert_eq!(parent_uri("/data/catalog.json"), "/data");
    }

    #[test]
    fn test_join_uri() {
        assert_eq!(join_uri("s3://b/train", "acc/item.json"), "s3://b/train/acc/item.json");
        assert_eq!(join_uri("s3://b/train/", "./acc.json"), "s3://b/train/acc.json");
        assert_eq!(join_uri("/data", "catalog.json"), "/data/catalog.json");
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("s3://b/acc/665946/665946.tif"), "665946.tif");
        assert_eq!(basename("665946.tif"), "665946.tif");
    }

    #[test]
    fn test_area_and_image_id() {
        let (area, id) = area_and_image_id("s3://bucket/acc/665946/665946.tif").unwrap();
        assert_eq!(area, "acc");
        assert_eq!(id, "665946");

        let (area, id) = area_and_image_id("/data/images/mon/401ab3/401ab3.tif").unwrap();
        assert_eq!(area, "mon");
        assert_eq!(id, "401ab3");
    }

    #[test]
    fn test_area_and_image_id_rejects_short_uris() {
        assert!(area_and_image_id("665946.tif").is_err());
        assert!(area_and_image_id("s3://665946.tif").is_err());
    }

    #[test]
    fn test_storage_dispatch() {
        assert!(is_s3_uri("s3://bucket/key"));
        assert!(!is_s3_uri("/tmp/file.tif"));
    }

    #[test]
    fn test_local_storage_roundtrip() {
        let dir = std::env::temp_dir().join(format!("segbench-storage-{}", std::process::id()));
        let uri = dir.join("nested").join("note.txt");
        let uri = uri.to_string_lossy().to_string();

        let storage = LocalStorage;
        assert!(!storage.exists(&uri).unwrap());
        storage.write_text(&uri, "hello").unwrap();
        assert!(storage.exists(&uri).unwrap());
        assert_eq!(storage.read_text(&uri).unwrap(), "hello");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_local_storage_upload_moves_file() {
        let dir = std::env::temp_dir().join(format!("segbench-upload-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let src = dir.join("tile.tif");
        std::fs::write(&src, b"data").unwrap();

        let dest = dir.join("out").join("tile.tif");
        let storage = LocalStorage;
        storage.upload(&src, &dest.to_string_lossy()).unwrap();

        assert!(!src.exists());
        assert!(dest.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
