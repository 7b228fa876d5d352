use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::{Artifact, ArtifactFormat, Error, Store, validate_key};

/// Filesystem-based artifact store.
///
/// Each artifact is stored at `{base_path}/{key}.{ext}` where `ext` follows the
/// artifact format (`json`, `md` or `txt`). The base directory is created on
/// first write. Writes go to a temporary sibling file and are renamed into
/// place, so readers never observe a partially written artifact.
pub struct FsStore {
  base_path: PathBuf,
}

impl FsStore {
  /// Create a new filesystem store with the given base path.
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  /// Get the directory artifacts are written to.
  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  /// Path of the artifact file for a key in the given format.
  pub fn artifact_path(&self, key: &str, format: ArtifactFormat) -> PathBuf {
    self
      .base_path
      .join(format!("{}.{}", key, format.extension()))
  }

  /// Find the file currently holding `key`, probing each format.
  async fn locate(&self, key: &str) -> Result<Option<(PathBuf, ArtifactFormat)>, Error> {
    for format in ArtifactFormat::ALL {
      let path = self.artifact_path(key, format);
      if fs::try_exists(&path).await? {
        return Ok(Some((path, format)));
      }
    }
    Ok(None)
  }
}

#[async_trait]
impl Store for FsStore {
  async fn get(&self, key: &str) -> Result<Artifact, Error> {
    validate_key(key)?;
    let (path, format) = self
      .locate(key)
      .await?
      .ok_or_else(|| Error::NotFound(key.to_string()))?;

    let content = fs::read_to_string(&path).await.map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        Error::NotFound(key.to_string())
      } else {
        Error::Io(e)
      }
    })?;

    match format {
      ArtifactFormat::Json => {
        let value = serde_json::from_str(&content).map_err(|e| Error::Serialization {
          key: key.to_string(),
          source: e,
        })?;
        Ok(Artifact::Json(value))
      }
      format => Ok(Artifact::Text { format, content }),
    }
  }

  async fn put(&self, key: &str, artifact: Artifact) -> Result<(), Error> {
    validate_key(key)?;
    fs::create_dir_all(&self.base_path).await?;

    let format = artifact.format();
    let bytes = match &artifact {
      Artifact::Json(value) => {
        serde_json::to_vec_pretty(value).map_err(|e| Error::Serialization {
          key: key.to_string(),
          source: e,
        })?
      }
      Artifact::Text { content, .. } => content.as_bytes().to_vec(),
    };

    // An artifact lives in exactly one file; drop any copy in another format.
    for other in ArtifactFormat::ALL.into_iter().filter(|f| *f != format) {
      let stale = self.artifact_path(key, other);
      if fs::try_exists(&stale).await? {
        fs::remove_file(&stale).await?;
      }
    }

    let path = self.artifact_path(key, format);
    let tmp_path = self
      .base_path
      .join(format!(".{}.{}.tmp", key, format.extension()));

    let mut file = File::create(&tmp_path).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp_path, &path).await?;
    Ok(())
  }

  async fn exists(&self, key: &str) -> Result<bool, Error> {
    validate_key(key)?;
    Ok(self.locate(key).await?.is_some())
  }

  async fn delete(&self, key: &str) -> Result<(), Error> {
    validate_key(key)?;
    match self.locate(key).await? {
      Some((path, _)) => {
        fs::remove_file(&path).await?;
        Ok(())
      }
      None => Err(Error::NotFound(key.to_string())),
    }
  }
}
