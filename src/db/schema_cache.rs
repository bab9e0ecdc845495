use crate::db::schema::SchemaMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum CacheError {
    IoError(std::io::Error),
    SerdeError(serde_json::Error),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::IoError(err) => write!(f, "Schema cache IO error: {}", err),
            CacheError::SerdeError(err) => write!(f, "Schema cache format error: {}", err),
        }
    }
}

impl Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::IoError(err)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerdeError(err)
    }
}

/// On-disk form of a schema snapshot
#[derive(Debug, Serialize, Deserialize)]
struct CacheArtifact {
    target: String,
    captured_at: DateTime<Utc>,
    schema: SchemaMetadata,
}

/// JSON file holding the last introspected schema for one connection target.
///
/// Deleting the file is the way to force re-introspection after the
/// database structure changes.
pub struct SchemaCacheFile {
    path: PathBuf,
    target: String,
}

impl SchemaCacheFile {
    pub fn new(path: PathBuf, target: String) -> Self {
        Self { path, target }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cached schema. A missing or unreadable file counts as a miss,
    /// as does one written for another target or holding no tables.
    pub async fn load(&self) -> Option<SchemaMetadata> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No schema cache at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read schema cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        let artifact: CacheArtifact = match serde_json::from_slice(&bytes) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!("Ignoring unreadable schema cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        if artifact.target != self.target {
            warn!(
                "Ignoring schema cache written for '{}' (configured target is '{}')",
                artifact.target, self.target
            );
            return None;
        }

        if artifact.schema.is_empty() {
            warn!("Ignoring schema cache {} with no tables", self.path.display());
            return None;
        }

        info!(
            "Loaded schema cache from {} (captured {})",
            self.path.display(),
            artifact.captured_at.to_rfc3339()
        );
        Some(artifact.schema)
    }

    /// Writes the snapshot through a sibling temp file so a crash never
    /// leaves a half-written cache behind.
    pub async fn store(&self, schema: &SchemaMetadata) -> Result<(), CacheError> {
        let artifact = CacheArtifact {
            target: self.target.clone(),
            captured_at: Utc::now(),
            schema: schema.clone(),
        };
        let json = serde_json::to_vec_pretty(&artifact)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        info!("Wrote schema cache to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::fixtures::sample_schema;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_then_load_after_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("schema_cache.json");
        let schema = sample_schema();

        SchemaCacheFile::new(path.clone(), "prod.duckdb".to_string())
            .store(&schema)
            .await
            .unwrap();

        // A fresh handle stands in for a new process
        let reloaded = SchemaCacheFile::new(path, "prod.duckdb".to_string()).load().await;
        assert_eq!(reloaded, Some(schema));
    }

    #[tokio::test]
    async fn test_missing_file_is_miss() {
        let dir = TempDir::new().unwrap();
        let cache = SchemaCacheFile::new(dir.path().join("absent.json"), "db".to_string());
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_miss() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema_cache.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let cache = SchemaCacheFile::new(path, "db".to_string());
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn test_other_target_is_miss() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema_cache.json");

        SchemaCacheFile::new(path.clone(), "staging.duckdb".to_string())
            .store(&sample_schema())
            .await
            .unwrap();

        let cache = SchemaCacheFile::new(path, "prod.duckdb".to_string());
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_schema_is_miss() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema_cache.json");
        let cache = SchemaCacheFile::new(path, "db".to_string());

        cache.store(&SchemaMetadata::default()).await.unwrap();
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn test_store_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema_cache.json");

        SchemaCacheFile::new(path.clone(), "db".to_string())
            .store(&sample_schema())
            .await
            .unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
