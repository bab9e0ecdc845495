use crate::db::schema::SchemaMetadata;
use crate::db::schema_cache::SchemaCacheFile;
use crate::db::{Database, DatabaseError};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

struct CachedSchema {
    schema: Arc<SchemaMetadata>,
    loaded_at: DateTime<Utc>,
}

/// Process-wide holder of the database schema.
///
/// The first caller loads the snapshot (durable cache, else live
/// introspection) while holding the build lock; callers arriving meanwhile
/// wait on that lock and then read the installed snapshot. Afterwards reads
/// only clone an `Arc`. Nothing expires the snapshot: a changed database needs
/// [`SchemaManager::refresh`] or a deleted cache file plus a restart.
pub struct SchemaManager {
    database: Arc<dyn Database>,
    cache_file: SchemaCacheFile,
    snapshot: RwLock<Option<CachedSchema>>,
    build_lock: Mutex<()>,
}

impl SchemaManager {
    pub fn new(database: Arc<dyn Database>, cache_file: SchemaCacheFile) -> Self {
        Self {
            database,
            cache_file,
            snapshot: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    /// Returns the cached schema, building it on first use.
    pub async fn get_schema(&self) -> Result<Arc<SchemaMetadata>, DatabaseError> {
        if let Some(schema) = self.current() {
            return Ok(schema);
        }

        let _guard = self.build_lock.lock().await;
        // Another caller may have finished the build while we waited
        if let Some(schema) = self.current() {
            return Ok(schema);
        }

        let schema = match self.cache_file.load().await {
            Some(schema) => schema,
            None => self.introspect_and_persist().await?,
        };

        Ok(self.install(schema))
    }

    /// Re-introspects the database, rewrites the durable cache and swaps the
    /// in-memory snapshot. Readers holding the old snapshot keep it.
    pub async fn refresh(&self) -> Result<Arc<SchemaMetadata>, DatabaseError> {
        let _guard = self.build_lock.lock().await;
        info!("Refreshing schema cache");
        let schema = self.introspect_and_persist().await?;
        Ok(self.install(schema))
    }

    /// The installed snapshot, if any, without triggering a build
    pub fn current(&self) -> Option<Arc<SchemaMetadata>> {
        let snapshot = self.snapshot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        snapshot.as_ref().map(|cached| Arc::clone(&cached.schema))
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        let snapshot = self.snapshot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        snapshot.as_ref().map(|cached| cached.loaded_at)
    }

    async fn introspect_and_persist(&self) -> Result<SchemaMetadata, DatabaseError> {
        info!("Introspecting database schema for {}", self.database.target());
        let schema = self.database.introspect().await?;
        // An empty catalog is a failed build: nothing is stored or installed
        if schema.is_empty() {
            warn!("Introspection of {} found no tables", self.database.target());
            return Err(DatabaseError::EmptySchema);
        }

        if let Err(e) = self.cache_file.store(&schema).await {
            warn!(
                "Failed to persist schema cache to {}: {}",
                self.cache_file.path().display(),
                e
            );
        }

        Ok(schema)
    }

    fn install(&self, schema: SchemaMetadata) -> Arc<SchemaMetadata> {
        let schema = Arc::new(schema);
        let mut snapshot = self.snapshot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *snapshot = Some(CachedSchema {
            schema: Arc::clone(&schema),
            loaded_at: Utc::now(),
        });
        info!("Schema cache holds {} tables", schema.table_count());
        schema
    }
}
