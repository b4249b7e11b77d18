//! Field and object registries.
//!
//! Both registries share one [`SchemaContext`]: the executor, the metadata
//! store, the provisioner, the keyed locks and the schema cache. Every schema
//! mutation follows the same shape:
//!
//! 1. check the input (nothing is written if it is invalid)
//! 2. take the keyed locks for everything it touches, in sorted order
//! 3. evict affected cache entries
//! 4. run metadata writes and DDL as one atomic batch
//! 5. evict again after commit

mod fields;
mod objects;

pub use fields::FieldRegistry;
pub use objects::ObjectRegistry;

use crate::cache::SchemaCache;
use crate::locks::KeyedLocks;
use crate::provisioner::Provisioner;
use crate::store::MetadataStore;
use schemata_core::SchemataResult;
use schemata_db::{DbExecutor, Statement};
use std::sync::Arc;

/// State shared by the registries and the instance engine.
pub struct SchemaContext {
    db: Arc<dyn DbExecutor>,
    store: MetadataStore,
    provisioner: Provisioner,
    locks: KeyedLocks,
    cache: SchemaCache,
}

impl std::fmt::Debug for SchemaContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaContext")
            .field("cached_schemas", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl SchemaContext {
    /// Creates the metadata tables if needed and returns a shared context.
    ///
    /// # Errors
    ///
    /// Propagates backend errors from creating the metadata tables.
    pub async fn bootstrap(db: Arc<dyn DbExecutor>) -> SchemataResult<Arc<Self>> {
        Self::with_provisioner(db, Provisioner::default()).await
    }

    /// Like [`bootstrap`](Self::bootstrap) with a custom provisioner.
    ///
    /// # Errors
    ///
    /// Propagates backend errors from creating the metadata tables.
    pub async fn with_provisioner(
        db: Arc<dyn DbExecutor>,
        provisioner: Provisioner,
    ) -> SchemataResult<Arc<Self>> {
        let store = MetadataStore::new(Arc::clone(&db));
        store.bootstrap().await?;
        Ok(Arc::new(Self {
            db,
            store,
            provisioner,
            locks: KeyedLocks::new(),
            cache: SchemaCache::new(),
        }))
    }

    /// The executor everything runs on.
    pub fn db(&self) -> &Arc<dyn DbExecutor> {
        &self.db
    }

    /// The metadata store.
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// The schema cache.
    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// The field registry over this context.
    pub fn fields(self: &Arc<Self>) -> FieldRegistry {
        FieldRegistry::new(Arc::clone(self))
    }

    /// The object registry over this context.
    pub fn objects(self: &Arc<Self>) -> ObjectRegistry {
        ObjectRegistry::new(Arc::clone(self))
    }

    /// Runs a schema change batch, logging a rollback.
    async fn apply(&self, action: &str, target: &str, batch: Vec<Statement>) -> SchemataResult<()> {
        let count = batch.len();
        match self.db.atomic(batch).await {
            Ok(_) => {
                tracing::debug!(action, target, statements = count, "schema change committed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(action, target, error = %e, "schema change rolled back");
                Err(e)
            }
        }
    }
}
