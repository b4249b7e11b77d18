//! # schemata
//!
//! Runtime-defined record types. Fields and objects are registered as data,
//! each object gets its own provisioned SQLite table, and one generic engine
//! validates, stores, searches and pages instances of every type.
//!
//! This is the facade crate: it opens the store from [`Settings`] and hands
//! out the field, object and instance entry points. The sub-crates are
//! re-exported for callers that need their types directly.
//!
//! ```rust,no_run
//! # async fn demo() -> schemata::SchemataResult<()> {
//! use schemata::schema::{Datatype, FieldDraft, ObjectDraft, ObjectFieldRef};
//! use serde_json::json;
//!
//! let app = schemata::Schemata::in_memory().await?;
//! app.fields()
//!     .register(FieldDraft::new("email", "Email", Datatype::Email).mandatory(true))
//!     .await?;
//! app.objects()
//!     .register(ObjectDraft::new("customer", "Customer").field(ObjectFieldRef::new("email", 0)))
//!     .await?;
//! let customer = app.instances().create("customer", &json!({"email": "a@b.com"})).await?;
//! # let _ = customer;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::result_large_err)]

use std::sync::Arc;

/// Errors, settings and logging.
pub use schemata_core as core;

/// Values, statements, the executor trait and the query compiler.
pub use schemata_db as db;

/// The SQLite backend.
pub use schemata_db_backends as db_backends;

/// Field and object registries, provisioning and resolved schemas.
pub use schemata_schema as schema;

/// Payload validation.
pub use schemata_validation as validation;

/// The generic instance engine.
pub use schemata_instances as instances;

pub use schemata_core::{ErrorKind, SchemataError, SchemataResult, Settings};
pub use schemata_instances::{Instance, InstanceEngine, InstancePage, ListParams};
pub use schemata_schema::{FieldRegistry, ObjectRegistry, SchemaContext};

use schemata_db::DbExecutor;
use schemata_db_backends::SqliteBackend;

/// An open schemata store.
///
/// Cheap to clone; every clone shares the backend, the locks and the schema
/// cache.
#[derive(Debug, Clone)]
pub struct Schemata {
    settings: Arc<Settings>,
    context: Arc<SchemaContext>,
    instances: InstanceEngine,
}

impl Schemata {
    /// Opens the database named by `settings.database` and creates the
    /// metadata tables if they are missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or bootstrapped.
    pub async fn open(settings: &Settings) -> SchemataResult<Self> {
        let backend = SqliteBackend::from_settings(settings)?;
        Self::with_executor(Arc::new(backend), settings).await
    }

    /// Opens a fresh in-memory store with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be bootstrapped.
    pub async fn in_memory() -> SchemataResult<Self> {
        Self::open(&Settings::in_memory()).await
    }

    /// Builds a store over an existing executor.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata tables cannot be created.
    pub async fn with_executor(
        db: Arc<dyn DbExecutor>,
        settings: &Settings,
    ) -> SchemataResult<Self> {
        let context = SchemaContext::bootstrap(db).await?;
        let instances = InstanceEngine::from_settings(context.objects(), settings);
        tracing::info!(
            database = %settings.database.path.display(),
            "schemata store ready"
        );
        Ok(Self {
            settings: Arc::new(settings.clone()),
            context,
            instances,
        })
    }

    /// Field definition operations.
    pub fn fields(&self) -> FieldRegistry {
        self.context.fields()
    }

    /// Object definition operations.
    pub fn objects(&self) -> ObjectRegistry {
        self.context.objects()
    }

    /// Instance operations.
    pub fn instances(&self) -> &InstanceEngine {
        &self.instances
    }

    /// The shared schema context.
    pub fn context(&self) -> &Arc<SchemaContext> {
        &self.context
    }

    /// The settings the store was opened with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
