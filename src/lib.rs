//! # project-graph — Idempotent Graph Upserts with Relationship Mirroring
//!
//! Writes an organizational / engineering dataset (people, teams, work
//! items, repositories, commits, pull requests) into a property graph using
//! match-or-create upserts, and keeps registered relationship types
//! bidirectional by writing a mirror edge alongside every forward edge.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between the upsert protocol and storage
//! 2. **Typed entities**: every node kind is a struct implementing `Entity`
//! 3. **Allow-listed structure**: labels, relationship types, and property names are checked; values are parameters
//! 4. **Injected registry**: the mirror table is an immutable value, not a global
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use project_graph::{EntityType, ProjectGraph, Relationship};
//!
//! # async fn example() -> project_graph::Result<()> {
//! let graph = ProjectGraph::open_memory().await?;
//! graph.create_constraints(None).await?;
//!
//! let rel = Relationship::new("REPORTS_TO", EntityType::Person, "p1", EntityType::Person, "p2")
//!     .with_property("since", "2024-01-01");
//! let outcome = graph.upsert_relationship(&rel).await?;
//! assert!(outcome.is_mirrored()); // p2 -[:MANAGES]-> p1
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | `MemoryBackend` | In-memory graph for testing/embedding |
//! | `CypherBackend` | Parameterized Cypher through a caller-supplied session |

use std::sync::Arc;

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod entity;
pub mod relationship;
pub mod registry;
pub mod storage;
pub mod tx;
pub mod schema;
pub mod index;
pub mod upsert;
pub mod loader;
pub mod config;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{Node, NodeId, Edge, EdgeId, Direction, Value, PropertyMap};

// ============================================================================
// Re-exports: Domain
// ============================================================================

pub use entity::{Entity, EntityType, EntityProperties, Layer};
pub use relationship::{Relationship, PropertyValue, PropertyBag, EdgeKey};
pub use registry::{MirrorRegistry, MirrorKind};
pub use upsert::RelationshipOutcome;

// ============================================================================
// Re-exports: Storage, schema, loading
// ============================================================================

pub use storage::{
    StorageBackend, ConstraintSpec,
    MemoryBackend, CypherBackend, CypherExecutor, Statement,
};
pub use tx::{Transaction, TxMode, TxId};
pub use schema::SchemaReport;
pub use index::{IndexSpec, IndexTier, IndexType};
pub use loader::{LayerData, Loader, LoadReport, ItemFailure, ItemRef};
pub use config::{GraphConfig, BackendConfig, ConnectionConfig};

// ============================================================================
// Top-level ProjectGraph handle
// ============================================================================

/// The primary entry point. A `ProjectGraph` wraps a storage backend and a
/// mirror registry, and runs each operation in its own transaction:
/// committed on success, rolled back on any error.
pub struct ProjectGraph<B: StorageBackend> {
    backend: B,
    registry: Arc<MirrorRegistry>,
}

impl<B: StorageBackend> ProjectGraph<B> {
    /// Wrap a backend, using the standard mirror table.
    pub fn with_backend(backend: B) -> Self {
        Self { backend, registry: Arc::new(MirrorRegistry::standard()) }
    }

    /// Replace the mirror table.
    pub fn with_registry(mut self, registry: impl Into<Arc<MirrorRegistry>>) -> Self {
        self.registry = registry.into();
        self
    }

    pub fn registry(&self) -> &MirrorRegistry {
        &self.registry
    }

    /// Upsert an entity, then each relationship in order.
    pub async fn upsert_node<E: Entity + Sync>(
        &self,
        entity: &E,
        relationships: &[Relationship],
    ) -> Result<NodeId> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result =
            upsert::upsert_node(&self.backend, &mut tx, &self.registry, entity, relationships).await;
        tx::finish(&self.backend, tx, result).await
    }

    /// Upsert a relationship and its mirror.
    pub async fn upsert_relationship(&self, rel: &Relationship) -> Result<RelationshipOutcome> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result = upsert::upsert_relationship(&self.backend, &mut tx, &self.registry, rel).await;
        tx::finish(&self.backend, tx, result).await
    }

    /// Declare uniqueness constraints for the given layers (`None` = all).
    pub async fn create_constraints(&self, layers: Option<&[Layer]>) -> Result<SchemaReport> {
        schema::create_constraints(&self.backend, layers).await
    }

    /// Declare the recommended indexes of the given tiers (`None` = tiers 1–3).
    pub async fn create_indexes(&self, tiers: Option<&[IndexTier]>) -> Result<SchemaReport> {
        index::create_indexes(&self.backend, tiers).await
    }

    /// Constraints, then indexes, as selected by `config`.
    pub async fn apply_schema(&self, config: &GraphConfig) -> Result<SchemaReport> {
        let mut report = self.create_constraints(config.constraint_layers()).await?;
        report.merge(self.create_indexes(Some(&config.index_tiers)).await?);
        Ok(report)
    }

    /// Batch-load a layer file, one transaction per item.
    pub async fn load(&self, data: &LayerData, fail_fast: bool) -> Result<LoadReport> {
        Loader::new(&self.backend, &self.registry)
            .fail_fast(fail_fast)
            .load(data)
            .await
    }

    /// `load` with the failure policy taken from `config`.
    pub async fn load_with(&self, data: &LayerData, config: &GraphConfig) -> Result<LoadReport> {
        self.load(data, config.fail_fast).await
    }

    /// Begin an explicit transaction spanning several upserts.
    pub async fn begin(&self, mode: TxMode) -> Result<GraphTx<'_, B>> {
        let tx = self.backend.begin_tx(mode).await?;
        Ok(GraphTx { graph: self, tx })
    }

    /// Access the underlying backend (for introspection).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.backend.shutdown().await
    }
}

/// In-memory graph for testing and embedding.
impl ProjectGraph<MemoryBackend> {
    pub async fn open_memory() -> Result<Self> {
        Ok(Self::with_backend(MemoryBackend::new()))
    }

    /// Open the store `config` selects, which must be the memory backend.
    pub async fn open(config: &GraphConfig) -> Result<Self> {
        config.validate()?;
        match &config.backend {
            BackendConfig::Memory => Self::open_memory().await,
            BackendConfig::Cypher(_) => Err(Error::Config(
                "configuration selects a cypher backend; use ProjectGraph::connect".into(),
            )),
        }
    }
}

/// Graph behind a Cypher session.
impl<E: CypherExecutor> ProjectGraph<CypherBackend<E>> {
    /// Validate the connection settings in `config` and hand them to
    /// `session`, which opens the caller's executor.
    pub async fn connect<F, Fut>(config: &GraphConfig, session: F) -> Result<Self>
    where
        F: FnOnce(ConnectionConfig) -> Fut,
        Fut: std::future::Future<Output = Result<E>>,
    {
        config.validate()?;
        let BackendConfig::Cypher(connection) = &config.backend else {
            return Err(Error::Config(
                "configuration selects the memory backend; use ProjectGraph::open".into(),
            ));
        };
        tracing::info!(uri = %connection.uri, database = %connection.database, "connecting");
        let executor = session(connection.clone()).await?;
        Ok(Self::with_backend(CypherBackend::new(executor)))
    }
}

/// Explicit transaction handle. Nothing is committed until `commit`.
pub struct GraphTx<'g, B: StorageBackend> {
    graph: &'g ProjectGraph<B>,
    tx: B::Tx,
}

impl<'g, B: StorageBackend> GraphTx<'g, B> {
    pub async fn upsert_node<E: Entity + Sync>(
        &mut self,
        entity: &E,
        relationships: &[Relationship],
    ) -> Result<NodeId> {
        let graph = self.graph;
        upsert::upsert_node(&graph.backend, &mut self.tx, &graph.registry, entity, relationships).await
    }

    pub async fn upsert_relationship(&mut self, rel: &Relationship) -> Result<RelationshipOutcome> {
        let graph = self.graph;
        upsert::upsert_relationship(&graph.backend, &mut self.tx, &graph.registry, rel).await
    }

    pub fn id(&self) -> TxId {
        self.tx.id()
    }

    pub async fn commit(self) -> Result<()> {
        self.graph.backend.commit_tx(self.tx).await
    }

    pub async fn rollback(self) -> Result<()> {
        self.graph.backend.rollback_tx(self.tx).await
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown type, missing key, or malformed property. Nothing was written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connectivity, authentication, or timeout failure at the store client.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Constraint on {label}.{property} already exists")]
    ConstraintAlreadyExists { label: String, property: String },

    #[error("Index {name} already exists")]
    IndexAlreadyExists { name: String },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The forward write succeeded in this unit of work; the mirror write
    /// failed. Whether the forward edge survives depends on the backend's
    /// rollback.
    #[error("Mirror {mirror_type} of {rel_type} ({from_id} -> {to_id}) failed: {source}")]
    PartialMirrorFailure {
        rel_type: String,
        from_id: String,
        to_id: String,
        mirror_type: String,
        source: Box<Error>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::StoreUnavailable(_) => true,
            Error::PartialMirrorFailure { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
