//! # Storage Backend Trait
//!
//! The contract between the upsert protocol and any graph store. The
//! protocol only ever needs three write primitives: merge a node by key,
//! merge an edge by its endpoint keys, and declare a uniqueness constraint.
//! Everything else here is introspection, used by callers and tests to see
//! what a load produced.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory reference store for testing/embedding |
//! | `CypherBackend` | `cypher` | Renders parameterized Cypher for a caller-supplied session |

pub mod memory;
pub mod cypher;

use async_trait::async_trait;

use crate::entity::{EntityType, Field};
use crate::index::IndexSpec;
use crate::model::*;
use crate::relationship::EdgeKey;
use crate::tx::{Transaction, TxMode};
use crate::{Error, Result};

pub use memory::MemoryBackend;
pub use cypher::{CypherBackend, CypherExecutor, Statement};

// ============================================================================
// Constraints
// ============================================================================

/// A uniqueness constraint on one label + property pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintSpec {
    pub label: EntityType,
    pub property: String,
}

impl ConstraintSpec {
    pub fn unique(label: EntityType, property: impl Into<String>) -> Self {
        Self { label, property: property.into() }
    }

    /// Schema name, e.g. `pull_request_id`.
    pub fn name(&self) -> String {
        format!("{}_{}", snake_case(self.label.label()), self.property)
    }
}

pub(crate) fn snake_case(label: &str) -> String {
    let mut out = String::with_capacity(label.len() + 4);
    for (i, c) in label.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The universal storage contract.
///
/// Write primitives are required. Read methods default to
/// `Error::Storage("... not supported")` so write-only stores (such as a
/// Cypher session) only implement what they can.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// The transaction type for this backend.
    type Tx: Transaction;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Shut down the backend, flushing any pending writes.
    async fn shutdown(&self) -> Result<()>;

    // ========================================================================
    // Transactions
    // ========================================================================

    async fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Write primitives
    // ========================================================================

    /// Match-or-create the node `(:label {id: key})`, then set every field
    /// in order. A `Null` value removes the property.
    async fn merge_node(
        &self,
        tx: &mut Self::Tx,
        label: EntityType,
        key: &str,
        fields: &[Field],
    ) -> Result<NodeId>;

    /// Match-or-create both endpoints (key only) and the edge
    /// `from -[type]-> to`, then set every property. A `Null` value removes
    /// the property. At most one edge exists per key.
    async fn merge_edge(
        &self,
        tx: &mut Self::Tx,
        key: &EdgeKey,
        props: &PropertyMap,
    ) -> Result<EdgeId>;

    /// Declare a uniqueness constraint. Fails with
    /// `Error::ConstraintAlreadyExists` when it is already declared.
    async fn create_constraint(&self, constraint: &ConstraintSpec) -> Result<()>;

    /// Declare a secondary index. Fails with `Error::IndexAlreadyExists`
    /// when an index with the same name exists.
    async fn create_index(&self, _index: &IndexSpec) -> Result<()> {
        Err(Error::Storage("indexes not supported".into()))
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Find a node by label and business key.
    async fn find_node(
        &self,
        _tx: &Self::Tx,
        _label: EntityType,
        _key: &str,
    ) -> Result<Option<Node>> {
        Err(Error::Storage("node lookup not supported".into()))
    }

    /// Find the edge stored for a key.
    async fn find_edge(&self, _tx: &Self::Tx, _key: &EdgeKey) -> Result<Option<Edge>> {
        Err(Error::Storage("edge lookup not supported".into()))
    }

    async fn get_node(&self, _tx: &Self::Tx, _id: NodeId) -> Result<Option<Node>> {
        Err(Error::Storage("node lookup not supported".into()))
    }

    /// All edges of a node, optionally filtered by direction and type.
    async fn edges_of(
        &self,
        _tx: &Self::Tx,
        _node: NodeId,
        _dir: Direction,
        _rel_type: Option<&str>,
    ) -> Result<Vec<Edge>> {
        Err(Error::Storage("traversal not supported".into()))
    }

    // ========================================================================
    // Schema introspection
    // ========================================================================

    async fn node_count(&self, _tx: &Self::Tx) -> Result<u64> {
        Err(Error::Storage("node count not supported".into()))
    }

    async fn relationship_count(&self, _tx: &Self::Tx) -> Result<u64> {
        Err(Error::Storage("relationship count not supported".into()))
    }

    async fn nodes_by_label(&self, _tx: &Self::Tx, _label: EntityType) -> Result<Vec<Node>> {
        Err(Error::Storage("label scan not supported".into()))
    }

    /// All edges of one type.
    ///
    /// Default: scans every node of every label and collects outgoing edges.
    async fn relationships_by_type(&self, tx: &Self::Tx, rel_type: &str) -> Result<Vec<Edge>> {
        let mut result = Vec::new();
        for label in EntityType::ALL {
            for node in self.nodes_by_label(tx, label).await? {
                let edges = self
                    .edges_of(tx, node.id, Direction::Outgoing, Some(rel_type))
                    .await?;
                result.extend(edges);
            }
        }
        Ok(result)
    }
}
