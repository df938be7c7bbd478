//! In-memory storage backend.
//!
//! The reference implementation of `StorageBackend`. Plain HashMaps behind
//! `parking_lot::RwLock`, with a `(label, key)` index so merges are lookups
//! rather than scans.
//!
//! ## Limitations
//!
//! - **No real transactions**: writes are applied immediately.
//!   `rollback_tx()` does NOT undo them.
//! - **Indexes are declarations only**: `create_index()` records the name so
//!   repeated declarations are detected, nothing more.
//!
//! Lock order is `key_index → nodes → edges → adjacency → constraints`;
//! every method that takes more than one lock follows it.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::entity::{non_key, EntityType, Field, KEY_FIELD};
use crate::index::IndexSpec;
use crate::model::*;
use crate::relationship::{is_identifier, EdgeKey};
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};
use super::{ConstraintSpec, StorageBackend};

type NodeKey = (EntityType, String);

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory property graph storage.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    key_index: RwLock<HashMap<NodeKey, NodeId>>,
    nodes: RwLock<HashMap<NodeId, Node>>,
    edges: RwLock<HashMap<EdgeId, Edge>>,
    /// node_id → ids of every edge touching it (self-loops listed once)
    adjacency: RwLock<HashMap<NodeId, Vec<EdgeId>>>,
    constraints: RwLock<BTreeSet<ConstraintSpec>>,
    indexes: RwLock<BTreeSet<String>>,
    next_node_id: AtomicU64,
    next_edge_id: AtomicU64,
    next_tx_id: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                key_index: RwLock::new(HashMap::new()),
                nodes: RwLock::new(HashMap::new()),
                edges: RwLock::new(HashMap::new()),
                adjacency: RwLock::new(HashMap::new()),
                constraints: RwLock::new(BTreeSet::new()),
                indexes: RwLock::new(BTreeSet::new()),
                next_node_id: AtomicU64::new(1),
                next_edge_id: AtomicU64::new(1),
                next_tx_id: AtomicU64::new(1),
            }),
        }
    }

    /// Declared uniqueness constraints, sorted.
    pub fn constraints(&self) -> Vec<ConstraintSpec> {
        self.inner.constraints.read().iter().cloned().collect()
    }

    /// Declared index names, sorted.
    pub fn indexes(&self) -> Vec<String> {
        self.inner.indexes.read().iter().cloned().collect()
    }

    /// Look up or create the node for a key. New nodes carry only `id`.
    fn ensure_node(
        &self,
        index: &mut HashMap<NodeKey, NodeId>,
        nodes: &mut HashMap<NodeId, Node>,
        adjacency: &mut HashMap<NodeId, Vec<EdgeId>>,
        label: EntityType,
        key: &str,
    ) -> NodeId {
        if let Some(id) = index.get(&(label, key.to_string())) {
            return *id;
        }
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let node = Node::new(id)
            .with_labels([label.label()])
            .with_property(KEY_FIELD, key);
        nodes.insert(id, node);
        adjacency.insert(id, Vec::new());
        index.insert((label, key.to_string()), id);
        tracing::trace!(%label, key, node_id = %id, "created node");
        id
    }

    /// Reject a write that would give two nodes of `label` the same value
    /// for a constrained property.
    fn check_unique(
        &self,
        nodes: &HashMap<NodeId, Node>,
        label: EntityType,
        key: &str,
        fields: &[Field],
    ) -> Result<()> {
        let constraints = self.inner.constraints.read();
        for field in non_key(fields) {
            if field.value.is_null() {
                continue;
            }
            if !constraints.contains(&ConstraintSpec::unique(label, field.name)) {
                continue;
            }
            let clash = nodes.values().any(|n| {
                n.has_label(label.label())
                    && n.key() != Some(key)
                    && n.get(field.name) == Some(&field.value)
            });
            if clash {
                return Err(Error::ConstraintViolation(format!(
                    "{label}.{} = {} already belongs to another node",
                    field.name, field.value
                )));
            }
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn apply(properties: &mut PropertyMap, key: &str, value: &Value) {
    if value.is_null() {
        properties.remove(key);
    } else {
        properties.insert(key.to_string(), value.clone());
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// In-memory transaction. Writes are applied directly, not buffered.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

#[async_trait]
impl StorageBackend for MemoryBackend {
    type Tx = MemoryTx;

    async fn shutdown(&self) -> Result<()> { Ok(()) }

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        Ok(MemoryTx { id, mode })
    }

    /// No-op: memory backend applies writes immediately, not on commit.
    async fn commit_tx(&self, _tx: MemoryTx) -> Result<()> { Ok(()) }

    /// WARNING: No-op. Writes made in this transaction are NOT reverted.
    async fn rollback_tx(&self, _tx: MemoryTx) -> Result<()> { Ok(()) }

    // ========================================================================
    // Write primitives
    // ========================================================================

    async fn merge_node(
        &self,
        tx: &mut MemoryTx,
        label: EntityType,
        key: &str,
        fields: &[Field],
    ) -> Result<NodeId> {
        tx.ensure_writable()?;
        let mut index = self.inner.key_index.write();
        let mut nodes = self.inner.nodes.write();
        self.check_unique(&nodes, label, key, fields)?;

        let mut adjacency = self.inner.adjacency.write();
        let id = self.ensure_node(&mut index, &mut nodes, &mut adjacency, label, key);
        drop(adjacency);

        let node = nodes
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        for field in non_key(fields) {
            apply(&mut node.properties, field.name, &field.value);
        }
        Ok(id)
    }

    async fn merge_edge(
        &self,
        tx: &mut MemoryTx,
        key: &EdgeKey,
        props: &PropertyMap,
    ) -> Result<EdgeId> {
        tx.ensure_writable()?;
        if !is_identifier(&key.rel_type) {
            return Err(Error::Validation(format!("invalid relationship type '{}'", key.rel_type)));
        }
        let mut index = self.inner.key_index.write();
        let mut nodes = self.inner.nodes.write();
        let mut edges = self.inner.edges.write();
        let mut adjacency = self.inner.adjacency.write();

        let src = self.ensure_node(&mut index, &mut nodes, &mut adjacency, key.from_label, &key.from_id);
        let dst = self.ensure_node(&mut index, &mut nodes, &mut adjacency, key.to_label, &key.to_id);

        let existing = adjacency
            .get(&src)
            .into_iter()
            .flatten()
            .copied()
            .find(|eid| {
                edges
                    .get(eid)
                    .is_some_and(|e| e.src == src && e.dst == dst && e.rel_type == key.rel_type)
            });

        let id = match existing {
            Some(id) => id,
            None => {
                let id = EdgeId(self.inner.next_edge_id.fetch_add(1, Ordering::Relaxed));
                edges.insert(id, Edge::new(id, src, dst, key.rel_type.as_str()));
                adjacency.entry(src).or_default().push(id);
                if src != dst {
                    adjacency.entry(dst).or_default().push(id);
                }
                tracing::trace!(edge = %key, edge_id = %id, "created edge");
                id
            }
        };

        let edge = edges
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Edge {id}")))?;
        for (k, v) in props {
            apply(&mut edge.properties, k, v);
        }
        Ok(id)
    }

    async fn create_constraint(&self, constraint: &ConstraintSpec) -> Result<()> {
        let nodes = self.inner.nodes.read();
        let mut constraints = self.inner.constraints.write();
        if constraints.contains(constraint) {
            return Err(Error::ConstraintAlreadyExists {
                label: constraint.label.label().to_string(),
                property: constraint.property.clone(),
            });
        }

        // Existing data must already satisfy the constraint.
        let mut seen = BTreeSet::new();
        for node in nodes.values().filter(|n| n.has_label(constraint.label.label())) {
            if let Some(value) = node.get(&constraint.property) {
                if !seen.insert(value.to_string()) {
                    return Err(Error::ConstraintViolation(format!(
                        "cannot create {}: duplicate value {value}",
                        constraint.name()
                    )));
                }
            }
        }

        constraints.insert(constraint.clone());
        Ok(())
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<()> {
        let mut indexes = self.inner.indexes.write();
        if !indexes.insert(index.name.clone()) {
            return Err(Error::IndexAlreadyExists { name: index.name.clone() });
        }
        Ok(())
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    async fn find_node(
        &self,
        _tx: &MemoryTx,
        label: EntityType,
        key: &str,
    ) -> Result<Option<Node>> {
        let index = self.inner.key_index.read();
        let nodes = self.inner.nodes.read();
        Ok(index
            .get(&(label, key.to_string()))
            .and_then(|id| nodes.get(id))
            .cloned())
    }

    async fn find_edge(&self, tx: &MemoryTx, key: &EdgeKey) -> Result<Option<Edge>> {
        let (src, dst) = {
            let index = self.inner.key_index.read();
            let src = index.get(&(key.from_label, key.from_id.clone())).copied();
            let dst = index.get(&(key.to_label, key.to_id.clone())).copied();
            match (src, dst) {
                (Some(src), Some(dst)) => (src, dst),
                _ => return Ok(None),
            }
        };
        let edges = self.edges_of(tx, src, Direction::Outgoing, Some(&key.rel_type)).await?;
        Ok(edges.into_iter().find(|e| e.dst == dst))
    }

    async fn get_node(&self, _tx: &MemoryTx, id: NodeId) -> Result<Option<Node>> {
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    async fn edges_of(
        &self,
        _tx: &MemoryTx,
        node: NodeId,
        dir: Direction,
        rel_type: Option<&str>,
    ) -> Result<Vec<Edge>> {
        let edges = self.inner.edges.read();
        let adjacency = self.inner.adjacency.read();

        let ids = adjacency.get(&node).cloned().unwrap_or_default();
        let mut result = Vec::new();

        for eid in ids {
            if let Some(edge) = edges.get(&eid) {
                let matches_dir = match dir {
                    Direction::Outgoing => edge.src == node,
                    Direction::Incoming => edge.dst == node,
                    Direction::Both => true,
                };
                let matches_type = rel_type.is_none_or(|t| edge.rel_type == t);

                if matches_dir && matches_type {
                    result.push(edge.clone());
                }
            }
        }

        Ok(result)
    }

    // ========================================================================
    // Schema introspection
    // ========================================================================

    async fn node_count(&self, _tx: &MemoryTx) -> Result<u64> {
        Ok(self.inner.nodes.read().len() as u64)
    }

    async fn relationship_count(&self, _tx: &MemoryTx) -> Result<u64> {
        Ok(self.inner.edges.read().len() as u64)
    }

    async fn nodes_by_label(&self, _tx: &MemoryTx, label: EntityType) -> Result<Vec<Node>> {
        let index = self.inner.key_index.read();
        let nodes = self.inner.nodes.read();
        let mut found: Vec<Node> = index
            .iter()
            .filter(|((l, _), _)| *l == label)
            .filter_map(|(_, id)| nodes.get(id).cloned())
            .collect();
        found.sort_by_key(|n| n.id);
        Ok(found)
    }

    async fn relationships_by_type(&self, _tx: &MemoryTx, rel_type: &str) -> Result<Vec<Edge>> {
        let mut found: Vec<Edge> = self
            .inner
            .edges
            .read()
            .values()
            .filter(|e| e.rel_type == rel_type)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.id);
        Ok(found)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityProperties;

    fn key(rel: &str, from: &str, to: &str) -> EdgeKey {
        EdgeKey {
            rel_type: rel.into(),
            from_label: EntityType::Person,
            from_id: from.into(),
            to_label: EntityType::Team,
            to_id: to.into(),
        }
    }

    #[tokio::test]
    async fn test_merge_node_twice_is_one_node() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        let fields = EntityProperties::new().scalar("id", "p1").scalar("name", "Ada");
        let a = db.merge_node(&mut tx, EntityType::Person, "p1", fields.fields()).await.unwrap();
        let fields = EntityProperties::new().scalar("id", "p1").scalar("name", "Ada L.");
        let b = db.merge_node(&mut tx, EntityType::Person, "p1", fields.fields()).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(db.node_count(&tx).await.unwrap(), 1);
        let node = db.find_node(&tx, EntityType::Person, "p1").await.unwrap().unwrap();
        assert_eq!(node.get("name"), Some(&Value::from("Ada L.")));
        assert_eq!(node.labels, vec!["Person"]);
    }

    #[tokio::test]
    async fn test_same_key_different_label_is_different_node() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        db.merge_node(&mut tx, EntityType::Person, "x", &[]).await.unwrap();
        db.merge_node(&mut tx, EntityType::Team, "x", &[]).await.unwrap();
        assert_eq!(db.node_count(&tx).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_null_removes_property() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        let set = EntityProperties::new().scalar("title", "Engineer");
        db.merge_node(&mut tx, EntityType::Person, "p1", set.fields()).await.unwrap();
        let clear = EntityProperties::new().scalar("title", Value::Null);
        db.merge_node(&mut tx, EntityType::Person, "p1", clear.fields()).await.unwrap();

        let node = db.find_node(&tx, EntityType::Person, "p1").await.unwrap().unwrap();
        assert!(node.get("title").is_none());
    }

    #[tokio::test]
    async fn test_merge_edge_creates_placeholders() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        db.merge_edge(&mut tx, &key("MEMBER_OF", "p1", "t1"), &PropertyMap::new()).await.unwrap();

        let p1 = db.find_node(&tx, EntityType::Person, "p1").await.unwrap().unwrap();
        let t1 = db.find_node(&tx, EntityType::Team, "t1").await.unwrap().unwrap();
        assert!(p1.is_placeholder());
        assert!(t1.is_placeholder());
        assert_eq!(db.relationship_count(&tx).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_merge_edge_rejects_non_identifier_type() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        let err = db
            .merge_edge(&mut tx, &key("KNOWN BY}) DETACH DELETE (x", "p1", "t1"), &PropertyMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(db.node_count(&tx).await.unwrap(), 0);
        assert_eq!(db.relationship_count(&tx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_merge_edge_twice_updates_in_place() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let k = key("MEMBER_OF", "p1", "t1");

        let first = db.merge_edge(&mut tx, &k, &props([("role", "lead"), ("since", "2024")])).await.unwrap();
        let second = db.merge_edge(&mut tx, &k, &props([("role", "member")])).await.unwrap();

        assert_eq!(first, second);
        let edge = db.find_edge(&tx, &k).await.unwrap().unwrap();
        assert_eq!(edge.get("role"), Some(&Value::from("member")));
        assert_eq!(edge.get("since"), Some(&Value::from("2024")));
    }

    #[tokio::test]
    async fn test_self_loop_listed_once() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let k = EdgeKey {
            rel_type: "RELATES_TO".into(),
            from_label: EntityType::Issue,
            from_id: "i1".into(),
            to_label: EntityType::Issue,
            to_id: "i1".into(),
        };

        db.merge_edge(&mut tx, &k, &PropertyMap::new()).await.unwrap();
        let node = db.find_node(&tx, EntityType::Issue, "i1").await.unwrap().unwrap();
        let edges = db.edges_of(&tx, node.id, Direction::Both, None).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert!(edges[0].is_self_loop());
    }

    #[tokio::test]
    async fn test_unique_constraint_rejects_duplicate_sha() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.create_constraint(&ConstraintSpec::unique(EntityType::Commit, "sha")).await.unwrap();

        let a = EntityProperties::new().scalar("sha", "abc123");
        db.merge_node(&mut tx, EntityType::Commit, "c1", a.fields()).await.unwrap();
        // Re-writing the same commit is fine.
        db.merge_node(&mut tx, EntityType::Commit, "c1", a.fields()).await.unwrap();

        let err = db.merge_node(&mut tx, EntityType::Commit, "c2", a.fields()).await.unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
        assert!(db.find_node(&tx, EntityType::Commit, "c2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_constraint_declared_twice() {
        let db = MemoryBackend::new();
        let spec = ConstraintSpec::unique(EntityType::Person, "id");
        db.create_constraint(&spec).await.unwrap();
        let err = db.create_constraint(&spec).await.unwrap_err();
        assert!(matches!(err, Error::ConstraintAlreadyExists { .. }));
        assert_eq!(db.constraints(), vec![spec]);
    }

    #[tokio::test]
    async fn test_read_only_tx_rejects_writes() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        let err = db.merge_node(&mut tx, EntityType::Person, "p1", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(db.node_count(&tx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_relationships_by_type() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        db.merge_edge(&mut tx, &key("MEMBER_OF", "a", "t"), &PropertyMap::new()).await.unwrap();
        db.merge_edge(&mut tx, &key("MEMBER_OF", "b", "t"), &PropertyMap::new()).await.unwrap();
        db.merge_edge(&mut tx, &key("MANAGES", "a", "t"), &PropertyMap::new()).await.unwrap();

        assert_eq!(db.relationships_by_type(&tx, "MEMBER_OF").await.unwrap().len(), 2);
        assert_eq!(db.relationships_by_type(&tx, "MANAGES").await.unwrap().len(), 1);
    }
}
