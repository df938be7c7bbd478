//! End-to-end tests for relationship upserts and mirroring.
//!
//! Symmetric and asymmetric mirrors, one-way and unregistered types,
//! self-loops, property updates, and a mirror write that fails after the
//! forward write went through.

use std::collections::BTreeSet;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use project_graph::entity::Field;
use project_graph::storage::memory::MemoryTx;
use project_graph::{
    ConstraintSpec, Edge, EdgeId, EdgeKey, EntityType, Error, MemoryBackend,
    MirrorRegistry, NodeId, ProjectGraph, PropertyMap, Relationship, Result, StorageBackend,
    TxMode, Value,
};

// ============================================================================
// Helpers
// ============================================================================

/// All edges of a type as `(from key, to key, edge)`.
async fn edges(backend: &MemoryBackend, rel_type: &str) -> Vec<(String, String, Edge)> {
    let tx = backend.begin_tx(TxMode::ReadOnly).await.unwrap();
    let mut out = Vec::new();
    for edge in backend.relationships_by_type(&tx, rel_type).await.unwrap() {
        let src = backend.get_node(&tx, edge.src).await.unwrap().unwrap();
        let dst = backend.get_node(&tx, edge.dst).await.unwrap().unwrap();
        out.push((src.key().unwrap().to_string(), dst.key().unwrap().to_string(), edge));
    }
    out
}

fn ends(list: &[(String, String, Edge)]) -> BTreeSet<(&str, &str)> {
    list.iter().map(|(f, t, _)| (f.as_str(), t.as_str())).collect()
}

async fn counts(backend: &MemoryBackend) -> (u64, u64) {
    let tx = backend.begin_tx(TxMode::ReadOnly).await.unwrap();
    (
        backend.node_count(&tx).await.unwrap(),
        backend.relationship_count(&tx).await.unwrap(),
    )
}

fn collaborator() -> Relationship {
    Relationship::new("COLLABORATOR", EntityType::Team, "team_x", EntityType::Repository, "repo_y")
        .with_property("permission", "WRITE")
        .with_property("granted_at", "2024-01-01")
}

// ============================================================================
// 1. Scenarios
// ============================================================================

#[tokio::test]
async fn test_team_membership_is_a_symmetric_pair() {
    let graph = ProjectGraph::open_memory().await.unwrap();
    let rel = Relationship::new("MEMBER_OF", EntityType::Person, "p1", EntityType::Team, "t1");
    graph.upsert_relationship(&rel).await.unwrap();

    let member_of = edges(graph.backend(), "MEMBER_OF").await;
    assert_eq!(ends(&member_of), BTreeSet::from([("p1", "t1"), ("t1", "p1")]));
    assert_eq!(counts(graph.backend()).await, (2, 2));
}

#[tokio::test]
async fn test_asymmetric_mirror_with_placeholders() {
    let graph = ProjectGraph::open_memory().await.unwrap();
    let rel = Relationship::new("REPORTS_TO", EntityType::Person, "p1", EntityType::Person, "p2");
    let outcome = graph.upsert_relationship(&rel).await.unwrap();
    assert!(outcome.is_mirrored());

    assert_eq!(ends(&edges(graph.backend(), "REPORTS_TO").await), BTreeSet::from([("p1", "p2")]));
    assert_eq!(ends(&edges(graph.backend(), "MANAGES").await), BTreeSet::from([("p2", "p1")]));
    // Mirroring is one level deep.
    assert!(edges(graph.backend(), "MANAGED_BY").await.is_empty());

    let tx = graph.backend().begin_tx(TxMode::ReadOnly).await.unwrap();
    for id in ["p1", "p2"] {
        let node = graph.backend().find_node(&tx, EntityType::Person, id).await.unwrap().unwrap();
        assert!(node.is_placeholder());
    }
}

#[tokio::test]
async fn test_properties_copied_to_mirror() {
    let graph = ProjectGraph::open_memory().await.unwrap();
    graph.upsert_relationship(&collaborator()).await.unwrap();

    let collab = edges(graph.backend(), "COLLABORATOR").await;
    assert_eq!(collab.len(), 2);
    for (_, _, edge) in &collab {
        assert_eq!(edge.get("permission"), Some(&Value::from("WRITE")));
        assert_eq!(edge.get("granted_at"), Some(&Value::from("2024-01-01")));
    }
}

#[tokio::test]
async fn test_reupsert_overwrites_supplied_keys_only() {
    let graph = ProjectGraph::open_memory().await.unwrap();
    graph.upsert_relationship(&collaborator()).await.unwrap();

    let downgrade =
        Relationship::new("COLLABORATOR", EntityType::Team, "team_x", EntityType::Repository, "repo_y")
            .with_property("permission", "READ");
    graph.upsert_relationship(&downgrade).await.unwrap();

    let collab = edges(graph.backend(), "COLLABORATOR").await;
    assert_eq!(ends(&collab), BTreeSet::from([("team_x", "repo_y"), ("repo_y", "team_x")]));
    for (_, _, edge) in &collab {
        assert_eq!(edge.get("permission"), Some(&Value::from("READ")));
        // omitted keys are kept
        assert_eq!(edge.get("granted_at"), Some(&Value::from("2024-01-01")));
    }
}

#[tokio::test]
async fn test_null_property_clears_key() {
    let graph = ProjectGraph::open_memory().await.unwrap();
    graph.upsert_relationship(&collaborator()).await.unwrap();

    let revoke = collaborator().with_property("granted_at", None::<&str>);
    graph.upsert_relationship(&revoke).await.unwrap();

    for (_, _, edge) in edges(graph.backend(), "COLLABORATOR").await {
        assert!(edge.get("granted_at").is_none());
        assert_eq!(edge.get("permission"), Some(&Value::from("WRITE")));
    }
}

#[tokio::test]
async fn test_empty_bag_is_unpropertied_edge() {
    let graph = ProjectGraph::open_memory().await.unwrap();
    let rel = Relationship::new("TARGETS", EntityType::PullRequest, "pr1", EntityType::Branch, "main");
    graph.upsert_relationship(&rel).await.unwrap();

    let targeted_by = edges(graph.backend(), "TARGETED_BY").await;
    assert_eq!(targeted_by.len(), 1);
    assert!(targeted_by[0].2.properties.is_empty());
}

// ============================================================================
// 2. One-way and unregistered types
// ============================================================================

#[tokio::test]
async fn test_one_way_type_writes_forward_only() {
    let graph = ProjectGraph::open_memory().await.unwrap();
    let rel = Relationship::new("FROM", EntityType::PullRequest, "pr1", EntityType::Branch, "feature");
    let outcome = graph.upsert_relationship(&rel).await.unwrap();

    assert_eq!(outcome.mirror, None);
    assert_eq!(counts(graph.backend()).await, (2, 1));
}

#[tokio::test]
async fn test_substitute_registry() {
    let registry = MirrorRegistry::from_pairs([("KNOWS", "KNOWS")]).with_one_way(["MEMBER_OF"]);
    let graph = ProjectGraph::open_memory().await.unwrap().with_registry(registry);

    let member = Relationship::new("MEMBER_OF", EntityType::Person, "p1", EntityType::Team, "t1");
    assert_eq!(graph.upsert_relationship(&member).await.unwrap().mirror, None);

    let knows = Relationship::new("KNOWS", EntityType::Person, "p1", EntityType::Person, "p2");
    assert!(graph.upsert_relationship(&knows).await.unwrap().is_mirrored());

    let reports = Relationship::new("REPORTS_TO", EntityType::Person, "p1", EntityType::Person, "p2");
    let err = graph.upsert_relationship(&reports).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert_eq!(counts(graph.backend()).await.1, 3);
}

#[tokio::test]
async fn test_invalid_relationship_writes_nothing() {
    let graph = ProjectGraph::open_memory().await.unwrap();

    let mut bad_label = Relationship::new("MEMBER_OF", EntityType::Person, "p1", EntityType::Team, "t1");
    bad_label.from_type = "Persn".into();
    let bad_type = Relationship::new("member of", EntityType::Person, "p1", EntityType::Team, "t1");
    let bad_key = Relationship::new("MEMBER_OF", EntityType::Person, "p1", EntityType::Team, "t1")
        .with_property("role`", "lead");

    for rel in [bad_label, bad_type, bad_key] {
        let err = graph.upsert_relationship(&rel).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{rel}: {err}");
    }
    assert_eq!(counts(graph.backend()).await, (0, 0));
}

#[tokio::test]
async fn test_malformed_mirror_type_writes_nothing() {
    let registry = MirrorRegistry::from_pairs([("KNOWS", "KNOWN BY}) DETACH DELETE (x")]);
    let graph = ProjectGraph::open_memory().await.unwrap().with_registry(registry);

    let knows = Relationship::new("KNOWS", EntityType::Person, "p1", EntityType::Person, "p2");
    let err = graph.upsert_relationship(&knows).await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)), "{err}");
    assert_eq!(counts(graph.backend()).await, (0, 0));
}

// ============================================================================
// 3. Self-loops
// ============================================================================

#[tokio::test]
async fn test_symmetric_self_loop() {
    let graph = ProjectGraph::open_memory().await.unwrap();
    let rel = Relationship::new("RELATES_TO", EntityType::Issue, "i1", EntityType::Issue, "i1")
        .with_property("reason", "duplicate");
    let outcome = graph.upsert_relationship(&rel).await.unwrap();

    // Forward and mirror share one key, so one stored loop carries both.
    assert_eq!(outcome.mirror, Some(outcome.forward));
    let loops = edges(graph.backend(), "RELATES_TO").await;
    assert_eq!(ends(&loops), BTreeSet::from([("i1", "i1")]));
    assert_eq!(loops[0].2.get("reason"), Some(&Value::from("duplicate")));
}

#[tokio::test]
async fn test_asymmetric_self_loop() {
    let graph = ProjectGraph::open_memory().await.unwrap();
    let rel = Relationship::new("BLOCKS", EntityType::Issue, "i1", EntityType::Issue, "i1");
    let outcome = graph.upsert_relationship(&rel).await.unwrap();

    assert_ne!(outcome.mirror, Some(outcome.forward));
    assert_eq!(ends(&edges(graph.backend(), "BLOCKS").await), BTreeSet::from([("i1", "i1")]));
    assert_eq!(ends(&edges(graph.backend(), "BLOCKED_BY").await), BTreeSet::from([("i1", "i1")]));
    assert_eq!(counts(graph.backend()).await, (1, 2));
}

// ============================================================================
// 4. Partial mirror failure
// ============================================================================

/// Memory store whose edge writes of one type always fail.
struct FlakyBackend {
    inner: MemoryBackend,
    failing_type: &'static str,
}

#[async_trait]
impl StorageBackend for FlakyBackend {
    type Tx = MemoryTx;

    async fn shutdown(&self) -> Result<()> {
        self.inner.shutdown().await
    }

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        self.inner.begin_tx(mode).await
    }

    async fn commit_tx(&self, tx: MemoryTx) -> Result<()> {
        self.inner.commit_tx(tx).await
    }

    async fn rollback_tx(&self, tx: MemoryTx) -> Result<()> {
        self.inner.rollback_tx(tx).await
    }

    async fn merge_node(
        &self,
        tx: &mut MemoryTx,
        label: EntityType,
        key: &str,
        fields: &[Field],
    ) -> Result<NodeId> {
        self.inner.merge_node(tx, label, key, fields).await
    }

    async fn merge_edge(&self, tx: &mut MemoryTx, key: &EdgeKey, props: &PropertyMap) -> Result<EdgeId> {
        if key.rel_type == self.failing_type {
            return Err(Error::StoreUnavailable("connection reset by peer".into()));
        }
        self.inner.merge_edge(tx, key, props).await
    }

    async fn create_constraint(&self, constraint: &ConstraintSpec) -> Result<()> {
        self.inner.create_constraint(constraint).await
    }
}

#[tokio::test]
async fn test_mirror_failure_is_partial_mirror_failure() {
    let store = MemoryBackend::new();
    let graph = ProjectGraph::with_backend(FlakyBackend { inner: store.clone(), failing_type: "MANAGES" });

    let rel = Relationship::new("REPORTS_TO", EntityType::Person, "p1", EntityType::Person, "p2");
    let err = graph.upsert_relationship(&rel).await.unwrap_err();

    match &err {
        Error::PartialMirrorFailure { rel_type, from_id, to_id, mirror_type, source } => {
            assert_eq!(rel_type, "REPORTS_TO");
            assert_eq!((from_id.as_str(), to_id.as_str()), ("p1", "p2"));
            assert_eq!(mirror_type, "MANAGES");
            assert!(matches!(**source, Error::StoreUnavailable(_)));
        }
        other => panic!("expected PartialMirrorFailure, got {other}"),
    }
    assert!(err.is_retryable());

    // The memory store cannot roll back, so the forward edge is visible.
    assert_eq!(edges(&store, "REPORTS_TO").await.len(), 1);
    assert!(edges(&store, "MANAGES").await.is_empty());
}

#[tokio::test]
async fn test_retry_after_partial_failure_completes_the_pair() {
    let store = MemoryBackend::new();
    let flaky = ProjectGraph::with_backend(FlakyBackend { inner: store.clone(), failing_type: "MANAGES" });
    let rel = Relationship::new("REPORTS_TO", EntityType::Person, "p1", EntityType::Person, "p2");
    assert!(flaky.upsert_relationship(&rel).await.is_err());

    let healthy = ProjectGraph::with_backend(store.clone());
    healthy.upsert_relationship(&rel).await.unwrap();

    assert_eq!(edges(&store, "REPORTS_TO").await.len(), 1);
    assert_eq!(edges(&store, "MANAGES").await.len(), 1);
}

#[tokio::test]
async fn test_forward_failure_is_not_partial() {
    let store = MemoryBackend::new();
    let graph = ProjectGraph::with_backend(FlakyBackend { inner: store.clone(), failing_type: "REPORTS_TO" });

    let rel = Relationship::new("REPORTS_TO", EntityType::Person, "p1", EntityType::Person, "p2");
    let err = graph.upsert_relationship(&rel).await.unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable(_)));
    assert!(edges(&store, "MANAGES").await.is_empty());
}

// ============================================================================
// 5. Properties: idempotence and symmetry over the whole registry
// ============================================================================

fn rt() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().build().unwrap()
}

const MIRRORED: &[&str] = &[
    "MEMBER_OF", "REPORTS_TO", "PART_OF", "BLOCKS", "DEPENDS_ON", "RELATES_TO",
    "COLLABORATOR", "MODIFIES", "REVIEWED_BY", "MERGED_BY",
];

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn upsert_relationship_twice_equals_once(
        type_idx in 0..MIRRORED.len(),
        from in "[a-z]{1,4}",
        to in "[a-z]{1,4}",
        weight in any::<i64>(),
        note in proptest::option::of("[ -~]{0,16}"),
    ) {
        let rel_type = MIRRORED[type_idx];
        let mut rel = Relationship::new(rel_type, EntityType::Issue, from.clone(), EntityType::Issue, to.clone())
            .with_property("weight", weight);
        if let Some(note) = note {
            rel = rel.with_property("note", note);
        }
        let registry = MirrorRegistry::standard();
        let mirror_type = registry.mirror_of(rel_type).unwrap();

        let (once, twice) = rt().block_on(async {
            let store = MemoryBackend::new();
            let graph = ProjectGraph::with_backend(store.clone());
            graph.upsert_relationship(&rel).await.unwrap();
            let once = counts(&store).await;
            graph.upsert_relationship(&rel).await.unwrap();
            let twice = counts(&store).await;

            let forward = edges(&store, rel_type).await;
            let forward: Vec<_> = forward.iter().filter(|(f, t, _)| *f == from && *t == to).collect();
            assert_eq!(forward.len(), 1);

            let mirror = edges(&store, mirror_type).await;
            let mirror: Vec<_> = mirror.iter().filter(|(f, t, _)| *f == to && *t == from).collect();
            assert_eq!(mirror.len(), 1);
            assert_eq!(mirror[0].2.properties, forward[0].2.properties);
            (once, twice)
        });

        prop_assert_eq!(once, twice);
    }
}
