//! Batch loading of layer files.
//!
//! A layer file is the JSON produced by the dataset generators:
//!
//! ```json
//! { "metadata": { ... },
//!   "nodes": { "people": [...], "teams": [...], ... },
//!   "relationships": [ { "type": "MEMBER_OF", ... } ] }
//! ```
//!
//! Nodes are loaded before relationships. Each item runs in its own
//! transaction; a failing item, including one whose transaction could not
//! be opened, is recorded with its context and the load moves on, unless
//! fail-fast is set.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entity::*;
use crate::model::NodeId;
use crate::registry::MirrorRegistry;
use crate::relationship::Relationship;
use crate::storage::StorageBackend;
use crate::tx::{self, TxMode};
use crate::upsert::{upsert_node, upsert_relationship, RelationshipOutcome};
use crate::{Error, Result};

// ============================================================================
// Layer data
// ============================================================================

/// Node lists of one layer file. Absent lists are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerNodes {
    pub people: Vec<Person>,
    pub teams: Vec<Team>,
    pub identity_mappings: Vec<IdentityMapping>,
    /// Layer 2 carries a single project object.
    pub project: Option<Project>,
    pub initiatives: Vec<Initiative>,
    pub epics: Vec<Epic>,
    pub issues: Vec<Issue>,
    pub sprints: Vec<Sprint>,
    pub repositories: Vec<Repository>,
    pub branches: Vec<Branch>,
    pub commits: Vec<Commit>,
    pub files: Vec<File>,
    pub pull_requests: Vec<PullRequest>,
}

impl LayerNodes {
    pub fn len(&self) -> usize {
        self.people.len()
            + self.teams.len()
            + self.identity_mappings.len()
            + usize::from(self.project.is_some())
            + self.initiatives.len()
            + self.epics.len()
            + self.issues.len()
            + self.sprints.len()
            + self.repositories.len()
            + self.branches.len()
            + self.commits.len()
            + self.files.len()
            + self.pull_requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerData {
    pub nodes: LayerNodes,
    pub relationships: Vec<Relationship>,
}

impl LayerData {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

// ============================================================================
// Report
// ============================================================================

/// What a failed item was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    Node { label: EntityType, id: String },
    Relationship { index: usize, description: String },
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemRef::Node { label, id } => write!(f, "{label} '{id}'"),
            ItemRef::Relationship { index, description } => {
                write!(f, "relationship #{index} {description}")
            }
        }
    }
}

#[derive(Debug)]
pub struct ItemFailure {
    pub item: ItemRef,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub nodes_written: usize,
    pub relationships_written: usize,
    pub mirrors_written: usize,
    pub failures: Vec<ItemFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// Loader
// ============================================================================

pub struct Loader<'a, B> {
    backend: &'a B,
    registry: &'a MirrorRegistry,
    fail_fast: bool,
}

impl<'a, B: StorageBackend> Loader<'a, B> {
    pub fn new(backend: &'a B, registry: &'a MirrorRegistry) -> Self {
        Self { backend, registry, fail_fast: false }
    }

    /// Stop at the first failing item and return its error.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Load every node, then every relationship.
    pub async fn load(&self, data: &LayerData) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        let nodes = &data.nodes;

        self.load_nodes(&nodes.people, &mut report).await?;
        self.load_nodes(&nodes.teams, &mut report).await?;
        self.load_nodes(&nodes.identity_mappings, &mut report).await?;
        self.load_nodes(nodes.project.as_slice(), &mut report).await?;
        self.load_nodes(&nodes.initiatives, &mut report).await?;
        self.load_nodes(&nodes.epics, &mut report).await?;
        self.load_nodes(&nodes.sprints, &mut report).await?;
        self.load_nodes(&nodes.issues, &mut report).await?;
        self.load_nodes(&nodes.repositories, &mut report).await?;
        self.load_nodes(&nodes.branches, &mut report).await?;
        self.load_nodes(&nodes.commits, &mut report).await?;
        self.load_nodes(&nodes.files, &mut report).await?;
        self.load_nodes(&nodes.pull_requests, &mut report).await?;

        self.load_relationships(&data.relationships, &mut report).await?;

        tracing::info!(
            nodes = report.nodes_written,
            relationships = report.relationships_written,
            mirrors = report.mirrors_written,
            failures = report.failures.len(),
            "layer loaded"
        );
        Ok(report)
    }

    pub async fn load_nodes<E: Entity + Sync>(
        &self,
        entities: &[E],
        report: &mut LoadReport,
    ) -> Result<()> {
        for entity in entities {
            match self.write_node(entity).await {
                Ok(_) => report.nodes_written += 1,
                Err(error) => {
                    let item = ItemRef::Node { label: E::TYPE, id: entity.id().to_string() };
                    self.record(report, item, error)?;
                }
            }
        }
        Ok(())
    }

    pub async fn load_relationships(
        &self,
        relationships: &[Relationship],
        report: &mut LoadReport,
    ) -> Result<()> {
        for (index, rel) in relationships.iter().enumerate() {
            match self.write_relationship(rel).await {
                Ok(outcome) => {
                    report.relationships_written += 1;
                    if outcome.is_mirrored() {
                        report.mirrors_written += 1;
                    }
                }
                Err(error) => {
                    let item = ItemRef::Relationship { index, description: rel.to_string() };
                    self.record(report, item, error)?;
                }
            }
        }
        Ok(())
    }

    /// One item, one transaction. Failing to open it counts against the item.
    async fn write_node<E: Entity + Sync>(&self, entity: &E) -> Result<NodeId> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result = upsert_node(self.backend, &mut tx, self.registry, entity, &[]).await;
        tx::finish(self.backend, tx, result).await
    }

    async fn write_relationship(&self, rel: &Relationship) -> Result<RelationshipOutcome> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result = upsert_relationship(self.backend, &mut tx, self.registry, rel).await;
        tx::finish(self.backend, tx, result).await
    }

    fn record(&self, report: &mut LoadReport, item: ItemRef, error: Error) -> Result<()> {
        tracing::warn!(item = %item, error = %error, "item failed");
        if self.fail_fast {
            return Err(error);
        }
        report.failures.push(ItemFailure { item, error });
        Ok(())
    }
}
