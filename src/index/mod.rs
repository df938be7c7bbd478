//! Index management.
//!
//! The recommended secondary indexes, grouped into priority tiers. Tiers
//! 1–3 (lookups, status flags, dates) are applied by default; composite,
//! full-text, and analytics indexes are opt-in.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::schema::SchemaReport;
use crate::storage::StorageBackend;
use crate::{Error, Result};

/// Type of index to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexType {
    /// Range index for equality and range queries.
    BTree,
    /// Full-text search index.
    FullText,
}

/// One secondary index declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub label: EntityType,
    pub properties: Vec<String>,
    pub index_type: IndexType,
}

impl IndexSpec {
    pub fn btree(name: impl Into<String>, label: EntityType, properties: &[&str]) -> Self {
        Self {
            name: name.into(),
            label,
            properties: properties.iter().map(|p| p.to_string()).collect(),
            index_type: IndexType::BTree,
        }
    }

    pub fn fulltext(name: impl Into<String>, label: EntityType, properties: &[&str]) -> Self {
        Self {
            index_type: IndexType::FullText,
            ..Self::btree(name, label, properties)
        }
    }

    pub fn is_composite(&self) -> bool {
        self.index_type == IndexType::BTree && self.properties.len() > 1
    }
}

// ============================================================================
// Tiers
// ============================================================================

/// Priority tier of a recommended index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum IndexTier {
    Lookup = 1,
    Status = 2,
    Temporal = 3,
    Composite = 4,
    FullText = 5,
    Analytics = 6,
}

impl IndexTier {
    pub const ALL: [IndexTier; 6] = [
        IndexTier::Lookup,
        IndexTier::Status,
        IndexTier::Temporal,
        IndexTier::Composite,
        IndexTier::FullText,
        IndexTier::Analytics,
    ];

    pub const DEFAULT: [IndexTier; 3] = [IndexTier::Lookup, IndexTier::Status, IndexTier::Temporal];

    pub fn number(self) -> u8 {
        self as u8
    }

    /// Every index of this tier, in declaration order.
    pub fn indexes(self) -> Vec<IndexSpec> {
        use EntityType::*;
        match self {
            IndexTier::Lookup => btree(&[
                ("person_name", Person, &["name"]),
                ("person_email", Person, &["email"]),
                ("person_role", Person, &["role"]),
                ("person_title", Person, &["title"]),
                ("person_seniority", Person, &["seniority"]),
                ("team_name", Team, &["name"]),
                ("identity_username", IdentityMapping, &["username"]),
                ("identity_provider", IdentityMapping, &["provider"]),
                ("identity_email", IdentityMapping, &["email"]),
                ("initiative_key", Initiative, &["key"]),
                ("epic_key", Epic, &["key"]),
                ("issue_key", Issue, &["key"]),
                ("repository_name", Repository, &["name"]),
                ("repository_full_name", Repository, &["full_name"]),
                ("repository_language", Repository, &["language"]),
                ("branch_name", Branch, &["name"]),
                ("file_path", File, &["path"]),
                ("file_name", File, &["name"]),
                ("file_extension", File, &["extension"]),
                ("file_language", File, &["language"]),
                ("pr_number", PullRequest, &["number"]),
                ("pr_state", PullRequest, &["state"]),
            ]),
            IndexTier::Status => btree(&[
                ("initiative_status", Initiative, &["status"]),
                ("epic_status", Epic, &["status"]),
                ("issue_status", Issue, &["status"]),
                ("issue_type", Issue, &["type"]),
                ("sprint_status", Sprint, &["status"]),
                ("branch_is_default", Branch, &["is_default"]),
                ("branch_is_deleted", Branch, &["is_deleted"]),
                ("branch_is_protected", Branch, &["is_protected"]),
                ("file_is_test", File, &["is_test"]),
                ("pr_mergeable_state", PullRequest, &["mergeable_state"]),
            ]),
            IndexTier::Temporal => btree(&[
                ("person_hire_date", Person, &["hire_date"]),
                ("initiative_start_date", Initiative, &["start_date"]),
                ("initiative_due_date", Initiative, &["due_date"]),
                ("epic_start_date", Epic, &["start_date"]),
                ("epic_due_date", Epic, &["due_date"]),
                ("issue_created_at", Issue, &["created_at"]),
                ("sprint_start_date", Sprint, &["start_date"]),
                ("sprint_end_date", Sprint, &["end_date"]),
                ("repository_created_at", Repository, &["created_at"]),
                ("branch_last_commit_timestamp", Branch, &["last_commit_timestamp"]),
                ("branch_created_at", Branch, &["created_at"]),
                ("commit_timestamp", Commit, &["timestamp"]),
                ("file_created_at", File, &["created_at"]),
                ("pr_created_at", PullRequest, &["created_at"]),
                ("pr_merged_at", PullRequest, &["merged_at"]),
                ("pr_updated_at", PullRequest, &["updated_at"]),
                ("pr_closed_at", PullRequest, &["closed_at"]),
            ]),
            IndexTier::Composite => btree(&[
                ("person_role_seniority", Person, &["role", "seniority"]),
                ("issue_type_status", Issue, &["type", "status"]),
                ("issue_status_priority", Issue, &["status", "priority"]),
                ("branch_is_default_is_deleted", Branch, &["is_default", "is_deleted"]),
                ("pr_state_created_at", PullRequest, &["state", "created_at"]),
            ]),
            IndexTier::FullText => vec![
                IndexSpec::fulltext("initiative_summary_fulltext", Initiative, &["summary", "description"]),
                IndexSpec::fulltext("epic_summary_fulltext", Epic, &["summary", "description"]),
                IndexSpec::fulltext("issue_summary_fulltext", Issue, &["summary", "description"]),
                IndexSpec::fulltext("pr_title_fulltext", PullRequest, &["title", "description"]),
                IndexSpec::fulltext("commit_message_fulltext", Commit, &["message"]),
            ],
            IndexTier::Analytics => btree(&[
                ("issue_story_points", Issue, &["story_points"]),
                ("commit_additions", Commit, &["additions"]),
                ("commit_deletions", Commit, &["deletions"]),
                ("commit_files_changed", Commit, &["files_changed"]),
                ("pr_commits_count", PullRequest, &["commits_count"]),
                ("pr_additions", PullRequest, &["additions"]),
                ("pr_deletions", PullRequest, &["deletions"]),
                ("pr_changed_files", PullRequest, &["changed_files"]),
                ("pr_comments", PullRequest, &["comments"]),
                ("pr_review_comments", PullRequest, &["review_comments"]),
                ("file_size", File, &["size"]),
            ]),
        }
    }
}

fn btree(rows: &[(&str, EntityType, &[&str])]) -> Vec<IndexSpec> {
    rows.iter().map(|(name, label, props)| IndexSpec::btree(*name, *label, props)).collect()
}

impl TryFrom<u8> for IndexTier {
    type Error = Error;

    fn try_from(n: u8) -> Result<Self> {
        IndexTier::ALL
            .into_iter()
            .find(|t| t.number() == n)
            .ok_or_else(|| Error::Validation(format!("unknown index tier {n}")))
    }
}

impl From<IndexTier> for u8 {
    fn from(tier: IndexTier) -> u8 {
        tier.number()
    }
}

impl fmt::Display for IndexTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "priority {}", self.number())
    }
}

// ============================================================================
// Registrar
// ============================================================================

/// Declare every index of the given tiers (`None` = the default tiers).
///
/// An index that already exists counts as existing; any other error stops
/// the run and propagates.
pub async fn create_indexes<B: StorageBackend>(
    backend: &B,
    tiers: Option<&[IndexTier]>,
) -> Result<SchemaReport> {
    let tiers = tiers.unwrap_or(&IndexTier::DEFAULT);
    let mut report = SchemaReport::default();

    for tier in tiers {
        for index in tier.indexes() {
            match backend.create_index(&index).await {
                Ok(()) => {
                    tracing::debug!(%tier, index = %index.name, "created index");
                    report.created.push(index.name);
                }
                Err(Error::IndexAlreadyExists { name }) => {
                    tracing::debug!(%tier, index = %name, "index already exists");
                    report.existing.push(name);
                }
                Err(e) => {
                    tracing::warn!(%tier, index = %index.name, error = %e, "index creation failed");
                    return Err(e);
                }
            }
        }
    }

    Ok(report)
}
