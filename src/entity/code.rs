//! Layers 5–8: repositories, branches, commits, files, and pull requests.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{temporal, Entity, EntityProperties, EntityType};

/// A git repository. Collaborators are `COLLABORATOR` relationships from
/// teams or people, carrying `permission` and `granted_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub full_name: String,
    pub url: String,
    pub language: String,
    pub is_private: bool,
    pub description: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub created_at: NaiveDate,
}

impl Entity for Repository {
    const TYPE: EntityType = EntityType::Repository;

    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> EntityProperties {
        EntityProperties::new()
            .scalar("id", &self.id)
            .scalar("name", &self.name)
            .scalar("full_name", &self.full_name)
            .scalar("url", &self.url)
            .scalar("language", &self.language)
            .scalar("is_private", self.is_private)
            .scalar("description", &self.description)
            .list("topics", &self.topics)
            .date("created_at", self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub is_protected: bool,
    pub is_deleted: bool,
    pub last_commit_sha: String,
    #[serde(with = "temporal::timestamp")]
    pub last_commit_timestamp: DateTime<Utc>,
    #[serde(with = "temporal::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Entity for Branch {
    const TYPE: EntityType = EntityType::Branch;

    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> EntityProperties {
        EntityProperties::new()
            .scalar("id", &self.id)
            .scalar("name", &self.name)
            .scalar("is_default", self.is_default)
            .scalar("is_protected", self.is_protected)
            .scalar("is_deleted", self.is_deleted)
            .scalar("last_commit_sha", &self.last_commit_sha)
            .timestamp("last_commit_timestamp", self.last_commit_timestamp)
            .timestamp("created_at", self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub sha: String,
    pub message: String,
    #[serde(with = "temporal::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub additions: i64,
    pub deletions: i64,
    pub files_changed: i64,
}

impl Entity for Commit {
    const TYPE: EntityType = EntityType::Commit;

    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> EntityProperties {
        EntityProperties::new()
            .scalar("id", &self.id)
            .scalar("sha", &self.sha)
            .scalar("message", &self.message)
            .timestamp("timestamp", self.timestamp)
            .scalar("additions", self.additions)
            .scalar("deletions", self.deletions)
            .scalar("files_changed", self.files_changed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    pub path: String,
    pub name: String,
    pub extension: String,
    pub language: String,
    pub is_test: bool,
    pub size: i64,
    #[serde(with = "temporal::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Entity for File {
    const TYPE: EntityType = EntityType::File;

    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> EntityProperties {
        EntityProperties::new()
            .scalar("id", &self.id)
            .scalar("path", &self.path)
            .scalar("name", &self.name)
            .scalar("extension", &self.extension)
            .scalar("language", &self.language)
            .scalar("is_test", self.is_test)
            .scalar("size", self.size)
            .timestamp("created_at", self.created_at)
    }
}

/// A pull (merge) request. `merged_at` is only set for merged requests and
/// `closed_at` for merged or closed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: String,
    pub number: i64,
    pub title: String,
    pub description: String,
    pub state: String,
    #[serde(with = "temporal::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "temporal::timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "temporal::opt_timestamp")]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default, with = "temporal::opt_timestamp")]
    pub closed_at: Option<DateTime<Utc>>,
    pub commits_count: i64,
    pub additions: i64,
    pub deletions: i64,
    pub changed_files: i64,
    pub comments: i64,
    pub review_comments: i64,
    pub head_branch_name: String,
    pub base_branch_name: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub mergeable_state: String,
}

impl Entity for PullRequest {
    const TYPE: EntityType = EntityType::PullRequest;

    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> EntityProperties {
        EntityProperties::new()
            .scalar("id", &self.id)
            .scalar("number", self.number)
            .scalar("title", &self.title)
            .scalar("description", &self.description)
            .scalar("state", &self.state)
            .timestamp("created_at", self.created_at)
            .timestamp("updated_at", self.updated_at)
            .nullable_timestamp("merged_at", self.merged_at)
            .nullable_timestamp("closed_at", self.closed_at)
            .scalar("commits_count", self.commits_count)
            .scalar("additions", self.additions)
            .scalar("deletions", self.deletions)
            .scalar("changed_files", self.changed_files)
            .scalar("comments", self.comments)
            .scalar("review_comments", self.review_comments)
            .scalar("head_branch_name", &self.head_branch_name)
            .scalar("base_branch_name", &self.base_branch_name)
            .list("labels", &self.labels)
            .scalar("mergeable_state", &self.mergeable_state)
    }
}
