//! Layers 2–4: projects, initiatives, epics, issues, and sprints.
//!
//! Assignees, reporters, parents, and teams are never fields here. Loaders
//! express them as relationships (`ASSIGNED_TO`, `REPORTED_BY`, `PART_OF`,
//! `TEAM`, `IN_SPRINT`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Entity, EntityProperties, EntityType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub key: String,
    pub name: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
}

impl Entity for Project {
    const TYPE: EntityType = EntityType::Project;

    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> EntityProperties {
        EntityProperties::new()
            .scalar("id", &self.id)
            .scalar("key", &self.key)
            .scalar("name", &self.name)
            .scalar("description", &self.description)
            .date("start_date", self.start_date)
            .date("end_date", self.end_date)
            .scalar("status", &self.status)
    }
}

/// Fields shared by initiatives and epics.
fn planned_item(
    id: &str,
    key: &str,
    summary: &str,
    description: &str,
    priority: &str,
    status: &str,
    dates: [(&'static str, NaiveDate); 3],
) -> EntityProperties {
    let mut props = EntityProperties::new()
        .scalar("id", id)
        .scalar("key", key)
        .scalar("summary", summary)
        .scalar("description", description)
        .scalar("priority", priority)
        .scalar("status", status);
    for (name, date) in dates {
        props = props.date(name, date);
    }
    props
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Initiative {
    pub id: String,
    pub key: String,
    pub summary: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub created_at: NaiveDate,
}

impl Entity for Initiative {
    const TYPE: EntityType = EntityType::Initiative;

    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> EntityProperties {
        planned_item(
            &self.id,
            &self.key,
            &self.summary,
            &self.description,
            &self.priority,
            &self.status,
            [
                ("start_date", self.start_date),
                ("due_date", self.due_date),
                ("created_at", self.created_at),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epic {
    pub id: String,
    pub key: String,
    pub summary: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub created_at: NaiveDate,
}

impl Entity for Epic {
    const TYPE: EntityType = EntityType::Epic;

    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> EntityProperties {
        planned_item(
            &self.id,
            &self.key,
            &self.summary,
            &self.description,
            &self.priority,
            &self.status,
            [
                ("start_date", self.start_date),
                ("due_date", self.due_date),
                ("created_at", self.created_at),
            ],
        )
    }
}

/// A story, bug, or task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub key: String,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub summary: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub story_points: i64,
    pub created_at: NaiveDate,
}

impl Entity for Issue {
    const TYPE: EntityType = EntityType::Issue;

    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> EntityProperties {
        EntityProperties::new()
            .scalar("id", &self.id)
            .scalar("key", &self.key)
            .scalar("type", &self.issue_type)
            .scalar("summary", &self.summary)
            .scalar("description", &self.description)
            .scalar("priority", &self.priority)
            .scalar("status", &self.status)
            .scalar("story_points", self.story_points)
            .date("created_at", self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: String,
    pub name: String,
    pub goal: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
}

impl Entity for Sprint {
    const TYPE: EntityType = EntityType::Sprint;

    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> EntityProperties {
        EntityProperties::new()
            .scalar("id", &self.id)
            .scalar("name", &self.name)
            .scalar("goal", &self.goal)
            .date("start_date", self.start_date)
            .date("end_date", self.end_date)
            .scalar("status", &self.status)
    }
}
