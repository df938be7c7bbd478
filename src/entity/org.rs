//! Layer 1: people, teams, and external identities.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{temporal, Entity, EntityProperties, EntityType};

/// A person in the organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub email: String,
    pub title: String,
    pub role: String,
    pub seniority: String,
    /// Unknown for some imported people.
    #[serde(default, with = "temporal::opt_date")]
    pub hire_date: Option<NaiveDate>,
    pub is_manager: bool,
}

impl Entity for Person {
    const TYPE: EntityType = EntityType::Person;

    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> EntityProperties {
        EntityProperties::new()
            .scalar("id", &self.id)
            .scalar("name", &self.name)
            .scalar("email", &self.email)
            .scalar("title", &self.title)
            .scalar("role", &self.role)
            .scalar("seniority", &self.seniority)
            .nullable_date("hire_date", self.hire_date)
            .scalar("is_manager", self.is_manager)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub focus_area: String,
    pub target_size: i64,
    pub created_at: NaiveDate,
}

impl Entity for Team {
    const TYPE: EntityType = EntityType::Team;

    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> EntityProperties {
        EntityProperties::new()
            .scalar("id", &self.id)
            .scalar("name", &self.name)
            .scalar("focus_area", &self.focus_area)
            .scalar("target_size", self.target_size)
            .date("created_at", self.created_at)
    }
}

/// An account on an external provider (GitHub, Jira) that maps to a person.
///
/// The owning person is not a field: it is expressed as a `MAPS_TO`
/// relationship from this node to the `Person`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityMapping {
    pub id: String,
    pub provider: String,
    pub username: String,
    pub email: String,
}

impl Entity for IdentityMapping {
    const TYPE: EntityType = EntityType::IdentityMapping;

    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> EntityProperties {
        EntityProperties::new()
            .scalar("id", &self.id)
            .scalar("provider", &self.provider)
            .scalar("username", &self.username)
            .scalar("email", &self.email)
    }
}
