//! # Entities
//!
//! Typed records for every node kind in the organizational graph, and the
//! property mapper that flattens them into storable fields.
//!
//! Each entity type knows its label, the layer it is loaded in, and which
//! fields are plain dates, UTC timestamps, nullable, or list-valued. The
//! writer uses those encodings; the values themselves are already typed.

pub mod org;
pub mod work;
pub mod code;
pub mod temporal;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{PropertyMap, Value};
use crate::{Error, Result};

pub use org::{Person, Team, IdentityMapping};
pub use work::{Project, Initiative, Epic, Issue, Sprint};
pub use code::{Repository, Branch, Commit, File, PullRequest};

/// Name of the business-key field every entity carries.
pub const KEY_FIELD: &str = "id";

// ============================================================================
// Layers
// ============================================================================

/// Logical load layer. Loaders for a layer only touch its entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Layer {
    People = 1,
    Initiatives = 2,
    Epics = 3,
    Issues = 4,
    Repositories = 5,
    Branches = 6,
    Commits = 7,
    PullRequests = 8,
}

impl Layer {
    pub const ALL: [Layer; 8] = [
        Layer::People,
        Layer::Initiatives,
        Layer::Epics,
        Layer::Issues,
        Layer::Repositories,
        Layer::Branches,
        Layer::Commits,
        Layer::PullRequests,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    /// Entity types whose nodes are loaded in this layer.
    pub fn entity_types(self) -> impl Iterator<Item = EntityType> {
        EntityType::ALL.into_iter().filter(move |t| t.layer() == self)
    }
}

impl TryFrom<u8> for Layer {
    type Error = Error;

    fn try_from(n: u8) -> Result<Self> {
        Layer::ALL
            .into_iter()
            .find(|l| l.number() == n)
            .ok_or_else(|| Error::Validation(format!("unknown layer {n}")))
    }
}

impl From<Layer> for u8 {
    fn from(layer: Layer) -> u8 {
        layer.number()
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer {}", self.number())
    }
}

// ============================================================================
// Entity types (the label allow-list)
// ============================================================================

/// Every node label this crate will write.
///
/// Parsing a label string through `FromStr` is the allow-list check used
/// before a label is placed into a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Person,
    Team,
    IdentityMapping,
    Project,
    Initiative,
    Epic,
    Issue,
    Sprint,
    Repository,
    Branch,
    Commit,
    File,
    PullRequest,
}

impl EntityType {
    pub const ALL: [EntityType; 13] = [
        EntityType::Person,
        EntityType::Team,
        EntityType::IdentityMapping,
        EntityType::Project,
        EntityType::Initiative,
        EntityType::Epic,
        EntityType::Issue,
        EntityType::Sprint,
        EntityType::Repository,
        EntityType::Branch,
        EntityType::Commit,
        EntityType::File,
        EntityType::PullRequest,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EntityType::Person => "Person",
            EntityType::Team => "Team",
            EntityType::IdentityMapping => "IdentityMapping",
            EntityType::Project => "Project",
            EntityType::Initiative => "Initiative",
            EntityType::Epic => "Epic",
            EntityType::Issue => "Issue",
            EntityType::Sprint => "Sprint",
            EntityType::Repository => "Repository",
            EntityType::Branch => "Branch",
            EntityType::Commit => "Commit",
            EntityType::File => "File",
            EntityType::PullRequest => "PullRequest",
        }
    }

    pub fn layer(self) -> Layer {
        match self {
            EntityType::Person | EntityType::Team | EntityType::IdentityMapping => Layer::People,
            EntityType::Project | EntityType::Initiative => Layer::Initiatives,
            EntityType::Epic => Layer::Epics,
            EntityType::Issue | EntityType::Sprint => Layer::Issues,
            EntityType::Repository => Layer::Repositories,
            EntityType::Branch => Layer::Branches,
            EntityType::Commit | EntityType::File => Layer::Commits,
            EntityType::PullRequest => Layer::PullRequests,
        }
    }

    /// Fields that must be unique per label. Commits are also unique by sha.
    pub fn unique_keys(self) -> &'static [&'static str] {
        match self {
            EntityType::Commit => &[KEY_FIELD, "sha"],
            _ => &[KEY_FIELD],
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.label() == s)
            .ok_or_else(|| Error::Validation(format!("unknown entity type '{s}'")))
    }
}

// ============================================================================
// Property mapping
// ============================================================================

/// How the writer must encode a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    /// String, integer, float, or boolean stored as-is.
    Scalar,
    /// Calendar date without time or zone.
    Date,
    /// UTC instant.
    Timestamp,
    /// Homogeneous list of scalars.
    List,
}

/// One mapped field of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub value: Value,
    pub encoding: Encoding,
    pub nullable: bool,
}

/// Every field except the key: what a node upsert sets after matching.
pub fn non_key(fields: &[Field]) -> impl Iterator<Item = &Field> {
    fields.iter().filter(|f| f.name != KEY_FIELD)
}

/// The flattened, ordered field set of one entity, `id` first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityProperties {
    fields: Vec<Field>,
}

impl EntityProperties {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: &'static str, value: Value, encoding: Encoding, nullable: bool) -> Self {
        self.fields.push(Field { name, value, encoding, nullable });
        self
    }

    pub fn scalar(self, name: &'static str, value: impl Into<Value>) -> Self {
        self.push(name, value.into(), Encoding::Scalar, false)
    }

    pub fn date(self, name: &'static str, value: chrono::NaiveDate) -> Self {
        self.push(name, Value::Date(value), Encoding::Date, false)
    }

    pub fn nullable_date(self, name: &'static str, value: Option<chrono::NaiveDate>) -> Self {
        self.push(name, value.into(), Encoding::Date, true)
    }

    pub fn timestamp(self, name: &'static str, value: chrono::DateTime<chrono::Utc>) -> Self {
        self.push(name, Value::DateTime(value), Encoding::Timestamp, false)
    }

    pub fn nullable_timestamp(
        self,
        name: &'static str,
        value: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Self {
        self.push(name, value.into(), Encoding::Timestamp, true)
    }

    pub fn list(self, name: &'static str, values: &[String]) -> Self {
        self.push(name, Value::from(values.to_vec()), Encoding::List, false)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Null-valued fields dropped, matching what a store keeps.
    pub fn to_property_map(&self) -> PropertyMap {
        self.fields
            .iter()
            .filter(|f| !f.value.is_null())
            .map(|f| (f.name.to_string(), f.value.clone()))
            .collect()
    }
}

/// A typed record stored as one node.
pub trait Entity {
    const TYPE: EntityType;

    /// Globally unique business key.
    fn id(&self) -> &str;

    /// Flatten into an ordered field set. Every declared field appears once.
    fn properties(&self) -> EntityProperties;

    fn validate(&self) -> Result<()> {
        if self.id().trim().is_empty() {
            return Err(Error::Validation(format!("{} with empty id", Self::TYPE)));
        }
        Ok(())
    }
}
