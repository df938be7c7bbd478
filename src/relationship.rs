//! Relationship records: the caller-side description of one directed edge.
//!
//! A `Relationship` is loose input (string type tags, as found in loader
//! JSON). Before anything is written it is validated into an [`EdgeKey`]
//! plus a [`PropertyMap`]: labels must be known entity types, the
//! relationship type must be on the registry's allow-list, and property
//! names must be plain identifiers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::model::{PropertyMap, Value};
use crate::registry::MirrorRegistry;
use crate::{Error, Result};

// ============================================================================
// Property values
// ============================================================================

/// Scalar value carried on an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<bool> for PropertyValue { fn from(v: bool) -> Self { PropertyValue::Bool(v) } }
impl From<i32> for PropertyValue { fn from(v: i32) -> Self { PropertyValue::Int(v as i64) } }
impl From<i64> for PropertyValue { fn from(v: i64) -> Self { PropertyValue::Int(v) } }
impl From<f64> for PropertyValue { fn from(v: f64) -> Self { PropertyValue::Float(v) } }
impl From<String> for PropertyValue { fn from(v: String) -> Self { PropertyValue::String(v) } }
impl From<&str> for PropertyValue { fn from(v: &str) -> Self { PropertyValue::String(v.to_owned()) } }
impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(PropertyValue::Null) }
}

impl From<PropertyValue> for Value {
    fn from(v: PropertyValue) -> Self {
        match v {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(b),
            PropertyValue::Int(i) => Value::Int(i),
            PropertyValue::Float(f) => Value::Float(f),
            PropertyValue::String(s) => Value::String(s),
        }
    }
}

/// Edge properties, ordered by key.
pub type PropertyBag = BTreeMap<String, PropertyValue>;

// ============================================================================
// Relationship
// ============================================================================

/// One directed, typed edge to upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub from_id: String,
    pub to_id: String,
    pub from_type: String,
    pub to_type: String,
    #[serde(default)]
    pub properties: PropertyBag,
}

impl Relationship {
    pub fn new(
        rel_type: impl Into<String>,
        from_type: EntityType,
        from_id: impl Into<String>,
        to_type: EntityType,
        to_id: impl Into<String>,
    ) -> Self {
        Self {
            rel_type: rel_type.into(),
            from_id: from_id.into(),
            to_id: to_id.into(),
            from_type: from_type.label().to_string(),
            to_type: to_type.label().to_string(),
            properties: PropertyBag::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.from_type == self.to_type && self.from_id == self.to_id
    }

    /// Check every structural and value part before any store call.
    pub fn validate(&self, registry: &MirrorRegistry) -> Result<(EdgeKey, PropertyMap)> {
        if self.from_id.trim().is_empty() || self.to_id.trim().is_empty() {
            return Err(Error::Validation(format!("{self}: endpoint id is empty")));
        }
        let from_label: EntityType = self.from_type.parse()?;
        let to_label: EntityType = self.to_type.parse()?;
        if !is_identifier(&self.rel_type) || !registry.is_known(&self.rel_type) {
            return Err(Error::Validation(format!(
                "unknown relationship type '{}'",
                self.rel_type
            )));
        }
        if let Some(mirror) = registry.mirror_of(&self.rel_type) {
            if !is_identifier(mirror) {
                return Err(Error::Validation(format!("{self}: invalid mirror type '{mirror}'")));
            }
        }

        let mut props = PropertyMap::new();
        for (key, value) in &self.properties {
            if !is_identifier(key) {
                return Err(Error::Validation(format!("{self}: invalid property name '{key}'")));
            }
            if let PropertyValue::Float(f) = value {
                if !f.is_finite() {
                    return Err(Error::Validation(format!(
                        "{self}: property '{key}' is not a finite number"
                    )));
                }
            }
            props.insert(key.clone(), value.clone().into());
        }

        let key = EdgeKey {
            rel_type: self.rel_type.clone(),
            from_label,
            from_id: self.from_id.clone(),
            to_label,
            to_id: self.to_id.clone(),
        };
        Ok((key, props))
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}:{})-[:{}]->({}:{})",
            self.from_type, self.from_id, self.rel_type, self.to_type, self.to_id
        )
    }
}

// ============================================================================
// EdgeKey
// ============================================================================

/// Validated identity of one stored edge: type plus both endpoint keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub rel_type: String,
    pub from_label: EntityType,
    pub from_id: String,
    pub to_label: EntityType,
    pub to_id: String,
}

impl EdgeKey {
    /// The mirror of this edge: endpoints swapped, typed `mirror_type`.
    pub fn reversed(&self, mirror_type: &str) -> EdgeKey {
        EdgeKey {
            rel_type: mirror_type.to_string(),
            from_label: self.to_label,
            from_id: self.to_id.clone(),
            to_label: self.from_label,
            to_id: self.from_id.clone(),
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}:{})-[:{}]->({}:{})",
            self.from_label, self.from_id, self.rel_type, self.to_label, self.to_id
        )
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, safe to place in a statement unquoted.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
