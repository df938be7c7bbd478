//! Node and relationship upserts.
//!
//! Both operations write through a caller-provided transaction and never
//! commit it. Running them twice with the same input leaves the store as
//! running them once.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::model::{EdgeId, NodeId};
use crate::registry::MirrorRegistry;
use crate::relationship::Relationship;
use crate::storage::StorageBackend;
use crate::{Error, Result};

/// Edges written by one relationship upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipOutcome {
    pub forward: EdgeId,
    /// `None` for one-way types. Equal to `forward` for the self-loop of a
    /// symmetric type, which is its own mirror.
    pub mirror: Option<EdgeId>,
}

impl RelationshipOutcome {
    pub fn is_mirrored(&self) -> bool {
        self.mirror.is_some()
    }
}

/// Upsert one entity, then each of `relationships` in order.
///
/// The node is matched by `(label, id)` and every other field is set,
/// whether or not the node existed. A failing relationship stops the rest;
/// what was written before it stays in `tx`.
pub async fn upsert_node<B, E>(
    backend: &B,
    tx: &mut B::Tx,
    registry: &MirrorRegistry,
    entity: &E,
    relationships: &[Relationship],
) -> Result<NodeId>
where
    B: StorageBackend,
    E: Entity + Sync,
{
    entity.validate()?;
    let properties = entity.properties();
    let id = backend
        .merge_node(tx, E::TYPE, entity.id(), properties.fields())
        .await?;
    tracing::debug!(label = %E::TYPE, id = entity.id(), fields = properties.len(), "upserted node");

    for rel in relationships {
        upsert_relationship(backend, tx, registry, rel).await?;
    }
    Ok(id)
}

/// Upsert a directed edge and, when its type is registered, the mirror edge.
///
/// Missing endpoints are created as placeholders carrying only their key.
/// The mirror is written with the same properties and is not itself looked
/// up in the registry. If the mirror write fails after the forward write
/// succeeded, the result is `Error::PartialMirrorFailure`.
pub async fn upsert_relationship<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    registry: &MirrorRegistry,
    rel: &Relationship,
) -> Result<RelationshipOutcome> {
    let (key, props) = rel.validate(registry)?;

    let forward = backend.merge_edge(tx, &key, &props).await?;
    tracing::debug!(edge = %key, props = props.len(), "upserted relationship");

    let Some(mirror_type) = registry.mirror_of(&key.rel_type) else {
        return Ok(RelationshipOutcome { forward, mirror: None });
    };

    let mirror_key = key.reversed(mirror_type);
    match backend.merge_edge(tx, &mirror_key, &props).await {
        Ok(mirror) => {
            tracing::debug!(edge = %mirror_key, "upserted mirror");
            Ok(RelationshipOutcome { forward, mirror: Some(mirror) })
        }
        Err(source) => {
            tracing::warn!(edge = %key, mirror = mirror_type, error = %source, "mirror write failed");
            Err(Error::PartialMirrorFailure {
                rel_type: key.rel_type.clone(),
                from_id: key.from_id.clone(),
                to_id: key.to_id.clone(),
                mirror_type: mirror_type.to_string(),
                source: Box::new(source),
            })
        }
    }
}
