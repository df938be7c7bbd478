//! Constraint registrar.
//!
//! Declares the uniqueness constraints for the entity types of selected
//! layers. Safe to run any number of times: a constraint that is already
//! in place is reported, not raised.

use serde::{Deserialize, Serialize};

use crate::entity::Layer;
use crate::storage::{ConstraintSpec, StorageBackend};
use crate::{Error, Result};

/// Outcome of a constraint or index run, by schema object name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

impl SchemaReport {
    /// Objects now in place, whether created by this run or not.
    pub fn total(&self) -> usize {
        self.created.len() + self.existing.len()
    }

    pub fn merge(&mut self, other: SchemaReport) {
        self.created.extend(other.created);
        self.existing.extend(other.existing);
    }
}

/// The constraints for the given layers (`None` = every layer), in layer
/// order.
pub fn constraints_for(layers: Option<&[Layer]>) -> Vec<ConstraintSpec> {
    let layers = layers.unwrap_or(&Layer::ALL);
    let mut specs = Vec::new();
    for layer in Layer::ALL.into_iter().filter(|l| layers.contains(l)) {
        for entity_type in layer.entity_types() {
            for key in entity_type.unique_keys() {
                specs.push(ConstraintSpec::unique(entity_type, *key));
            }
        }
    }
    specs
}

/// Ensure every constraint for the given layers exists.
///
/// `ConstraintAlreadyExists` counts as existing. Any other error stops the
/// run and propagates; constraints declared before it stay in place.
pub async fn create_constraints<B: StorageBackend>(
    backend: &B,
    layers: Option<&[Layer]>,
) -> Result<SchemaReport> {
    let mut report = SchemaReport::default();

    for spec in constraints_for(layers) {
        let name = spec.name();
        match backend.create_constraint(&spec).await {
            Ok(()) => {
                tracing::debug!(constraint = %name, "created constraint");
                report.created.push(name);
            }
            Err(Error::ConstraintAlreadyExists { .. }) => {
                tracing::debug!(constraint = %name, "constraint already exists");
                report.existing.push(name);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use crate::storage::MemoryBackend;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_all_layers() {
        let specs = constraints_for(None);
        // 13 id constraints plus Commit.sha
        assert_eq!(specs.len(), 14);
        assert!(specs.contains(&ConstraintSpec::unique(EntityType::Commit, "sha")));
    }

    #[test]
    fn test_selected_layers_keep_layer_order() {
        let names: Vec<_> = constraints_for(Some(&[Layer::Commits, Layer::People]))
            .iter()
            .map(ConstraintSpec::name)
            .collect();
        assert_eq!(
            names,
            vec![
                "person_id",
                "team_id",
                "identity_mapping_id",
                "commit_id",
                "commit_sha",
                "file_id",
            ]
        );
    }

    #[test]
    fn test_empty_selection() {
        assert!(constraints_for(Some(&[])).is_empty());
    }

    #[tokio::test]
    async fn test_second_run_reports_existing() {
        let db = MemoryBackend::new();
        let first = create_constraints(&db, Some(&[Layer::People])).await.unwrap();
        assert_eq!(first.created.len(), 3);

        let second = create_constraints(&db, Some(&[Layer::People])).await.unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.existing, first.created);
        assert_eq!(db.constraints().len(), 3);
    }

    #[test]
    fn test_report_merge() {
        let mut a = SchemaReport { created: vec!["a".into()], existing: vec![] };
        a.merge(SchemaReport { created: vec![], existing: vec!["b".into()] });
        assert_eq!(a.total(), 2);
    }
}
