//! Association preloading for list/find results.
//!
//! Eager loading is one extra query per named association: all child rows
//! whose foreign key falls in the parent id set, grouped and attached as an
//! array under the association name. Preload queries run under the parent
//! entity's read breaker.

use std::collections::HashMap;

use serde_json::Value;

use crate::cache::record_key;
use crate::entity::EntityDescriptor;
use crate::error::{DataAccessError, FieldViolation, Result};
use crate::query::{Conditions, QueryBuilder};
use crate::repository::facade::Repository;
use crate::resilience::OperationClass;
use crate::storage::Record;

impl Repository {
    pub(crate) async fn apply_preloads(
        &self,
        entity: &EntityDescriptor,
        mut rows: Vec<Record>,
        preload: &[String],
    ) -> Result<Vec<Record>> {
        for name in preload {
            let association = entity.association_named(name).ok_or_else(|| {
                DataAccessError::validation(
                    &entity.name,
                    vec![FieldViolation::new(
                        name.clone(),
                        "is not a known association",
                    )],
                )
            })?;

            let parent_ids: Vec<Value> = rows
                .iter()
                .filter_map(|row| row.get(&entity.primary_key))
                .cloned()
                .collect();

            let children: Vec<Record> = if parent_ids.is_empty() {
                Vec::new()
            } else {
                let conditions =
                    Conditions::new().in_list(&association.foreign_key, parent_ids);
                let query = QueryBuilder::new(&association.table)
                    .conditions(&conditions)
                    .build();
                self.through_breaker(&entity.name, OperationClass::Read, "preload", || async {
                    self.storage().select(entity, &query).await
                })
                .await?
            };

            let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
            for child in children {
                if let Some(fk) = child.get(&association.foreign_key) {
                    grouped
                        .entry(record_key(fk))
                        .or_default()
                        .push(Value::Object(child));
                }
            }

            for row in &mut rows {
                let attached = row
                    .get(&entity.primary_key)
                    .and_then(|pk| grouped.get(&record_key(pk)).cloned())
                    .unwrap_or_default();
                row.insert(association.name.clone(), Value::Array(attached));
            }
        }

        Ok(rows)
    }
}
