//! JOIN clause management and the join engine: side-qualified field
//! resolution, conventional foreign-key inference, and SQL assembly for
//! two-entity joins.

use std::collections::HashSet;

use crate::entity::{snake_case, EntityDescriptor};
use crate::error::{DataAccessError, FieldViolation, Result};
use crate::query::builder::{QueryBuilder, SelectQuery};
use crate::query::conditions::ConditionValue;
use crate::query::options::{QueryOptions, SortDirection};

/// Supported SQL JOIN flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl JoinType {
    pub fn to_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
        }
    }
}

/// A rendered JOIN clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: String,
    pub on_condition: String,
}

impl Join {
    pub fn new(join_type: JoinType, table: impl Into<String>, on_condition: impl Into<String>) -> Self {
        Self {
            join_type,
            table: table.into(),
            on_condition: on_condition.into(),
        }
    }

    pub fn inner(table: impl Into<String>, on_condition: impl Into<String>) -> Self {
        Self::new(JoinType::Inner, table, on_condition)
    }

    pub fn left(table: impl Into<String>, on_condition: impl Into<String>) -> Self {
        Self::new(JoinType::Left, table, on_condition)
    }

    pub fn right(table: impl Into<String>, on_condition: impl Into<String>) -> Self {
        Self::new(JoinType::Right, table, on_condition)
    }

    /// Convert to SQL string
    pub fn to_sql(&self) -> String {
        format!("{} {} ON {}", self.join_type.to_sql(), self.table, self.on_condition)
    }
}

/// A field reference that may be qualified with an entity name. Bare
/// references default to the left side of the join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub qualifier: Option<String>,
    pub name: String,
}

impl FieldRef {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
        }
    }

    pub fn of(entity: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            qualifier: Some(entity.into()),
            name: name.into(),
        }
    }
}

/// Where-conditions for join operations: qualified field plus the same
/// operator table as single-entity queries.
pub type JoinConditions = Vec<(FieldRef, ConditionValue)>;

/// Infer the conventional join fields when the caller supplies none: the
/// left entity's primary key against `"<snake_case(left)>_id"` on the right.
/// A heuristic, not a schema-derived fact; non-conventional schemas must
/// pass `join_on` explicitly.
pub fn infer_join_fields(left: &EntityDescriptor) -> (String, String) {
    (
        left.primary_key.clone(),
        format!("{}_id", snake_case(&left.name)),
    )
}

/// Resolve a possibly-qualified field reference against the two joined
/// entities, producing a `table.column` expression. A qualifier naming
/// neither side is a validation error.
pub fn resolve_field(
    left: &EntityDescriptor,
    right: &EntityDescriptor,
    field: &FieldRef,
) -> Result<String> {
    match &field.qualifier {
        None => Ok(format!("{}.{}", left.name, field.name)),
        Some(qualifier) if *qualifier == left.name => {
            Ok(format!("{}.{}", left.name, field.name))
        }
        Some(qualifier) if *qualifier == right.name => {
            Ok(format!("{}.{}", right.name, field.name))
        }
        Some(qualifier) => Err(DataAccessError::validation(
            &left.name,
            vec![FieldViolation::new(
                field.name.clone(),
                format!(
                    "qualifier '{}' names neither '{}' nor '{}'",
                    qualifier, left.name, right.name
                ),
            )],
        )),
    }
}

/// Build the select list. An empty request selects every declared field of
/// both entities. Output column names collide when both sides declare the
/// same field; the second occurrence is aliased `<entity>_<field>`.
fn resolve_select(
    left: &EntityDescriptor,
    right: &EntityDescriptor,
    select: &[FieldRef],
) -> Result<Vec<String>> {
    let requested: Vec<(String, String)> = if select.is_empty() {
        left.fields
            .iter()
            .map(|f| (left.name.clone(), f.name.clone()))
            .chain(
                right
                    .fields
                    .iter()
                    .map(|f| (right.name.clone(), f.name.clone())),
            )
            .collect()
    } else {
        select
            .iter()
            .map(|field| {
                resolve_field(left, right, field).map(|qualified| {
                    let (table, column) =
                        qualified.split_once('.').unwrap_or(("", qualified.as_str()));
                    (table.to_string(), column.to_string())
                })
            })
            .collect::<Result<Vec<_>>>()?
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut items = Vec::with_capacity(requested.len());
    for (table, column) in requested {
        if seen.insert(column.clone()) {
            items.push(format!("{table}.{column}"));
        } else {
            let alias = format!("{table}_{column}");
            seen.insert(alias.clone());
            items.push(format!("{table}.{column} AS {alias}"));
        }
    }
    Ok(items)
}

/// Assemble a two-entity join query: ON clause from explicit or inferred
/// join fields, side-resolved select list and where-conditions, left-pk
/// default ordering, and pagination.
pub fn entity_join(
    join_type: JoinType,
    left: &EntityDescriptor,
    right: &EntityDescriptor,
    select: &[FieldRef],
    conditions: &JoinConditions,
    options: &QueryOptions,
) -> Result<SelectQuery> {
    let (left_field, right_field) = options
        .join_on
        .clone()
        .unwrap_or_else(|| infer_join_fields(left));

    let on_condition = format!(
        "{}.{} = {}.{}",
        left.name, left_field, right.name, right_field
    );

    let select_items = resolve_select(left, right, select)?;
    let mut builder = QueryBuilder::new(&left.name)
        .select_items(select_items)
        .join(Join::new(join_type, &right.name, &on_condition));

    for (field, value) in conditions {
        let qualified = resolve_field(left, right, field)?;
        if let Some(condition) = value.to_condition(&qualified) {
            builder = builder.condition(condition);
        }
    }

    if options.order_by.is_empty() {
        builder = builder.order_by(
            &format!("{}.{}", left.name, left.primary_key),
            SortDirection::Asc,
        );
    } else {
        for (field, direction) in &options.order_by {
            let qualified = if field.contains('.') {
                field.clone()
            } else {
                format!("{}.{}", left.name, field)
            };
            builder = builder.order_by(&qualified, *direction);
        }
    }

    Ok(builder
        .limit_opt(options.limit)
        .offset_opt(options.offset)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{FieldDescriptor, FieldKind};
    use serde_json::json;

    fn widget() -> EntityDescriptor {
        EntityDescriptor::new("widget", "id")
            .field(FieldDescriptor::optional("id", FieldKind::Integer))
            .field(FieldDescriptor::required("name", FieldKind::Text))
    }

    fn order() -> EntityDescriptor {
        EntityDescriptor::new("order", "id")
            .field(FieldDescriptor::optional("id", FieldKind::Integer))
            .field(FieldDescriptor::optional("widget_id", FieldKind::Integer))
            .field(FieldDescriptor::optional("name", FieldKind::Text))
    }

    #[test]
    fn test_join_to_sql() {
        let join = Join::inner("order", "widget.id = order.widget_id");
        assert_eq!(
            join.to_sql(),
            "INNER JOIN order ON widget.id = order.widget_id"
        );
        let join = Join::right("order", "widget.id = order.widget_id");
        assert_eq!(
            join.to_sql(),
            "RIGHT JOIN order ON widget.id = order.widget_id"
        );
    }

    #[test]
    fn test_inference_uses_conventional_foreign_key() {
        let (left_field, right_field) = infer_join_fields(&widget());
        assert_eq!(left_field, "id");
        assert_eq!(right_field, "widget_id");
    }

    #[test]
    fn test_inferred_join_matches_explicit_join() {
        let inferred = entity_join(
            JoinType::Inner,
            &widget(),
            &order(),
            &[],
            &Vec::new(),
            &QueryOptions::new(),
        )
        .unwrap();

        let explicit = entity_join(
            JoinType::Inner,
            &widget(),
            &order(),
            &[],
            &Vec::new(),
            &QueryOptions::new().join_on("id", "widget_id"),
        )
        .unwrap();

        assert_eq!(inferred.sql, explicit.sql);
    }

    #[test]
    fn test_bare_fields_resolve_to_left_side() {
        let resolved = resolve_field(&widget(), &order(), &FieldRef::bare("name")).unwrap();
        assert_eq!(resolved, "widget.name");
    }

    #[test]
    fn test_unknown_qualifier_is_rejected() {
        let err = resolve_field(&widget(), &order(), &FieldRef::of("gadget", "name")).unwrap_err();
        match err {
            DataAccessError::Validation { violations, .. } => {
                assert!(violations[0].message.contains("gadget"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_select_collisions_are_aliased() {
        let sql = entity_join(
            JoinType::Left,
            &widget(),
            &order(),
            &[
                FieldRef::bare("name"),
                FieldRef::of("order", "name"),
            ],
            &Vec::new(),
            &QueryOptions::new(),
        )
        .unwrap()
        .sql;

        assert!(sql.contains("widget.name"));
        assert!(sql.contains("order.name AS order_name"));
    }

    #[test]
    fn test_default_select_covers_both_entities() {
        let sql = entity_join(
            JoinType::Inner,
            &widget(),
            &order(),
            &[],
            &Vec::new(),
            &QueryOptions::new(),
        )
        .unwrap()
        .sql;

        assert!(sql.contains("widget.id"));
        assert!(sql.contains("order.widget_id"));
        // colliding id/name columns from the right side get aliases
        assert!(sql.contains("order.id AS order_id"));
        assert!(sql.contains("order.name AS order_name"));
    }

    #[test]
    fn test_where_conditions_translate_with_qualification() {
        let conditions: JoinConditions = vec![
            (FieldRef::bare("name"), ConditionValue::Eq(json!("gear"))),
            (FieldRef::of("order", "widget_id"), ConditionValue::NotNull),
        ];
        let sql = entity_join(
            JoinType::Inner,
            &widget(),
            &order(),
            &[],
            &conditions,
            &QueryOptions::new(),
        )
        .unwrap()
        .sql;

        assert!(sql.contains("widget.name = 'gear'"));
        assert!(sql.contains("order.widget_id IS NOT NULL"));
    }

    #[test]
    fn test_default_ordering_is_left_primary_key() {
        let sql = entity_join(
            JoinType::Inner,
            &widget(),
            &order(),
            &[],
            &Vec::new(),
            &QueryOptions::new(),
        )
        .unwrap()
        .sql;
        assert!(sql.contains("ORDER BY widget.id ASC"));
    }
}
