//! Core query builder: assembles SELECT statements from translated
//! conditions, joins, ordering, and pagination. The built [`SelectQuery`]
//! is the storage-native form handed to the storage collaborator.

use crate::entity::EntityDescriptor;
use crate::query::conditions::{Condition, Conditions};
use crate::query::joins::Join;
use crate::query::options::{QueryOptions, SortDirection};
use crate::query::pagination::Pagination;

/// A fully-built, ready-to-execute select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub sql: String,
}

/// Fluent builder for select statements over named entities.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    base_table: String,
    select_fields: Vec<String>,
    joins: Vec<Join>,
    conditions: Vec<Condition>,
    order_by: Vec<String>,
    pagination: Option<Pagination>,
}

impl QueryBuilder {
    /// Create a new query builder for the given table
    pub fn new(table: &str) -> Self {
        Self {
            base_table: table.to_string(),
            select_fields: vec!["*".to_string()],
            joins: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            pagination: None,
        }
    }

    /// Replace the select list with pre-rendered expressions.
    pub fn select_items(mut self, items: Vec<String>) -> Self {
        if !items.is_empty() {
            self.select_fields = items;
        }
        self
    }

    /// Add a JOIN clause
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Add a single translated condition.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add every condition from a declarative map (no-ops already dropped).
    pub fn conditions(mut self, conditions: &Conditions) -> Self {
        self.conditions.extend(conditions.to_conditions());
        self
    }

    /// Add ORDER BY clause
    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order_by.push(format!("{} {}", field, direction.to_sql()));
        self
    }

    /// Add LIMIT clause
    pub fn limit(mut self, limit: u32) -> Self {
        let pagination = self.pagination.get_or_insert_with(Pagination::default);
        pagination.limit = Some(limit);
        self
    }

    /// Add OFFSET clause
    pub fn offset(mut self, offset: u32) -> Self {
        let pagination = self.pagination.get_or_insert_with(Pagination::default);
        pagination.offset = Some(offset);
        self
    }

    pub fn limit_opt(self, limit: Option<u32>) -> Self {
        match limit {
            Some(limit) => self.limit(limit),
            None => self,
        }
    }

    pub fn offset_opt(self, offset: Option<u32>) -> Self {
        match offset {
            Some(offset) => self.offset(offset),
            None => self,
        }
    }

    /// Build the complete SQL query string
    pub fn build_sql(&self) -> String {
        let mut sql = String::new();

        sql.push_str("SELECT ");
        sql.push_str(&self.select_fields.join(", "));
        sql.push_str(&format!(" FROM {}", self.base_table));

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql());
        }

        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            let parts: Vec<String> = self.conditions.iter().map(|c| c.to_sql()).collect();
            sql.push_str(&parts.join(" AND "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.order_by.join(", ")));
        }

        if let Some(ref pagination) = self.pagination {
            sql.push_str(&pagination.to_sql());
        }

        sql
    }

    pub fn build(&self) -> SelectQuery {
        SelectQuery {
            sql: self.build_sql(),
        }
    }
}

/// Build the select for a single-entity `list`/`find`: operator-table
/// condition translation, caller ordering or ascending-primary-key default,
/// and pagination.
pub fn entity_select(
    entity: &EntityDescriptor,
    conditions: &Conditions,
    options: &QueryOptions,
) -> SelectQuery {
    let mut builder = QueryBuilder::new(&entity.name).conditions(conditions);

    if options.order_by.is_empty() {
        builder = builder.order_by(&entity.primary_key, SortDirection::Asc);
    } else {
        for (field, direction) in &options.order_by {
            builder = builder.order_by(field, *direction);
        }
    }

    builder
        .limit_opt(options.limit)
        .offset_opt(options.offset)
        .build()
}
