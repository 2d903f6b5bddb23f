//! Per-query options: ordering, pagination, eager loading, and explicit
//! join fields. Options serialize in fixed declaration order so they can be
//! part of the canonical query-cache key.

use serde::Serialize;

/// Sort direction for an `order_by` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Recognized option keys for list/find/join operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOptions {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub order_by: Vec<(String, SortDirection)>,
    pub preload: Vec<String>,
    /// Explicit `(left_field, right_field)` pair for join operations.
    /// When absent the join engine infers conventional foreign-key naming.
    pub join_on: Option<(String, String)>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by.push((field.into(), direction));
        self
    }

    pub fn order_asc(self, field: impl Into<String>) -> Self {
        self.order_by(field, SortDirection::Asc)
    }

    pub fn order_desc(self, field: impl Into<String>) -> Self {
        self.order_by(field, SortDirection::Desc)
    }

    pub fn preload(mut self, association: impl Into<String>) -> Self {
        self.preload.push(association.into());
        self
    }

    pub fn join_on(mut self, left_field: impl Into<String>, right_field: impl Into<String>) -> Self {
        self.join_on = Some((left_field.into(), right_field.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates() {
        let options = QueryOptions::new()
            .limit(10)
            .offset(20)
            .order_desc("created_at")
            .preload("tags");

        assert_eq!(options.limit, Some(10));
        assert_eq!(options.offset, Some(20));
        assert_eq!(
            options.order_by,
            vec![("created_at".to_string(), SortDirection::Desc)]
        );
        assert_eq!(options.preload, vec!["tags".to_string()]);
        assert!(options.join_on.is_none());
    }

    #[test]
    fn test_direction_sql() {
        assert_eq!(SortDirection::Asc.to_sql(), "ASC");
        assert_eq!(SortDirection::Desc.to_sql(), "DESC");
    }
}
