/// LIMIT/OFFSET rendering for SQL queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Pagination {
    /// Create pagination with only limit
    pub fn limit_only(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: None,
        }
    }

    /// Create pagination with only offset
    pub fn offset_only(offset: u32) -> Self {
        Self {
            limit: None,
            offset: Some(offset),
        }
    }

    /// Create pagination with both limit and offset
    pub fn limit_offset(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    /// Build from optional parts; `None` when neither is set.
    pub fn from_parts(limit: Option<u32>, offset: Option<u32>) -> Option<Self> {
        if limit.is_none() && offset.is_none() {
            return None;
        }
        Some(Self { limit, offset })
    }

    /// Convert to SQL string
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_only() {
        let pagination = Pagination::limit_only(5);
        assert_eq!(pagination.to_sql(), " LIMIT 5");
    }

    #[test]
    fn test_offset_only() {
        let pagination = Pagination::offset_only(15);
        assert_eq!(pagination.to_sql(), " OFFSET 15");
    }

    #[test]
    fn test_limit_and_offset() {
        let pagination = Pagination::limit_offset(10, 30);
        assert_eq!(pagination.to_sql(), " LIMIT 10 OFFSET 30");
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(Pagination::from_parts(None, None), None);
        assert_eq!(
            Pagination::from_parts(Some(10), None),
            Some(Pagination::limit_only(10))
        );
        assert_eq!(
            Pagination::from_parts(Some(10), Some(5)),
            Some(Pagination::limit_offset(10, 5))
        );
    }
}
