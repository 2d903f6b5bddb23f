//! # Query Predicate Engine
//!
//! Translates declarative condition maps and option sets into
//! storage-native SQL. Pure and stateless: nothing in this module touches
//! the cache, the breakers, or storage itself.
//!
//! ## Components
//!
//! - [`conditions`] - operator-table condition translation
//! - [`builder`] - SELECT assembly and the [`SelectQuery`] handed to storage
//! - [`joins`] - two-entity join engine with foreign-key inference
//! - [`options`] - ordering/pagination/preload/join options
//! - [`pagination`] - LIMIT/OFFSET rendering

pub mod builder;
pub mod conditions;
pub mod joins;
pub mod options;
pub mod pagination;

pub use builder::{entity_select, QueryBuilder, SelectQuery};
pub use conditions::{Condition, ConditionValue, Conditions};
pub use joins::{entity_join, infer_join_fields, FieldRef, Join, JoinConditions, JoinType};
pub use options::{QueryOptions, SortDirection};
pub use pagination::Pagination;
