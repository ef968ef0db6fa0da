pub mod types;
pub mod schema;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod matcher;
pub mod engine;

pub use types::*;
pub use schema::{camel_to_snake, FieldDef, FieldKind, FieldSchema};
pub use filter::Query;
pub use filter_where::FilterParser;
pub use filter_order::SortParser;
pub use engine::QueryEngine;
