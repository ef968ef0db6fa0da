pub mod category;
pub mod line_item;
pub mod payload;
pub mod result;

use serde_json::Value;

use crate::auth::scopes::ScopeSet;
use crate::config::LinkConfig;
use crate::database::Record;
use crate::error::Result;
use crate::filter::FieldSchema;

pub use category::Category;
pub use line_item::LineItem;
pub use result::GradeResult;

/// Gradebook resource types sharing the one record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Category,
    LineItem,
    Result,
}

impl ResourceKind {
    /// Singular wire name, also the store discriminator
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Category => "category",
            ResourceKind::LineItem => "lineItem",
            ResourceKind::Result => "result",
        }
    }

    /// Collection path segment and list envelope name
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Category => "categories",
            ResourceKind::LineItem => "lineItems",
            ResourceKind::Result => "results",
        }
    }

    /// Fields no two active records of this kind may share
    pub fn unique_key(&self) -> Option<&'static [&'static str]> {
        match self {
            ResourceKind::Result => Some(result::UNIQUE_KEY),
            ResourceKind::Category | ResourceKind::LineItem => None,
        }
    }

    /// External names of the unique key, for error messages
    pub fn unique_key_label(&self) -> String {
        let schema = self.schema();
        self.unique_key()
            .unwrap_or_default()
            .iter()
            .map(|name| schema.field(name).map_or(*name, |def| def.external))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn schema(&self) -> &'static FieldSchema {
        match self {
            ResourceKind::Category => &*category::SCHEMA,
            ResourceKind::LineItem => &*line_item::SCHEMA,
            ResourceKind::Result => &*result::SCHEMA,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one resource type: its schema, the scopes its
/// routes require, its business rules and its wire rendering
pub trait Resource: Send + Sync + 'static {
    const KIND: ResourceKind;
    const SCOPES: ScopeSet;

    fn schema() -> &'static FieldSchema {
        Self::KIND.schema()
    }

    /// Cross-field rules. Runs after every create and every update merge.
    fn check_invariants(_record: &Record) -> Result<()> {
        Ok(())
    }

    fn render(record: &Record, links: &LinkConfig) -> Value;
}

/// OneRoster GUIDRef: a typed pointer to another resource
pub fn guid_ref(href: String, sourced_id: &str, ref_type: &str) -> Value {
    serde_json::json!({
        "href": href,
        "sourcedId": sourced_id,
        "type": ref_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(ResourceKind::LineItem.as_str(), "lineItem");
        assert_eq!(ResourceKind::LineItem.collection(), "lineItems");
        assert_eq!(ResourceKind::Result.to_string(), "result");
    }

    #[test]
    fn test_unique_keys() {
        assert_eq!(ResourceKind::Category.unique_key(), None);
        assert_eq!(
            ResourceKind::Result.unique_key_label(),
            "lineItemSourcedId, studentSourcedId"
        );
        for name in ResourceKind::Result.unique_key().unwrap() {
            assert!(ResourceKind::Result.schema().field(name).is_some());
        }
    }

    #[test]
    fn test_every_schema_has_common_fields() {
        for kind in [ResourceKind::Category, ResourceKind::LineItem, ResourceKind::Result] {
            let schema = kind.schema();
            for name in ["sourced_id", "status", "date_last_modified", "metadata"] {
                assert!(schema.field(name).is_some(), "{} lacks {}", kind, name);
            }
        }
    }
}
