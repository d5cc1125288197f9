//! # Filter Module
//!
//! Compiles a [`FilterDefinition`] into a [`FilterPredicate`] over
//! [`FileMetadata`](crate::core::scanner::FileMetadata).
//!
//! Each condition category is toggled by its own `selected` flag. Enabled
//! categories are ANDed; disabled ones never reject a file. Operators and
//! units are kept as strings in the definition so a typo surfaces as a
//! [`ConfigError`](crate::error::ConfigError) from [`FilterPredicateBuilder::build`]
//! rather than being silently defaulted.
//!
//! A selected name-include condition needs at least one non-blank
//! fragment; an empty list is rejected as an invalid `include` value.
//!
//! ## Example
//! ```rust,ignore
//! let predicate = FilterPredicateBuilder::new().build(&definition)?;
//! if predicate.matches(&metadata) { /* ... */ }
//! ```

mod content;
mod predicate;

pub use content::ContentOperator;
pub use predicate::{
    Comparison, DateUnit, FilterPredicate, FilterPredicateBuilder, SizeUnit,
    DEFAULT_CONTENT_READ_LIMIT,
};

use serde::{Deserialize, Deserializer, Serialize};

/// A named set of independently toggled conditions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterDefinition {
    pub id: u64,
    pub name: String,
    pub size: SizeCondition,
    pub created: DateCondition,
    pub modified: DateCondition,
    pub accessed: DateCondition,
    pub archive: AttributeCondition,
    pub hidden: AttributeCondition,
    pub read_only: AttributeCondition,
    pub system: AttributeCondition,
    pub temporary: AttributeCondition,
    pub include: IncludeCondition,
    pub content: ContentCondition,
}

/// File length compared against `value × unit`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeCondition {
    pub selected: bool,
    pub operator: String,
    pub value: String,
    pub unit: String,
}

/// File age compared against `value × unit`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DateCondition {
    pub selected: bool,
    pub operator: String,
    pub value: String,
    pub unit: String,
}

/// Expected yes/no state of one attribute bit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeCondition {
    pub selected: bool,
    pub expected: YesOrNo,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YesOrNo {
    #[default]
    No,
    Yes,
}

impl YesOrNo {
    pub fn as_bool(self) -> bool {
        matches!(self, YesOrNo::Yes)
    }
}

/// Name fragments, any of which must occur in the file name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeCondition {
    pub selected: bool,
    #[serde(deserialize_with = "list_or_comma_separated")]
    pub patterns: Vec<String>,
}

/// Text the file content is matched against
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentCondition {
    pub selected: bool,
    pub operator: String,
    pub text: String,
}

/// Accept `["a", "b"]` as well as `"a, b"`.
fn list_or_comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::List(items) => items,
        Raw::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    })
}
