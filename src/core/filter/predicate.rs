//! Filter compilation and evaluation.

use super::content::{ContentMatcher, ContentOperator};
use super::{AttributeCondition, DateCondition, FilterDefinition, IncludeCondition, SizeCondition};
use crate::core::rules::pattern::NameFragment;
use crate::core::scanner::{FileAttributes, FileMetadata};
use crate::error::ConfigError;
use std::time::SystemTime;

/// Default bound on how much of a file the content condition reads
pub const DEFAULT_CONTENT_READ_LIMIT: usize = 1024 * 1024;

/// Comparison operator shared by size and date conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    LessThan,
    LessOrEqual,
    Equal,
    GreaterOrEqual,
    GreaterThan,
    NotEqual,
}

impl Comparison {
    pub fn parse(field: &'static str, value: &str) -> Result<Self, ConfigError> {
        Ok(match value.trim().to_lowercase().as_str() {
            "<" | "lt" | "less_than" => Self::LessThan,
            "<=" | "le" => Self::LessOrEqual,
            "=" | "==" | "eq" | "equal" => Self::Equal,
            ">=" | "ge" => Self::GreaterOrEqual,
            ">" | "gt" | "greater_than" => Self::GreaterThan,
            "!=" | "≠" | "<>" | "ne" | "not_equal" => Self::NotEqual,
            _ => {
                return Err(ConfigError::UnknownOperator {
                    field,
                    value: value.to_string(),
                })
            }
        })
    }

    pub fn apply<T: PartialOrd>(self, actual: T, expected: T) -> bool {
        match self {
            Self::LessThan => actual < expected,
            Self::LessOrEqual => actual <= expected,
            Self::Equal => actual == expected,
            Self::GreaterOrEqual => actual >= expected,
            Self::GreaterThan => actual > expected,
            Self::NotEqual => actual != expected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
}

impl SizeUnit {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        Ok(match value.trim().to_lowercase().as_str() {
            "b" | "byte" | "bytes" => Self::Bytes,
            "kb" | "kilobyte" | "kilobytes" => Self::Kilobytes,
            "mb" | "megabyte" | "megabytes" => Self::Megabytes,
            "gb" | "gigabyte" | "gigabytes" => Self::Gigabytes,
            _ => {
                return Err(ConfigError::UnknownUnit {
                    field: "size",
                    value: value.to_string(),
                })
            }
        })
    }

    pub fn bytes(self) -> u64 {
        match self {
            Self::Bytes => 1,
            Self::Kilobytes => 1024,
            Self::Megabytes => 1024 * 1024,
            Self::Gigabytes => 1024 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DateUnit {
    pub fn parse(field: &'static str, value: &str) -> Result<Self, ConfigError> {
        Ok(match value.trim().to_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => Self::Seconds,
            "m" | "min" | "minute" | "minutes" => Self::Minutes,
            "h" | "hour" | "hours" => Self::Hours,
            "d" | "day" | "days" => Self::Days,
            _ => {
                return Err(ConfigError::UnknownUnit {
                    field,
                    value: value.to_string(),
                })
            }
        })
    }

    pub fn seconds(self) -> u64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 60 * 60,
            Self::Days => 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DateField {
    Created,
    Modified,
    Accessed,
}

impl DateField {
    fn name(self) -> &'static str {
        match self {
            Self::Created => "created date",
            Self::Modified => "modified date",
            Self::Accessed => "accessed date",
        }
    }

    fn read(self, meta: &FileMetadata) -> SystemTime {
        match self {
            Self::Created => meta.created,
            Self::Modified => meta.modified,
            Self::Accessed => meta.accessed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Attribute {
    Archive,
    Hidden,
    ReadOnly,
    System,
    Temporary,
}

impl Attribute {
    fn read(self, attributes: &FileAttributes) -> bool {
        match self {
            Self::Archive => attributes.archive,
            Self::Hidden => attributes.hidden,
            Self::ReadOnly => attributes.read_only,
            Self::System => attributes.system,
            Self::Temporary => attributes.temporary,
        }
    }
}

#[derive(Debug, Clone)]
enum Condition {
    Size {
        comparison: Comparison,
        bytes: f64,
    },
    Age {
        field: DateField,
        comparison: Comparison,
        value: f64,
        unit_seconds: u64,
    },
    Attribute {
        attribute: Attribute,
        expected: bool,
    },
    NameInclude(Vec<NameFragment>),
    Content(ContentMatcher),
}

impl Condition {
    fn evaluate(&self, meta: &FileMetadata, now: SystemTime) -> bool {
        match self {
            Condition::Size { comparison, bytes } => comparison.apply(meta.size as f64, *bytes),
            Condition::Age {
                field,
                comparison,
                value,
                unit_seconds,
            } => {
                let age = now
                    .duration_since(field.read(meta))
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);
                let unit = *unit_seconds as f64;

                match comparison {
                    // Equality is judged in whole elapsed units
                    Comparison::Equal | Comparison::NotEqual => {
                        comparison.apply((age / unit).floor(), value.floor())
                    }
                    _ => comparison.apply(age, value * unit),
                }
            }
            Condition::Attribute {
                attribute,
                expected,
            } => attribute.read(&meta.attributes) == *expected,
            Condition::NameInclude(fragments) => {
                let name = meta.file_name();
                fragments.iter().any(|f| f.matches(&name))
            }
            Condition::Content(matcher) => matcher.matches_file(&meta.path),
        }
    }
}

/// A compiled filter.
///
/// Holds no reference to the [`FilterDefinition`] it came from.
#[derive(Debug, Clone, Default)]
pub struct FilterPredicate {
    conditions: Vec<Condition>,
}

impl FilterPredicate {
    /// A predicate with no conditions; matches every file
    pub fn always() -> Self {
        Self::default()
    }

    /// True when no category was enabled
    pub fn is_trivial(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, meta: &FileMetadata) -> bool {
        self.matches_at(meta, SystemTime::now())
    }

    /// Evaluate with an explicit clock for date conditions
    pub fn matches_at(&self, meta: &FileMetadata, now: SystemTime) -> bool {
        self.conditions.iter().all(|c| c.evaluate(meta, now))
    }
}

/// Compiles filter definitions
#[derive(Debug, Clone)]
pub struct FilterPredicateBuilder {
    content_read_limit: usize,
}

impl Default for FilterPredicateBuilder {
    fn default() -> Self {
        Self {
            content_read_limit: DEFAULT_CONTENT_READ_LIMIT,
        }
    }
}

impl FilterPredicateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_read_limit(mut self, bytes: usize) -> Self {
        self.content_read_limit = bytes.max(1);
        self
    }

    /// Compile every selected condition.
    ///
    /// Cheap stat-level conditions are placed before the content read.
    pub fn build(&self, definition: &FilterDefinition) -> Result<FilterPredicate, ConfigError> {
        let mut conditions = Vec::new();

        if let Some(condition) = build_size(&definition.size)? {
            conditions.push(condition);
        }

        for (field, condition) in [
            (DateField::Created, &definition.created),
            (DateField::Modified, &definition.modified),
            (DateField::Accessed, &definition.accessed),
        ] {
            if let Some(condition) = build_age(field, condition)? {
                conditions.push(condition);
            }
        }

        for (attribute, condition) in [
            (Attribute::Archive, &definition.archive),
            (Attribute::Hidden, &definition.hidden),
            (Attribute::ReadOnly, &definition.read_only),
            (Attribute::System, &definition.system),
            (Attribute::Temporary, &definition.temporary),
        ] {
            if let Some(condition) = build_attribute(attribute, condition) {
                conditions.push(condition);
            }
        }

        if let Some(condition) = build_include(&definition.include)? {
            conditions.push(condition);
        }

        if definition.content.selected {
            let operator = ContentOperator::parse(&definition.content.operator)?;
            conditions.push(Condition::Content(ContentMatcher::new(
                operator,
                &definition.content.text,
                self.content_read_limit,
            )?));
        }

        Ok(FilterPredicate { conditions })
    }
}

fn parse_amount(field: &'static str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| ConfigError::InvalidValue {
            field,
            value: value.to_string(),
        })
}

fn build_size(condition: &SizeCondition) -> Result<Option<Condition>, ConfigError> {
    if !condition.selected {
        return Ok(None);
    }

    let comparison = Comparison::parse("size", &condition.operator)?;
    let unit = SizeUnit::parse(&condition.unit)?;
    let amount = parse_amount("size", &condition.value)?;

    Ok(Some(Condition::Size {
        comparison,
        bytes: (amount * unit.bytes() as f64).round(),
    }))
}

fn build_age(field: DateField, condition: &DateCondition) -> Result<Option<Condition>, ConfigError> {
    if !condition.selected {
        return Ok(None);
    }

    Ok(Some(Condition::Age {
        field,
        comparison: Comparison::parse(field.name(), &condition.operator)?,
        unit_seconds: DateUnit::parse(field.name(), &condition.unit)?.seconds(),
        value: parse_amount(field.name(), &condition.value)?,
    }))
}

fn build_attribute(attribute: Attribute, condition: &AttributeCondition) -> Option<Condition> {
    condition.selected.then(|| Condition::Attribute {
        attribute,
        expected: condition.expected.as_bool(),
    })
}

fn build_include(condition: &IncludeCondition) -> Result<Option<Condition>, ConfigError> {
    if !condition.selected {
        return Ok(None);
    }

    let fragments = condition
        .patterns
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| NameFragment::parse(p))
        .collect::<Result<Vec<_>, _>>()?;
    if fragments.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "include",
            value: condition.patterns.join(","),
        });
    }

    Ok(Some(Condition::NameInclude(fragments)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::{ContentCondition, YesOrNo};
    use std::path::PathBuf;
    use std::time::Duration;

    const DAY: u64 = 24 * 60 * 60;

    fn meta(name: &str, size: u64, age: Duration, now: SystemTime) -> FileMetadata {
        let stamp = now - age;
        FileMetadata {
            path: PathBuf::from("/in").join(name),
            size,
            created: stamp,
            modified: stamp,
            accessed: stamp,
            attributes: FileAttributes::default(),
        }
    }

    fn size(op: &str, value: &str, unit: &str) -> SizeCondition {
        SizeCondition {
            selected: true,
            operator: op.into(),
            value: value.into(),
            unit: unit.into(),
        }
    }

    fn date(op: &str, value: &str, unit: &str) -> DateCondition {
        DateCondition {
            selected: true,
            operator: op.into(),
            value: value.into(),
            unit: unit.into(),
        }
    }

    #[test]
    fn all_disabled_is_always_true() {
        let now = SystemTime::now();
        let predicate = FilterPredicateBuilder::new()
            .build(&FilterDefinition::default())
            .unwrap();

        assert!(predicate.is_trivial());
        assert!(predicate.matches_at(&meta("a", 0, Duration::ZERO, now), now));
        assert!(predicate.matches_at(&meta("b.iso", 1 << 40, Duration::from_secs(10 * DAY), now), now));
    }

    #[test]
    fn disabled_categories_ignore_bad_values() {
        let definition = FilterDefinition {
            size: SizeCondition {
                selected: false,
                operator: "??".into(),
                value: "lots".into(),
                unit: "TB".into(),
            },
            ..Default::default()
        };
        assert!(FilterPredicateBuilder::new().build(&definition).is_ok());
    }

    #[test]
    fn size_compares_in_units() {
        let now = SystemTime::now();
        let definition = FilterDefinition {
            size: size(">=", "1.5", "KB"),
            ..Default::default()
        };
        let predicate = FilterPredicateBuilder::new().build(&definition).unwrap();

        assert!(predicate.matches_at(&meta("big", 1536, Duration::ZERO, now), now));
        assert!(!predicate.matches_at(&meta("small", 1535, Duration::ZERO, now), now));
    }

    #[test]
    fn every_operator_is_supported() {
        let now = SystemTime::now();
        let file = meta("f", 100, Duration::ZERO, now);
        let cases = [
            ("<", "101", true),
            ("<=", "100", true),
            ("=", "100", true),
            (">=", "100", true),
            (">", "99", true),
            ("≠", "100", false),
            ("!=", "5", true),
        ];

        for (op, value, expected) in cases {
            let definition = FilterDefinition {
                size: size(op, value, "B"),
                ..Default::default()
            };
            let predicate = FilterPredicateBuilder::new().build(&definition).unwrap();
            assert_eq!(predicate.matches_at(&file, now), expected, "operator {op}");
        }
    }

    #[test]
    fn unknown_unit_fails_fast() {
        let definition = FilterDefinition {
            size: size(">", "1", "TB"),
            ..Default::default()
        };
        let error = FilterPredicateBuilder::new().build(&definition).unwrap_err();
        assert!(matches!(error, ConfigError::UnknownUnit { field: "size", .. }));
    }

    #[test]
    fn unknown_date_operator_fails_fast() {
        let definition = FilterDefinition {
            modified: date("about", "3", "days"),
            ..Default::default()
        };
        let error = FilterPredicateBuilder::new().build(&definition).unwrap_err();
        assert!(matches!(error, ConfigError::UnknownOperator { .. }));
    }

    #[test]
    fn non_numeric_value_fails_fast() {
        let definition = FilterDefinition {
            created: date(">", "three", "days"),
            ..Default::default()
        };
        let error = FilterPredicateBuilder::new().build(&definition).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn older_than_uses_file_age() {
        let now = SystemTime::now();
        let definition = FilterDefinition {
            modified: date(">", "3", "days"),
            ..Default::default()
        };
        let predicate = FilterPredicateBuilder::new().build(&definition).unwrap();

        assert!(predicate.matches_at(&meta("old", 0, Duration::from_secs(4 * DAY), now), now));
        assert!(!predicate.matches_at(&meta("new", 0, Duration::from_secs(2 * DAY), now), now));
    }

    #[test]
    fn date_equality_uses_whole_units() {
        let now = SystemTime::now();
        let definition = FilterDefinition {
            accessed: date("=", "2", "hours"),
            ..Default::default()
        };
        let predicate = FilterPredicateBuilder::new().build(&definition).unwrap();

        assert!(predicate.matches_at(&meta("a", 0, Duration::from_secs(2 * 3600 + 1800), now), now));
        assert!(!predicate.matches_at(&meta("b", 0, Duration::from_secs(3 * 3600), now), now));
    }

    #[test]
    fn attributes_compare_against_expectation() {
        let now = SystemTime::now();
        let definition = FilterDefinition {
            hidden: AttributeCondition {
                selected: true,
                expected: YesOrNo::No,
            },
            system: AttributeCondition {
                selected: true,
                expected: YesOrNo::No,
            },
            ..Default::default()
        };
        let predicate = FilterPredicateBuilder::new().build(&definition).unwrap();

        let visible = meta("visible.txt", 1, Duration::ZERO, now);
        let mut hidden = meta(".hidden", 1, Duration::ZERO, now);
        hidden.attributes.hidden = true;

        assert!(predicate.matches_at(&visible, now));
        assert!(!predicate.matches_at(&hidden, now));
    }

    #[test]
    fn include_is_any_of_and_combines_with_and() {
        let now = SystemTime::now();
        let definition = FilterDefinition {
            include: IncludeCondition {
                selected: true,
                patterns: vec!["INVOICE".into(), "receipt".into()],
            },
            size: size("<", "1", "KB"),
            ..Default::default()
        };
        let predicate = FilterPredicateBuilder::new().build(&definition).unwrap();

        assert!(predicate.matches_at(&meta("march-invoice.pdf", 10, Duration::ZERO, now), now));
        assert!(predicate.matches_at(&meta("Receipt_01.png", 10, Duration::ZERO, now), now));
        assert!(!predicate.matches_at(&meta("march-invoice.pdf", 4096, Duration::ZERO, now), now));
        assert!(!predicate.matches_at(&meta("notes.txt", 10, Duration::ZERO, now), now));
    }

    #[test]
    fn selected_include_without_fragments_is_rejected() {
        let definition = FilterDefinition {
            include: IncludeCondition {
                selected: true,
                patterns: vec!["  ".into(), String::new()],
            },
            ..Default::default()
        };
        let error = FilterPredicateBuilder::new().build(&definition).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue { field: "include", .. }));
    }

    #[test]
    fn content_condition_reads_the_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("memo.txt");
        std::fs::write(&path, "Meeting moved to Friday").unwrap();

        let definition = FilterDefinition {
            content: ContentCondition {
                selected: true,
                operator: "string".into(),
                text: "friday".into(),
            },
            ..Default::default()
        };
        let predicate = FilterPredicateBuilder::new().build(&definition).unwrap();

        let file = FileMetadata::from_path(&path).unwrap();
        assert!(predicate.matches(&file));
    }
}
