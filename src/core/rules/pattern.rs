//! File name patterns.
//!
//! Literal rule expressions use a small grammar:
//!
//! | Expression        | Meaning                                        |
//! |-------------------|------------------------------------------------|
//! | `invoice`         | name contains "invoice" (case-insensitive)     |
//! | `*.pdf`           | glob over the whole name (case-insensitive)    |
//! | `*.jpg;*.png`     | either alternative (`|` works too)             |
//! | `*.jpg/sea*`      | `*.jpg` but not `sea*`                         |
//! | `#*.tmp`          | exclusion                                      |
//! | `` or `*`         | every file                                     |

use crate::error::ConfigError;
use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

/// One piece of a literal pattern
#[derive(Debug, Clone)]
pub enum NameFragment {
    /// Case-insensitive substring
    Contains(String),
    /// Anchored, case-insensitive glob over the file name
    Glob(GlobMatcher),
}

impl NameFragment {
    pub fn parse(fragment: &str) -> Result<Self, ConfigError> {
        let fragment = fragment.trim();
        if fragment.contains('*') || fragment.contains('?') {
            let glob = GlobBuilder::new(fragment)
                .case_insensitive(true)
                .literal_separator(true)
                .build()
                .map_err(|e| ConfigError::InvalidGlob {
                    pattern: fragment.to_string(),
                    reason: e.kind().to_string(),
                })?;
            Ok(NameFragment::Glob(glob.compile_matcher()))
        } else {
            Ok(NameFragment::Contains(fragment.to_lowercase()))
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            NameFragment::Contains(needle) => file_name.to_lowercase().contains(needle.as_str()),
            NameFragment::Glob(glob) => glob.is_match(file_name),
        }
    }
}

/// An inclusion with an optional carve-out (`include/except`)
#[derive(Debug, Clone)]
pub struct Alternative {
    include: NameFragment,
    except: Option<NameFragment>,
}

impl Alternative {
    fn matches(&self, name: &str) -> bool {
        self.include.matches(name) && !self.except.as_ref().is_some_and(|e| e.matches(name))
    }
}

/// A compiled rule match expression
#[derive(Debug, Clone)]
pub enum NamePattern {
    /// Every file name matches
    Any,
    /// Literal grammar described in the module docs
    Literal {
        includes: Vec<Alternative>,
        excludes: Vec<NameFragment>,
    },
    /// Regular expression searched within the file name
    Regex(Regex),
}

impl NamePattern {
    /// Compile an expression, honouring the rule's `is_regex` flag
    pub fn compile(expression: &str, is_regex: bool) -> Result<Self, ConfigError> {
        if is_regex {
            return Regex::new(expression)
                .map(NamePattern::Regex)
                .map_err(|e| ConfigError::InvalidRegex {
                    pattern: expression.to_string(),
                    reason: e.to_string(),
                });
        }

        let mut includes = Vec::new();
        let mut excludes = Vec::new();

        for part in expression.split([';', '|']) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            if let Some(negated) = part.strip_prefix('#') {
                for piece in negated.split('&').map(str::trim).filter(|p| !p.is_empty()) {
                    excludes.push(NameFragment::parse(piece)?);
                }
                continue;
            }

            let alternative = match part.split_once('/') {
                Some((include, except)) => Alternative {
                    include: NameFragment::parse(include)?,
                    except: Some(NameFragment::parse(except)?),
                },
                None => Alternative {
                    include: NameFragment::parse(part)?,
                    except: None,
                },
            };
            includes.push(alternative);
        }

        if includes.is_empty() && excludes.is_empty() {
            return Ok(NamePattern::Any);
        }

        Ok(NamePattern::Literal { includes, excludes })
    }

    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            NamePattern::Any => true,
            NamePattern::Regex(regex) => regex.is_match(file_name),
            NamePattern::Literal { includes, excludes } => {
                let included =
                    includes.is_empty() || includes.iter().any(|alt| alt.matches(file_name));
                included && !excludes.iter().any(|e| e.matches(file_name))
            }
        }
    }
}
