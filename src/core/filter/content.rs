//! Content matching with a bounded read.

use crate::error::ConfigError;
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// How the filter text is compared with the file text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOperator {
    AtLeastOneWord,
    AtLeastOneWordCaseSensitive,
    AllWordsInAnyOrder,
    AllWordsInAnyOrderCaseSensitive,
    RegularExpression,
    String,
    StringCaseSensitive,
}

impl ContentOperator {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let normalized = value.trim().to_lowercase().replace(['-', ' '], "_");
        Ok(match normalized.as_str() {
            "at_least_one_word" => Self::AtLeastOneWord,
            "at_least_one_word_case_sensitive" => Self::AtLeastOneWordCaseSensitive,
            "all_words_in_any_order" => Self::AllWordsInAnyOrder,
            "all_words_in_any_order_case_sensitive" => Self::AllWordsInAnyOrderCaseSensitive,
            "regular_expression" | "regex" => Self::RegularExpression,
            "string" | "contains" => Self::String,
            "string_case_sensitive" => Self::StringCaseSensitive,
            _ => {
                return Err(ConfigError::UnknownOperator {
                    field: "content",
                    value: value.to_string(),
                })
            }
        })
    }

    fn case_sensitive(self) -> bool {
        matches!(
            self,
            Self::AtLeastOneWordCaseSensitive
                | Self::AllWordsInAnyOrderCaseSensitive
                | Self::StringCaseSensitive
                | Self::RegularExpression
        )
    }
}

#[derive(Debug, Clone)]
pub(super) struct ContentMatcher {
    operator: ContentOperator,
    needle: String,
    words: Vec<String>,
    regex: Option<Regex>,
    read_limit: usize,
}

impl ContentMatcher {
    pub(super) fn new(
        operator: ContentOperator,
        text: &str,
        read_limit: usize,
    ) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "content",
                value: text.to_string(),
            });
        }

        let regex = match operator {
            ContentOperator::RegularExpression => {
                Some(Regex::new(text).map_err(|e| ConfigError::InvalidRegex {
                    pattern: text.to_string(),
                    reason: e.to_string(),
                })?)
            }
            _ => None,
        };

        let fold = |s: &str| {
            if operator.case_sensitive() {
                s.to_string()
            } else {
                s.to_lowercase()
            }
        };

        Ok(Self {
            operator,
            needle: fold(text),
            words: text.split_whitespace().map(fold).collect(),
            regex,
            read_limit,
        })
    }

    pub(super) fn matches_file(&self, path: &Path) -> bool {
        match read_text_prefix(path, self.read_limit) {
            Some(text) => self.matches_text(&text),
            None => false,
        }
    }

    pub(super) fn matches_text(&self, text: &str) -> bool {
        if let Some(regex) = &self.regex {
            return regex.is_match(text);
        }

        let haystack = if self.operator.case_sensitive() {
            text.to_string()
        } else {
            text.to_lowercase()
        };

        match self.operator {
            ContentOperator::String | ContentOperator::StringCaseSensitive => {
                haystack.contains(&self.needle)
            }
            ContentOperator::AtLeastOneWord | ContentOperator::AtLeastOneWordCaseSensitive => {
                let content_words: Vec<&str> = split_words(&haystack).collect();
                self.words.iter().any(|w| content_words.contains(&w.as_str()))
            }
            ContentOperator::AllWordsInAnyOrder
            | ContentOperator::AllWordsInAnyOrderCaseSensitive => {
                let content_words: Vec<&str> = split_words(&haystack).collect();
                self.words.iter().all(|w| content_words.contains(&w.as_str()))
            }
            ContentOperator::RegularExpression => false,
        }
    }
}

fn split_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
}

/// Read at most `limit` bytes. Binary (NUL-containing) or unreadable files yield `None`.
fn read_text_prefix(path: &Path, limit: usize) -> Option<String> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "content read skipped");
            return None;
        }
    };

    let mut buffer = Vec::with_capacity(limit.min(64 * 1024));
    if let Err(e) = file.take(limit as u64).read_to_end(&mut buffer) {
        debug!(path = %path.display(), error = %e, "content read failed");
        return None;
    }

    if buffer.contains(&0) {
        return None;
    }

    Some(String::from_utf8_lossy(&buffer).into_owned())
}
