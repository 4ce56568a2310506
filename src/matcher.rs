//! URL matchers attached to registered rules.

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};
use crate::tab::Tab;

pub type TabPredicate = Arc<dyn Fn(&Tab) -> bool + Send + Sync>;

/// What a caller hands to registration.
#[derive(Clone)]
pub enum Matcher {
    /// Case-insensitive substring of the URL.
    Literal(String),
    Pattern(Regex),
    /// Arbitrary test over the whole tab, not only its URL.
    Predicate(TabPredicate),
}

impl Matcher {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Compiles `pattern` as a regular expression, failing at registration
    /// time rather than silently never matching.
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|source| Error::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Tab) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Literals become escaped, case-insensitive patterns.
    pub(crate) fn compile(self) -> Result<UrlMatcher> {
        match self {
            Self::Literal(text) => RegexBuilder::new(&regex::escape(&text))
                .case_insensitive(true)
                .build()
                .map(UrlMatcher::Pattern)
                .map_err(|source| Error::InvalidPattern {
                    pattern: text,
                    source,
                }),
            Self::Pattern(regex) => Ok(UrlMatcher::Pattern(regex)),
            Self::Predicate(f) => Ok(UrlMatcher::Predicate(f)),
        }
    }
}

impl From<&str> for Matcher {
    fn from(text: &str) -> Self {
        Self::literal(text)
    }
}

impl From<String> for Matcher {
    fn from(text: String) -> Self {
        Self::Literal(text)
    }
}

impl From<Regex> for Matcher {
    fn from(regex: Regex) -> Self {
        Self::Pattern(regex)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Self::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Normalized matcher as stored in the registry.
#[derive(Clone)]
pub enum UrlMatcher {
    Pattern(Regex),
    Predicate(TabPredicate),
}

impl UrlMatcher {
    pub fn matches(&self, tab: &Tab) -> bool {
        match self {
            Self::Predicate(f) => f(tab),
            Self::Pattern(regex) => tab.url().is_some_and(|url| regex.is_match(url)),
        }
    }
}

impl fmt::Debug for UrlMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
