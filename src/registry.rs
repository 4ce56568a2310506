use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::matcher::{Matcher, UrlMatcher};
use crate::tab::Tab;

pub type TabCallback = Arc<dyn Fn(&Tab) + Send + Sync>;

/// Shared by every rule created in one registration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchGroupId(Uuid);

impl MatchGroupId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MatchGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Namespace {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Namespace {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scripts, stylesheets and the completion hook delivered for a match.
#[derive(Clone, Default)]
pub struct ResourceBundle {
    pub scripts: Vec<String>,
    pub stylesheets: Vec<String>,
    pub callback: Option<TabCallback>,
    pub namespace: Option<Namespace>,
}

impl ResourceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scripts<I, S>(mut self, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts = scripts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stylesheets<I, S>(mut self, stylesheets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stylesheets = stylesheets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Tab) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<Namespace>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

impl fmt::Debug for ResourceBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBundle")
            .field("scripts", &self.scripts)
            .field("stylesheets", &self.stylesheets)
            .field("callback", &self.callback.is_some())
            .field("namespace", &self.namespace)
            .finish()
    }
}

#[derive(Debug)]
pub struct Rule {
    pub matcher: UrlMatcher,
    pub bundle: ResourceBundle,
    pub match_group: MatchGroupId,
}

impl Rule {
    pub fn matches(&self, tab: &Tab) -> bool {
        self.matcher.matches(tab)
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.bundle.namespace.as_ref()
    }

    pub fn in_namespace(&self, namespace: &Namespace) -> bool {
        self.namespace() == Some(namespace)
    }
}

/// Ordered rule list. Insertion order is resolution order and duplicates are
/// kept as independent rules.
#[derive(Debug, Default)]
pub struct Registry {
    rules: Vec<Arc<Rule>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one rule per matcher, all sharing a fresh match group.
    ///
    /// Every matcher is compiled before anything is stored, so a bad pattern
    /// leaves the registry untouched.
    pub fn register<I>(&mut self, matchers: I, bundle: ResourceBundle) -> Result<MatchGroupId>
    where
        I: IntoIterator,
        I::Item: Into<Matcher>,
    {
        let compiled = matchers
            .into_iter()
            .map(|m| Into::<Matcher>::into(m).compile())
            .collect::<Result<Vec<_>>>()?;
        if compiled.is_empty() {
            return Err(Error::NoMatchers);
        }

        let match_group = MatchGroupId::generate();
        self.rules.extend(compiled.into_iter().map(|matcher| {
            Arc::new(Rule {
                matcher,
                bundle: bundle.clone(),
                match_group,
            })
        }));
        Ok(match_group)
    }

    /// Removes every rule tagged with `namespace`, returning how many went.
    pub fn unregister_namespace(&mut self, namespace: &Namespace) -> usize {
        let before = self.rules.len();
        self.rules.retain(|rule| !rule.in_namespace(namespace));
        before - self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.iter()
    }

    /// Cheap copy of the rule list so matching can run without the lock.
    pub fn snapshot(&self) -> Vec<Arc<Rule>> {
        self.rules.clone()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }
}
