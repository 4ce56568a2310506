//! Rules loaded from TOML files.
//!
//! ```toml
//! [[rule]]
//! matches = ["github.com/", "gitlab.com/"]
//! regex = ['^https://[^/]+\.atlassian\.net/']
//! scripts = ["js/review.js"]
//! stylesheets = ["css/review.css"]
//! ```
//!
//! Each `[[rule]]` table is one registration (one match group). All rules in
//! a file share a namespace named after the file's path relative to the rules
//! directory, prefixed with `file:` (`file:sites/mail.toml`), so a file can be
//! reloaded as a unit without touching namespaces registered by other callers.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::injector::PendingDelivery;
use crate::matcher::Matcher;
use crate::registry::{MatchGroupId, Namespace, ResourceBundle, TabCallback};
use crate::resources::ContentResources;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSpec {
    /// Case-insensitive URL substrings.
    pub matches: Vec<String>,
    pub regex: Vec<String>,
    pub scripts: Vec<String>,
    pub stylesheets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl RuleSpec {
    pub fn matchers(&self) -> Result<Vec<Matcher>> {
        let mut matchers: Vec<Matcher> = self.matches.iter().cloned().map(Matcher::from).collect();
        for pattern in &self.regex {
            matchers.push(Matcher::regex(pattern)?);
        }
        Ok(matchers)
    }

    pub fn bundle(&self) -> ResourceBundle {
        let bundle = ResourceBundle::new()
            .with_scripts(self.scripts.iter().cloned())
            .with_stylesheets(self.stylesheets.iter().cloned());
        match &self.namespace {
            Some(namespace) => bundle.with_namespace(namespace.as_str()),
            None => bundle,
        }
    }

    pub fn register(
        &self,
        resources: &ContentResources,
        callback: Option<TabCallback>,
    ) -> Result<MatchGroupId> {
        let mut bundle = self.bundle();
        bundle.callback = callback;
        resources.register_content_resources_for_tab_urls(self.matchers()?, bundle)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RuleFile {
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleSpec>,
}

impl RuleFile {
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|source| Error::RulesFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Namespace prefix for rules that come from files.
pub const FILE_NAMESPACE_PREFIX: &str = "file:";

/// A parsed rules file with every matcher compiled, ready to register.
struct Prepared {
    namespace: Namespace,
    rules: Vec<(Vec<Matcher>, ResourceBundle)>,
}

pub type CallbackFactory = Arc<dyn Fn(&Namespace) -> TabCallback + Send + Sync>;

pub struct RuleLoader {
    resources: ContentResources,
    dir: PathBuf,
    on_loaded: Option<CallbackFactory>,
}

impl RuleLoader {
    pub fn new(resources: ContentResources, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let dir = dir.canonicalize().unwrap_or(dir);
        Self {
            resources,
            dir,
            on_loaded: None,
        }
    }

    /// Gives every file-loaded bundle a completion callback built per namespace.
    pub fn with_callback_factory(mut self, factory: CallbackFactory) -> Self {
        self.on_loaded = Some(factory);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn namespace_for(&self, path: &Path) -> Namespace {
        let relative = path.strip_prefix(&self.dir).unwrap_or(path);
        let name: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Namespace::new(format!("{FILE_NAMESPACE_PREFIX}{}", name.join("/")))
    }

    /// Loads every `*.toml` file under the rules directory. A file that fails
    /// to load is logged and skipped.
    pub fn load_all(&self) -> Result<Vec<Namespace>> {
        if !self.dir.is_dir() {
            info!(dir = %self.dir.display(), "rules directory not found, no file rules loaded");
            return Ok(Vec::new());
        }

        let mut loaded = Vec::new();
        for entry in WalkDir::new(&self.dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_rules_file(e.path()))
        {
            match self.load_file(entry.path()) {
                Ok(count) => {
                    info!(path = %entry.path().display(), rules = count, "loaded rules file");
                    loaded.push(self.namespace_for(entry.path()));
                }
                Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping rules file"),
            }
        }
        Ok(loaded)
    }

    /// Registers every rule in `path` under the file's namespace. Either all
    /// of the file's rules are registered or none are.
    pub fn load_file(&self, path: &Path) -> Result<usize> {
        let prepared = self.prepare(path)?;
        self.install(prepared)
    }

    /// Swaps the file's rules for its current contents and replays the
    /// namespace over the open tabs. A file that no longer parses leaves the
    /// rules already loaded from it in place; a removed file drops them.
    pub async fn reload_file(&self, path: &Path) -> Result<Vec<PendingDelivery>> {
        let namespace = self.namespace_for(path);
        if !path.is_file() {
            self.resources
                .unregister_content_resources_by_namespace(&namespace);
            info!(%namespace, "rules file removed");
            return Ok(Vec::new());
        }

        let prepared = self.prepare(path)?;
        self.resources
            .unregister_content_resources_by_namespace(&namespace);
        let count = self.install(prepared)?;
        info!(%namespace, rules = count, "reloaded rules file");
        self.resources
            .execute_existing_tab_load_matches(Some(&namespace))
            .await
    }

    /// Reads and compiles `path` without touching the registry.
    fn prepare(&self, path: &Path) -> Result<Prepared> {
        let file = RuleFile::parse(path, &fs::read_to_string(path)?)?;
        let namespace = self.namespace_for(path);
        let callback = self.on_loaded.as_ref().map(|factory| factory(&namespace));

        let mut rules = Vec::with_capacity(file.rules.len());
        for spec in &file.rules {
            let matchers = spec.matchers()?;
            if matchers.is_empty() {
                return Err(Error::NoMatchers);
            }
            let mut bundle = spec.bundle().with_namespace(namespace.clone());
            bundle.callback = callback.clone();
            rules.push((matchers, bundle));
        }
        Ok(Prepared { namespace, rules })
    }

    fn install(&self, prepared: Prepared) -> Result<usize> {
        let Prepared { namespace, rules } = prepared;
        let count = rules.len();
        for (matchers, bundle) in rules {
            if let Err(e) = self
                .resources
                .register_content_resources_for_tab_urls(matchers, bundle)
            {
                self.resources
                    .unregister_content_resources_by_namespace(&namespace);
                return Err(e);
            }
        }
        Ok(count)
    }

    /// Watches the rules directory, sending changed rules file paths on `tx`.
    /// The watcher stops when the returned value is dropped.
    pub fn watch(&self, tx: mpsc::UnboundedSender<PathBuf>) -> Result<RecommendedWatcher> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    return;
                }
                for path in event.paths.into_iter().filter(|p| is_rules_file(p)) {
                    let _ = tx.send(path);
                }
            }
            Err(e) => warn!(error = %e, "rules watcher error"),
        })?;
        watcher.watch(&self.dir, RecursiveMode::Recursive)?;
        debug!(dir = %self.dir.display(), "watching rules directory");
        Ok(watcher)
    }
}

/// Collects a burst of change notifications into one set of paths.
pub fn drain_changes(first: PathBuf, rx: &mut mpsc::UnboundedReceiver<PathBuf>) -> BTreeSet<PathBuf> {
    let mut paths = BTreeSet::from([first]);
    while let Ok(path) = rx.try_recv() {
        paths.insert(path);
    }
    paths
}

fn is_rules_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}
