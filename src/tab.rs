use std::fmt;

use serde::{Deserialize, Serialize};

pub type TabId = i32;

/// Snapshot of a browser tab as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Tab {
    pub fn new(id: TabId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// The URL, treating an empty string as absent.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }
}

/// The `changeInfo` object delivered with a tab update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ChangeInfo {
    pub fn complete() -> Self {
        Self {
            status: Some("complete".to_string()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some("complete")
    }
}

/// How a tab's URL changed between two observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Load,
    Reload,
    HashChange,
    Close,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Reload => "reload",
            Self::HashChange => "hash_change",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAt {
    DocumentStart,
    #[default]
    DocumentEnd,
}

/// Per-call injection settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectOptions {
    pub run_at: RunAt,
    pub all_frames: bool,
}

impl InjectOptions {
    pub fn new(run_at_document_start: bool, all_frames: bool) -> Self {
        Self {
            run_at: if run_at_document_start {
                RunAt::DocumentStart
            } else {
                RunAt::DocumentEnd
            },
            all_frames,
        }
    }
}
