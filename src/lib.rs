//! Decides which scripts and stylesheets get injected into each browser tab.
//!
//! Rules map URL matchers to resource bundles. Every completed tab load is
//! classified (`load`, `reload`, `hash_change`, `close`), reported to
//! transition observers, and run through a matching pass that delivers each
//! matching bundle once: stylesheets first, then scripts, then the bundle's
//! completion callback.
//!
//! The browser side is abstracted behind [`TabHost`]; [`NativeHost`] speaks to
//! an extension over native messaging.

pub mod bridge;
pub mod classifier;
pub mod config;
pub mod control;
pub mod error;
pub mod host;
pub mod injector;
pub mod matcher;
pub mod native;
pub mod orchestrator;
pub mod protocol;
pub mod registry;
pub mod resources;
pub mod rules;
pub mod state;
pub mod tab;

pub use error::{Error, HostError, Result};
pub use host::{ScriptDetails, StylesheetDetails, TabHost};
pub use injector::{InjectionFailure, PendingDelivery};
pub use matcher::Matcher;
pub use native::NativeHost;
pub use registry::{MatchGroupId, Namespace, ResourceBundle, TabCallback};
pub use resources::ContentResources;
pub use tab::{ChangeInfo, InjectOptions, RunAt, Tab, TabId, Transition};
