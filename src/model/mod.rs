//! The document/version graph: the data types `spec.md` §3 defines,
//! independent of how the scheduler and workers move them around.

pub mod element;
pub mod fingerprint;
pub mod merged_config;
pub mod namespace;
pub mod raw_config;
pub mod request;
pub mod wait_built;
pub mod watcher;

pub use element::Element;
pub use fingerprint::OverridesFingerprint;
pub use merged_config::{MergedConfig, MergedConfigStatus};
pub use namespace::{ConfigNamespace, Generation, NamespaceStatus};
pub use raw_config::{DocumentMetadata, OverrideMetadata, RawConfig, RawConfigId};
pub use request::{
    override_key_string, validate_document_view, DocumentName, DocumentUpdate, DocumentView, OverrideName,
};
pub use wait_built::{ElementToBuild, WaitBuilt, Waiter};
pub use watcher::Watcher;
