//! hubmirror core library: domain types, configuration and errors.
//!
//! Public API surface:
//! - [`types`]: newtypes and the canonical [`SyncItem`]
//! - [`config`]: load / save / env overrides / validation
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{CollectionConfig, Collections, Config, Credentials, PropertyNames, SourceMode};
pub use error::ConfigError;
pub use types::{
    DatabaseId, IdentityKey, IdentityStrategy, ItemKind, ItemState, RepoRef, SinkPageId, SyncItem,
};
