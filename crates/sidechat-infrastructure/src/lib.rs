//! Infrastructure adapters for Sidechat.
//!
//! Implementations of the collaborator traits declared in `sidechat-core`
//! (HTTP remote service, JSON file cache, static credentials) plus config
//! loading, platform paths and tracing setup.

pub mod config_service;
pub mod credentials;
pub mod dto;
pub mod http_remote;
pub mod json_cache;
pub mod logging;
pub mod paths;

pub use crate::config_service::ConfigService;
pub use crate::credentials::StaticCredentialProvider;
pub use crate::http_remote::HttpRemoteSessionService;
pub use crate::json_cache::JsonFileSessionCache;
pub use crate::logging::init_tracing;
pub use crate::paths::SidechatPaths;
