//! Extension method enhancement for JVM archives.
//!
//! An [`ExtensionStore`] says which archives need new methods, the
//! [`OverlayCache`] hands out private copies of them, and the [`Enhancer`]
//! patches those copies and substitutes them into an archive list.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod repository;
pub mod runtime;
pub mod store;

pub use cache::OverlayCache;
pub use config::EnhanceConfig;
pub use error::{EnhanceError, Result};
pub use pipeline::Enhancer;
pub use repository::{LocalRepository, Repository};
pub use runtime::{RuntimeCollector, RuntimeLocator};
pub use store::{ExtensionStore, ExtensionStoreBuilder};
