//! Which archives carry extension methods, and what they are.

use crate::config::EnhanceConfig;
use crate::error::Result;
use crate::runtime::RuntimeLocator;
use jarweave_api::ModuleId;
use jarweave_java::ExtensionMethodDefinition;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Extension method definitions keyed by the archive that holds their targets.
///
/// Built once through [`ExtensionStoreBuilder`] and read-only afterwards.
/// Archive paths are compared as given; callers pass the same spelling to
/// the store and to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ExtensionStore {
    definitions: BTreeMap<PathBuf, Vec<ExtensionMethodDefinition>>,
    runtime_archives: BTreeSet<PathBuf>,
    runtime_root: Option<PathBuf>,
}

impl ExtensionStore {
    pub fn builder() -> ExtensionStoreBuilder {
        ExtensionStoreBuilder::default()
    }

    /// Builds a store from the `extensions` section of a configuration.
    ///
    /// Archives under the configured (or detected) runtime root count as
    /// runtime archives, as do entries flagged with `"runtime": true`.
    pub fn from_config(config: &EnhanceConfig) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(root) = config.runtime.root.clone().or_else(RuntimeLocator::from_env) {
            builder = builder.runtime_root(root);
        }

        for extension in &config.extensions {
            if extension.runtime {
                builder = builder.mark_runtime(&extension.archive);
            }
            for method in &extension.methods {
                builder = builder.define(&extension.archive, method.to_definition()?);
            }
        }
        Ok(builder.build())
    }

    pub fn has_extension(&self) -> bool {
        !self.definitions.is_empty()
    }

    /// True when at least one archive with definitions ships with the runtime.
    pub fn has_runtime_extension(&self) -> bool {
        self.definitions.keys().any(|archive| self.is_runtime_archive(archive))
    }

    pub fn is_runtime_archive(&self, archive: &Path) -> bool {
        self.runtime_archives.contains(archive)
            || self
                .runtime_root
                .as_deref()
                .is_some_and(|root| archive.starts_with(root))
    }

    pub fn definitions_for(&self, archive: &Path) -> &[ExtensionMethodDefinition] {
        self.definitions.get(archive).map(Vec::as_slice).unwrap_or_default()
    }

    /// Definitions for `archive` grouped by target class, ready for
    /// [`jarweave_java::ArchivePatcher::patch`].
    pub fn grouped_definitions(&self, archive: &Path) -> BTreeMap<ModuleId, Vec<ExtensionMethodDefinition>> {
        let mut grouped: BTreeMap<ModuleId, Vec<ExtensionMethodDefinition>> = BTreeMap::new();
        for definition in self.definitions_for(archive) {
            grouped
                .entry(definition.target.clone())
                .or_default()
                .push(definition.clone());
        }
        grouped
    }

    /// Archives with at least one definition, in path order.
    pub fn archives(&self) -> impl Iterator<Item = &Path> {
        self.definitions.keys().map(PathBuf::as_path)
    }
}

#[derive(Debug, Default)]
pub struct ExtensionStoreBuilder {
    definitions: BTreeMap<PathBuf, Vec<ExtensionMethodDefinition>>,
    runtime_archives: BTreeSet<PathBuf>,
    runtime_root: Option<PathBuf>,
}

impl ExtensionStoreBuilder {
    pub fn define(mut self, archive: impl AsRef<Path>, definition: ExtensionMethodDefinition) -> Self {
        self.definitions
            .entry(archive.as_ref().to_path_buf())
            .or_default()
            .push(definition);
        self
    }

    pub fn define_all<I>(self, archive: impl AsRef<Path>, definitions: I) -> Self
    where
        I: IntoIterator<Item = ExtensionMethodDefinition>,
    {
        let archive = archive.as_ref();
        definitions
            .into_iter()
            .fold(self, |builder, definition| builder.define(archive, definition))
    }

    /// Marks an archive as part of the runtime environment.
    pub fn mark_runtime(mut self, archive: impl AsRef<Path>) -> Self {
        self.runtime_archives.insert(archive.as_ref().to_path_buf());
        self
    }

    /// Every archive below `root` belongs to the runtime environment.
    pub fn runtime_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.runtime_root = Some(root.into());
        self
    }

    pub fn build(self) -> ExtensionStore {
        ExtensionStore {
            definitions: self.definitions,
            runtime_archives: self.runtime_archives,
            runtime_root: self.runtime_root,
        }
    }
}
