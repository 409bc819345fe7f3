use crate::cache::OverlayCache;
use crate::error::{EnhanceError, Result};
use crate::runtime::RuntimeCollector;
use crate::store::ExtensionStore;
use jarweave_java::ArchivePatcher;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Swaps archives that carry extension methods for patched overlay copies.
#[derive(Debug, Clone)]
pub struct Enhancer {
    store: ExtensionStore,
    cache: OverlayCache,
    patcher: ArchivePatcher,
}

impl Enhancer {
    pub fn new(store: ExtensionStore, cache: OverlayCache) -> Self {
        Self {
            store,
            cache,
            patcher: ArchivePatcher::new(),
        }
    }

    pub fn store(&self) -> &ExtensionStore {
        &self.store
    }

    pub fn cache(&self) -> &OverlayCache {
        &self.cache
    }

    /// Returns `archives` with every archive known to the store replaced by
    /// a freshly patched cache copy, at the same positions.
    ///
    /// Distinct archives are patched in parallel. The first failure aborts
    /// the whole call. Two targets with the same overlay name, such as
    /// `x/lib.jar` and `y/lib.jar`, are rejected before anything is copied.
    pub fn enhance(&self, archives: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
        let targets: Vec<&Path> = self
            .store
            .archives()
            .filter(|archive| archives.iter().any(|a| a == archive))
            .collect();
        if targets.is_empty() {
            debug!("No archive among {} needs enhancing", archives.len());
            return Ok(archives);
        }
        check_overlay_names(&targets)?;

        let substitutions: HashMap<&Path, PathBuf> = targets
            .par_iter()
            .map(|original| self.enhance_archive(original).map(|copy| (*original, copy)))
            .collect::<Result<_>>()?;

        Ok(archives
            .into_iter()
            .map(|archive| match substitutions.get(archive.as_path()) {
                Some(copy) => copy.clone(),
                None => archive,
            })
            .collect())
    }

    /// Collects the runtime archives under `root` and enhances them.
    pub fn enhanced_runtime(&self, root: &Path, collector: &RuntimeCollector) -> Result<Vec<PathBuf>> {
        let archives = collector.collect(root)?;
        info!("Collected {} runtime archives under {}", archives.len(), root.display());
        self.enhance(archives)
    }

    fn enhance_archive(&self, original: &Path) -> Result<PathBuf> {
        let copy = self.cache.materialize(original)?;
        let definitions = self.store.grouped_definitions(original);
        if let Err(e) = self.patcher.patch(&copy, &definitions) {
            // A half-enhanced copy must never become current.
            let _ = fs::remove_file(&copy);
            return Err(e.into());
        }
        info!("Enhance {} to {}", original.display(), copy.display());
        Ok(copy)
    }
}

fn check_overlay_names(targets: &[&Path]) -> Result<()> {
    let mut claimed: HashMap<String, &Path> = HashMap::with_capacity(targets.len());
    for original in targets {
        let Some(name) = OverlayCache::overlay_name(original) else { continue };
        if let Some(other) = claimed.insert(name.clone(), original) {
            return Err(EnhanceError::Config(format!(
                "{} and {} share the overlay name {}",
                other.display(),
                original.display(),
                name
            )));
        }
    }
    Ok(())
}
