use jarweave_core::{EnhanceConfig, Enhancer, ExtensionStore, OverlayCache};
use std::path::{Path, PathBuf};
use tracing::info;

pub fn run(config_path: &Path, archives: Vec<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = EnhanceConfig::load(config_path)?;
    let store = ExtensionStore::from_config(&config)?;
    if !store.has_extension() {
        info!("{} defines no extension methods", config_path.display());
    }

    let enhancer = Enhancer::new(store, OverlayCache::new(&config.cache_dir));
    for archive in enhancer.enhance(archives)? {
        println!("{}", archive.display());
    }
    Ok(())
}
