use jarweave_core::{EnhanceConfig, Enhancer, ExtensionStore, OverlayCache, RuntimeLocator};
use std::path::Path;

pub fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = EnhanceConfig::load(config_path)?;
    let root = config
        .runtime
        .root
        .clone()
        .or_else(RuntimeLocator::from_env)
        .ok_or("no runtime root configured and JAVA_HOME does not point at a runtime")?;
    let collector = config.runtime.collector()?;

    let store = ExtensionStore::from_config(&config)?;
    let enhancer = Enhancer::new(store, OverlayCache::new(&config.cache_dir));
    for archive in enhancer.enhanced_runtime(&root, &collector)? {
        println!("{}", archive.display());
    }
    Ok(())
}
