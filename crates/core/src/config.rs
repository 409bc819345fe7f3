//! JSON configuration for an enhancement run.

use crate::error::Result;
use crate::runtime::{DEFAULT_EXCLUDE, DEFAULT_INCLUDE, RuntimeCollector};
use jarweave_api::{MethodSignature, ModuleId, access_from_keywords};
use jarweave_java::{DelegateBody, ExtensionMethodDefinition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhanceConfig {
    /// Overlay cache directory. Defaults to `~/.jarweave/local-library`.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub extensions: Vec<ExtensionConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Archive directory of the runtime. Detected from `JAVA_HOME` when absent.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

/// One archive and the methods to inject into classes it contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    pub archive: PathBuf,
    /// Whether the archive ships with the runtime environment.
    #[serde(default)]
    pub runtime: bool,
    #[serde(default)]
    pub methods: Vec<MethodConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodConfig {
    pub target: String,
    #[serde(default)]
    pub access: Vec<String>,
    pub name: String,
    pub descriptor: String,
    pub delegate: DelegateConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegateConfig {
    pub owner: String,
    /// Helper method name; the injected method's name when absent.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub interface: bool,
}

fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".jarweave/local-library"))
        .unwrap_or_else(|| PathBuf::from(".jarweave/local-library"))
}

fn default_include() -> Vec<String> {
    DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect()
}

fn default_exclude() -> Vec<String> {
    DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect()
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            runtime: RuntimeConfig::default(),
            extensions: Vec::new(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            root: None,
            include: default_include(),
            exclude: default_exclude(),
        }
    }
}

impl EnhanceConfig {
    /// Reads a configuration file. Relative paths inside it are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_json(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.cache_dir);
        if let Some(root) = self.runtime.root.as_mut() {
            resolve(root);
        }
        for extension in &mut self.extensions {
            resolve(&mut extension.archive);
        }
    }
}

impl RuntimeConfig {
    pub fn collector(&self) -> Result<RuntimeCollector> {
        RuntimeCollector::new(&self.include, &self.exclude)
    }
}

impl MethodConfig {
    pub fn to_definition(&self) -> Result<ExtensionMethodDefinition> {
        let target = ModuleId::parse(&self.target)?;
        let access = access_from_keywords(&self.access)?;
        let signature = MethodSignature::new(access, &self.name, &self.descriptor)?;

        let owner = ModuleId::parse(&self.delegate.owner)?;
        let mut body = DelegateBody::new(&owner);
        if let Some(name) = &self.delegate.name {
            body = body.named(name.clone());
        }
        if self.delegate.interface {
            body = body.on_interface();
        }
        Ok(ExtensionMethodDefinition::new(target, signature, body))
    }
}
