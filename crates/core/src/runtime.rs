//! Runtime environment discovery.
//!
//! Finds the archive directory of an installed JVM and lists the jars in it
//! that are worth enhancing.

use crate::error::{EnhanceError, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub const DEFAULT_INCLUDE: &[&str] = &["**/*.jar"];

/// Archives that are never enhanced: tooling, deployment, and the
/// `javaws`/`javafx` family.
pub const DEFAULT_EXCLUDE: &[&str] = &[
    "plugin.jar",
    "management-agent.jar",
    "jfxswt.jar",
    "java*",
    "security/*",
    "deploy.jar",
];

/// Enumerates candidate archives below a runtime root.
///
/// Each file is matched twice, by its `/` separated path relative to the
/// root and by its bare file name. A file is collected when either matches
/// an include pattern and neither matches an exclude pattern.
#[derive(Debug, Clone)]
pub struct RuntimeCollector {
    include: GlobSet,
    exclude: GlobSet,
}

impl RuntimeCollector {
    pub fn new<I, E, S, T>(include: I, exclude: E) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_INCLUDE, DEFAULT_EXCLUDE)
    }

    /// Returns matching files in a stable order (directory walk sorted by file name).
    pub fn collect(&self, root: &Path) -> Result<Vec<PathBuf>> {
        fs::read_dir(root).map_err(|cause| EnhanceError::Collection {
            root: root.to_path_buf(),
            cause,
        })?;

        let mut archives = Vec::new();
        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(EnhanceError::Collection {
                        root: root.to_path_buf(),
                        cause: e.into_io_error().unwrap_or_else(|| std::io::Error::other("file system loop")),
                    });
                }
                Err(e) => {
                    debug!("Skipping unreadable runtime entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let file_name = entry.file_name().to_string_lossy();

            if self.accepts(&relative, &file_name) {
                archives.push(entry.into_path());
            }
        }
        Ok(archives)
    }

    fn accepts(&self, relative: &str, file_name: &str) -> bool {
        let included = self.include.is_match(relative) || self.include.is_match(file_name);
        let excluded = self.exclude.is_match(relative) || self.exclude.is_match(file_name);
        included && !excluded
    }
}

fn compile<I, S>(patterns: I) -> Result<GlobSet>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern.as_ref()).literal_separator(true).build()?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Locates the archive directory of an installed runtime.
pub struct RuntimeLocator;

impl RuntimeLocator {
    /// Uses `JAVA_HOME`.
    pub fn from_env() -> Option<PathBuf> {
        let home = std::env::var_os("JAVA_HOME")?;
        Self::locate(Path::new(&home))
    }

    /// `jre/lib` when it holds jars (a JDK 8 layout), otherwise `lib`.
    pub fn locate(java_home: &Path) -> Option<PathBuf> {
        ["jre/lib", "lib"]
            .iter()
            .map(|dir| java_home.join(dir))
            .find(|dir| contains_archive(dir))
    }
}

fn contains_archive(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries
        .filter_map(|e| e.ok())
        .any(|e| e.path().extension().and_then(|ext| ext.to_str()) == Some("jar"))
}
