//! Where artifacts live, locally and remotely.
//!
//! Both sides share [`ArtifactCoordinate::path_of`], so a jar found under
//! `~/.m2/repository/g/a/1.0/a-1.0.jar` is fetched from
//! `{base}/g/a/1.0/a-1.0.jar`.

use crate::error::{EnhanceError, Result};
use jarweave_api::ArtifactCoordinate;
use std::path::{Path, PathBuf};
use url::Url;

pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2/";

/// A remote repository reachable over HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub url: Url,
}

impl Repository {
    pub fn new(name: impl Into<String>, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|cause| EnhanceError::MalformedLocation {
            location: url.to_string(),
            cause,
        })?;
        Ok(Self {
            name: name.into(),
            url,
        })
    }

    pub fn maven_central() -> Result<Self> {
        Self::new("maven-central", MAVEN_CENTRAL)
    }

    /// Resolves the coordinate's path against the base URL.
    ///
    /// Standard relative reference rules apply: a base without a trailing
    /// `/` has its last segment replaced.
    pub fn locate(&self, coordinate: &ArtifactCoordinate, extension: &str) -> Result<Url> {
        let path = coordinate.path_of(extension);
        self.url
            .join(&path)
            .map_err(|cause| EnhanceError::MalformedLocation { location: path, cause })
    }
}

/// A Maven layout directory on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepository {
    pub root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn locate(&self, coordinate: &ArtifactCoordinate, extension: &str) -> PathBuf {
        coordinate
            .path_of(extension)
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

impl Default for LocalRepository {
    /// `~/.m2/repository`
    fn default() -> Self {
        let root = dirs::home_dir()
            .map(|h| h.join(".m2/repository"))
            .unwrap_or_else(|| PathBuf::from(".m2/repository"));
        Self { root }
    }
}
