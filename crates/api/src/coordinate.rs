use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maven style `{group, artifact, version}` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    pub group: String,
    pub artifact: String,
    pub version: Version,
}

impl ArtifactCoordinate {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>, version: Version) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version,
        }
    }

    /// Canonical relative location: `group/artifact/version/artifact-version{extension}`.
    ///
    /// The separator is always `/`, whatever the host uses, so the same string
    /// works below a local repository root and against a remote base URL.
    pub fn path_of(&self, extension: &str) -> String {
        format!(
            "{group}/{artifact}/{version}/{artifact}-{version}{extension}",
            group = self.group,
            artifact = self.artifact,
            version = self.version,
        )
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.artifact, self.version)
    }
}
