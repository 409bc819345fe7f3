use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies one compiled class by its binary name (`java.lang.String`,
/// `java.util.Map$Entry`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleId {
    binary_name: String,
}

impl ModuleId {
    /// Accepts the dotted binary name or the slashed internal name.
    pub fn parse(name: &str) -> ApiResult<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.ends_with(".class") || trimmed.contains(['[', ';']) {
            return Err(ApiError::InvalidModule(name.to_string()));
        }

        let binary_name = trimmed.replace('/', ".");
        if binary_name
            .split('.')
            .any(|segment| segment.is_empty() || segment.contains(char::is_whitespace))
        {
            return Err(ApiError::InvalidModule(name.to_string()));
        }

        Ok(Self { binary_name })
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    /// `java/lang/String`
    pub fn internal_name(&self) -> String {
        self.binary_name.replace('.', "/")
    }

    /// Location of the class file inside an archive: `java/lang/String.class`.
    pub fn entry_path(&self) -> String {
        format!("{}.class", self.internal_name())
    }

    pub fn simple_name(&self) -> &str {
        self.binary_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.binary_name)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.binary_name)
    }
}

impl FromStr for ModuleId {
    type Err = ApiError;

    fn from_str(s: &str) -> ApiResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ModuleId {
    type Error = ApiError;

    fn try_from(value: String) -> ApiResult<Self> {
        Self::parse(&value)
    }
}

impl From<ModuleId> for String {
    fn from(value: ModuleId) -> Self {
        value.binary_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_path() {
        let module = ModuleId::parse("java.lang.String").unwrap();
        assert_eq!(module.internal_name(), "java/lang/String");
        assert_eq!(module.entry_path(), "java/lang/String.class");
        assert_eq!(module.simple_name(), "String");
    }

    #[test]
    fn test_slashed_and_nested() {
        let module = ModuleId::parse("java/util/Map$Entry").unwrap();
        assert_eq!(module.binary_name(), "java.util.Map$Entry");
        assert_eq!(module.entry_path(), "java/util/Map$Entry.class");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(ModuleId::parse("").is_err());
        assert!(ModuleId::parse("a..B").is_err());
        assert!(ModuleId::parse("a.B.class").is_err());
        assert!(ModuleId::parse("[Ljava/lang/String;").is_err());
    }
}
