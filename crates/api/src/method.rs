use crate::descriptor::MethodDescriptor;
use crate::error::{ApiError, ApiResult};
pub use ristretto_classfile::MethodAccessFlags;
use std::fmt;

/// Source keywords for the method access flags (JVMS table 4.6-A).
const KEYWORDS: [(&str, MethodAccessFlags); 12] = [
    ("public", MethodAccessFlags::PUBLIC),
    ("private", MethodAccessFlags::PRIVATE),
    ("protected", MethodAccessFlags::PROTECTED),
    ("static", MethodAccessFlags::STATIC),
    ("final", MethodAccessFlags::FINAL),
    ("synchronized", MethodAccessFlags::SYNCHRONIZED),
    ("bridge", MethodAccessFlags::BRIDGE),
    ("varargs", MethodAccessFlags::VARARGS),
    ("native", MethodAccessFlags::NATIVE),
    ("abstract", MethodAccessFlags::ABSTRACT),
    ("strictfp", MethodAccessFlags::STRICT),
    ("synthetic", MethodAccessFlags::SYNTHETIC),
];

pub fn access_from_keyword(keyword: &str) -> ApiResult<MethodAccessFlags> {
    KEYWORDS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(keyword.trim()))
        .map(|(_, flag)| *flag)
        .ok_or_else(|| ApiError::UnknownAccess(keyword.to_string()))
}

/// Combines keywords such as `["public", "static"]` into one flag set.
pub fn access_from_keywords<I, S>(keywords: I) -> ApiResult<MethodAccessFlags>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keywords
        .into_iter()
        .try_fold(MethodAccessFlags::empty(), |acc, k| {
            Ok(acc | access_from_keyword(k.as_ref())?)
        })
}

/// `public static` style rendering of `access`.
pub fn access_keywords(access: MethodAccessFlags) -> String {
    KEYWORDS
        .iter()
        .filter(|(_, flag)| access.contains(*flag))
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Access flags, name and descriptor of a method to inject.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub access: MethodAccessFlags,
    pub name: String,
    pub descriptor: MethodDescriptor,
}

impl MethodSignature {
    pub fn new(access: MethodAccessFlags, name: &str, descriptor: &str) -> ApiResult<Self> {
        let valid_name = name == "<init>"
            || (!name.is_empty() && !name.contains(['.', ';', '[', '/', '<', '>']));
        if !valid_name {
            return Err(ApiError::InvalidMethodName(name.to_string()));
        }

        let descriptor = MethodDescriptor::parse(descriptor)?;
        Ok(Self {
            access,
            name: name.to_string(),
            descriptor,
        })
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(MethodAccessFlags::STATIC)
    }

    /// Slots taken by `this` (if any) and the parameters.
    pub fn argument_slots(&self) -> u16 {
        self.descriptor.parameter_slots() + if self.is_static() { 0 } else { 1 }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor)
    }
}
