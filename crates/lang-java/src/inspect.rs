//! Read-back checks on serialized class files.

use crate::classfile::{self, ClassFileExt};
use crate::error::{RewriteError, RewriteResult};

/// `(name, descriptor)` of every method, in table order.
pub fn method_table(bytes: &[u8]) -> RewriteResult<Vec<(String, String)>> {
    let class = classfile::parse(bytes)
        .map_err(|e| RewriteError::Verification(format!("Failed to parse class: {e}")))?;
    class
        .method_keys()
        .map_err(|e| RewriteError::Verification(format!("Failed to read method table: {e}")))
}

/// Fails unless the method table of `bytes` is exactly `expected`.
pub fn verify_method_table(bytes: &[u8], expected: &[(String, String)]) -> RewriteResult<()> {
    let actual = method_table(bytes)?;
    if actual != expected {
        let render = |methods: &[(String, String)]| {
            methods
                .iter()
                .map(|(name, descriptor)| format!("{name}{descriptor}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        return Err(RewriteError::Verification(format!(
            "method table is [{}], expected [{}]",
            render(&actual),
            render(expected)
        )));
    }
    Ok(())
}
