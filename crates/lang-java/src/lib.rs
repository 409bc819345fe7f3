//! JVM class file rewriting for jarweave.
//!
//! [`ArchivePatcher`] opens a jar, hands every targeted class to
//! [`enhance::enhance_class`] and writes the container back atomically.

pub mod archive;
pub mod bytecode;
pub mod classfile;
pub mod definition;
pub mod enhance;
pub mod error;
pub mod inspect;

pub use archive::{ArchivePatcher, PatchReport};
pub use definition::{BodyContext, BodyGenerator, DelegateBody, ExtensionMethodDefinition, InstructionBody};
pub use error::{AnalysisError, ClassFileError, PatchCause, PatchError, RewriteError, RewriteResult};
