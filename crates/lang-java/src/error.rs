use jarweave_api::{ApiError, ModuleId};
use std::path::PathBuf;
use thiserror::Error;

/// Structural problems while decoding or encoding a class file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("Malformed class file: {0}")]
    Malformed(String),
    #[error("{what} too large: {len}")]
    TooLarge { what: &'static str, len: usize },
}

impl From<ristretto_classfile::Error> for ClassFileError {
    fn from(err: ristretto_classfile::Error) -> Self {
        ClassFileError::Malformed(err.to_string())
    }
}

/// Reasons the bytecode analyzer rejects a generated method body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("expected {expected} but found {found}")]
    TypeMismatch { expected: &'static str, found: String },
    #[error("cannot merge {left} with {right} on the operand stack without class hierarchy information")]
    IncompatibleMerge { left: String, right: String },
    #[error("operand stack height {found} differs from {expected} at a merge point")]
    StackHeightMismatch { expected: usize, found: usize },
    #[error("local variable {index} holds {found}")]
    BadLocal { index: u16, found: String },
    #[error("return of {found} from a method declared to return {expected}")]
    ReturnMismatch { expected: String, found: String },
    #[error("execution can fall off the end of the code")]
    FallsOffEnd,
    #[error("instruction is unreachable")]
    Unreachable,
    #[error("{what} exceeds {limit}")]
    LimitExceeded { what: &'static str, limit: u32 },
}

/// Failures of the structured rewrite of one class.
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error(transparent)]
    ClassFile(#[from] ClassFileError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Method {0} already exists")]
    DuplicateMethod(String),
    #[error("Method {method} cannot be injected with flags `{flags}`")]
    UnsupportedFlags { method: String, flags: String },
    #[error("Interface {class} has class version {major}; non-static method {method} needs 52 or later")]
    InterfaceVersion {
        class: String,
        major: u16,
        method: String,
    },
    #[error("Definition targets {expected} but the class file declares {found}")]
    WrongTarget { expected: String, found: String },
    #[error("Body generator for {method} failed: {reason}")]
    Generator { method: String, reason: String },
    #[error("Invalid body for {method} at instruction {index}: {error}")]
    Analysis {
        method: String,
        index: usize,
        error: AnalysisError,
    },
    #[error("Label L{0} is used but never placed")]
    UnboundLabel(u32),
    #[error("Label L{0} is placed twice")]
    DuplicateLabel(u32),
    #[error("Branch from offset {from} to {to} exceeds the 16-bit range")]
    BranchOutOfRange { from: u32, to: u32 },
    #[error("Method body too large: {0} bytes")]
    CodeTooLarge(usize),
    #[error("Verification of the rewritten class failed: {0}")]
    Verification(String),
}

impl From<ristretto_classfile::Error> for RewriteError {
    fn from(err: ristretto_classfile::Error) -> Self {
        RewriteError::ClassFile(err.into())
    }
}

pub type RewriteResult<T> = std::result::Result<T, RewriteError>;

#[derive(Error, Debug)]
pub enum PatchCause {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error("entry {0} not found")]
    MissingEntry(String),
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}

/// Patching an archive failed; the archive must be discarded.
#[derive(Error, Debug)]
#[error("Failed to patch {}{}: {cause}", .archive.display(), module_suffix(.module))]
pub struct PatchError {
    pub archive: PathBuf,
    pub module: Option<ModuleId>,
    #[source]
    pub cause: PatchCause,
}

impl PatchError {
    pub fn new(archive: impl Into<PathBuf>, module: Option<&ModuleId>, cause: impl Into<PatchCause>) -> Self {
        Self {
            archive: archive.into(),
            module: module.cloned(),
            cause: cause.into(),
        }
    }
}

fn module_suffix(module: &Option<ModuleId>) -> String {
    module
        .as_ref()
        .map(|m| format!(" (module {m})"))
        .unwrap_or_default()
}
