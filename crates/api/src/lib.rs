//! Value types shared by the jarweave crates.

pub mod coordinate;
pub mod descriptor;
pub mod error;
pub mod method;
pub mod module;
pub mod version;

pub use coordinate::ArtifactCoordinate;
pub use descriptor::{BaseType, FieldType, MethodDescriptor};
pub use error::{ApiError, ApiResult};
pub use method::{MethodAccessFlags, MethodSignature, access_from_keyword, access_from_keywords, access_keywords};
pub use module::ModuleId;
pub use version::Version;
