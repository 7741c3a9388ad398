//! Layered configuration: files, environment and command line arguments
//! merged under a fixed precedence (CLI > environment > files > defaults),
//! read back through dotted key paths with type coercion, checked against
//! an optional schema, and reloaded when watched files change.

pub mod bridge;
pub mod coerce;
pub mod error;
pub mod loader;
pub mod logging;
pub mod path;
pub mod reload;
pub mod schema;
pub mod store;
pub mod value;

pub use error::{Error, Result};
pub use loader::{EnvSource, EnvVars, FileFormat, FileSource, Sources};
pub use path::KeyPath;
pub use reload::ReloadCallback;
pub use schema::{Schema, SchemaKind, ValidationError, ValidationErrorKind, ValidationResult};
pub use store::Config;
pub use value::{Value, ValueKind};
