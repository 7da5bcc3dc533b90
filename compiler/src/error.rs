use std::path::PathBuf;
use thiserror::Error;

/// Every failure the generator can produce. Generation is all-or-nothing:
/// the driver prints one of these and exits non-zero.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to open schema file {}: {}", path.display(), source)]
    SchemaOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The schema compiler rejected the file; covers both syntax and
    /// type-resolution diagnostics.
    #[error("unable to compile schema: {0}")]
    Parse(#[from] protox::Error),

    /// The compiled descriptor set is not usable (a reference points at a
    /// type the set does not contain).
    #[error("unable to link schema: {0}")]
    Link(String),

    #[error("unable to find message type {0}")]
    MessageNotFound(String),

    #[error("unsupported protobuf type {type_name} on field {field}")]
    UnsupportedType { field: String, type_name: String },

    #[error("recursive message {0} cannot be expanded into a finite state machine")]
    RecursiveMessage(String),

    #[error("key hash collision between {first} and {second} in {object}")]
    HashCollision {
        object: String,
        first: String,
        second: String,
    },
}
