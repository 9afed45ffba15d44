//! Generator-time error surface. Parse-time errors are the runtime's
//! `ParseError` and never appear here.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while opening a session or emitting parsers.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller-supplied output directory must already exist; only the
    /// module subdirectory underneath it is created by the session.
    #[error("output directory does not exist: {}", .0.display())]
    OutputDirMissing(PathBuf),

    /// `generate` binds the entrypoint to the root's destination type, so
    /// the root schema must be named.
    #[error("root schema has no destination type name")]
    UnnamedRoot,

    /// `<type>.<method>` was already generated in this session.
    #[error("entrypoint {0} already defined")]
    DuplicateEntrypoint(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
