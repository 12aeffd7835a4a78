//! Failures surfaced by synthesis and rewriting.
//!
//! An unresolvable type is never an error here: the locator reports it as
//! `None` and the procedure is skipped.

use std::path::PathBuf;

use crate::syntax::Span;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Function types have no runtime schema.
    #[error("cannot serialize a function (`{ty}`)")]
    UnsupportedFunction { ty: String },

    #[error("unsupported intersection `{ty}`")]
    UnsupportedIntersection { ty: String },

    /// Optional or variadic tuple elements, or a rest element that isn't last.
    #[error("unsupported tuple shape `{ty}`")]
    UnsupportedTuple { ty: String },

    #[error("type recursion limit exceeded (depth > {limit})")]
    RecursionLimit { limit: usize },

    /// The validator namespace is already bound to something else in the file.
    #[error("`{name}` is already bound to {binding}; expected an import from `{module}`")]
    ImportConflict {
        name: String,
        module: String,
        binding: String,
    },

    #[error("overlapping edits at {first:?} and {second:?}")]
    OverlappingEdits { first: Span, second: Span },

    /// A procedure-level failure, located.
    #[error("{}:{line}: {source}", path.display())]
    Procedure {
        path: PathBuf,
        line: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Shape errors are per-procedure; everything else concerns the whole file.
    pub fn is_unsupported_shape(&self) -> bool {
        match self {
            Error::UnsupportedFunction { .. } | Error::UnsupportedIntersection { .. } | Error::UnsupportedTuple { .. } => true,
            Error::Procedure { source, .. } => source.is_unsupported_shape(),
            _ => false,
        }
    }
}
