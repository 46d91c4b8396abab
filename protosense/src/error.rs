use std::{fmt, io, path::PathBuf, sync::Arc};

use miette::Diagnostic;
use protosense_parse::GrammarError;
use thiserror::Error;

/// An error from loading documents into a [`Workspace`](crate::Workspace).
#[derive(Diagnostic, Error)]
#[error(transparent)]
#[diagnostic(transparent)]
pub struct Error {
    kind: Box<ErrorKind>,
}

#[derive(Debug, Diagnostic, Error)]
pub(crate) enum ErrorKind {
    #[error("error opening file '{}'", path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        err: io::Error,
    },
    #[error("file '{}' is not valid utf-8", path.display())]
    FileInvalidUtf8 { path: PathBuf },
    #[error("'{}' cannot be converted to a file URI", path.display())]
    #[diagnostic(help("paths must be absolute"))]
    InvalidPath { path: PathBuf },
    #[error("failed to load the protobuf grammar")]
    #[diagnostic(help("parsing will continue with the fallback parser"))]
    Grammar {
        #[source]
        err: Arc<GrammarError>,
    },
}

impl Error {
    pub(crate) fn from_kind(kind: ErrorKind) -> Self {
        Error {
            kind: Box::new(kind),
        }
    }

    /// Returns true if this error is caused by an IO error while opening a file.
    pub fn is_io(&self) -> bool {
        matches!(&*self.kind, ErrorKind::OpenFile { .. })
    }

    /// Returns true if the grammar library could not be loaded.
    pub fn is_grammar(&self) -> bool {
        matches!(&*self.kind, ErrorKind::Grammar { .. })
    }

    /// The path of the file involved, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match &*self.kind {
            ErrorKind::OpenFile { path, .. }
            | ErrorKind::FileInvalidUtf8 { path }
            | ErrorKind::InvalidPath { path } => Some(path),
            ErrorKind::Grammar { .. } => None,
        }
    }
}

impl From<Arc<GrammarError>> for Error {
    fn from(err: Arc<GrammarError>) -> Self {
        Error::from_kind(ErrorKind::Grammar { err })
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            ErrorKind::OpenFile { err, .. } => write!(f, "{}: {}", self, err),
            ErrorKind::Grammar { err } => write!(f, "{}: {}", self, err),
            ErrorKind::FileInvalidUtf8 { .. } | ErrorKind::InvalidPath { .. } => {
                write!(f, "{}", self)
            }
        }
    }
}
