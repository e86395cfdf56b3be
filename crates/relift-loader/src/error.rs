//! Load-stage errors surfaced to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    /// The file's magic matched no registered loader.
    #[error("unrecognised binary file")]
    UnknownMagic,

    /// A loader claimed the file but could not map it.
    #[error("loader failed: {0}")]
    LoaderFailed(String),

    /// The mapped image violated a post-load invariant.
    #[error("post-load invariant broken: {0}")]
    BadImage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
