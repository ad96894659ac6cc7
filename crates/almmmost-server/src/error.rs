//! The top-level error type for the server binary: anything that aborts
//! startup or a link, as opposed to [`almmmost_fs::FsError`], which is
//! always translated into a wire-level `(retcode, err)` pair and never
//! propagated past the dispatcher.

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Alm(#[from] almmmost_core::AlmError),
    #[error("I/O error opening '{path}': {source}")]
    Image {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ServerResult<T> = Result<T, ServerError>;
