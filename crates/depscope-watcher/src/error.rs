use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to create file watcher: {0}")]
    Init(#[from] notify::Error),

    #[error("cannot watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("handler {0:?} is already registered")]
    DuplicateHandler(String),

    #[error("handler {name:?} has no entry point at {path}")]
    MissingEntryPoint { name: String, path: PathBuf },
}
