use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed payload under `{key}`: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{key}` was written with schema version {found}, newest supported is {supported}")]
    UnsupportedVersion {
        key: String,
        found: u32,
        supported: u32,
    },

    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HabitError {
    #[error("habit name must not be empty")]
    EmptyName,

    #[error("habit name is {len} characters long, the limit is {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("unknown habit icon `{0}`")]
    UnknownIcon(String),
}
