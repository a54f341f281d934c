use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("Failed loading {0}")]
    Load(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Browser storage is not available")]
    Unavailable,

    #[error("Storage write failed: {0}")]
    Write(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Map construction failed: {0}")]
    Create(String),
}
