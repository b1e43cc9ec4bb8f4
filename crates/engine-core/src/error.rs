use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateStoreError {
    #[error("Failed to save state: {0}")]
    Save(String),

    #[error("Failed to load state: {0}")]
    Load(String),

    #[error("Failed to (de)serialize state: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sled::Error> for StateStoreError {
    fn from(err: sled::Error) -> Self {
        StateStoreError::Save(err.to_string())
    }
}

impl From<serde_json::Error> for StateStoreError {
    fn from(err: serde_json::Error) -> Self {
        StateStoreError::Serialization(err.to_string())
    }
}
