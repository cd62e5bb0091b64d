/// Key-value storage scoped to one client session.
#[async_trait::async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionStorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), SessionStorageError>;
    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), SessionStorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
}
