use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ErrorKind, RedisError};
use tracing::warn;

/// Session storage on redis. Every key lives under the session namespace and
/// expires with it, so nothing outlives the client session.
pub struct RedisSessionStorage {
    conn: ConnectionManager,
    namespace: String,
    ttl_secs: u64,
}

impl RedisSessionStorage {
    pub fn new(conn: ConnectionManager, namespace: impl Into<String>, ttl_secs: u64) -> Self {
        RedisSessionStorage {
            conn,
            namespace: namespace.into(),
            ttl_secs,
        }
    }

    pub async fn connect(
        dsn: &str,
        namespace: impl Into<String>,
        ttl_secs: u64,
    ) -> Result<Self, SessionStorageError> {
        if ttl_secs == 0 {
            return Err(SessionStorageError::Backend(
                "session ttl must be at least one second".to_string(),
            ));
        }
        let client = redis::Client::open(dsn).map_err(backend)?;
        let conn = client.get_connection_manager().await.map_err(backend)?;
        Ok(Self::new(conn, namespace, ttl_secs))
    }

    fn key(&self, key: &str) -> String {
        namespaced_key(&self.namespace, key)
    }
}

fn namespaced_key(namespace: &str, key: &str) -> String {
    format!("{}:{}", namespace, key)
}

/// A value that is there but cannot be read as text.
fn is_unreadable(e: &RedisError) -> bool {
    e.kind() == ErrorKind::TypeError || e.code() == Some("WRONGTYPE")
}

fn backend(e: redis::RedisError) -> SessionStorageError {
    SessionStorageError::Backend(e.to_string())
}

#[async_trait::async_trait]
impl SessionStorage for RedisSessionStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionStorageError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let raw: Result<Option<Vec<u8>>, RedisError> = conn.get(&key).await;
        let text = match raw {
            Ok(None) => return Ok(None),
            Ok(Some(bytes)) => String::from_utf8(bytes).ok(),
            Err(e) if is_unreadable(&e) => None,
            Err(e) => return Err(backend(e)),
        };
        if text.is_none() {
            warn!(%key, "dropping unreadable session value");
            let _: () = conn.del(&key).await.map_err(backend)?;
        }
        Ok(text)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SessionStorageError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(&key, value, self.ttl_secs)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionStorageError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let _: () = conn.del(&key).await.map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_live_under_the_namespace() {
        assert_eq!(
            namespaced_key("session:3fa9c01b2e", "auth_tokens"),
            "session:3fa9c01b2e:auth_tokens"
        );
        assert_ne!(
            namespaced_key("session:a", "auth_tokens"),
            namespaced_key("session:b", "auth_tokens")
        );
    }

    #[test]
    fn test_type_mismatch_counts_as_unreadable() {
        let mismatch = RedisError::from((ErrorKind::TypeError, "not a string"));
        assert!(is_unreadable(&mismatch));

        let down = RedisError::from((ErrorKind::IoError, "connection refused"));
        assert!(!is_unreadable(&down));
    }

    #[tokio::test]
    async fn test_zero_ttl_is_refused() {
        let result = RedisSessionStorage::connect("redis://127.0.0.1:6379", "session:x", 0).await;

        assert!(matches!(result, Err(SessionStorageError::Backend(_))));
    }
}
