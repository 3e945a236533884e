use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::types::{ClientId, Password};
use crate::{BrokerError, Result};

///Checks client credentials at CONNECT time. A single instance is selected at
///startup and shared for the broker's lifetime, so implementations must be
///safe for concurrent invocation.
#[async_trait]
pub trait Authenticator: Sync + Send + std::fmt::Debug {
    async fn check_valid(
        &self,
        client_id: &ClientId,
        username: Option<&str>,
        password: Option<&Password>,
    ) -> bool;
}

///Topic-level access control. Same sharing contract as [`Authenticator`].
#[async_trait]
pub trait Authorizator: Sync + Send + std::fmt::Debug {
    ///May the client publish to `topic`
    async fn can_publish(&self, client_id: &ClientId, username: Option<&str>, topic: &str) -> bool;

    ///May the client subscribe to `topic`
    async fn can_subscribe(&self, client_id: &ClientId, username: Option<&str>, topic: &str) -> bool;
}

///Default authenticator when neither a factory nor a credentials file is
///configured.
#[derive(Debug)]
pub struct AcceptAllAuthenticator;

#[async_trait]
impl Authenticator for AcceptAllAuthenticator {
    #[inline]
    async fn check_valid(
        &self,
        _client_id: &ClientId,
        _username: Option<&str>,
        _password: Option<&Password>,
    ) -> bool {
        true
    }
}

///Authenticator backed by a credentials file, one `username:password` entry
///per line, `#` comments and blank lines ignored.
#[derive(Debug)]
pub struct FileAuthenticator {
    credentials: HashMap<String, String>,
}

impl FileAuthenticator {
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BrokerError::Config(format!("credentials file {} unreadable, {e}", path.display())))?;
        Self::from_str(&content)
            .map_err(|e| BrokerError::Config(format!("credentials file {}, {e}", path.display())))
    }

    fn from_str(content: &str) -> Result<Self> {
        let mut credentials = HashMap::new();
        for (no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (username, password) = line
                .split_once(':')
                .ok_or_else(|| BrokerError::Msg(format!("malformed entry at line {}", no + 1)))?;
            if username.trim().is_empty() {
                return Err(BrokerError::Msg(format!("empty username at line {}", no + 1)));
            }
            credentials.insert(username.trim().to_string(), password.to_string());
        }
        Ok(Self { credentials })
    }
}

#[async_trait]
impl Authenticator for FileAuthenticator {
    async fn check_valid(
        &self,
        _client_id: &ClientId,
        username: Option<&str>,
        password: Option<&Password>,
    ) -> bool {
        let Some(username) = username else {
            //anonymous access is the allow-anonymous flag's call, not ours
            return false;
        };
        match (self.credentials.get(username), password) {
            (Some(expected), Some(given)) => expected.as_bytes() == given.as_ref(),
            (Some(expected), None) => expected.is_empty(),
            (None, _) => false,
        }
    }
}

///Default authorizator when no ACL file is configured.
#[derive(Debug)]
pub struct PermitAllAuthorizator;

#[async_trait]
impl Authorizator for PermitAllAuthorizator {
    #[inline]
    async fn can_publish(&self, _client_id: &ClientId, _username: Option<&str>, _topic: &str) -> bool {
        true
    }

    #[inline]
    async fn can_subscribe(&self, _client_id: &ClientId, _username: Option<&str>, _topic: &str) -> bool {
        true
    }
}

///Fallback when a configured ACL file fails to parse. Denying everything is
///the safe default for a broker that was told to run with access control.
#[derive(Debug)]
pub struct DenyAllAuthorizator;

#[async_trait]
impl Authorizator for DenyAllAuthorizator {
    #[inline]
    async fn can_publish(&self, _client_id: &ClientId, _username: Option<&str>, _topic: &str) -> bool {
        false
    }

    #[inline]
    async fn can_subscribe(&self, _client_id: &ClientId, _username: Option<&str>, _topic: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::{AcceptAllAuthenticator, Authenticator, FileAuthenticator};

    #[tokio::test]
    async fn accept_all() {
        let auth = AcceptAllAuthenticator;
        assert!(auth.check_valid(&"c1".into(), None, None).await);
        assert!(auth.check_valid(&"c1".into(), Some("anyone"), Some(&Bytes::from_static(b"x"))).await);
    }

    #[tokio::test]
    async fn file_authenticator() {
        let auth = FileAuthenticator::from_str(
            "# test users\n\nalice:secret\nbob:hunter2\nguest:\n",
        )
        .unwrap();

        let pw = |s: &'static str| Bytes::from_static(s.as_bytes());
        assert!(auth.check_valid(&"c1".into(), Some("alice"), Some(&pw("secret"))).await);
        assert!(!auth.check_valid(&"c1".into(), Some("alice"), Some(&pw("wrong"))).await);
        assert!(!auth.check_valid(&"c1".into(), Some("mallory"), Some(&pw("secret"))).await);
        assert!(auth.check_valid(&"c1".into(), Some("guest"), None).await);
        assert!(!auth.check_valid(&"c1".into(), None, None).await);
    }

    #[test]
    fn malformed_credentials_rejected() {
        assert!(FileAuthenticator::from_str("alice secret").is_err());
        assert!(FileAuthenticator::from_str(":nouser").is_err());
    }
}
