use config::ConfigError;
use thiserror::Error;

pub type Result<T, E = BrokerError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum BrokerError {
    ///Fatal to startup, the orchestrator returns no engine handle
    #[error("configuration error, {0}")]
    Config(String),
    ///Recoverable at resolution time, the authorizator falls back to deny-all
    #[error("acl parse error, {0}")]
    AclParse(String),
    #[error("broker is already initialized")]
    AlreadyInitialized,
    #[error("{0}")]
    ConfigFile(#[from] ConfigError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("{0}")]
    Msg(String),
}

impl From<String> for BrokerError {
    #[inline]
    fn from(e: String) -> Self {
        BrokerError::Msg(e)
    }
}

impl From<&str> for BrokerError {
    #[inline]
    fn from(e: &str) -> Self {
        BrokerError::Msg(e.to_string())
    }
}
