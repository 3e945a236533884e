use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, File};
use serde::{Deserialize, Deserializer};

use crate::Result;

///Read-only configuration carrier, cheap to clone and shared with every
///collaborator the orchestrator builds.
#[derive(Clone)]
pub struct Settings(Arc<Inner>);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Inner {
    #[serde(default)]
    pub security: Security,
    #[serde(default)]
    pub interception: Interception,
    #[serde(default)]
    pub storage: Storage,
    ///Base path that relative credentials/ACL/storage paths resolve against.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
}

impl Deref for Settings {
    type Target = Inner;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl Settings {
    ///Builds settings from the well-known config files, the environment
    ///(prefix `WRENMQ`), and an optional explicit config file name.
    pub fn load(cfg_name: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name("/etc/wrenmq/wrenmq").required(false))
            .add_source(File::with_name("wrenmq").required(false))
            .add_source(config::Environment::with_prefix("wrenmq").try_parsing(true));

        if let Some(cfg) = cfg_name {
            builder = builder.add_source(File::with_name(cfg).required(true));
        }

        let inner: Inner = builder.build()?.try_deserialize()?;
        Ok(Self(Arc::new(inner)))
    }

    ///Resolves a configured file path against `base_dir` unless absolute.
    #[inline]
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match (&self.base_dir, path.is_absolute()) {
            (Some(base), false) => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl From<Inner> for Settings {
    fn from(inner: Inner) -> Self {
        Self(Arc::new(inner))
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Security {
    ///Registered authenticator factory name, takes precedence over a caller
    ///supplied instance. Empty means not configured.
    #[serde(default)]
    pub authenticator: String,

    ///Registered authorizator factory name. Empty means not configured.
    #[serde(default)]
    pub authorizator: String,

    ///Credentials file path, `username:password` per line.
    #[serde(default)]
    pub password_file: String,

    ///ACL file path, mosquitto-style `user`/`topic` lines.
    #[serde(default)]
    pub acl_file: String,

    ///Whether clients may connect without credentials. Unrecognized values
    ///fall back to the default rather than failing startup.
    #[serde(
        default = "Security::allow_anonymous_default",
        deserialize_with = "Security::deserialize_allow_anonymous"
    )]
    pub allow_anonymous: bool,
}

impl Default for Security {
    #[inline]
    fn default() -> Self {
        Self {
            authenticator: String::new(),
            authorizator: String::new(),
            password_file: String::new(),
            acl_file: String::new(),
            allow_anonymous: Self::allow_anonymous_default(),
        }
    }
}

impl Security {
    fn allow_anonymous_default() -> bool {
        true
    }

    #[inline]
    pub fn authenticator_name(&self) -> Option<&str> {
        none_if_empty(&self.authenticator)
    }

    #[inline]
    pub fn authorizator_name(&self) -> Option<&str> {
        none_if_empty(&self.authorizator)
    }

    #[inline]
    pub fn password_file(&self) -> Option<&str> {
        none_if_empty(&self.password_file)
    }

    #[inline]
    pub fn acl_file(&self) -> Option<&str> {
        none_if_empty(&self.acl_file)
    }

    #[inline]
    fn deserialize_allow_anonymous<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Int(i64),
            Str(String),
        }

        Ok(match Raw::deserialize(deserializer) {
            Ok(Raw::Bool(b)) => b,
            Ok(Raw::Int(n)) => n != 0,
            Ok(Raw::Str(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => true,
                "false" | "no" | "off" | "0" => false,
                _ => Self::allow_anonymous_default(),
            },
            Err(_) => Self::allow_anonymous_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Interception {
    ///Registered custom observer factory name, appended after the embedded
    ///observers. Empty means not configured.
    #[serde(default)]
    pub handler: String,
}

impl Interception {
    #[inline]
    pub fn handler_name(&self) -> Option<&str> {
        none_if_empty(&self.handler)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    ///Persistent store location. Empty keeps everything in memory.
    #[serde(default)]
    pub dir: String,
}

impl Storage {
    #[inline]
    pub fn dir(&self) -> Option<&str> {
        none_if_empty(&self.dir)
    }
}

#[inline]
fn none_if_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::{Inner, Settings};

    fn from_toml(toml: &str) -> Settings {
        let inner: Inner = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        inner.into()
    }

    #[test]
    fn defaults() {
        let settings = Settings::from(Inner::default());
        assert!(settings.security.allow_anonymous);
        assert!(settings.security.authenticator_name().is_none());
        assert!(settings.security.authorizator_name().is_none());
        assert!(settings.security.password_file().is_none());
        assert!(settings.security.acl_file().is_none());
        assert!(settings.interception.handler_name().is_none());
        assert!(settings.storage.dir().is_none());
    }

    #[test]
    fn empty_keys_are_unset() {
        let settings = from_toml(
            r#"
            [security]
            authenticator = ""
            acl_file = "  "
            [interception]
            handler = ""
            "#,
        );
        assert!(settings.security.authenticator_name().is_none());
        assert!(settings.security.acl_file().is_none());
        assert!(settings.interception.handler_name().is_none());
    }

    #[test]
    fn allow_anonymous_parsing() {
        assert!(from_toml("").security.allow_anonymous);
        assert!(!from_toml("[security]\nallow_anonymous = false").security.allow_anonymous);
        assert!(from_toml("[security]\nallow_anonymous = \"yes\"").security.allow_anonymous);
        assert!(!from_toml("[security]\nallow_anonymous = \"off\"").security.allow_anonymous);
        //junk values fall back to the default instead of failing
        assert!(from_toml("[security]\nallow_anonymous = \"maybe\"").security.allow_anonymous);
    }

    #[test]
    fn resolve_path_honors_base_dir() {
        let settings = from_toml("base_dir = \"/etc/broker\"");
        assert_eq!(settings.resolve_path("auth/users.conf"), std::path::PathBuf::from("/etc/broker/auth/users.conf"));
        assert_eq!(settings.resolve_path("/abs/users.conf"), std::path::PathBuf::from("/abs/users.conf"));

        let settings = from_toml("");
        assert_eq!(settings.resolve_path("users.conf"), std::path::PathBuf::from("users.conf"));
    }
}
