use core::pin::Pin;
use std::future::Future;
use std::sync::Arc;

use crate::acl::AclFileParser;
use crate::auth::{
    AcceptAllAuthenticator, Authenticator, Authorizator, DenyAllAuthorizator, FileAuthenticator,
    PermitAllAuthorizator,
};
use crate::intercept::InterceptHandler;
use crate::settings::Settings;
use crate::types::DashMap;
use crate::{BrokerError, Result};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

pub trait AuthenticatorFn:
    'static + Sync + Send + Fn(Settings) -> BoxFuture<Result<Arc<dyn Authenticator>>>
{
}

impl<T> AuthenticatorFn for T where
    T: 'static + Sync + Send + ?Sized + Fn(Settings) -> BoxFuture<Result<Arc<dyn Authenticator>>>
{
}

pub trait AuthorizatorFn:
    'static + Sync + Send + Fn(Settings) -> BoxFuture<Result<Arc<dyn Authorizator>>>
{
}

impl<T> AuthorizatorFn for T where
    T: 'static + Sync + Send + ?Sized + Fn(Settings) -> BoxFuture<Result<Arc<dyn Authorizator>>>
{
}

pub trait HandlerFn:
    'static + Sync + Send + Fn(Settings) -> BoxFuture<Result<Arc<dyn InterceptHandler>>>
{
}

impl<T> HandlerFn for T where
    T: 'static + Sync + Send + ?Sized + Fn(Settings) -> BoxFuture<Result<Arc<dyn InterceptHandler>>>
{
}

///Resolves configuration into concrete collaborator instances.
///
///Custom implementations are registered by name before orchestration; a name
///appearing in configuration is looked up here and its constructor invoked.
///A configured name takes precedence over a caller-supplied instance, which
///takes precedence over the built-in defaults.
#[derive(Default)]
pub struct Resolver {
    authenticators: DashMap<String, Box<dyn AuthenticatorFn>>,
    authorizators: DashMap<String, Box<dyn AuthorizatorFn>>,
    handlers: DashMap<String, Box<dyn HandlerFn>>,
}

impl Resolver {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_authenticator<N: Into<String>, F: AuthenticatorFn>(&self, name: N, f: F) {
        self.authenticators.insert(name.into(), Box::new(f));
    }

    pub fn register_authorizator<N: Into<String>, F: AuthorizatorFn>(&self, name: N, f: F) {
        self.authorizators.insert(name.into(), Box::new(f));
    }

    pub fn register_handler<N: Into<String>, F: HandlerFn>(&self, name: N, f: F) {
        self.handlers.insert(name.into(), Box::new(f));
    }

    ///Any failure on the configured-name path is a configuration error and
    ///fatal to startup.
    pub async fn resolve_authenticator(
        &self,
        settings: &Settings,
        supplied: Option<Arc<dyn Authenticator>>,
    ) -> Result<Arc<dyn Authenticator>> {
        if let Some(name) = settings.security.authenticator_name() {
            let fut = {
                let f = self.authenticators.get(name).ok_or_else(|| {
                    BrokerError::Config(format!("authenticator {name:?} is not registered"))
                })?;
                (*f)(settings.clone())
            };
            let authenticator = fut.await.map_err(|e| {
                BrokerError::Config(format!("authenticator {name:?} construction failed, {e}"))
            })?;
            log::info!("loaded custom authenticator {name:?}");
            return Ok(authenticator);
        }

        if let Some(authenticator) = supplied {
            return Ok(authenticator);
        }

        if let Some(path) = settings.security.password_file() {
            let path = settings.resolve_path(path);
            let authenticator = FileAuthenticator::open(&path)?;
            log::info!("using credentials file {}", path.display());
            Ok(Arc::new(authenticator))
        } else {
            Ok(Arc::new(AcceptAllAuthenticator))
        }
    }

    ///Same precedence as the authenticator. An ACL file that fails to parse
    ///is logged and degrades to deny-all instead of aborting startup.
    pub async fn resolve_authorizator(
        &self,
        settings: &Settings,
        supplied: Option<Arc<dyn Authorizator>>,
    ) -> Result<Arc<dyn Authorizator>> {
        if let Some(name) = settings.security.authorizator_name() {
            let fut = {
                let f = self.authorizators.get(name).ok_or_else(|| {
                    BrokerError::Config(format!("authorizator {name:?} is not registered"))
                })?;
                (*f)(settings.clone())
            };
            let authorizator = fut.await.map_err(|e| {
                BrokerError::Config(format!("authorizator {name:?} construction failed, {e}"))
            })?;
            log::info!("loaded custom authorizator {name:?}");
            return Ok(authorizator);
        }

        if let Some(authorizator) = supplied {
            return Ok(authorizator);
        }

        if let Some(path) = settings.security.acl_file() {
            let path = settings.resolve_path(path);
            match AclFileParser::parse(&path) {
                Ok(acl) => {
                    log::info!("using acl file {}", path.display());
                    Ok(Arc::new(acl))
                }
                Err(e) => {
                    log::error!("format error in acl file {}, {e}", path.display());
                    Ok(Arc::new(DenyAllAuthorizator))
                }
            }
        } else {
            log::info!("starting without acl definition");
            Ok(Arc::new(PermitAllAuthorizator))
        }
    }

    ///The custom observer is optional: any failure here is logged and
    ///orchestration proceeds without it.
    pub async fn resolve_handler(&self, settings: &Settings) -> Option<Arc<dyn InterceptHandler>> {
        let name = settings.interception.handler_name()?;
        let fut = {
            match self.handlers.get(name) {
                Some(f) => (*f)(settings.clone()),
                None => {
                    log::error!("can't load the intercept handler {name:?}, not registered");
                    return None;
                }
            }
        };
        match fut.await {
            Ok(handler) => {
                log::info!("loaded custom intercept handler {name:?}");
                Some(handler)
            }
            Err(e) => {
                log::error!("can't load the intercept handler {name:?}, {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{BoxFuture, Resolver};
    use crate::auth::{AcceptAllAuthenticator, Authenticator, Authorizator, DenyAllAuthorizator};
    use crate::intercept::InterceptHandler;
    use crate::settings::{Inner, Security, Settings};
    use crate::types::{ClientId, Password};
    use crate::{BrokerError, Result};

    fn security_settings(security: Security) -> Settings {
        Settings::from(Inner { security, ..Default::default() })
    }

    fn deny_authenticator(_: Settings) -> BoxFuture<Result<Arc<dyn Authenticator>>> {
        #[derive(Debug)]
        struct Deny;
        #[async_trait::async_trait]
        impl Authenticator for Deny {
            async fn check_valid(
                &self,
                _client_id: &ClientId,
                _username: Option<&str>,
                _password: Option<&Password>,
            ) -> bool {
                false
            }
        }
        Box::pin(async { Ok(Arc::new(Deny) as Arc<dyn Authenticator>) })
    }

    #[tokio::test]
    async fn defaults_with_no_configuration() {
        let resolver = Resolver::new();
        let settings = security_settings(Security::default());

        let authenticator = resolver.resolve_authenticator(&settings, None).await.unwrap();
        assert!(authenticator.check_valid(&"c1".into(), Some("anyone"), None).await);

        let authorizator = resolver.resolve_authorizator(&settings, None).await.unwrap();
        assert!(authorizator.can_publish(&"c1".into(), None, "t").await);
        assert!(authorizator.can_subscribe(&"c1".into(), None, "t").await);
    }

    #[tokio::test]
    async fn supplied_instance_used_when_no_name_configured() {
        let resolver = Resolver::new();
        let settings = security_settings(Security::default());

        let supplied: Arc<dyn Authorizator> = Arc::new(DenyAllAuthorizator);
        let authorizator = resolver.resolve_authorizator(&settings, Some(supplied)).await.unwrap();
        assert!(!authorizator.can_publish(&"c1".into(), None, "t").await);
    }

    #[tokio::test]
    async fn configured_name_beats_supplied_instance() {
        let resolver = Resolver::new();
        resolver.register_authenticator("deny-all", deny_authenticator);

        let settings = security_settings(Security { authenticator: "deny-all".into(), ..Default::default() });
        let supplied: Arc<dyn Authenticator> = Arc::new(AcceptAllAuthenticator);
        let authenticator = resolver.resolve_authenticator(&settings, Some(supplied)).await.unwrap();
        assert!(!authenticator.check_valid(&"c1".into(), Some("anyone"), None).await);
    }

    #[tokio::test]
    async fn unknown_name_is_a_configuration_error() {
        let resolver = Resolver::new();
        let settings = security_settings(Security { authenticator: "no-such".into(), ..Default::default() });
        let err = resolver.resolve_authenticator(&settings, None).await.unwrap_err();
        assert!(matches!(err, BrokerError::Config(_)));

        let settings = security_settings(Security { authorizator: "no-such".into(), ..Default::default() });
        let err = resolver.resolve_authorizator(&settings, None).await.unwrap_err();
        assert!(matches!(err, BrokerError::Config(_)));
    }

    #[tokio::test]
    async fn factory_failure_is_a_configuration_error() {
        let resolver = Resolver::new();
        resolver.register_authenticator("broken", |_s: Settings| -> BoxFuture<Result<Arc<dyn Authenticator>>> {
            Box::pin(async { Err(BrokerError::Msg("nope".into())) })
        });
        let settings = security_settings(Security { authenticator: "broken".into(), ..Default::default() });
        let err = resolver.resolve_authenticator(&settings, None).await.unwrap_err();
        assert!(matches!(err, BrokerError::Config(_)));
    }

    #[tokio::test]
    async fn missing_password_file_is_fatal() {
        let resolver = Resolver::new();
        let settings =
            security_settings(Security { password_file: "/no/such/file".into(), ..Default::default() });
        let err = resolver.resolve_authenticator(&settings, None).await.unwrap_err();
        assert!(matches!(err, BrokerError::Config(_)));
    }

    #[tokio::test]
    async fn malformed_acl_degrades_to_deny_all() {
        let tmp = tempfile::tempdir().unwrap();
        let acl = tmp.path().join("rules.acl");
        std::fs::write(&acl, "this is not an acl file\n").unwrap();

        let resolver = Resolver::new();
        let settings = security_settings(Security {
            acl_file: acl.to_string_lossy().into_owned(),
            ..Default::default()
        });
        let authorizator = resolver.resolve_authorizator(&settings, None).await.unwrap();
        assert!(!authorizator.can_publish(&"c1".into(), Some("alice"), "t").await);
        assert!(!authorizator.can_subscribe(&"c1".into(), Some("alice"), "t").await);
    }

    #[tokio::test]
    async fn valid_acl_file_is_used() {
        let tmp = tempfile::tempdir().unwrap();
        let acl = tmp.path().join("rules.acl");
        std::fs::write(&acl, "topic readwrite announce\n").unwrap();

        let resolver = Resolver::new();
        let settings = security_settings(Security {
            acl_file: acl.to_string_lossy().into_owned(),
            ..Default::default()
        });
        let authorizator = resolver.resolve_authorizator(&settings, None).await.unwrap();
        assert!(authorizator.can_publish(&"c1".into(), None, "announce").await);
        assert!(!authorizator.can_publish(&"c1".into(), None, "other").await);
    }

    #[tokio::test]
    async fn optional_handler_failures_are_skipped() {
        let resolver = Resolver::new();

        //not registered
        let settings = Settings::from(Inner {
            interception: crate::settings::Interception { handler: "audit".into() },
            ..Default::default()
        });
        assert!(resolver.resolve_handler(&settings).await.is_none());

        //registered but failing to construct
        resolver.register_handler("audit", |_s: Settings| -> BoxFuture<Result<Arc<dyn InterceptHandler>>> {
            Box::pin(async { Err(BrokerError::Msg("down".into())) })
        });
        assert!(resolver.resolve_handler(&settings).await.is_none());

        //registered and healthy
        struct Noop;
        #[async_trait::async_trait]
        impl InterceptHandler for Noop {}
        resolver.register_handler("audit", |_s: Settings| -> BoxFuture<Result<Arc<dyn InterceptHandler>>> {
            Box::pin(async { Ok(Arc::new(Noop) as Arc<dyn InterceptHandler>) })
        });
        assert!(resolver.resolve_handler(&settings).await.is_some());
    }
}
