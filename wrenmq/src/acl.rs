use std::path::Path;

use async_trait::async_trait;

use crate::auth::Authorizator;
use crate::types::{ClientId, TopicFilter, UserName};
use crate::{BrokerError, Result};

///Access granted by an ACL rule, mosquitto vocabulary: `read` covers
///subscribe, `write` covers publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    #[inline]
    fn allows_read(&self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    #[inline]
    fn allows_write(&self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

impl TryFrom<&str> for Access {
    type Error = BrokerError;
    #[inline]
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "read" => Ok(Access::Read),
            "write" => Ok(Access::Write),
            "readwrite" => Ok(Access::ReadWrite),
            _ => Err(BrokerError::AclParse(format!("unknown access {s:?}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub access: Access,
    pub topic: TopicFilter,
    ///None applies the rule to every client
    pub user: Option<UserName>,
}

impl Rule {
    #[inline]
    fn hit(&self, username: Option<&str>, topic: &str) -> bool {
        if let Some(user) = &self.user {
            if username != Some(&**user) {
                return false;
            }
        }
        //exact filter match plus the catch-all; wildcard semantics live in
        //the matching engine, not here
        &*self.topic == topic || &*self.topic == "#"
    }
}

///Authorizator built from a parsed ACL file. Anything no rule grants is
///denied.
#[derive(Debug)]
pub struct AclAuthorizator {
    rules: Vec<Rule>,
}

impl AclAuthorizator {
    #[inline]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    #[inline]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

#[async_trait]
impl Authorizator for AclAuthorizator {
    async fn can_publish(&self, _client_id: &ClientId, username: Option<&str>, topic: &str) -> bool {
        self.rules.iter().any(|r| r.access.allows_write() && r.hit(username, topic))
    }

    async fn can_subscribe(&self, _client_id: &ClientId, username: Option<&str>, topic: &str) -> bool {
        self.rules.iter().any(|r| r.access.allows_read() && r.hit(username, topic))
    }
}

///Parser for mosquitto-style ACL files:
///
///```text
///# global rules
///topic read $SYS/#
///topic readwrite sensor/announce
///
///user alice
///topic write sensor/alice/#
///```
///
///`topic` lines before the first `user` line apply to every client; after a
///`user <name>` line they apply to that user only. An access keyword is
///optional and defaults to `readwrite`.
pub struct AclFileParser;

impl AclFileParser {
    pub fn parse(path: &Path) -> Result<AclAuthorizator> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BrokerError::AclParse(format!("acl file {} unreadable, {e}", path.display())))?;
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> Result<AclAuthorizator> {
        let mut rules = Vec::new();
        let mut current_user: Option<UserName> = None;

        for (no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix("user ") {
                let name = rest.trim();
                if name.is_empty() {
                    return Err(BrokerError::AclParse(format!("empty user name at line {}", no + 1)));
                }
                current_user = Some(name.into());
            } else if let Some(rest) = line.strip_prefix("topic ") {
                rules.push(Self::parse_topic_line(rest.trim(), current_user.clone(), no + 1)?);
            } else {
                return Err(BrokerError::AclParse(format!(
                    "unrecognized directive at line {}, {line:?}",
                    no + 1
                )));
            }
        }

        Ok(AclAuthorizator::new(rules))
    }

    fn parse_topic_line(rest: &str, user: Option<UserName>, no: usize) -> Result<Rule> {
        let (access, filter) = match rest.split_once(char::is_whitespace) {
            Some((first, remainder)) if matches!(first, "read" | "write" | "readwrite") => {
                (Access::try_from(first)?, remainder.trim())
            }
            _ => (Access::ReadWrite, rest),
        };
        if filter.is_empty() {
            return Err(BrokerError::AclParse(format!("missing topic filter at line {no}")));
        }
        Ok(Rule { access, topic: filter.into(), user })
    }
}
