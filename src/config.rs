//! Host configuration - alias table used to resolve remote targets

use crate::error::{Result, WeaveError};
use serde::Deserialize;
use std::collections::BTreeMap;

/// A remote host reachable over ssh
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Host {
    pub addr: String,
    pub user: String,
}

impl Host {
    pub fn new(addr: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            user: user.into(),
        }
    }

    /// Connection target: `user@addr`, or bare `addr` when no user is set
    pub fn target(&self) -> String {
        if self.user.is_empty() {
            self.addr.clone()
        } else {
            format!("{}@{}", self.user, self.addr)
        }
    }
}

/// Alias → host mapping
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostConfig {
    hosts: BTreeMap<String, Host>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    hosts: Option<serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHost {
    addr: String,
    #[serde(default)]
    user: String,
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_host(mut self, alias: impl Into<String>, host: Host) -> Self {
        self.hosts.insert(alias.into(), host);
        self
    }

    /// Parse the `config` section of a Weavefile.
    ///
    /// An absent section yields an empty table. A present section must carry
    /// a `hosts` mapping whose entries each have a non-empty `addr`.
    pub fn from_value(value: Option<&serde_yaml::Value>) -> Result<Self> {
        let Some(value) = value else {
            return Ok(Self::default());
        };
        if value.is_null() {
            return Ok(Self::default());
        }
        if !value.is_mapping() {
            return Err(WeaveError::Config("config must be a mapping".into()));
        }

        let raw: RawConfig = serde_yaml::from_value(value.clone())
            .map_err(|e| WeaveError::Config(e.to_string()))?;

        let Some(hosts) = raw.hosts else {
            return Err(WeaveError::Config("no valid hosts found".into()));
        };
        let Some(table) = hosts.as_mapping() else {
            return Err(WeaveError::Config("config.hosts must be a mapping".into()));
        };

        let mut config = Self::default();
        for (key, entry) in table {
            let Some(alias) = key.as_str() else {
                return Err(WeaveError::Config(format!(
                    "config.hosts keys must be strings, got {:?}",
                    key
                )));
            };
            let raw: RawHost = serde_yaml::from_value(entry.clone())
                .map_err(|e| WeaveError::Config(format!("config.hosts.{}: {}", alias, e)))?;
            if raw.addr.trim().is_empty() {
                return Err(WeaveError::Config(format!(
                    "config.hosts.{}: addr cannot be empty",
                    alias
                )));
            }
            config.hosts.insert(alias.to_string(), Host::new(raw.addr, raw.user));
        }

        Ok(config)
    }

    /// Resolve an alias to its connection target
    pub fn resolve(&self, alias: &str) -> Result<String> {
        self.hosts
            .get(alias)
            .map(Host::target)
            .ok_or_else(|| WeaveError::Argument(format!("unknown host: {}", alias)))
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<HostConfig> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        HostConfig::from_value(Some(&value))
    }

    #[test]
    fn test_host_target() {
        assert_eq!(Host::new("10.0.0.1", "deploy").target(), "deploy@10.0.0.1");
        assert_eq!(Host::new("box.local", "").target(), "box.local");
    }

    #[test]
    fn test_parse_hosts() {
        let config = parse(
            r#"
hosts:
  web: { addr: 10.0.0.5, user: deploy }
  db:
    addr: db.internal
"#,
        )
        .unwrap();

        assert_eq!(config.len(), 2);
        assert_eq!(config.resolve("web").unwrap(), "deploy@10.0.0.5");
        assert_eq!(config.resolve("db").unwrap(), "db.internal");
        assert_eq!(config.aliases().collect::<Vec<_>>(), vec!["db", "web"]);
    }

    #[test]
    fn test_absent_config_is_empty() {
        assert!(HostConfig::from_value(None).unwrap().is_empty());
        assert!(parse("~").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_config() {
        assert!(matches!(parse("[1, 2]"), Err(WeaveError::Config(_))));
        assert!(matches!(parse("{}"), Err(WeaveError::Config(_))));
        assert!(matches!(parse("hosts: [a]"), Err(WeaveError::Config(_))));
        assert!(matches!(
            parse("hosts: { web: { user: x } }"),
            Err(WeaveError::Config(_))
        ));
        assert!(matches!(
            parse("hosts: { web: { addr: '' } }"),
            Err(WeaveError::Config(_))
        ));
        assert!(matches!(
            parse("hosts: { web: { addr: a, port: 22 } }"),
            Err(WeaveError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_alias_is_argument_error() {
        let config = HostConfig::new().with_host("web", Host::new("10.0.0.5", ""));
        let err = config.resolve("nope").unwrap_err();
        assert!(matches!(err, WeaveError::Argument(_)));
        assert!(err.to_string().contains("unknown host: nope"));
    }
}
