use crate::error::RelayError;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// A `host:port` pair as written in the configuration.
///
/// The host is kept unresolved; name resolution happens when the address is
/// bound or dialed. IPv6 literals must be bracketed (`[::1]:22`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl HostPort {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl FromStr for HostPort {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| RelayError::Config(format!("'{}' is not in host:port form", s)))?;

        let host = if let Some(inner) = host.strip_prefix('[') {
            inner
                .strip_suffix(']')
                .ok_or_else(|| RelayError::Config(format!("unbalanced brackets in '{}'", s)))?
        } else if host.contains(':') {
            return Err(RelayError::Config(format!(
                "IPv6 address must be bracketed in '{}'",
                s
            )));
        } else {
            host
        };

        if host.is_empty() {
            return Err(RelayError::Config(format!("missing host in '{}'", s)));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| RelayError::Config(format!("invalid port in '{}': {}", s, e)))?;

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl<'de> Deserialize<'de> for HostPort {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        let addr: HostPort = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(addr.host, "127.0.0.1");
        assert_eq!(addr.port, 9000);
        assert_eq!(addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_parse_hostname() {
        let addr: HostPort = "bastion.internal:22".parse().unwrap();
        assert_eq!(addr, HostPort::new("bastion.internal", 22));
    }

    #[test]
    fn test_parse_bracketed_ipv6() {
        let addr: HostPort = "[::1]:2222".parse().unwrap();
        assert_eq!(addr.host, "::1");
        assert_eq!(addr.port, 2222);
        assert_eq!(addr.to_string(), "[::1]:2222");
    }

    #[test]
    fn test_rejects_bare_ipv6() {
        assert!("::1:22".parse::<HostPort>().is_err());
    }

    #[test]
    fn test_rejects_missing_parts() {
        assert!("localhost".parse::<HostPort>().is_err());
        assert!(":80".parse::<HostPort>().is_err());
        assert!("host:".parse::<HostPort>().is_err());
        assert!("host:99999".parse::<HostPort>().is_err());
        assert!("[::1:80".parse::<HostPort>().is_err());
    }
}
