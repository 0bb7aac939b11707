// ABOUTME: Listener address configuration for the REST API.
// ABOUTME: Parses formats like "unix:/path/to.sock", "tcp:host:port", or a bare socket path.

use serde::de::{self, Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddress {
    Unix(PathBuf),
    Tcp { host: String, port: u16 },
}

impl FromStr for ListenAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("listen address cannot be empty".to_string());
        }

        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err("unix socket path cannot be empty".to_string());
            }
            return Ok(ListenAddress::Unix(PathBuf::from(path)));
        }

        if let Some(rest) = s.strip_prefix("tcp:") {
            let (host, port_str) = rest
                .rsplit_once(':')
                .ok_or_else(|| format!("missing port in tcp address: {}", rest))?;
            let port = port_str
                .parse::<u16>()
                .map_err(|_| format!("invalid port: {}", port_str))?;
            if host.is_empty() {
                return Err("hostname cannot be empty".to_string());
            }
            return Ok(ListenAddress::Tcp {
                host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
                port,
            });
        }

        if s.starts_with('/') {
            return Ok(ListenAddress::Unix(PathBuf::from(s)));
        }

        Err(format!("unknown listen address: {}", s))
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddress::Unix(path) => write!(f, "unix:{}", path.display()),
            ListenAddress::Tcp { host, port } if host.contains(':') => {
                write!(f, "tcp:[{}]:{}", host, port)
            }
            ListenAddress::Tcp { host, port } => write!(f, "tcp:{}:{}", host, port),
        }
    }
}

impl<'de> Deserialize<'de> for ListenAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_and_tcp() {
        assert_eq!(
            "unix:/run/quayd.sock".parse::<ListenAddress>().unwrap(),
            ListenAddress::Unix(PathBuf::from("/run/quayd.sock"))
        );
        assert_eq!(
            "tcp:[::1]:8443".parse::<ListenAddress>().unwrap(),
            ListenAddress::Tcp {
                host: "::1".to_string(),
                port: 8443
            }
        );
    }

    #[test]
    fn rejects_missing_port() {
        assert!("tcp:localhost".parse::<ListenAddress>().is_err());
    }
}
