// Server identity

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Region server identity: host, port and start code.
///
/// Rendered and parsed as `host,port,startcode`. The start code tells apart
/// two incarnations of a server on the same host and port, so a restarted
/// server is a different identity.
///
/// Ordering is (host, port, start_code); the queue table relies on it for
/// a deterministic tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerName {
    host: String,
    port: u16,
    start_code: u64,
}

impl ServerName {
    pub fn new(host: impl Into<String>, port: u16, start_code: u64) -> Self {
        Self {
            host: host.into(),
            port,
            start_code,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn start_code(&self) -> u64 {
        self.start_code
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.host, self.port, self.start_code)
    }
}

impl FromStr for ServerName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidServerName(s.to_string());

        let mut parts = s.split(',');
        let (Some(host), Some(port), Some(start_code), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let host = host.trim();
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.trim().parse::<u16>().map_err(|_| invalid())?;
        let start_code = start_code.trim().parse::<u64>().map_err(|_| invalid())?;

        Ok(Self::new(host, port, start_code))
    }
}

impl TryFrom<String> for ServerName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServerName> for String {
    fn from(server: ServerName) -> Self {
        server.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let server: ServerName = "rs1.example.com,16020,1700000000000".parse().unwrap();
        assert_eq!(server.host(), "rs1.example.com");
        assert_eq!(server.port(), 16020);
        assert_eq!(server.start_code(), 1_700_000_000_000);
        assert_eq!(server.to_string(), "rs1.example.com,16020,1700000000000");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "host", "host,16020", ",16020,1", "host,port,1", "h,1,2,3", "h,70000,1"] {
            assert!(
                matches!(bad.parse::<ServerName>(), Err(DomainError::InvalidServerName(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_restart_is_distinct_identity() {
        let before = ServerName::new("rs1", 16020, 1);
        let after = ServerName::new("rs1", 16020, 2);
        assert_ne!(before, after);
        assert!(before < after);
    }

    #[test]
    fn test_serde_as_string() {
        let server = ServerName::new("rs2", 16020, 42);
        let json = serde_json::to_string(&server).unwrap();
        assert_eq!(json, "\"rs2,16020,42\"");

        let back: ServerName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, server);

        assert!(serde_json::from_str::<ServerName>("\"nope\"").is_err());
    }
}
