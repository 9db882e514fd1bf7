//! Agent configuration.

use std::fmt;

/// The transport the agent sends and listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Udp,
    Tcp,
    Tls,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportMode::Udp => "UDP",
            TransportMode::Tcp => "TCP",
            TransportMode::Tls => "TLS",
        };
        write!(f, "{s}")
    }
}

/// TLS material, required only when `transport_mode` is `Tls`.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
    pub key_passphrase: Option<String>,
}

/// Everything the agent needs to register and place/receive calls with a
/// single SIP account.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub bind_ip: String,
    pub bind_port: u16,
    pub transport_mode: TransportMode,
    pub tls: Option<TlsConfig>,
    pub default_expires: u32,
    pub register_timeout: u64,
    pub allow_basic_auth: bool,
}

impl AgentConfig {
    /// Builds a config with the reference defaults
    /// (`bind_port=5060`, `default_expires=120`, `register_timeout=30`,
    /// `allow_basic_auth=false`).
    pub fn new(server: impl Into<String>, user: impl Into<String>, bind_ip: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: 5060,
            user: user.into(),
            bind_ip: bind_ip.into(),
            bind_port: 5060,
            transport_mode: TransportMode::Udp,
            tls: None,
            default_expires: 120,
            register_timeout: 30,
            allow_basic_auth: false,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_ip, self.bind_port)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let cfg = AgentConfig::new("registrar.example.com", "alice", "0.0.0.0");
        assert_eq!(cfg.bind_port, 5060);
        assert_eq!(cfg.default_expires, 120);
        assert_eq!(cfg.register_timeout, 30);
        assert!(!cfg.allow_basic_auth);
    }
}
