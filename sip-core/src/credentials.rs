//! Credentials store contract.
//!
//! The agent never holds passwords itself; it asks a `CredentialsManager`
//! for them each time a challenge is encountered, keyed by the server,
//! realm, and username named in the challenge.

/// A username/password pair for one `(server, realm, user)` triple.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// External collaborator that resolves credentials for a challenge.
/// Implementations are expected to be cheap to call repeatedly (e.g. an
/// in-memory map, or a thin wrapper over a secrets store) since the
/// authenticator calls `get` once per challenge.
pub trait CredentialsManager: Send + Sync {
    fn get(&self, server: &str, realm: &str, user: &str) -> Option<Credentials>;
}

/// A simple in-memory credentials manager backed by a single account,
/// sufficient for an agent that manages one SIP identity.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    server: String,
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(server: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl CredentialsManager for StaticCredentials {
    fn get(&self, server: &str, _realm: &str, user: &str) -> Option<Credentials> {
        if server == self.server && user == self.username {
            Some(Credentials {
                username: self.username.clone(),
                password: self.password.clone(),
            })
        } else {
            None
        }
    }
}
