//! HTTP Digest (RFC 7616 / RFC 2617) and Basic authentication.
//!
//! The authenticator turns a `WWW-Authenticate`/`Proxy-Authenticate`
//! challenge plus a `Credentials` pair into the exact bytes of an
//! `Authorization`/`Proxy-Authorization` header value. It is the single
//! source of truth for the hashed bytes — callers never reconstruct HA1/
//! HA2 themselves.

use base64::Engine as _;
use md5::Md5;
use sha2::{Digest as Sha2Digest, Sha256, Sha512_256};

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::ids::gen_cnonce;
use crate::message::parse_params;
use crate::tags::NonceCounters;

/// The Digest algorithm named in the challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Md5,
    Md5Sess,
    Sha256,
    Sha256Sess,
    Sha512_256,
    Sha512_256Sess,
}

impl Algorithm {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "MD5" => Ok(Algorithm::Md5),
            "MD5-sess" => Ok(Algorithm::Md5Sess),
            "SHA-256" => Ok(Algorithm::Sha256),
            "SHA-256-sess" => Ok(Algorithm::Sha256Sess),
            "SHA-512-256" => Ok(Algorithm::Sha512_256),
            "SHA-512-256-sess" => Ok(Algorithm::Sha512_256Sess),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }

    fn is_sess(self) -> bool {
        matches!(self, Algorithm::Md5Sess | Algorithm::Sha256Sess | Algorithm::Sha512_256Sess)
    }

    fn token(self) -> &'static str {
        match self {
            Algorithm::Md5 => "MD5",
            Algorithm::Md5Sess => "MD5-sess",
            Algorithm::Sha256 => "SHA-256",
            Algorithm::Sha256Sess => "SHA-256-sess",
            Algorithm::Sha512_256 => "SHA-512-256",
            Algorithm::Sha512_256Sess => "SHA-512-256-sess",
        }
    }

    fn hash(self, input: &str) -> String {
        match self {
            Algorithm::Md5 | Algorithm::Md5Sess => hex::encode(Md5::digest(input.as_bytes())),
            Algorithm::Sha256 | Algorithm::Sha256Sess => hex::encode(Sha256::digest(input.as_bytes())),
            Algorithm::Sha512_256 | Algorithm::Sha512_256Sess => {
                hex::encode(Sha512_256::digest(input.as_bytes()))
            }
        }
    }
}

/// The QOP (quality of protection) requested by the server, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qop {
    Auth,
    AuthInt,
}

/// A parsed `WWW-Authenticate`/`Proxy-Authenticate` challenge.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub scheme: String,
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub algorithm: Algorithm,
    pub qop: Option<Qop>,
    pub userhash: bool,
    pub proxy: bool,
}

impl Challenge {
    /// Parses a challenge header value such as
    /// `Digest realm="biloxi.com", nonce="...", algorithm=MD5, qop="auth"`.
    pub fn parse(header_name: &str, value: &str) -> Result<Self> {
        let (scheme, rest) = value.split_once(' ').unwrap_or((value, ""));
        let params = parse_params(&format!(";{}", rest.replace(", ", ";").replace(',', ";")));

        let get = |k: &str| params.get(k).and_then(|v| v.clone());

        let algorithm = match get("algorithm") {
            Some(a) => Algorithm::parse(&a)?,
            None => Algorithm::Md5,
        };
        let qop = get("qop").and_then(|q| {
            let options: Vec<&str> = q.split(',').map(str::trim).collect();
            if options.contains(&"auth") {
                Some(Qop::Auth)
            } else if options.contains(&"auth-int") {
                Some(Qop::AuthInt)
            } else {
                None
            }
        });
        let userhash = get("userhash").as_deref() == Some("true");

        Ok(Self {
            scheme: scheme.to_string(),
            realm: get("realm").unwrap_or_default(),
            nonce: get("nonce").unwrap_or_default(),
            opaque: get("opaque"),
            algorithm,
            qop,
            userhash,
            proxy: header_name.eq_ignore_ascii_case("Proxy-Authenticate"),
        })
    }
}

/// Turns challenges into `Authorization`/`Proxy-Authorization` header
/// values. Holds the per-nonce `nc` counters since RFC 7616 requires a
/// monotonically increasing count per `(nonce, algorithm)` pair for the
/// lifetime of the nonce.
#[derive(Debug, Default)]
pub struct Authenticator {
    nonce_counters: NonceCounters,
}

impl Authenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the `Authorization`/`Proxy-Authorization` header (name,
    /// value) pair for `challenge`, authenticating `method uri` with
    /// `creds`. `body` is required when `qop=auth-int` is requested (HA2
    /// binds the request body).
    pub fn authorize(
        &self,
        challenge: &Challenge,
        method: &str,
        uri: &str,
        creds: &Credentials,
        body: &[u8],
    ) -> Result<(&'static str, String)> {
        let header_name = if challenge.proxy {
            "Proxy-Authorization"
        } else {
            "Authorization"
        };

        if challenge.scheme.eq_ignore_ascii_case("Basic") {
            let raw = format!("{}:{}", creds.username, creds.password);
            let value = format!(
                "Basic {}",
                base64::engine::general_purpose::STANDARD.encode(raw)
            );
            return Ok((header_name, value));
        }

        let algo = challenge.algorithm;
        let ha1_base = format!("{}:{}:{}", creds.username, challenge.realm, creds.password);
        let ha1 = algo.hash(&ha1_base);

        let cnonce = gen_cnonce();
        let ha1 = if algo.is_sess() {
            algo.hash(&format!("{ha1}:{}:{cnonce}", challenge.nonce))
        } else {
            ha1
        };

        let ha2_base = match challenge.qop {
            Some(Qop::AuthInt) => {
                let body_hash = algo.hash(&String::from_utf8_lossy(body));
                format!("{method}:{uri}:{body_hash}")
            }
            _ => format!("{method}:{uri}"),
        };
        let ha2 = algo.hash(&ha2_base);

        let (response, nc_str, qop_token) = match challenge.qop {
            Some(qop) => {
                let nc = self.nonce_counters.next(&challenge.nonce);
                let nc_str = format!("{nc:08x}");
                let qop_token = match qop {
                    Qop::Auth => "auth",
                    Qop::AuthInt => "auth-int",
                };
                let response = algo.hash(&format!(
                    "{ha1}:{}:{nc_str}:{cnonce}:{qop_token}:{ha2}",
                    challenge.nonce
                ));
                (response, Some(nc_str), Some(qop_token))
            }
            None => {
                let response = algo.hash(&format!("{ha1}:{}:{ha2}", challenge.nonce));
                (response, None, None)
            }
        };

        let username_field = if challenge.userhash {
            let hashed = algo.hash(&format!("{}:{}", creds.username, challenge.realm));
            format!("username=\"{hashed}\"")
        } else {
            format!("username=\"{}\"", creds.username)
        };

        let mut value = format!(
            "Digest {username_field}, realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", response=\"{response}\", algorithm={}",
            challenge.realm,
            challenge.nonce,
            algo.token(),
        );
        if let Some(opaque) = &challenge.opaque {
            value.push_str(&format!(", opaque=\"{opaque}\""));
        }
        if let (Some(nc), Some(qop_token)) = (nc_str, qop_token) {
            value.push_str(&format!(", qop={qop_token}, nc={nc}, cnonce=\"{cnonce}\""));
        }
        if challenge.userhash {
            value.push_str(", userhash=true");
        }

        Ok((header_name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3261_digest_vector_matches() {
        let challenge = Challenge {
            scheme: "Digest".to_string(),
            realm: "biloxi.com".to_string(),
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".to_string(),
            opaque: Some("5ccc069c403ebaf9f0171e9517f40e41".to_string()),
            algorithm: Algorithm::Md5,
            qop: None,
            userhash: false,
            proxy: false,
        };
        let creds = Credentials {
            username: "bob".to_string(),
            password: "zanzibar".to_string(),
        };
        let auth = Authenticator::new();
        let (name, value) = auth
            .authorize(&challenge, "REGISTER", "sip:registrar.biloxi.com", &creds, b"")
            .unwrap();
        assert_eq!(name, "Authorization");
        assert!(value.contains("response=\"b4e0a3a72bb618580130047003c64700\""));
    }

    #[test]
    fn rfc3261_digest_vector_matches_for_invite_uri() {
        let challenge = Challenge {
            scheme: "Digest".to_string(),
            realm: "biloxi.com".to_string(),
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".to_string(),
            opaque: Some("5ccc069c403ebaf9f0171e9517f40e41".to_string()),
            algorithm: Algorithm::Md5,
            qop: None,
            userhash: false,
            proxy: false,
        };
        let creds = Credentials {
            username: "bob".to_string(),
            password: "zanzibar".to_string(),
        };
        let auth = Authenticator::new();
        let (_, value) = auth
            .authorize(&challenge, "INVITE", "sip:bob@biloxi.com", &creds, b"")
            .unwrap();
        assert!(value.contains("response=\"bf57e4e0d0bffc0fbaedce64d59add5e\""));
    }

    #[test]
    fn qop_auth_increments_nc_on_repeat_use() {
        let challenge = Challenge {
            scheme: "Digest".to_string(),
            realm: "biloxi.com".to_string(),
            nonce: "abcd1234".to_string(),
            opaque: None,
            algorithm: Algorithm::Md5,
            qop: Some(Qop::Auth),
            userhash: false,
            proxy: false,
        };
        let creds = Credentials {
            username: "bob".to_string(),
            password: "zanzibar".to_string(),
        };
        let auth = Authenticator::new();
        let (_, first) = auth
            .authorize(&challenge, "REGISTER", "sip:biloxi.com", &creds, b"")
            .unwrap();
        let (_, second) = auth
            .authorize(&challenge, "REGISTER", "sip:biloxi.com", &creds, b"")
            .unwrap();
        assert!(first.contains("nc=00000001"));
        assert!(second.contains("nc=00000002"));
    }

    #[test]
    fn auth_int_binds_body_into_response() {
        let challenge = Challenge {
            scheme: "Digest".to_string(),
            realm: "biloxi.com".to_string(),
            nonce: "abcd1234".to_string(),
            opaque: None,
            algorithm: Algorithm::Md5,
            qop: Some(Qop::AuthInt),
            userhash: false,
            proxy: false,
        };
        let creds = Credentials {
            username: "bob".to_string(),
            password: "zanzibar".to_string(),
        };
        let auth = Authenticator::new();
        let (_, a) = auth
            .authorize(&challenge, "MESSAGE", "sip:biloxi.com", &creds, b"hello")
            .unwrap();
        let (_, b) = auth
            .authorize(&challenge, "MESSAGE", "sip:biloxi.com", &creds, b"goodbye")
            .unwrap();
        assert_ne!(a, b, "different bodies under auth-int must hash differently");
    }

    #[test]
    fn basic_auth_encodes_username_password() {
        let challenge = Challenge {
            scheme: "Basic".to_string(),
            realm: "biloxi.com".to_string(),
            nonce: String::new(),
            opaque: None,
            algorithm: Algorithm::Md5,
            qop: None,
            userhash: false,
            proxy: false,
        };
        let creds = Credentials {
            username: "bob".to_string(),
            password: "zanzibar".to_string(),
        };
        let auth = Authenticator::new();
        let (name, value) = auth
            .authorize(&challenge, "REGISTER", "sip:biloxi.com", &creds, b"")
            .unwrap();
        assert_eq!(name, "Authorization");
        assert!(value.starts_with("Basic "));
    }
}
