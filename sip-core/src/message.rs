//! The message contract shared by the composer, dispatcher and transaction
//! drivers.
//!
//! A full RFC 3261 parser is out of scope for this crate (see the purpose
//! and scope notes); what follows is the minimal conforming representation
//! the rest of the crate programs against, plus a line-oriented reader good
//! enough to drive the mock transport in tests and to satisfy the contract
//! described for an external parser.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result, SipParseError};

/// Whether a message is a request or a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
}

/// A parsed SIP message: either a request (method + request-line) or a
/// response (status code + reason phrase), with its headers, optional
/// body, and the raw bytes it was parsed from.
#[derive(Debug, Clone)]
pub struct Message {
    kind: MessageKind,
    method: Option<String>,
    status: Option<u16>,
    reason: String,
    version: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
    raw: String,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// The request method, if this is a request.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// The status code, if this is a response.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the first value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value of header `name` (case-insensitive), in order.
    pub fn headers_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn all_headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The `WWW-Authenticate` or `Proxy-Authenticate` challenge header,
    /// whichever is present, used to drive the authenticator.
    pub fn authentication(&self) -> Option<&str> {
        self.header("WWW-Authenticate")
            .or_else(|| self.header("Proxy-Authenticate"))
    }

    /// The request-line or status-line, without headers or body.
    pub fn heading(&self) -> &str {
        self.raw.lines().next().unwrap_or("")
    }

    /// A short human-readable summary, e.g. for logging.
    pub fn summary(&self) -> String {
        match self.kind {
            MessageKind::Request => format!(
                "{} (Call-ID {})",
                self.method.as_deref().unwrap_or("?"),
                self.header("Call-ID").unwrap_or("?")
            ),
            MessageKind::Response => format!(
                "{} {} (Call-ID {})",
                self.status.unwrap_or(0),
                self.reason,
                self.header("Call-ID").unwrap_or("?")
            ),
        }
    }

    /// Parses a raw SIP message (request or response) from its wire form.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut lines = raw.split("\r\n");
        let heading = lines
            .next()
            .ok_or_else(|| Error::Parse(SipParseError::new("empty message")))?;

        let mut headers = Vec::new();
        let mut body_lines = Vec::new();
        let mut in_body = false;
        for line in lines {
            if in_body {
                body_lines.push(line);
                continue;
            }
            if line.is_empty() {
                in_body = true;
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) => headers.push((name.trim().to_string(), value.trim().to_string())),
                None => {
                    return Err(Error::Parse(SipParseError::new(format!(
                        "malformed header line: {line}"
                    ))))
                }
            }
        }
        let body = if body_lines.iter().all(|l| l.is_empty()) {
            None
        } else {
            Some(body_lines.join("\r\n"))
        };

        if let Some(rest) = heading.strip_prefix("SIP/") {
            let mut parts = rest.splitn(2, ' ');
            let version = format!("SIP/{}", parts.next().unwrap_or(""));
            let rest = parts.next().unwrap_or("");
            let mut status_parts = rest.splitn(2, ' ');
            let status: u16 = status_parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::Parse(SipParseError::new("missing status code")))?;
            let reason = status_parts.next().unwrap_or("").to_string();
            Ok(Self {
                kind: MessageKind::Response,
                method: None,
                status: Some(status),
                reason,
                version,
                headers,
                body,
                raw: raw.to_string(),
            })
        } else {
            let mut parts = heading.splitn(3, ' ');
            let method = parts
                .next()
                .ok_or_else(|| Error::Parse(SipParseError::new("missing method")))?
                .to_string();
            let _uri = parts.next();
            let version = parts.next().unwrap_or("SIP/2.0").to_string();
            Ok(Self {
                kind: MessageKind::Request,
                method: Some(method),
                status: None,
                reason: String::new(),
                version,
                headers,
                body,
                raw: raw.to_string(),
            })
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// A loosely-typed parameter bag for header parameters such as
/// `;tag=`, `;branch=`, `;rport`.
pub type Params = HashMap<String, Option<String>>;

/// Parses `;key=value` / bare `;key` parameters from a header value tail.
pub fn parse_params(s: &str) -> Params {
    let mut params = HashMap::new();
    for part in s.split(';').skip(1) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.split_once('=') {
            Some((k, v)) => {
                params.insert(k.trim().to_string(), Some(v.trim().trim_matches('"').to_string()));
            }
            None => {
                params.insert(part.to_string(), None);
            }
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_response_status_and_headers() {
        let raw = "SIP/2.0 200 OK\r\nCall-ID: abc\r\nVia: SIP/2.0/UDP 1.2.3.4;branch=z9hG4bK1\r\n\r\n";
        let msg = Message::parse(raw).unwrap();
        assert_eq!(msg.kind(), MessageKind::Response);
        assert_eq!(msg.status(), Some(200));
        assert_eq!(msg.header("Call-ID"), Some("abc"));
    }

    #[test]
    fn parses_request_method() {
        let raw = "BYE sip:bob@biloxi.com SIP/2.0\r\nCall-ID: abc\r\n\r\n";
        let msg = Message::parse(raw).unwrap();
        assert_eq!(msg.kind(), MessageKind::Request);
        assert_eq!(msg.method(), Some("BYE"));
    }

    #[test]
    fn via_params_parse_rport_bare_and_valued() {
        let bare = parse_params(";branch=z9hG4bK1;rport");
        assert_eq!(bare.get("rport"), Some(&None));
        let valued = parse_params(";branch=z9hG4bK1;rport=5060;received=1.2.3.4");
        assert_eq!(valued.get("rport"), Some(&Some("5060".to_string())));
        assert_eq!(valued.get("received"), Some(&Some("1.2.3.4".to_string())));
    }
}
