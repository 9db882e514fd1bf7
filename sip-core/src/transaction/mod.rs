//! Outbound transaction drivers.
//!
//! Each driver owns the socket for the duration of its own transaction:
//! it sends the request, then reads replies off the same socket until it
//! gets a final response, a timeout, or a bounded number of 500 retries.
//! The receive task is not started until the initial REGISTER has
//! succeeded (see the agent lifecycle), so there is no race between a
//! driver's own reads and the receive task's reads during startup.

pub mod bye;
pub mod cancel;
pub mod invite;
pub mod message;
pub mod register;

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Authenticator, Challenge};
use crate::credentials::CredentialsManager;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::transport::VoipSocket;

/// Bounds the 500-response retry loop (Design Notes: bounded retry
/// replaces the reference client's unbounded recursion).
pub const MAX_SERVER_ERROR_RETRIES: u32 = 3;

/// How long a driver waits for a `100 Trying` before giving up on the
/// transaction entirely.
pub const TRYING_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared pieces every transaction driver needs: a socket to drive, a
/// credentials source, and an authenticator to answer challenges.
pub struct DriverContext<'a> {
    pub socket: &'a dyn VoipSocket,
    pub credentials: &'a dyn CredentialsManager,
    pub authenticator: &'a Authenticator,
    pub server: &'a str,
    pub realm_user: &'a str,
    pub allow_basic_auth: bool,
}

/// Sends `request` and reads from the socket until a response with
/// `CSeq: <cseq> <method>` arrives, a non-`100` final response arrives, or
/// `timeout` elapses.
pub async fn send_and_recv(
    socket: &dyn VoipSocket,
    request: &[u8],
    method: &'static str,
    timeout: Duration,
) -> Result<Message> {
    socket.send(request).await?;
    let mut buf = vec![0u8; 8192];
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Err(Error::Timeout { method });
        }
        let n = match tokio::time::timeout(remaining, socket.recv(&mut buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(Error::Io(e)),
            Err(_) => return Err(Error::Timeout { method }),
        };
        let text = String::from_utf8_lossy(&buf[..n]).to_string();
        let message = Message::parse(&text)?;
        if message.version() != "SIP/2.0" {
            return Err(Error::VersionUnsupported(message.version().to_string()));
        }
        if message.status() == Some(100) {
            continue;
        }
        return Ok(message);
    }
}

/// Resolves a challenge from `response` into an `Authorization`/
/// `Proxy-Authorization` header, looking up credentials by the challenge's
/// realm.
pub fn authorize_challenge(
    ctx: &DriverContext<'_>,
    response: &Message,
    method: &str,
    uri: &str,
    body: &[u8],
) -> Result<(&'static str, String)> {
    let header_value = response
        .authentication()
        .ok_or_else(|| Error::Parse(crate::error::SipParseError::new("401/407 without a challenge header")))?;
    let header_name = if response.header("Proxy-Authenticate").is_some() {
        "Proxy-Authenticate"
    } else {
        "WWW-Authenticate"
    };
    let challenge = Challenge::parse(header_name, header_value)?;
    if challenge.scheme.eq_ignore_ascii_case("Basic") && !ctx.allow_basic_auth {
        return Err(Error::BasicAuthNotAllowed);
    }
    let creds = ctx
        .credentials
        .get(ctx.server, &challenge.realm, ctx.realm_user)
        .ok_or_else(|| Error::InvalidAccountInfo {
            server: ctx.server.to_string(),
            realm: challenge.realm.clone(),
            user: ctx.realm_user.to_string(),
        })?;
    ctx.authenticator.authorize(&challenge, method, uri, &creds, body)
}

/// A reference-counted, `Send + Sync` socket handle shared between the
/// agent's driver calls and its receive task.
pub type SharedSocket = Arc<dyn VoipSocket>;
