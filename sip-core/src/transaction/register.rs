//! REGISTER / DEREGISTER transaction driver.

use std::time::Duration;

use crate::composer::Composer;
use crate::error::{Error, Result};
use crate::message::Message;

use super::{authorize_challenge, send_and_recv, DriverContext, MAX_SERVER_ERROR_RETRIES, TRYING_TIMEOUT};

/// Result of a successful REGISTER: the `Expires` the server actually
/// granted, used to schedule the next refresh.
#[derive(Debug)]
pub struct Registered {
    pub expires: u32,
}

/// Runs a REGISTER (or, with `expires == 0`, a DEREGISTER), challenging
/// once on 401/407 and retrying up to [`MAX_SERVER_ERROR_RETRIES`] times on
/// 500. A second 401/407 after already answering one challenge is treated
/// as fatal bad credentials, matching the reference behavior.
pub async fn register(ctx: &DriverContext<'_>, composer: &Composer, expires: u32) -> Result<Registered> {
    let request = composer.compose_register(expires, None);
    let response = send_and_recv(ctx.socket, request.as_bytes(), "REGISTER", TRYING_TIMEOUT).await?;

    let response = match response.status() {
        Some(200) => response,
        Some(401) | Some(407) => {
            let uri = format!("sip:{}", ctx.server);
            let authorization = authorize_challenge(ctx, &response, "REGISTER", &uri, b"")?;
            let request = composer.compose_register(expires, Some(authorization));
            let response = send_and_recv(ctx.socket, request.as_bytes(), "REGISTER", TRYING_TIMEOUT).await?;
            match response.status() {
                Some(200) => response,
                Some(401) | Some(407) => {
                    return Err(Error::InvalidAccountInfo {
                        server: ctx.server.to_string(),
                        realm: String::new(),
                        user: ctx.realm_user.to_string(),
                    })
                }
                Some(status) if (500..600).contains(&status) => {
                    retry_on_server_error(ctx, composer, expires, None).await?
                }
                _ => response,
            }
        }
        Some(status) if (500..600).contains(&status) => {
            retry_on_server_error(ctx, composer, expires, None).await?
        }
        _ => response,
    };

    let granted = response
        .header("Expires")
        .and_then(|v| v.parse().ok())
        .unwrap_or(expires);
    Ok(Registered { expires: granted })
}

async fn retry_on_server_error(
    ctx: &DriverContext<'_>,
    composer: &Composer,
    expires: u32,
    authorization: Option<(&'static str, String)>,
) -> Result<Message> {
    let mut last_status = 500;
    for attempt in 0..MAX_SERVER_ERROR_RETRIES {
        tokio::time::sleep(Duration::from_millis(200 * (attempt as u64 + 1))).await;
        let request = composer.compose_register(expires, authorization.clone());
        let response = send_and_recv(ctx.socket, request.as_bytes(), "REGISTER", TRYING_TIMEOUT).await?;
        match response.status() {
            Some(200) => return Ok(response),
            Some(status) if (500..600).contains(&status) => last_status = status,
            _ => return Ok(response),
        }
    }
    Err(Error::ServerError { status: last_status })
}
