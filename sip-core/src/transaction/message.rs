//! MESSAGE (instant message) transaction driver.
//!
//! The reference client spliced a retried `Authorization` header by
//! replacing a literal placeholder string that was never actually present
//! in the composed request, so the second attempt silently went out
//! unauthenticated. Here the composer is asked to render the
//! `Authorization` header directly on the retry instead of splicing text.

use crate::composer::Composer;
use crate::error::Result;

use super::{authorize_challenge, send_and_recv, DriverContext, TRYING_TIMEOUT};

/// Sends a MESSAGE to `to`, answering one 401/407 challenge.
pub async fn message(ctx: &DriverContext<'_>, composer: &Composer, to: &str, text: &str) -> Result<()> {
    let request = composer.compose_message(to, text, None);
    let response = send_and_recv(ctx.socket, request.as_bytes(), "MESSAGE", TRYING_TIMEOUT).await?;

    if matches!(response.status(), Some(401) | Some(407)) {
        let uri = format!("sip:{to}");
        let authorization = authorize_challenge(ctx, &response, "MESSAGE", &uri, text.as_bytes())?;
        let request = composer.compose_message(to, text, Some(authorization));
        send_and_recv(ctx.socket, request.as_bytes(), "MESSAGE", TRYING_TIMEOUT).await?;
    }

    Ok(())
}
