//! INVITE transaction driver.

use crate::composer::{Composer, Dialog};
use crate::error::Result;
use crate::sdp::MediaOffer;

use super::{authorize_challenge, send_and_recv, DriverContext, TRYING_TIMEOUT};

/// Places a call: sends INVITE; on a 401/407, ACKs that challenge first
/// (as RFC 3261 requires for any non-2xx final response), then resends an
/// authenticated INVITE in a fresh transaction. Whatever final response
/// comes back after that is ACKed again to close out the transaction.
pub async fn invite(ctx: &DriverContext<'_>, composer: &Composer, callee: &str, offer: &MediaOffer) -> Result<Dialog> {
    let (request, mut dialog) = composer.compose_invite(callee, offer, None);
    let response = send_and_recv(ctx.socket, request.as_bytes(), "INVITE", TRYING_TIMEOUT).await?;

    let response = match response.status() {
        Some(401) | Some(407) => {
            dialog.remote_tag = remote_tag(&response);
            let challenge_ack = composer.compose_ack(&dialog);
            ctx.socket.send(challenge_ack.as_bytes()).await?;

            let uri = format!("sip:{callee}");
            let authorization = authorize_challenge(ctx, &response, "INVITE", &uri, b"")?;
            let (request, new_dialog) = composer.compose_invite(callee, offer, Some(authorization));
            dialog = new_dialog;
            send_and_recv(ctx.socket, request.as_bytes(), "INVITE", TRYING_TIMEOUT).await?
        }
        _ => response,
    };

    dialog.remote_tag = remote_tag(&response);

    let ack = composer.compose_ack(&dialog);
    ctx.socket.send(ack.as_bytes()).await?;

    Ok(dialog)
}

fn remote_tag(response: &crate::message::Message) -> Option<String> {
    response
        .header("To")
        .and_then(|to| to.split_once("tag=").map(|(_, tag)| tag.to_string()))
}
