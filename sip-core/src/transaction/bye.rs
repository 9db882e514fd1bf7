//! BYE transaction driver.
//!
//! A single retry on 401/407 is the specified behavior here, not a bug:
//! unlike REGISTER/INVITE, a second challenge on a BYE is treated as the
//! far end simply not answering, and the dialog is torn down locally
//! regardless.

use crate::composer::{Composer, Dialog};
use crate::error::Result;

use super::{authorize_challenge, send_and_recv, DriverContext, TRYING_TIMEOUT};

pub async fn bye(ctx: &DriverContext<'_>, composer: &Composer, dialog: &Dialog) -> Result<()> {
    let request = composer.compose_bye_or_cancel("BYE", dialog, None);
    let response = send_and_recv(ctx.socket, request.as_bytes(), "BYE", TRYING_TIMEOUT).await?;

    if matches!(response.status(), Some(401) | Some(407)) {
        let authorization = authorize_challenge(ctx, &response, "BYE", &dialog.remote_target, b"")?;
        let request = composer.compose_bye_or_cancel("BYE", dialog, Some(authorization));
        // Single retry; any further challenge is not chased, matching the
        // reference behavior of tearing the dialog down locally regardless.
        let _ = send_and_recv(ctx.socket, request.as_bytes(), "BYE", TRYING_TIMEOUT).await;
    }

    Ok(())
}
