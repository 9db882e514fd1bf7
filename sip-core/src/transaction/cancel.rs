//! CANCEL transaction driver.
//!
//! CANCEL only ever applies to an INVITE that has not yet received a final
//! response, so it reuses that INVITE's branch and CSeq number rather than
//! minting its own.

use crate::composer::{Composer, Dialog};
use crate::error::Result;

use super::{send_and_recv, DriverContext, TRYING_TIMEOUT};

pub async fn cancel(ctx: &DriverContext<'_>, composer: &Composer, dialog: &Dialog) -> Result<()> {
    let request = composer.compose_bye_or_cancel("CANCEL", dialog, None);
    let _ = send_and_recv(ctx.socket, request.as_bytes(), "CANCEL", TRYING_TIMEOUT).await?;
    Ok(())
}
