//! Routes inbound requests and responses to the right handler.
//!
//! For BYE and CANCEL, the application callback always runs before the
//! stock reply is composed and sent — a callback that wants to inspect
//! the teardown before the agent answers it must not be raced by the
//! agent's own response.

use async_trait::async_trait;

use crate::message::{Message, MessageKind};

/// What the dispatcher decided to do with an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A response to one of our own transactions; hand to the transaction
    /// driver that is waiting on it.
    TransactionResponse,
    /// An inbound request answered purely by a stock reply (OPTIONS).
    StockReply,
    /// An inbound request that runs the application callback, then a
    /// stock reply (BYE, CANCEL).
    CallbackThenStockReply,
    /// An inbound request that only runs the application callback
    /// (INVITE, MESSAGE — the transaction driver composes the reply).
    CallbackOnly,
    /// Unrecognized method/response; logged and dropped.
    Unhandled,
}

/// Decides how an inbound message should be routed, mirroring the
/// dispatch table: requests route by method, responses always go to the
/// waiting transaction.
pub fn route(message: &Message) -> Route {
    match message.kind() {
        MessageKind::Response => Route::TransactionResponse,
        MessageKind::Request => match message.method() {
            Some("OPTIONS") => Route::StockReply,
            Some("BYE") | Some("CANCEL") => Route::CallbackThenStockReply,
            Some("INVITE") | Some("MESSAGE") => Route::CallbackOnly,
            Some("ACK") => Route::Unhandled,
            _ => Route::Unhandled,
        },
    }
}

/// The application's hook for inbound requests that need a decision
/// (answer/reject an INVITE, consume a MESSAGE body). Returning `Some`
/// text lets the callback supply an auto-reply body; `None` means the
/// agent's stock handling is enough.
#[async_trait]
pub trait CallCallback: Send + Sync {
    async fn on_message(&self, message: &Message) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str) -> Message {
        Message::parse(&format!("{method} sip:bob@biloxi.com SIP/2.0\r\nCall-ID: x\r\n\r\n")).unwrap()
    }

    fn response() -> Message {
        Message::parse("SIP/2.0 200 OK\r\nCall-ID: x\r\n\r\n").unwrap()
    }

    #[test]
    fn responses_always_route_to_transaction() {
        assert_eq!(route(&response()), Route::TransactionResponse);
    }

    #[test]
    fn bye_and_cancel_run_callback_before_stock_reply() {
        assert_eq!(route(&request("BYE")), Route::CallbackThenStockReply);
        assert_eq!(route(&request("CANCEL")), Route::CallbackThenStockReply);
    }

    #[test]
    fn options_is_a_pure_stock_reply() {
        assert_eq!(route(&request("OPTIONS")), Route::StockReply);
    }
}
