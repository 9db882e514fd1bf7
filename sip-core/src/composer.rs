//! Builds the exact bytes of every outbound SIP message.
//!
//! This is the single source of truth for header composition: the
//! authenticator only computes the `response=` hash, the composer decides
//! where every header goes and in what order, so that what gets
//! Digest-hashed by the authenticator for `qop=auth-int` is always exactly
//! what goes out on the wire.

use std::fmt::Write as _;

use crate::config::AgentConfig;
use crate::ids::{gen_branch, gen_instance_urn, CSeqCounters, CallIdGen};
use crate::sdp::MediaOffer;
use crate::tags::{TagLibrary, REGISTER_TAG_KEY};

/// Methods this crate's composer and dispatcher implement, advertised in
/// the `Allow` header.
pub const SUPPORTED_METHODS: &str = "INVITE, ACK, BYE, CANCEL, OPTIONS, REGISTER, MESSAGE, SUBSCRIBE";

const BRANCH_LEN: usize = 32;

/// Shared identity/sequencing state used across every composed message.
pub struct Composer {
    config: AgentConfig,
    cseq: CSeqCounters,
    call_ids: CallIdGen,
    tags: TagLibrary,
    instance_urn: String,
}

/// Identifies an existing dialog for requests that must stay inside it
/// (ACK, BYE, CANCEL, re-sent INVITE).
#[derive(Debug, Clone)]
pub struct Dialog {
    pub call_id: String,
    pub cseq: u32,
    pub branch: String,
    pub local_tag: String,
    pub remote_tag: Option<String>,
    pub local_uri: String,
    pub remote_uri: String,
    pub remote_target: String,
}

impl Composer {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            cseq: CSeqCounters::default(),
            call_ids: CallIdGen::new(),
            tags: TagLibrary::new(),
            instance_urn: gen_instance_urn(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn via_header(&self, branch: &str) -> String {
        format!(
            "SIP/2.0/{} {}:{};branch={};rport",
            self.config.transport_mode,
            self.config.bind_ip,
            self.config.bind_port,
            branch
        )
    }

    fn contact_header(&self) -> String {
        format!(
            "<sip:{}@{}:{};transport={}>;+sip.instance=\"<{}>\"",
            self.config.user, self.config.bind_ip, self.config.bind_port, self.config.transport_mode, self.instance_urn
        )
    }

    /// Composes a REGISTER. `authorization` is `Some((header_name, value))`
    /// once a prior 401/407 challenge has been answered; the first attempt
    /// passes `None`.
    pub fn compose_register(&self, expires: u32, authorization: Option<(&str, String)>) -> String {
        let tag = self.tags.get_or_create(REGISTER_TAG_KEY);
        let call_id = self
            .call_ids
            .current()
            .unwrap_or_else(|| self.call_ids.generate(&self.config.bind_ip, self.config.bind_port));
        let cseq = self.cseq.register.next();
        let branch = gen_branch(BRANCH_LEN);
        let server = &self.config.server;
        let user = &self.config.user;

        let mut msg = String::new();
        let _ = write!(
            msg,
            "REGISTER sip:{server} SIP/2.0\r\n\
             Via: {via}\r\n\
             From: <sip:{user}@{server}>;tag={tag}\r\n\
             To: <sip:{user}@{server}>\r\n\
             Call-ID: {call_id}\r\n\
             CSeq: {cseq} REGISTER\r\n\
             Contact: {contact}\r\n\
             Allow: {methods}\r\n\
             Allow-Events: org.3gpp.nwinitdereg\r\n\
             Max-Forwards: 70\r\n\
             Expires: {expires}\r\n\
             User-Agent: sip-core\r\n",
            via = self.via_header(&branch),
            contact = self.contact_header(),
            methods = SUPPORTED_METHODS,
        );
        if let Some((name, value)) = authorization {
            let _ = write!(msg, "{name}: {value}\r\n");
        }
        let _ = write!(msg, "Content-Length: 0\r\n\r\n");
        msg
    }

    /// Composes an INVITE, opening a new dialog. `authorization` is set
    /// when resending after a 401/407 challenge.
    pub fn compose_invite(
        &self,
        callee: &str,
        offer: &MediaOffer,
        authorization: Option<(&str, String)>,
    ) -> (String, Dialog) {
        let call_id = self.call_ids.generate(&self.config.bind_ip, self.config.bind_port);
        let tag = crate::ids::gen_tag();
        let cseq = self.cseq.invite.next();
        let branch = gen_branch(BRANCH_LEN);
        let body = crate::sdp::compose(offer);

        let local_uri = format!("sip:{}@{}", self.config.user, self.config.server);
        let remote_uri = format!("sip:{}", callee);

        let mut msg = String::new();
        let _ = write!(
            msg,
            "INVITE sip:{callee} SIP/2.0\r\n\
             Via: {via}\r\n\
             From: <{local_uri}>;tag={tag}\r\n\
             To: <{remote_uri}>\r\n\
             Call-ID: {call_id}\r\n\
             CSeq: {cseq} INVITE\r\n\
             Contact: {contact}\r\n\
             Allow: {methods}\r\n\
             Max-Forwards: 70\r\n\
             User-Agent: sip-core\r\n",
            via = self.via_header(&branch),
            contact = self.contact_header(),
            methods = SUPPORTED_METHODS,
        );
        if let Some((name, value)) = authorization {
            let _ = write!(msg, "{name}: {value}\r\n");
        }
        let _ = write!(
            msg,
            "Content-Type: application/sdp\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );

        let dialog = Dialog {
            call_id,
            cseq,
            branch,
            local_tag: tag,
            remote_tag: None,
            local_uri,
            remote_uri,
            remote_target: format!("sip:{}", callee),
        };
        (msg, dialog)
    }

    /// Composes the ACK that ends an INVITE transaction, reusing the
    /// INVITE's branch and CSeq number.
    pub fn compose_ack(&self, dialog: &Dialog) -> String {
        let mut msg = String::new();
        let to = match &dialog.remote_tag {
            Some(tag) => format!("<{}>;tag={}", dialog.remote_uri, tag),
            None => format!("<{}>", dialog.remote_uri),
        };
        let _ = write!(
            msg,
            "ACK {target} SIP/2.0\r\n\
             Via: {via}\r\n\
             From: <{local_uri}>;tag={local_tag}\r\n\
             To: {to}\r\n\
             Call-ID: {call_id}\r\n\
             CSeq: {cseq} ACK\r\n\
             Max-Forwards: 70\r\n\
             Content-Length: 0\r\n\r\n",
            target = dialog.remote_target,
            via = self.via_header(&dialog.branch),
            local_uri = dialog.local_uri,
            local_tag = dialog.local_tag,
            call_id = dialog.call_id,
            cseq = dialog.cseq,
        );
        msg
    }

    /// Composes BYE or CANCEL. The local tag always stays on `From` and the
    /// remote tag (once known) on `To`, regardless of which party placed
    /// the original INVITE.
    pub fn compose_bye_or_cancel(
        &self,
        method: &str,
        dialog: &Dialog,
        authorization: Option<(&str, String)>,
    ) -> String {
        let branch = if method == "CANCEL" {
            dialog.branch.clone()
        } else {
            gen_branch(BRANCH_LEN)
        };
        let cseq = if method == "CANCEL" {
            dialog.cseq
        } else {
            self.cseq.bye.next()
        };

        let from = format!("<{}>;tag={}", dialog.local_uri, dialog.local_tag);
        let to = match &dialog.remote_tag {
            Some(tag) => format!("<{}>;tag={}", dialog.remote_uri, tag),
            None => format!("<{}>", dialog.remote_uri),
        };

        let mut msg = String::new();
        let _ = write!(
            msg,
            "{method} {target} SIP/2.0\r\n\
             Via: {via}\r\n\
             From: {from}\r\n\
             To: {to}\r\n\
             Call-ID: {call_id}\r\n\
             CSeq: {cseq} {method}\r\n\
             Max-Forwards: 70\r\n",
            target = dialog.remote_target,
            via = self.via_header(&branch),
            call_id = dialog.call_id,
        );
        if let Some((name, value)) = authorization {
            let _ = write!(msg, "{name}: {value}\r\n");
        }
        let _ = write!(msg, "Content-Length: 0\r\n\r\n");
        msg
    }

    /// Composes a MESSAGE request, splicing in an `Authorization` header
    /// when retrying after a challenge (the reference client's equivalent
    /// splice used a literal, never-matching placeholder and silently sent
    /// unauthenticated retries; this always actually inserts the header).
    pub fn compose_message(&self, to: &str, text: &str, authorization: Option<(&str, String)>) -> String {
        let call_id = self.call_ids.generate(&self.config.bind_ip, self.config.bind_port);
        let tag = crate::ids::gen_tag();
        let cseq = self.cseq.message.next();
        let branch = gen_branch(BRANCH_LEN);
        let local_uri = format!("sip:{}@{}", self.config.user, self.config.server);

        let mut msg = String::new();
        let _ = write!(
            msg,
            "MESSAGE sip:{to} SIP/2.0\r\n\
             Via: {via}\r\n\
             From: <{local_uri}>;tag={tag}\r\n\
             To: <sip:{to}>\r\n\
             Call-ID: {call_id}\r\n\
             CSeq: {cseq} MESSAGE\r\n\
             Max-Forwards: 70\r\n\
             Content-Type: text/plain\r\n",
            via = self.via_header(&branch),
        );
        if let Some((name, value)) = authorization {
            let _ = write!(msg, "{name}: {value}\r\n");
        }
        let _ = write!(msg, "Content-Length: {}\r\n\r\n{text}", text.len());
        msg
    }

    /// Composes a SUBSCRIBE to the registrar for message-waiting-indication
    /// notifications.
    pub fn compose_subscribe(&self) -> String {
        let tag = crate::ids::gen_tag();
        let call_id = self.call_ids.generate(&self.config.bind_ip, self.config.bind_port);
        let cseq = self.cseq.subscribe.next();
        let branch = gen_branch(BRANCH_LEN);
        let server = &self.config.server;
        let user = &self.config.user;
        let expires = self.config.default_expires * 2;

        let mut msg = String::new();
        let _ = write!(
            msg,
            "SUBSCRIBE sip:{server} SIP/2.0\r\n\
             Via: {via}\r\n\
             From: <sip:{user}@{server}>;tag={tag}\r\n\
             To: <sip:{user}@{server}>\r\n\
             Call-ID: {call_id}\r\n\
             CSeq: {cseq} SUBSCRIBE\r\n\
             Contact: {contact}\r\n\
             Max-Forwards: 70\r\n\
             Event: message-summary\r\n\
             Accept: application/simple-message-summary\r\n\
             Expires: {expires}\r\n\
             Content-Length: 0\r\n\r\n",
            via = self.via_header(&branch),
            contact = self.contact_header(),
        );
        msg
    }

    /// Echoes the `Via` line of an inbound request back into a response,
    /// preserving whichever `rport` form the request used (bare, or with a
    /// value) and appending `received` when the request's source address
    /// differs from the literal host in the Via.
    pub fn echo_via(request_via: &str, source_ip: &str) -> String {
        let params = crate::message::parse_params(request_via);
        let mut via = request_via.to_string();
        if params.contains_key("rport") && !via.contains("received=") {
            via.push_str(&format!(";received={source_ip}"));
        }
        via
    }

    /// Echoes every `Via` header of the request, in order, as one `Via:`
    /// line each — a response must carry the full Via stack it was routed
    /// through, not just the topmost one.
    fn echo_vias(request_vias: &[&str], source_ip: &str) -> String {
        request_vias
            .iter()
            .map(|via| format!("Via: {}\r\n", Self::echo_via(via, source_ip)))
            .collect()
    }

    /// Composes a response in an existing (or about-to-exist) dialog:
    /// `180 Ringing`, `200 OK`, `486 Busy Here`, etc. `to_tag` is generated
    /// once per inbound INVITE and reused for every response to it.
    /// `request_vias` is the full ordered `Via` stack off the request.
    pub fn compose_response(
        &self,
        status: u16,
        reason: &str,
        request_vias: &[&str],
        source_ip: &str,
        from: &str,
        to_uri: &str,
        to_tag: &str,
        call_id: &str,
        cseq_line: &str,
        body: Option<&str>,
    ) -> String {
        let vias = Self::echo_vias(request_vias, source_ip);
        let mut msg = String::new();
        let _ = write!(
            msg,
            "SIP/2.0 {status} {reason}\r\n\
             {vias}\
             From: {from}\r\n\
             To: {to_uri};tag={to_tag}\r\n\
             Call-ID: {call_id}\r\n\
             CSeq: {cseq_line}\r\n\
             Contact: {contact}\r\n",
            contact = self.contact_header(),
        );
        match body {
            Some(b) => {
                let _ = write!(msg, "Content-Type: application/sdp\r\nContent-Length: {}\r\n\r\n{b}", b.len());
            }
            None => {
                let _ = write!(msg, "Content-Length: 0\r\n\r\n");
            }
        }
        msg
    }

    /// Composes `505 Version Not Supported`, with a `Warning` header
    /// naming the offending version. `request_vias` is the full ordered
    /// `Via` stack off the request.
    pub fn compose_version_not_supported(
        &self,
        request_vias: &[&str],
        source_ip: &str,
        from: &str,
        to_uri: &str,
        to_tag: &str,
        call_id: &str,
        cseq_line: &str,
        bad_version: &str,
    ) -> String {
        let vias = Self::echo_vias(request_vias, source_ip);
        format!(
            "SIP/2.0 505 Version Not Supported\r\n\
             {vias}\
             From: {from}\r\n\
             To: {to_uri};tag={to_tag}\r\n\
             Call-ID: {call_id}\r\n\
             CSeq: {cseq_line}\r\n\
             Warning: 399 {host} \"unsupported SIP version {bad_version}\"\r\n\
             Content-Length: 0\r\n\r\n",
            host = self.config.bind_ip,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;

    fn composer() -> Composer {
        Composer::new(AgentConfig::new("biloxi.com", "bob", "192.168.1.2"))
    }

    #[test]
    fn register_cseq_is_monotonic() {
        let c = composer();
        let first = c.compose_register(120, None);
        let second = c.compose_register(120, None);
        assert!(first.contains("CSeq: 1 REGISTER"));
        assert!(second.contains("CSeq: 2 REGISTER"));
    }

    #[test]
    fn register_reuses_same_from_tag() {
        let c = composer();
        let first = c.compose_register(120, None);
        let second = c.compose_register(120, None);
        let extract_tag = |s: &str| {
            s.lines()
                .find(|l| l.starts_with("From:"))
                .and_then(|l| l.split("tag=").nth(1))
                .unwrap()
                .to_string()
        };
        assert_eq!(extract_tag(&first), extract_tag(&second));
    }

    #[test]
    fn bye_keeps_local_tag_on_from_regardless_of_role() {
        let c = composer();
        let dialog = Dialog {
            call_id: "abc".to_string(),
            cseq: 1,
            branch: "z9hG4bK1".to_string(),
            local_tag: "localtag".to_string(),
            remote_tag: Some("remotetag".to_string()),
            local_uri: "sip:bob@biloxi.com".to_string(),
            remote_uri: "sip:alice@atlanta.com".to_string(),
            remote_target: "sip:alice@atlanta.com".to_string(),
        };
        let bye = c.compose_bye_or_cancel("BYE", &dialog, None);
        let from_line = bye.lines().find(|l| l.starts_with("From:")).unwrap();
        assert!(from_line.contains("localtag"));
        let to_line = bye.lines().find(|l| l.starts_with("To:")).unwrap();
        assert!(to_line.contains("remotetag"));
    }

    #[test]
    fn via_echo_preserves_bare_and_valued_rport_and_order() {
        let bare = "SIP/2.0/UDP 10.0.0.5:5060;branch=z9hG4bK1;rport";
        let echoed = Composer::echo_via(bare, "203.0.113.9");
        assert_eq!(echoed, format!("{bare};received=203.0.113.9"));

        let valued = "SIP/2.0/UDP 10.0.0.5:5060;branch=z9hG4bK1;rport=5060";
        let echoed = Composer::echo_via(valued, "203.0.113.9");
        assert_eq!(echoed, format!("{valued};received=203.0.113.9"));
    }

    #[test]
    fn cancel_reuses_invite_branch_and_cseq() {
        let c = composer();
        let dialog = Dialog {
            call_id: "abc".to_string(),
            cseq: 4,
            branch: "z9hG4bK1".to_string(),
            local_tag: "localtag".to_string(),
            remote_tag: None,
            local_uri: "sip:bob@biloxi.com".to_string(),
            remote_uri: "sip:alice@atlanta.com".to_string(),
            remote_target: "sip:alice@atlanta.com".to_string(),
        };
        let cancel = c.compose_bye_or_cancel("CANCEL", &dialog, None);
        assert!(cancel.contains("branch=z9hG4bK1"));
        assert!(cancel.contains("CSeq: 4 CANCEL"));
    }
}
