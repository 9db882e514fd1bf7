//! SDP (RFC 4566) body composition for a single audio media line.
//!
//! Building a full SDP offer/answer negotiator is out of scope; the
//! composer only ever needs to print one `m=audio` line plus the
//! attributes enumerated in the external interfaces, so that is all this
//! module renders.

use std::fmt;

/// A single RTP payload type and its encoding name, clock rate, and
/// optional channel count, e.g. `(0, "PCMU", 8000, None)`.
#[derive(Debug, Clone)]
pub struct RtpMap {
    pub payload_type: u8,
    pub encoding: String,
    pub clock_rate: u32,
    pub channels: Option<u8>,
}

/// Whether the media line should advertise sending, receiving, both, or
/// neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendType {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl fmt::Display for SendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SendType::SendRecv => "sendrecv",
            SendType::SendOnly => "sendonly",
            SendType::RecvOnly => "recvonly",
            SendType::Inactive => "inactive",
        };
        write!(f, "{s}")
    }
}

/// Everything the SDP composer needs to render one audio media
/// description.
#[derive(Debug, Clone)]
pub struct MediaOffer {
    pub session_id: String,
    pub session_version: String,
    pub originator_addr: String,
    pub connection_addr: String,
    pub rtp_port: u16,
    pub codecs: Vec<RtpMap>,
    pub ptime: Option<u32>,
    pub maxptime: Option<u32>,
    pub send_type: SendType,
}

/// Renders `offer` into an SDP body, CRLF-terminated.
pub fn compose(offer: &MediaOffer) -> String {
    let mut body = String::new();
    body.push_str("v=0\r\n");
    body.push_str(&format!(
        "o=- {} {} IN IP4 {}\r\n",
        offer.session_id, offer.session_version, offer.originator_addr
    ));
    body.push_str("s=-\r\n");
    body.push_str(&format!("c=IN IP4 {}\r\n", offer.connection_addr));
    body.push_str("t=0 0\r\n");

    let payload_types: Vec<String> = offer.codecs.iter().map(|c| c.payload_type.to_string()).collect();
    body.push_str(&format!("m=audio {} RTP/AVP {}\r\n", offer.rtp_port, payload_types.join(" ")));

    for codec in &offer.codecs {
        match codec.channels {
            Some(ch) => body.push_str(&format!(
                "a=rtpmap:{} {}/{}/{}\r\n",
                codec.payload_type, codec.encoding, codec.clock_rate, ch
            )),
            None => body.push_str(&format!(
                "a=rtpmap:{} {}/{}\r\n",
                codec.payload_type, codec.encoding, codec.clock_rate
            )),
        }
        if codec.encoding == "telephone-event" {
            body.push_str(&format!("a=fmtp:{} 0-15\r\n", codec.payload_type));
        }
    }
    if let Some(ptime) = offer.ptime {
        body.push_str(&format!("a=ptime:{ptime}\r\n"));
    }
    if let Some(maxptime) = offer.maxptime {
        body.push_str(&format!("a=maxptime:{maxptime}\r\n"));
    }
    body.push_str(&format!("a={}\r\n", offer.send_type));

    body
}
