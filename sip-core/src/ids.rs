//! Monotonic counters and identifier generation.
//!
//! Mirrors the per-method-family CSeq counters and the Call-ID/tag/branch
//! generators of the reference client: one counter per method family, a
//! single shared tag library, and a single instance-wide `urn:uuid`.

use std::sync::Mutex;

use md5::Digest as _;
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A monotonic, thread-safe counter starting at 1.
///
/// `next()` returns the next value and advances the counter; `current()`
/// peeks at the most recently returned value without advancing it.
#[derive(Debug)]
pub struct Counter(Mutex<u32>);

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

impl Counter {
    pub fn new() -> Self {
        Self(Mutex::new(0))
    }

    /// Returns the next value in the sequence, starting at 1.
    pub fn next(&self) -> u32 {
        let mut guard = self.0.lock().expect("counter mutex poisoned");
        *guard += 1;
        *guard
    }

    /// Returns the most recently issued value (0 if `next` was never called).
    pub fn current(&self) -> u32 {
        *self.0.lock().expect("counter mutex poisoned")
    }
}

/// The six CSeq counters named in the data model, one per method family
/// that independently tracks its own CSeq sequence.
#[derive(Debug, Default)]
pub struct CSeqCounters {
    pub register: Counter,
    pub invite: Counter,
    pub message: Counter,
    pub bye: Counter,
    pub cancel: Counter,
    pub subscribe: Counter,
}

/// Generates Call-IDs the way the reference client does: SHA-256 of the
/// decimal counter value, truncated to 32 hex characters, suffixed with
/// the local bind address.
#[derive(Debug, Default)]
pub struct CallIdGen {
    counter: Counter,
    last: Mutex<Option<String>>,
}

impl CallIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a fresh Call-ID bound to `host:port`.
    pub fn generate(&self, host: &str, port: u16) -> String {
        let n = self.counter.next();
        let digest = Sha256::digest(n.to_string().as_bytes());
        let hex = hex::encode(digest);
        let call_id = format!("{}@{}:{}", &hex[..32], host, port);
        *self.last.lock().expect("call-id mutex poisoned") = Some(call_id.clone());
        call_id
    }

    /// Returns the most recently generated Call-ID, if any.
    pub fn current(&self) -> Option<String> {
        self.last.lock().expect("call-id mutex poisoned").clone()
    }
}

/// Generates a random 8-character lowercase-hex tag: the first 8 hex
/// characters of an MD5 digest of a random u32, matching the reference
/// client's `gen_tag` (`hashlib.md5(rand).hexdigest()[0:8]`).
pub fn gen_tag() -> String {
    let n: u32 = rand::rng().random();
    let digest = md5::Md5::digest(n.to_string().as_bytes());
    hex::encode(digest)[..8].to_string()
}

/// Generates a branch parameter: the RFC 3261 magic cookie `z9hG4bK`
/// followed by a random hex suffix, truncated to `length` total characters.
pub fn gen_branch(length: usize) -> String {
    const MAGIC_COOKIE: &str = "z9hG4bK";
    let suffix_len = length.saturating_sub(MAGIC_COOKIE.len());
    let suffix = Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..suffix_len.min(suffix.len())];
    format!("{MAGIC_COOKIE}{suffix}")
}

/// Generates the single instance-wide `urn:uuid:` used in the
/// `+sip.instance` Contact parameter, stable for the lifetime of the agent.
pub fn gen_instance_urn() -> String {
    format!("urn:uuid:{}", Uuid::new_v4())
}

/// Generates a `cnonce` value for Digest auth: 16 random bytes, hex-encoded.
pub fn gen_cnonce() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tags_are_unique_over_one_thousand_calls() {
        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            let tag = gen_tag();
            assert!(seen.insert(tag), "duplicate tag generated");
        }
    }

    #[test]
    fn tag_is_eight_hex_chars() {
        let tag = gen_tag();
        assert_eq!(tag.len(), 8);
        assert!(tag.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn branch_has_magic_cookie_and_requested_length() {
        let branch = gen_branch(32);
        assert!(branch.starts_with("z9hG4bK"));
        assert_eq!(branch.len(), 32);
    }

    #[test]
    fn cseq_counters_are_monotonic_per_family() {
        let counters = CSeqCounters::default();
        assert_eq!(counters.register.next(), 1);
        assert_eq!(counters.register.next(), 2);
        assert_eq!(counters.invite.next(), 1);
        assert_eq!(counters.register.current(), 2);
    }

    #[test]
    fn call_id_is_stable_hex_and_deterministic_on_counter() {
        let gen = CallIdGen::new();
        let first = gen.generate("127.0.0.1", 5060);
        assert_eq!(gen.current(), Some(first));
    }
}
