//! # sip-core
//!
//! A SIP (RFC 3261) user-agent client core: registration, call setup and
//! teardown, instant messaging, and HTTP Digest authentication, built
//! around a pluggable transport and credentials store.

pub mod agent;
pub mod auth;
pub mod composer;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod message;
pub mod sdp;
pub mod tags;
pub mod transaction;
pub mod transport;

pub use agent::Agent;
pub use error::{Error, Result};

#[cfg(test)]
#[macro_use]
extern crate assert_matches;
