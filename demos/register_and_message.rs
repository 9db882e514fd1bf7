//! Registers with a SIP registrar and sends a MESSAGE, using the static
//! in-memory credentials store. Run with a real registrar reachable at
//! the configured address.

use std::sync::Arc;

use async_trait::async_trait;
use sip_core::agent::Agent;
use sip_core::config::AgentConfig;
use sip_core::credentials::StaticCredentials;
use sip_core::dispatcher::CallCallback;
use sip_core::message::Message;
use sip_core::transport::UdpTransport;

struct Logger;

#[async_trait]
impl CallCallback for Logger {
    async fn on_message(&self, message: &Message) -> Option<String> {
        log::info!("inbound: {}", message.summary());
        None
    }
}

#[tokio::main]
async fn main() -> sip_core::Result<()> {
    env_logger::init();

    let config = AgentConfig::new("sip.example.com", "alice", "0.0.0.0");
    let bind_addr = config.bind_addr().parse().expect("valid bind addr");

    let resolver = util::DnsResolver::default();
    let socket = Arc::new(UdpTransport::bind_to_host(bind_addr, &config.server, config.port, &resolver).await?);
    let credentials = Arc::new(StaticCredentials::new("sip.example.com", "alice", "hunter2"));
    let callback = Arc::new(Logger);

    let agent = Arc::new(Agent::new(config, socket, credentials, callback));
    agent.start().await?;

    tokio::signal::ctrl_c().await.ok();
    agent.stop().await?;
    Ok(())
}
