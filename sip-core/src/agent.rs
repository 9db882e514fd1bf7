//! Agent lifecycle: start, stop, the register-refresh timer, and the
//! long-running receive task.
//!
//! Three activities run concurrently once `start()` succeeds: the
//! register timer (reschedules itself `expires - 5` seconds after every
//! successful REGISTER), the receive task (reads inbound datagrams and
//! dispatches them), and whatever outbound transaction the caller is
//! currently driving. The receive task is started only after the initial
//! REGISTER succeeds, so during startup no task other than the caller's
//! own `start()` call is reading the socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::auth::Authenticator;
use crate::composer::Composer;
use crate::config::AgentConfig;
use crate::credentials::CredentialsManager;
use crate::dispatcher::{route, CallCallback, Route};
use crate::error::Result;
use crate::message::Message;
use crate::transaction::{register, DriverContext, SharedSocket};

/// "Not Shutting Down" — cleared by `stop()`, checked by the register
/// timer and the receive task at every suspension point so both wind down
/// promptly once it flips.
struct Nsd(AtomicBool);

impl Nsd {
    fn new() -> Self {
        Self(AtomicBool::new(true))
    }
    fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
    fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A running SIP user agent: one registered identity, one socket.
pub struct Agent {
    config: AgentConfig,
    composer: Arc<Composer>,
    credentials: Arc<dyn CredentialsManager>,
    authenticator: Arc<Authenticator>,
    socket: SharedSocket,
    callback: Arc<dyn CallCallback>,
    nsd: Arc<Nsd>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Agent {
    /// Constructs an agent. Does not register or start any task; call
    /// [`Agent::start`] for that.
    pub fn new(
        config: AgentConfig,
        socket: SharedSocket,
        credentials: Arc<dyn CredentialsManager>,
        callback: Arc<dyn CallCallback>,
    ) -> Self {
        let composer = Arc::new(Composer::new(config.clone()));
        Self {
            config,
            composer,
            credentials,
            authenticator: Arc::new(Authenticator::new()),
            socket,
            callback,
            nsd: Arc::new(Nsd::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn driver_ctx(&self) -> DriverContext<'_> {
        DriverContext {
            socket: self.socket.as_ref(),
            credentials: self.credentials.as_ref(),
            authenticator: self.authenticator.as_ref(),
            server: &self.config.server,
            realm_user: &self.config.user,
            allow_basic_auth: self.config.allow_basic_auth,
        }
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// Performs the initial REGISTER, then spawns the register-refresh
    /// timer and the receive task. Returns once registration has
    /// succeeded; the background tasks keep running after this returns.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let expires = self.config.default_expires;
        register::register(&self.driver_ctx(), &self.composer, expires).await?;
        debug!("registered {} for {}s", self.config.user, expires);

        let recv_handle = self.spawn_receive_task();
        let timer_handle = self.spawn_register_timer(expires);

        let mut tasks = self.tasks.lock().await;
        tasks.push(recv_handle);
        tasks.push(timer_handle);
        Ok(())
    }

    /// Signals every background task to stop, sends a DEREGISTER
    /// (`Expires: 0`), and closes the socket.
    pub async fn stop(&self) -> Result<()> {
        self.nsd.stop();
        let _ = register::register(&self.driver_ctx(), &self.composer, 0).await;
        self.socket.close().await?;

        let mut tasks = self.tasks.lock().await;
        for handle in tasks.drain(..) {
            handle.abort();
        }
        Ok(())
    }

    fn spawn_register_timer(self: &Arc<Self>, initial_expires: u32) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut expires = initial_expires;
            loop {
                let refresh_in = expires.saturating_sub(5).max(1);
                tokio::time::sleep(std::time::Duration::from_secs(refresh_in as u64)).await;
                if !this.nsd.is_running() {
                    return;
                }
                match register::register(&this.driver_ctx(), &this.composer, initial_expires).await {
                    Ok(registered) => expires = registered.expires,
                    Err(e) => {
                        error!("register refresh failed: {e}");
                        return;
                    }
                }
            }
        })
    }

    fn spawn_receive_task(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            while this.nsd.is_running() {
                let n = match this.socket.recv(&mut buf).await {
                    Ok(n) => n,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                    Err(_) => return,
                };
                let text = String::from_utf8_lossy(&buf[..n]).to_string();
                match Message::parse(&text) {
                    Ok(message) => this.handle_inbound(&message).await,
                    Err(e) => warn!("dropping unparseable message: {e}"),
                }
            }
        })
    }

    async fn handle_inbound(&self, message: &Message) {
        if message.version() != "SIP/2.0" {
            self.send_version_not_supported(message).await;
            return;
        }
        match route(message) {
            Route::TransactionResponse => {
                debug!("unsolicited response routed to no waiting transaction: {}", message.summary());
            }
            Route::StockReply => {
                self.send_ok(message).await;
            }
            Route::CallbackThenStockReply => {
                self.callback.on_message(message).await;
                self.send_ok(message).await;
                debug!("answered {} after callback", message.summary());
            }
            Route::CallbackOnly => {
                self.callback.on_message(message).await;
            }
            Route::Unhandled => {
                warn!("unhandled message: {}", message.summary());
            }
        }
    }

    /// Sends a stock `200 OK` in reply to `request` (used for OPTIONS,
    /// and for BYE/CANCEL once the callback has run).
    async fn send_ok(&self, request: &Message) {
        let Some(reply) = self.compose_stock_response(request, 200, "OK") else {
            warn!("cannot answer {}: missing required headers", request.summary());
            return;
        };
        if let Err(e) = self.socket.send(reply.as_bytes()).await {
            warn!("failed to send 200 OK: {e}");
        }
    }

    async fn send_version_not_supported(&self, request: &Message) {
        let vias: Vec<&str> = request.headers_named("Via").collect();
        let (Some(from), Some(to), Some(call_id), Some(cseq)) = (
            request.header("From"),
            request.header("To"),
            request.header("Call-ID"),
            request.header("CSeq"),
        ) else {
            return;
        };
        if vias.is_empty() {
            return;
        }
        let to_tag = crate::ids::gen_tag();
        let reply = self.composer.compose_version_not_supported(
            &vias,
            &self.config.server,
            from,
            to,
            &to_tag,
            call_id,
            cseq,
            request.version(),
        );
        let _ = self.socket.send(reply.as_bytes()).await;
    }

    fn compose_stock_response(&self, request: &Message, status: u16, reason: &str) -> Option<String> {
        let vias: Vec<&str> = request.headers_named("Via").collect();
        if vias.is_empty() {
            return None;
        }
        let from = request.header("From")?;
        let to = request.header("To")?;
        let call_id = request.header("Call-ID")?;
        let cseq = request.header("CSeq")?;
        let to_tag = crate::ids::gen_tag();
        Some(self.composer.compose_response(
            status,
            reason,
            &vias,
            &self.config.server,
            from,
            to,
            &to_tag,
            call_id,
            cseq,
            None,
        ))
    }
}
