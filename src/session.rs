// ABOUTME: Session driver: receive loop plus periodic presence heartbeat
// ABOUTME: Feeds inbound chat messages to the router and dispatches the replies

use anyhow::Result;
use chatty_core::{
    metrics, InboundMessage, MessageKind, MessagingTransport, Router, TransportEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Drives one connected session until the transport disconnects.
pub struct SessionDriver {
    transport: Arc<dyn MessagingTransport>,
    router: Router,
    presence_interval: Duration,
}

impl std::fmt::Debug for SessionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDriver")
            .field("transport", &self.transport.transport_id())
            .field("router", &self.router)
            .field("presence_interval", &self.presence_interval)
            .finish()
    }
}

impl SessionDriver {
    pub fn new(
        transport: Arc<dyn MessagingTransport>,
        router: Router,
        presence_interval: Duration,
    ) -> Self {
        Self {
            transport,
            router,
            presence_interval,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Run until the transport reports an unrecoverable disconnect.
    ///
    /// Always returns an error: the session has no other way to end.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            transport = self.transport.transport_id(),
            members = self.router.roster().len(),
            "Session started"
        );

        let heartbeat = spawn_presence_heartbeat(
            Arc::clone(&self.transport),
            self.presence_interval,
        );
        let result = self.receive_loop().await;
        heartbeat.abort();

        if let Err(e) = self.transport.shutdown().await {
            tracing::debug!(error = %e, "Transport shutdown failed");
        }
        result
    }

    async fn receive_loop(&mut self) -> Result<()> {
        loop {
            let event = match self.transport.receive().await {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "Receive failed");
                    continue;
                }
            };

            match event {
                TransportEvent::Message(msg) => {
                    self.process(msg).await;
                }
                TransportEvent::Disconnected { reason } => {
                    tracing::error!(reason = %reason, "Transport disconnected");
                    anyhow::bail!("Transport disconnected: {}", reason);
                }
            }
        }
    }

    /// Handle one inbound message and send the results.
    /// Returns the number of messages delivered successfully.
    pub async fn process(&mut self, msg: InboundMessage) -> usize {
        tracing::debug!(sender = %msg.sender, kind = %msg.kind, "Message received");

        if !msg.is_chat() {
            return 0;
        }

        let outbound = match self.router.handle(&msg.sender, &msg.text) {
            Ok(result) => result.into_messages(),
            Err(e) => {
                tracing::error!(sender = %msg.sender, error = %e, "Error handling message");
                return 0;
            }
        };

        let mut delivered = 0;
        for out in outbound {
            match self
                .transport
                .send(&out.to, MessageKind::Chat, &out.text)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => {
                    metrics::record_send_failure();
                    tracing::warn!(to = %out.to, error = %e, "Failed to relay message");
                }
            }
        }
        delivered
    }
}

/// Spawn the liveness task. The first signal goes out one full interval
/// after start, then every interval until the handle is aborted.
pub fn spawn_presence_heartbeat(
    transport: Arc<dyn MessagingTransport>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match transport.signal_presence().await {
                Ok(()) => tracing::trace!("Presence signalled"),
                Err(e) => tracing::warn!(error = %e, "Failed to signal presence"),
            }
        }
    })
}
