// ABOUTME: XMPP transport built on tokio-xmpp
// ABOUTME: An actor task owns the client; sends and receives travel over channels

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chatty_core::config::split_server;
use chatty_core::{InboundMessage, MessageKind, MessagingTransport, TransportEvent};
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_xmpp::parsers::message::{Body, Message, MessageType};
use tokio_xmpp::parsers::presence::{Presence, Type as PresenceType};
use tokio_xmpp::parsers::{Element, Jid};
use tokio_xmpp::{AsyncClient, AsyncConfig, AsyncServerConfig, Event};

const OUTGOING_CAPACITY: usize = 64;

/// Request handed to the client actor
struct Outgoing {
    stanza: Element,
    reply: oneshot::Sender<Result<()>>,
}

/// The stream/sink surface of an XMPP client the actor drives
#[async_trait]
trait StanzaClient: Send + 'static {
    async fn next_event(&mut self) -> Option<Event>;
    async fn send_element(&mut self, stanza: Element) -> Result<()>;
}

#[async_trait]
impl StanzaClient for AsyncClient {
    async fn next_event(&mut self) -> Option<Event> {
        self.next().await
    }

    async fn send_element(&mut self, stanza: Element) -> Result<()> {
        self.send_stanza(stanza)
            .await
            .map_err(|e| anyhow!("XMPP send failed: {}", e))
    }
}

pub struct XmppTransport {
    bound_jid: String,
    outgoing: mpsc::Sender<Outgoing>,
    // Unbounded: the actor must never wait on the receive loop, which may
    // itself be waiting on a send the actor has yet to perform.
    events: Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
    actor: JoinHandle<()>,
}

impl std::fmt::Debug for XmppTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmppTransport")
            .field("bound_jid", &self.bound_jid)
            .finish()
    }
}

impl XmppTransport {
    /// Log in and wait until the session is online.
    ///
    /// An empty `server` resolves the host through DNS SRV records.
    pub async fn connect(server: &str, username: &str, password: &str) -> Result<Self> {
        let jid: Jid = username
            .parse()
            .map_err(|e| anyhow!("Invalid username '{}': {}", username, e))?;

        let server_config = if server.trim().is_empty() {
            AsyncServerConfig::UseSrv
        } else {
            let (host, port) = split_server(server)?;
            AsyncServerConfig::Manual { host, port }
        };

        tracing::info!(server = %server, username = %username, "Connecting to XMPP server");

        let mut client = AsyncClient::new_with_config(AsyncConfig {
            jid,
            password: password.to_string(),
            server: server_config,
        });
        client.set_reconnect(false);

        let bound_jid = loop {
            match client.next().await {
                Some(Event::Online { bound_jid, .. }) => break bound_jid.to_string(),
                Some(Event::Disconnected(e)) => {
                    anyhow::bail!("Failed to connect to XMPP server: {}", e)
                }
                Some(Event::Stanza(_)) => continue,
                None => anyhow::bail!("XMPP stream closed before the session came online"),
            }
        };

        client
            .send_stanza(available_presence())
            .await
            .map_err(|e| anyhow!("Failed to send initial presence: {}", e))?;

        tracing::info!(jid = %bound_jid, "Connected");

        Ok(Self::spawn(client, bound_jid))
    }

    /// Hand an online client to a new actor task
    fn spawn<C: StanzaClient>(client: C, bound_jid: String) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let actor = tokio::spawn(run_client(client, outgoing_rx, events_tx));

        Self {
            bound_jid,
            outgoing: outgoing_tx,
            events: Mutex::new(events_rx),
            actor,
        }
    }

    /// Full JID the server bound for this session
    pub fn bound_jid(&self) -> &str {
        &self.bound_jid
    }

    async fn submit(&self, stanza: Element) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.outgoing
            .send(Outgoing { stanza, reply })
            .await
            .map_err(|_| anyhow!("XMPP client is no longer running"))?;
        done.await
            .context("XMPP client dropped the send request")?
    }
}

#[async_trait]
impl MessagingTransport for XmppTransport {
    async fn receive(&self) -> Result<TransportEvent> {
        let mut events = self.events.lock().await;
        Ok(events
            .recv()
            .await
            .unwrap_or_else(|| TransportEvent::Disconnected {
                reason: "XMPP client stopped".to_string(),
            }))
    }

    async fn send(&self, to: &str, kind: MessageKind, text: &str) -> Result<()> {
        let to: Jid = to
            .parse()
            .map_err(|e| anyhow!("Invalid recipient address '{}': {}", to, e))?;

        let mut message = Message::new(Some(to));
        message.type_ = message_type(kind);
        message
            .bodies
            .insert(String::new(), Body(text.to_string()));

        self.submit(message.into()).await
    }

    async fn signal_presence(&self) -> Result<()> {
        self.submit(available_presence()).await
    }

    fn transport_id(&self) -> &'static str {
        "xmpp"
    }

    async fn shutdown(&self) -> Result<()> {
        self.actor.abort();
        Ok(())
    }
}

fn available_presence() -> Element {
    Presence::new(PresenceType::None).into()
}

fn message_type(kind: MessageKind) -> MessageType {
    match kind {
        MessageKind::Chat => MessageType::Chat,
        MessageKind::GroupChat => MessageType::Groupchat,
        MessageKind::Headline => MessageType::Headline,
        MessageKind::Normal => MessageType::Normal,
        MessageKind::Error => MessageType::Error,
    }
}

fn message_kind(type_: &MessageType) -> MessageKind {
    match type_ {
        MessageType::Chat => MessageKind::Chat,
        MessageType::Groupchat => MessageKind::GroupChat,
        MessageType::Headline => MessageKind::Headline,
        MessageType::Normal => MessageKind::Normal,
        MessageType::Error => MessageKind::Error,
    }
}

/// Convert a stanza to an inbound message. Non-message stanzas and messages
/// without a sender or body (e.g. chat state notifications) yield `None`.
fn inbound_from_stanza(stanza: Element) -> Option<InboundMessage> {
    let message = Message::try_from(stanza).ok()?;
    let sender = message.from.as_ref()?.to_string();
    let body = message
        .bodies
        .get("")
        .or_else(|| message.bodies.values().next())?;

    Some(InboundMessage {
        sender,
        kind: message_kind(&message.type_),
        text: body.0.clone(),
    })
}

/// Client actor: forwards inbound stanzas and performs queued sends
async fn run_client<C: StanzaClient>(
    mut client: C,
    mut outgoing: mpsc::Receiver<Outgoing>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    loop {
        tokio::select! {
            event = client.next_event() => {
                let forwarded = match event {
                    Some(Event::Stanza(stanza)) => match inbound_from_stanza(stanza) {
                        Some(msg) => TransportEvent::Message(msg),
                        None => continue,
                    },
                    Some(Event::Online { .. }) => {
                        tracing::info!("XMPP session online");
                        continue;
                    }
                    Some(Event::Disconnected(e)) => TransportEvent::Disconnected {
                        reason: e.to_string(),
                    },
                    None => TransportEvent::Disconnected {
                        reason: "XMPP stream closed".to_string(),
                    },
                };

                let disconnected = matches!(forwarded, TransportEvent::Disconnected { .. });
                if events.send(forwarded).is_err() || disconnected {
                    break;
                }
            }
            request = outgoing.recv() => {
                let Some(Outgoing { stanza, reply }) = request else {
                    break;
                };
                let _ = reply.send(client.send_element(stanza).await);
            }
        }
    }
    tracing::debug!("XMPP client actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    /// Client fed from a channel; records every stanza sent through it
    struct ScriptedClient {
        inbound: mpsc::UnboundedReceiver<Event>,
        sent: Arc<std::sync::Mutex<Vec<Element>>>,
    }

    #[async_trait]
    impl StanzaClient for ScriptedClient {
        async fn next_event(&mut self) -> Option<Event> {
            self.inbound.recv().await
        }

        async fn send_element(&mut self, stanza: Element) -> Result<()> {
            self.sent.lock().unwrap().push(stanza);
            Ok(())
        }
    }

    fn scripted_transport() -> (
        XmppTransport,
        mpsc::UnboundedSender<Event>,
        Arc<std::sync::Mutex<Vec<Element>>>,
    ) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let sent = Arc::new(std::sync::Mutex::new(Vec::new()));
        let client = ScriptedClient {
            inbound: inbound_rx,
            sent: sent.clone(),
        };
        let transport = XmppTransport::spawn(client, "relay@example.com/chatty".to_string());
        (transport, inbound_tx, sent)
    }

    fn chat_stanza(from: &str, body: Option<&str>) -> Element {
        let mut message = Message::new(Some("relay@example.com".parse().unwrap()));
        message.from = Some(from.parse().unwrap());
        message.type_ = MessageType::Chat;
        if let Some(body) = body {
            message.bodies.insert(String::new(), Body(body.to_string()));
        }
        message.into()
    }

    #[test]
    fn test_inbound_chat_keeps_resource_in_sender() {
        let msg = inbound_from_stanza(chat_stanza("a@example.com/phone", Some("hi"))).unwrap();
        assert_eq!(msg.sender, "a@example.com/phone");
        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.text, "hi");
    }

    #[test]
    fn test_inbound_without_body_is_skipped() {
        assert!(inbound_from_stanza(chat_stanza("a@example.com/phone", None)).is_none());
    }

    #[test]
    fn test_non_message_stanza_is_skipped() {
        assert!(inbound_from_stanza(available_presence()).is_none());
    }

    #[test]
    fn test_message_kind_maps_both_ways() {
        for kind in [
            MessageKind::Chat,
            MessageKind::GroupChat,
            MessageKind::Headline,
            MessageKind::Normal,
            MessageKind::Error,
        ] {
            assert_eq!(message_kind(&message_type(kind)), kind);
        }
    }

    #[tokio::test]
    async fn test_sends_complete_while_inbound_backlog_is_undrained() {
        let (transport, inbound, sent) = scripted_transport();

        for i in 0..500 {
            inbound
                .send(Event::Stanza(chat_stanza(
                    "a@example.com/phone",
                    Some(&format!("msg {}", i)),
                )))
                .unwrap();
        }

        // Nobody calls receive(); every send must still go through.
        for i in 0..3 {
            tokio::time::timeout(
                Duration::from_secs(5),
                transport.send("b@example.com", MessageKind::Chat, &format!("out {}", i)),
            )
            .await
            .expect("send stalled behind undelivered inbound messages")
            .unwrap();
        }
        tokio::time::timeout(Duration::from_secs(5), transport.signal_presence())
            .await
            .expect("presence stalled behind undelivered inbound messages")
            .unwrap();

        assert_eq!(sent.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_inbound_messages_are_delivered_in_order() {
        let (transport, inbound, _) = scripted_transport();
        inbound
            .send(Event::Stanza(available_presence()))
            .unwrap();
        inbound
            .send(Event::Stanza(chat_stanza("a@example.com/phone", Some("one"))))
            .unwrap();
        inbound
            .send(Event::Stanza(chat_stanza("b@example.com/laptop", Some("two"))))
            .unwrap();
        drop(inbound);

        let texts: Vec<String> = [transport.receive().await, transport.receive().await]
            .into_iter()
            .map(|event| match event.unwrap() {
                TransportEvent::Message(msg) => msg.text,
                other => panic!("unexpected event: {:?}", other),
            })
            .collect();
        assert_eq!(texts, vec!["one".to_string(), "two".to_string()]);

        assert!(matches!(
            transport.receive().await.unwrap(),
            TransportEvent::Disconnected { .. }
        ));
    }
}
