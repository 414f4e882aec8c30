//! WebSocket transport
//!
//! Translates JSON commands into broker calls. Each connection gets a
//! `Session` holding its subscriptions; every subscription runs a pull task
//! that wakes on broker notifications or on the poll tick and delivers the
//! next value whenever the consumer is idle.
//!
//! On disconnect all subscriptions are dropped through `Broker::unsubscribe`,
//! which nacks any delivery the client never acknowledged.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, Receiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::broker::Broker;
use crate::config::Settings;
use crate::consumer::{Consumer, EventKind, SharedConsumer};
use crate::store::Value;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::error::BrokerError;

struct Subscription {
    consumer: SharedConsumer,
    pull: JoinHandle<()>,
}

/// Per-connection state.
pub struct Session {
    broker: Arc<Broker>,
    outbound: UnboundedSender<WsMessage>,
    poll_interval: Duration,
    subscriptions: HashMap<String, Subscription>,
}

fn send(outbound: &UnboundedSender<WsMessage>, msg: &ServerMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            if outbound.send(WsMessage::text(json)).is_err() {
                debug!("outbound channel closed, dropping message");
            }
        }
        Err(e) => error!("Failed to serialize message: {e}"),
    }
}

fn error_message(message: impl ToString) -> ServerMessage {
    ServerMessage::Error {
        message: message.to_string(),
    }
}

/// Delivers the next value to the client if the consumer holds none.
fn deliver(consumer: &SharedConsumer, outbound: &UnboundedSender<WsMessage>) {
    let mut consumer = consumer.lock().unwrap_or_else(PoisonError::into_inner);
    if consumer.outstanding || consumer.is_detached() {
        return;
    }

    match consumer.next() {
        Ok(value) => send(
            outbound,
            &ServerMessage::Message {
                topic: consumer.topic_name().into_owned(),
                payload: String::from_utf8_lossy(&value.payload).into_owned(),
                delivery_count: value.delivery_count,
                ack_offset: consumer.ack_offset,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        ),
        Err(e) if e.is_empty_topic() => {}
        Err(e) => warn!(consumer = %consumer.id, "delivery failed: {e}"),
    }
}

async fn pull_loop(
    consumer: SharedConsumer,
    mut events: Receiver<EventKind>,
    outbound: UnboundedSender<WsMessage>,
    poll_interval: Duration,
) {
    let mut tick = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            event = events.recv() => {
                // the broker dropped the sender: unsubscribed
                if event.is_none() {
                    break;
                }
            }
            _ = tick.tick() => {}
        }

        if outbound.is_closed() {
            break;
        }
        deliver(&consumer, &outbound);
    }
}

impl Session {
    pub fn new(
        broker: Arc<Broker>,
        outbound: UnboundedSender<WsMessage>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            broker,
            outbound,
            poll_interval,
            subscriptions: HashMap::new(),
        }
    }

    /// True while this connection holds a subscription on `topic`.
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.contains_key(topic)
    }

    /// Parses one text frame and executes it. Replies go to the outbound
    /// channel.
    pub fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => self.handle(msg),
            Err(err) => {
                warn!("Invalid client message: {err} | {text}");
                send(&self.outbound, &error_message(format!("invalid message: {err}")));
            }
        }
    }

    /// Executes one client command and sends its reply. Failures are
    /// reported to the client as `error` messages, never returned.
    pub fn handle(&mut self, msg: ClientMessage) {
        let reply = match msg {
            ClientMessage::Publish { topic, payload } => self
                .broker
                .publish(topic.as_bytes(), &Value::new(payload))
                .map(|offset| ServerMessage::Published { topic, offset }),

            ClientMessage::Subscribe { topic } => {
                self.subscribe(topic);
                return;
            }

            ClientMessage::Unsubscribe { topic } => {
                if !self.is_subscribed(&topic) {
                    send(&self.outbound, &error_message(format!("not subscribed to {topic}")));
                    return;
                }
                self.unsubscribe(&topic)
                    .map(|()| ServerMessage::Unsubscribed { topic })
            }

            ClientMessage::Ack { topic } => {
                self.settle(topic, |consumer| consumer.ack(), |topic| ServerMessage::Acked { topic });
                return;
            }

            ClientMessage::Nack { topic } => {
                self.settle(topic, |consumer| consumer.nack(), |topic| ServerMessage::Nacked { topic });
                return;
            }

            ClientMessage::Purge { topic } => self
                .broker
                .store()
                .purge(topic.as_bytes())
                .map(|removed| ServerMessage::Purged { topic, removed })
                .map_err(BrokerError::from),

            ClientMessage::Stats { topic } => self
                .broker
                .store()
                .stats(topic.as_bytes())
                .map(|stats| ServerMessage::Stats {
                    topic,
                    head: stats.head,
                    tail: stats.tail,
                    ack_tail: stats.ack_tail,
                    ready: stats.ready(),
                })
                .map_err(BrokerError::from),
        };

        match reply {
            Ok(msg) => send(&self.outbound, &msg),
            Err(err) => send(&self.outbound, &error_message(err)),
        }
    }

    fn subscribe(&mut self, topic: String) {
        if topic.is_empty() {
            send(&self.outbound, &error_message("topic must not be empty"));
            return;
        }
        if self.is_subscribed(&topic) {
            send(&self.outbound, &error_message(format!("already subscribed to {topic}")));
            return;
        }

        let consumer = self.broker.subscribe(topic.as_bytes());
        let (consumer_id, events) = {
            let mut guard = consumer.lock().unwrap_or_else(PoisonError::into_inner);
            (guard.id.clone(), guard.take_events())
        };

        send(
            &self.outbound,
            &ServerMessage::Subscribed {
                topic: topic.clone(),
                consumer_id,
            },
        );

        // a fresh consumer always still owns its receiver
        let Some(events) = events else {
            return;
        };
        let pull = tokio::spawn(pull_loop(
            consumer.clone(),
            events,
            self.outbound.clone(),
            self.poll_interval,
        ));
        self.subscriptions
            .insert(topic, Subscription { consumer, pull });
    }

    /// Stops the pull task, then unsubscribes from the broker. When the
    /// forced nack fails the subscription stays in place without its pull
    /// task: ack, nack and a retried unsubscribe still work.
    fn unsubscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        let Some(sub) = self.subscriptions.get(topic) else {
            return Ok(());
        };
        sub.pull.abort();
        let id = sub
            .consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .id
            .clone();

        self.broker.unsubscribe(topic.as_bytes(), &id)?;
        self.subscriptions.remove(topic);
        Ok(())
    }

    /// Acks or nacks the delivery held on `topic`, then tries to deliver the
    /// next value right away.
    fn settle(
        &self,
        topic: String,
        op: impl FnOnce(&mut Consumer) -> Result<(), BrokerError>,
        reply: impl FnOnce(String) -> ServerMessage,
    ) {
        let Some(sub) = self.subscriptions.get(&topic) else {
            send(&self.outbound, &error_message(format!("not subscribed to {topic}")));
            return;
        };

        let result = {
            let mut guard = sub.consumer.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut *guard)
        };
        match result {
            Ok(()) => {
                send(&self.outbound, &reply(topic));
                deliver(&sub.consumer, &self.outbound);
            }
            Err(err) => send(&self.outbound, &error_message(err)),
        }
    }

    /// Drops every subscription of this connection.
    pub fn close(&mut self) {
        for (topic, sub) in self.subscriptions.drain() {
            sub.pull.abort();
            let id = sub
                .consumer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .id
                .clone();
            if let Err(e) = self.broker.unsubscribe(topic.as_bytes(), &id) {
                error!("Failed to unsubscribe {id} from {topic}: {e}");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

pub async fn start_websocket_server(
    addr: &str,
    broker: Arc<Broker>,
    settings: Settings,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let poll_interval = Duration::from_millis(settings.broker.poll_interval_ms.max(1));

    info!("WebSocket server listening on ws://{addr}");

    loop {
        let (stream, peer) = listener.accept().await?;
        let broker = broker.clone();
        let client_id = format!("client-{}", Uuid::new_v4());

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake error from {peer}: {e}");
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

            {
                let client_id = client_id.clone();
                tokio::spawn(async move {
                    while let Some(msg) = rx.recv().await {
                        if let Err(e) = ws_sender.send(msg).await {
                            warn!("Failed to send message to {client_id}: {e}");
                            break;
                        }
                    }
                    debug!("Send loop closed for {client_id}");
                });
            }

            info!("{client_id} connected from {peer}");
            let mut session = Session::new(broker, tx, poll_interval);

            while let Some(Ok(msg)) = ws_receiver.next().await {
                if !msg.is_text() {
                    continue;
                }
                if let Ok(text) = msg.to_text() {
                    session.handle_text(text);
                }
            }

            session.close();
            info!("{client_id} disconnected");
        });
    }
}
