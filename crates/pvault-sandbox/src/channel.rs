//! The cross-document message channel.
//!
//! Models the host↔sandbox transport as unbounded in-process channels of
//! JSON envelopes. An [`Envelope`] carries the raw message value plus an
//! optional reply [`Port`] — the message source. A missing source models the
//! browser-extension case where the platform reports a null source; such
//! envelopes are dropped by the sandbox without processing.
//!
//! Per sender/receiver pair, delivery order matches send order. There is no
//! ordering guarantee between different channels.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::logger::Logger;

/// An inbound message: the raw data plus the sender's reply port.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// The raw message value. Untrusted until structurally validated.
    pub data: Value,
    /// The reply port of the sending context, if the platform attached one.
    pub source: Option<Port>,
}

/// The sending half of a document's message channel.
#[derive(Debug, Clone)]
pub struct Port {
    tx: mpsc::UnboundedSender<Envelope>,
}

/// The receiving half of a document's message channel.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

/// Create a connected port/inbox pair for one document.
pub fn channel() -> (Port, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Port { tx }, Inbox { rx })
}

impl Port {
    /// Deliver an envelope. Returns `false` when the document is gone.
    pub fn deliver(&self, envelope: Envelope) -> bool {
        self.tx.send(envelope).is_ok()
    }
}

impl Inbox {
    /// Receive the next envelope, or `None` once every port is dropped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

/// Build a wire message value: `{event, payload?}`.
pub fn message(event: &str, payload: Option<Value>) -> Value {
    let mut map = serde_json::Map::new();
    map.insert("event".into(), Value::String(event.to_owned()));
    if let Some(payload) = payload {
        map.insert("payload".into(), payload);
    }
    Value::Object(map)
}

/// A directed sender: events go to one bound peer port.
///
/// Starts unbound (sends are dropped) and is bound to the source of the
/// `init` message that starts a session — never to a statically-known peer.
#[derive(Debug, Clone)]
pub struct Sender {
    to: Option<Port>,
    from: Option<Port>,
    logger: Logger,
}

impl Sender {
    /// A sender that drops everything. The state before `init` binds a peer.
    pub fn unbound(logger: Logger) -> Self {
        Self {
            to: None,
            from: None,
            logger,
        }
    }

    /// A sender bound to `to`, attaching `from` as the message source.
    pub fn bound(to: Port, from: Port, logger: Logger) -> Self {
        Self {
            to: Some(to),
            from: Some(from),
            logger,
        }
    }

    /// Send `{event, payload?}` to the bound peer, if any.
    pub fn send(&self, event: &str, payload: Option<Value>) {
        let Some(to) = &self.to else {
            return;
        };
        self.logger.log(&format!("send \"{event}\" event"));
        // receiver teardown is not an error for the sender
        let _ = to.deliver(Envelope {
            data: message(event, payload),
            source: self.from.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn messages_arrive_in_send_order() {
        let (port, mut inbox) = channel();
        for n in 0..5 {
            assert!(port.deliver(Envelope {
                data: json!({"event": "n", "payload": n}),
                source: None,
            }));
        }
        for n in 0..5 {
            let envelope = inbox.recv().await.unwrap();
            assert_eq!(envelope.data["payload"], json!(n));
        }
    }

    #[tokio::test]
    async fn unbound_sender_drops_silently() {
        let sender = Sender::unbound(Logger::disabled("sandbox"));
        sender.send("ready", None);
    }

    #[tokio::test]
    async fn bound_sender_attaches_its_source() {
        let (peer_port, mut peer_inbox) = channel();
        let (own_port, _own_inbox) = channel();
        let sender = Sender::bound(peer_port, own_port, Logger::disabled("sandbox"));

        sender.send("ready", None);
        let envelope = peer_inbox.recv().await.unwrap();
        assert_eq!(envelope.data, json!({"event": "ready"}));
        assert!(envelope.source.is_some());
    }

    #[test]
    fn message_omits_missing_payload() {
        assert_eq!(message("ready", None), json!({"event": "ready"}));
        assert_eq!(
            message("error", Some(json!({"type": "update"}))),
            json!({"event": "error", "payload": {"type": "update"}})
        );
    }
}
