//! Shared fixtures for plugin tests
//!
//! Plugins are exercised without a connection: events are fed in with
//! `trigger_handler` and their output is observed through a recorder
//! listening on `client_global_send` and any other event names.

use rustirc_core::event::CLIENT_GLOBAL_SEND;
use rustirc_core::{Client, Config, Event, EventMap, Handler, Message};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub(crate) type Recorded = mpsc::UnboundedReceiver<(String, Event)>;

pub(crate) struct Recorder {
    events: Vec<String>,
    tx: mpsc::UnboundedSender<(String, Event)>,
}

impl Handler for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut map = EventMap::new();
        for name in &self.events {
            let tx = self.tx.clone();
            let name = name.clone();
            map.on(&name.clone(), move |_, event| {
                let tx = tx.clone();
                let name = name.clone();
                async move {
                    let _ = tx.send((name, event));
                    Ok(())
                }
            });
        }
        map
    }
}

/// A disconnected client with a recorder on `client_global_send` plus `extra`
pub(crate) fn client_with_recorder(extra: &[&str]) -> (Client, Recorded) {
    let client = Client::new(Config::default());
    let (tx, rx) = mpsc::unbounded_channel();
    let mut events = vec![CLIENT_GLOBAL_SEND.to_string()];
    events.extend(extra.iter().map(|name| name.to_string()));
    client
        .add_handler(Arc::new(Recorder { events, tx }))
        .expect("recorder registers");
    (client, rx)
}

pub(crate) async fn next(rx: &mut Recorded) -> (String, Event) {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("recorder dropped")
}

/// Next message passed to `Client::send`, rendered
pub(crate) async fn next_sent(rx: &mut Recorded) -> String {
    loop {
        let (name, event) = next(rx).await;
        if name == CLIENT_GLOBAL_SEND {
            return event.as_message().expect("send carries a message").render();
        }
    }
}

/// Next event named `wanted`
pub(crate) async fn next_named(rx: &mut Recorded, wanted: &str) -> Event {
    loop {
        let (name, event) = next(rx).await;
        if name == wanted {
            return event;
        }
    }
}

/// Feed a raw line to the client as if it had been received
pub(crate) fn receive(client: &Client, line: &str) {
    let message = Message::parse(line).expect("valid test line");
    let key = message.event_key();
    client.trigger_handler(&key, Event::message(message));
}

/// Give spawned handler tasks a chance to run, then make sure nothing was sent
pub(crate) async fn assert_nothing_sent(rx: &mut Recorded) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    while let Ok((name, _)) = rx.try_recv() {
        assert_ne!(name, CLIENT_GLOBAL_SEND, "unexpected message sent");
    }
}
