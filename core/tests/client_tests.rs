//! Client pipeline integration tests
//!
//! Each test runs a real client against a loopback listener (or an
//! in-memory duplex stream) and observes it through a recording handler.

use rustirc_core::event::{CLIENT_CONNECTED, CLIENT_DISCONNECTED, CLIENT_ERROR, CLIENT_GLOBAL_RECV, CLIENT_LOAD};
use rustirc_core::{commands, Client, Config, ConnectionState, Event, EventMap, Handler, Step};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_test::assert_ok;

const WAIT: Duration = Duration::from_secs(5);

type Recorded = mpsc::UnboundedReceiver<(String, Event)>;

/// Forwards every listed event to a channel
struct Recorder {
    events: Vec<&'static str>,
    tx: mpsc::UnboundedSender<(String, Event)>,
}

impl Recorder {
    fn new(events: &[&'static str]) -> (Arc<Self>, Recorded) {
        let (tx, rx) = mpsc::unbounded_channel();
        let recorder = Arc::new(Self {
            events: events.to_vec(),
            tx,
        });
        (recorder, rx)
    }
}

impl Handler for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut map = EventMap::new();
        for name in &self.events {
            let tx = self.tx.clone();
            let name = name.to_string();
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

async fn next_event(rx: &mut Recorded) -> (String, Event) {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("recorder dropped")
}

/// Next event that is not `name`
async fn next_event_except(rx: &mut Recorded, name: &str) -> (String, Event) {
    loop {
        let event = next_event(rx).await;
        if event.0 != name {
            return event;
        }
    }
}

async fn listener() -> (TcpListener, Config) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut config = Config::new("127.0.0.1", port);
    config.throttle.delay_seconds = 0.0;
    (listener, config)
}

/// Start `client` and accept its connection
async fn connect(client: &Client, listener: &TcpListener) -> TcpStream {
    let (accepted, _) = tokio::join!(listener.accept(), client.start());
    accepted.unwrap().0
}

#[tokio::test]
async fn test_messages_dispatched_in_arrival_order() {
    let (listener, config) = listener().await;
    let client = Client::new(config);
    let (recorder, mut rx) = Recorder::new(&[CLIENT_GLOBAL_RECV]);
    assert_ok!(client.add_handler(recorder));

    let mut server = connect(&client, &listener).await;
    server.write_all(b"PRIVMSG #c :A\r\n").await.unwrap();
    server.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    server.write_all(b"PRIVMSG #c :B\r\n").await.unwrap();

    let (_, first) = next_event(&mut rx).await;
    let (_, second) = next_event(&mut rx).await;
    assert_eq!(first.as_message().unwrap().arg(1), Some("A"));
    assert_eq!(second.as_message().unwrap().arg(1), Some("B"));

    client.shutdown();
    timeout(WAIT, client.join()).await.unwrap();
}

#[tokio::test]
async fn test_lines_split_across_reads_are_reassembled() {
    let (listener, config) = listener().await;
    let client = Client::new(config);
    let (recorder, mut rx) = Recorder::new(&["NOTICE"]);
    assert_ok!(client.add_handler(recorder));

    let mut server = connect(&client, &listener).await;
    server.write_all(b"NOTICE me :hel").await.unwrap();
    server.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    server.write_all(b"lo\r\n").await.unwrap();

    let (name, event) = next_event(&mut rx).await;
    assert_eq!(name, "NOTICE");
    assert_eq!(event.as_message().unwrap().args(), ["me", "hello"]);

    client.shutdown();
}

#[tokio::test]
async fn test_sent_messages_arrive_in_order() {
    let (listener, config) = listener().await;
    let client = Client::new(config);
    let server = connect(&client, &listener).await;

    client.send(commands::nick("alice").unwrap());
    client.send(commands::user("alice", "0", "*", "Alice A").unwrap());
    client.send(commands::join("#rust").unwrap());
    client.send(commands::privmsg("#rust", "").unwrap());

    let mut lines = BufReader::new(server).lines();
    let mut received = Vec::new();
    for _ in 0..4 {
        let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
        received.push(line);
    }
    assert_eq!(
        received,
        ["NICK alice", "USER alice 0 * :Alice A", "JOIN #rust", "PRIVMSG #rust :"]
    );

    client.shutdown();
}

#[tokio::test]
async fn test_messages_queued_before_start_are_sent() {
    let (listener, config) = listener().await;
    let client = Client::new(config);
    client.send(commands::nick("early").unwrap());

    let server = connect(&client, &listener).await;
    let mut lines = BufReader::new(server).lines();
    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap();
    assert_eq!(line.as_deref(), Some("NICK early"));

    client.shutdown();
}

#[tokio::test]
async fn test_connect_failure_reports_connect_step() {
    let (listener, config) = listener().await;
    drop(listener);

    let client = Client::new(config);
    let (recorder, mut rx) = Recorder::new(&[CLIENT_ERROR, CLIENT_CONNECTED]);
    assert_ok!(client.add_handler(recorder));

    client.start().await;

    let (name, event) = next_event(&mut rx).await;
    assert_eq!(name, CLIENT_ERROR);
    assert_eq!(event.as_error().unwrap().step(), Step::Connect);
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.shutdown();
    timeout(WAIT, client.join()).await.unwrap();
}

#[tokio::test]
async fn test_peer_close_reports_recv_error_and_disconnects() {
    let (listener, config) = listener().await;
    let client = Client::new(config);
    let (recorder, mut rx) = Recorder::new(&[CLIENT_ERROR, CLIENT_DISCONNECTED]);
    assert_ok!(client.add_handler(recorder));

    let server = connect(&client, &listener).await;
    drop(server);

    let mut seen = Vec::new();
    for _ in 0..2 {
        seen.push(next_event(&mut rx).await);
    }
    let error = seen
        .iter()
        .find_map(|(name, event)| (name == CLIENT_ERROR).then(|| event.as_error().cloned()))
        .flatten()
        .expect("client_error was not dispatched");
    assert_eq!(error.step(), Step::Recv);
    assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    assert!(seen.iter().any(|(name, _)| name == CLIENT_DISCONNECTED));
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.shutdown();
    timeout(WAIT, client.join()).await.unwrap();
}

#[tokio::test]
async fn test_stop_dispatches_disconnected_once() {
    let (listener, config) = listener().await;
    let client = Client::new(config);
    let (recorder, mut rx) = Recorder::new(&[CLIENT_CONNECTED, CLIENT_DISCONNECTED]);
    assert_ok!(client.add_handler(recorder));

    let _server = connect(&client, &listener).await;
    assert_eq!(next_event(&mut rx).await.0, CLIENT_CONNECTED);
    assert!(client.is_connected());

    client.stop();
    client.stop();
    assert_eq!(next_event(&mut rx).await.0, CLIENT_DISCONNECTED);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());

    client.shutdown();
    timeout(WAIT, client.join()).await.unwrap();
}

#[tokio::test]
async fn test_shutdown_during_throttle_sleep() {
    let (listener, mut config) = listener().await;
    config.throttle.delay_seconds = 3600.0;
    config.throttle.burst = 1;
    let client = Client::new(config);
    let server = connect(&client, &listener).await;

    client.send(commands::ping("one").unwrap());
    client.send(commands::ping("two").unwrap());

    let mut lines = BufReader::new(server).lines();
    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap();
    assert_eq!(line.as_deref(), Some("PING one"));

    // The send loop is now asleep on the throttle
    client.shutdown();
    timeout(WAIT, client.join())
        .await
        .expect("join deadlocked during throttle sleep");
}

#[tokio::test]
async fn test_shutdown_during_blocked_read() {
    let (listener, mut config) = listener().await;
    config.connection.timeout_seconds = 0;
    let client = Client::new(config);
    let _server = connect(&client, &listener).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    client.shutdown();
    timeout(WAIT, client.join())
        .await
        .expect("join deadlocked during blocked read");
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_restart_after_shutdown() {
    let (listener, config) = listener().await;
    let client = Client::new(config);
    let (recorder, mut rx) = Recorder::new(&["PING"]);
    assert_ok!(client.add_handler(recorder));

    let _first = connect(&client, &listener).await;
    client.shutdown();
    timeout(WAIT, client.join()).await.unwrap();

    let mut second = connect(&client, &listener).await;
    second.write_all(b"PING :again\r\n").await.unwrap();
    let (_, event) = next_event(&mut rx).await;
    assert_eq!(event.as_message().unwrap().arg(0), Some("again"));

    client.shutdown();
}

struct SlowFirst {
    tx: mpsc::UnboundedSender<String>,
}

impl Handler for SlowFirst {
    fn name(&self) -> &str {
        "slow-first"
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut map = EventMap::new();
        map.on("PRIVMSG", move |_, event| {
            let this = self.clone();
            async move {
                let text = event.as_message().and_then(|m| m.arg(1)).unwrap_or_default().to_string();
                if text == "first" {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                let _ = this.tx.send(text);
                Ok(())
            }
        });
        map
    }
}

#[tokio::test]
async fn test_strict_ordering_serializes_handlers() {
    let (listener, mut config) = listener().await;
    config.dispatch.strict_ordering = true;
    let client = Client::new(config);
    let (tx, mut rx) = mpsc::unbounded_channel();
    assert_ok!(client.add_handler(Arc::new(SlowFirst { tx })));

    let mut server = connect(&client, &listener).await;
    server
        .write_all(b"PRIVMSG #c :first\r\nPRIVMSG #c :second\r\n")
        .await
        .unwrap();

    let first = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    let second = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!((first.as_str(), second.as_str()), ("first", "second"));

    client.shutdown();
    timeout(WAIT, client.join()).await.unwrap();
}

struct Echo;

impl Handler for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut map = EventMap::new();
        map.on("PING", |client, event| async move {
            let token = event.as_message().and_then(|m| m.arg(0)).unwrap_or_default();
            client.send(commands::pong(token)?);
            Ok(())
        });
        map.on("RPL_WELCOME", |client, _| async move {
            client.send(commands::join("#welcome")?);
            Ok(())
        });
        map.on("FAIL", |_, _| async { anyhow::bail!("handler failure") });
        map
    }
}

#[tokio::test]
async fn test_start_with_stream_and_numeric_routing() {
    let client = Client::new(Config::default());
    client.set_throttle_delay(Duration::ZERO);
    let (recorder, mut rx) = Recorder::new(&[CLIENT_LOAD, CLIENT_CONNECTED]);
    assert_ok!(client.add_handler(recorder));
    assert_eq!(next_event(&mut rx).await.0, CLIENT_LOAD);
    assert_ok!(client.add_handler(Arc::new(Echo)));

    let (stream, server) = tokio::io::duplex(1024);
    client.start_with_stream(stream);
    assert_eq!(next_event_except(&mut rx, CLIENT_LOAD).await.0, CLIENT_CONNECTED);

    let (server_read, mut server_write) = tokio::io::split(server);
    // A failing handler must not take the pipeline down
    server_write.write_all(b"FAIL\r\n").await.unwrap();
    server_write
        .write_all(b":irc.example.net 001 me :Welcome\r\nPING :abc\r\n")
        .await
        .unwrap();

    let mut lines = BufReader::new(server_read).lines();
    let mut received = Vec::new();
    for _ in 0..2 {
        received.push(timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap());
    }
    received.sort();
    assert_eq!(received, ["JOIN #welcome", "PONG abc"]);

    client.shutdown();
    timeout(WAIT, client.join()).await.unwrap();
    assert_eq!(client.handler_failures(), 1);
}

#[tokio::test]
async fn test_send_loop_bursts_then_waits() {
    let (listener, mut config) = listener().await;
    config.throttle.delay_seconds = 0.5;
    config.throttle.burst = 5;
    let client = Client::new(config);
    let server = connect(&client, &listener).await;

    let started = Instant::now();
    for n in 1..=6 {
        client.send(commands::ping(&n.to_string()).unwrap());
    }

    let mut lines = BufReader::new(server).lines();
    let mut arrivals = Vec::new();
    for n in 1..=6 {
        let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap();
        assert_eq!(line, Some(format!("PING {}", n)));
        arrivals.push(started.elapsed());
    }

    assert!(arrivals[4] < Duration::from_millis(250), "burst was throttled: {:?}", arrivals);
    assert!(
        arrivals[5] - arrivals[4] >= Duration::from_millis(400),
        "sixth line was not delayed: {:?}",
        arrivals
    );

    client.shutdown();
    timeout(WAIT, client.join()).await.unwrap();
}

#[tokio::test]
async fn test_shutdown_while_connecting() {
    let (listener, config) = listener().await;
    let client = Client::new(config);

    let other = client.clone();
    tokio::join!(client.start(), async move {
        tokio::task::yield_now().await;
        other.shutdown();
    });

    assert_ne!(client.state(), ConnectionState::Connected);
    timeout(WAIT, client.join())
        .await
        .expect("join blocked after shutdown during connect");

    // The client is still usable afterwards
    let _server = connect(&client, &listener).await;
    assert!(client.is_connected());
    client.shutdown();
    timeout(WAIT, client.join()).await.unwrap();
}

#[tokio::test]
async fn test_reconnect_refused_after_shutdown() {
    let (listener, config) = listener().await;
    let client = Client::new(config);

    let epoch = client.shutdown_epoch();
    client.shutdown();
    client.reconnect(epoch).await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(timeout(Duration::from_millis(200), listener.accept()).await.is_err());
    timeout(WAIT, client.join()).await.unwrap();

    // With a current epoch it connects as usual
    let (accepted, _) = tokio::join!(listener.accept(), client.reconnect(client.shutdown_epoch()));
    let _server = assert_ok!(accepted);
    assert!(client.is_connected());

    client.shutdown();
    timeout(WAIT, client.join()).await.unwrap();
}

#[tokio::test]
async fn test_timeout_change_applies_to_live_connection() {
    let (listener, mut config) = listener().await;
    config.connection.timeout_seconds = 0;
    let client = Client::new(config);
    let (recorder, mut rx) = Recorder::new(&[CLIENT_ERROR]);
    assert_ok!(client.add_handler(recorder));

    let _server = connect(&client, &listener).await;
    // The receive loop is now waiting with no timeout at all
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.set_timeout(Some(Duration::from_secs(1)));

    let (name, event) = next_event(&mut rx).await;
    assert_eq!(name, CLIENT_ERROR);
    let error = event.as_error().unwrap();
    assert_eq!(error.step(), Step::Recv);
    assert_eq!(error.kind(), io::ErrorKind::TimedOut);

    client.shutdown();
    timeout(WAIT, client.join()).await.unwrap();
}
