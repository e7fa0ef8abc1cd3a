//! Connection pipeline
//!
//! Three loops move data between the transport and the handlers:
//!
//! - the send loop drains the outbound queue onto the transport, throttled
//!   by a token bucket,
//! - the receive loop frames incoming bytes into messages and pushes them
//!   onto the inbound queue,
//! - the process loop pulls inbound items and dispatches them.
//!
//! The send and receive loops are bound to the transport they were started
//! with and end, without reporting anything, once it is closed.

use crate::buffer::{LineBuffer, SendBuffer, READ_CHUNK_SIZE};
use crate::event::{Inbound, Step, CLIENT_ERROR, CLIENT_GLOBAL_RECV};
use crate::tasks::TaskGroup;
use crate::throttle::Throttle;
use crate::transport::Transport;
use crate::{Client, Event, Message};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// Connection state as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

type SharedReceiver<T> = Arc<tokio::sync::Mutex<UnboundedReceiver<T>>>;

/// Outbound and inbound FIFOs
///
/// Receivers sit behind async mutexes so the whole set can be swapped out
/// while a loop still holds the old one.
struct Queues {
    outbound_tx: UnboundedSender<Message>,
    outbound_rx: SharedReceiver<Message>,
    inbound_tx: UnboundedSender<Inbound>,
    inbound_rx: SharedReceiver<Inbound>,
}

impl Queues {
    fn new() -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            outbound_tx,
            outbound_rx: Arc::new(tokio::sync::Mutex::new(outbound_rx)),
            inbound_tx,
            inbound_rx: Arc::new(tokio::sync::Mutex::new(inbound_rx)),
        }
    }
}

pub(crate) struct Pipeline {
    transport: Mutex<Option<Arc<Transport>>>,
    state: Mutex<ConnectionState>,
    queues: Mutex<Queues>,
    throttle: Mutex<Throttle>,
    pub(crate) core_tasks: TaskGroup,
    process_task: Mutex<Option<AbortHandle>>,
    /// Bumped by every shutdown; work begun under an older epoch may not
    /// install a transport or start a process loop
    epoch: watch::Sender<u64>,
}

impl Pipeline {
    pub(crate) fn new(burst: u32) -> Self {
        Self {
            transport: Mutex::new(None),
            state: Mutex::new(ConnectionState::Disconnected),
            queues: Mutex::new(Queues::new()),
            throttle: Mutex::new(Throttle::new(burst)),
            core_tasks: TaskGroup::new("pipeline"),
            process_task: Mutex::new(None),
            epoch: watch::channel(0).0,
        }
    }

    pub(crate) fn epoch(&self) -> u64 {
        *self.epoch.borrow()
    }

    /// Start a new epoch, fencing off connects still in flight
    pub(crate) fn begin_shutdown(&self) {
        let _slot = self.transport.lock();
        self.epoch.send_modify(|epoch| *epoch += 1);
    }

    /// Resolves once the epoch has moved past `epoch`
    pub(crate) async fn shut_down_since(&self, epoch: u64) {
        let mut epochs = self.epoch.subscribe();
        let _ = epochs.wait_for(|current| *current != epoch).await;
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    pub(crate) fn transport(&self) -> Option<Arc<Transport>> {
        self.transport.lock().clone()
    }

    /// Make `transport` the current one, unless a shutdown has happened
    /// since `epoch`
    pub(crate) fn install(&self, transport: Arc<Transport>, epoch: u64) -> bool {
        let mut slot = self.transport.lock();
        if self.epoch() != epoch {
            if slot.is_none() {
                self.set_state(ConnectionState::Disconnected);
            }
            return false;
        }
        *slot = Some(transport);
        self.set_state(ConnectionState::Connected);
        true
    }

    /// Close and clear the current transport
    ///
    /// With `expected` set, only a transport that is still the current one
    /// is cleared. Returns whether anything was cleared.
    pub(crate) fn clear(&self, expected: Option<&Arc<Transport>>) -> bool {
        let taken = {
            let mut slot = self.transport.lock();
            let taken = match (slot.as_ref(), expected) {
                (Some(current), Some(expected)) if !Arc::ptr_eq(current, expected) => None,
                _ => slot.take(),
            };
            if taken.is_some() {
                self.set_state(ConnectionState::Disconnected);
            }
            taken
        };

        match taken {
            Some(transport) => {
                transport.close();
                true
            }
            None => false,
        }
    }

    pub(crate) fn enqueue_outbound(&self, message: Message) {
        // The receiver lives in the same struct, so the send cannot fail
        let _ = self.queues.lock().outbound_tx.send(message);
    }

    pub(crate) fn enqueue_inbound(&self, item: Inbound) {
        let _ = self.queues.lock().inbound_tx.send(item);
    }

    fn outbound_receiver(&self) -> SharedReceiver<Message> {
        self.queues.lock().outbound_rx.clone()
    }

    fn inbound_receiver(&self) -> SharedReceiver<Inbound> {
        self.queues.lock().inbound_rx.clone()
    }

    /// Replace both queues, dropping anything not yet delivered
    pub(crate) fn reset_queues(&self) {
        *self.queues.lock() = Queues::new();
    }

    /// Run `start` unless a process loop is already running
    ///
    /// Returns false, starting nothing, if a shutdown has happened since
    /// `epoch`.
    pub(crate) fn ensure_processing(&self, epoch: u64, start: impl FnOnce() -> AbortHandle) -> bool {
        let mut process_task = self.process_task.lock();
        if self.epoch() != epoch {
            return false;
        }
        let running = process_task
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false);
        if !running {
            *process_task = Some(start());
        }
        true
    }

    /// Cancel every pipeline task
    pub(crate) fn abort(&self) {
        self.process_task.lock().take();
        self.core_tasks.abort_all();
    }
}

pub(crate) async fn send_loop(client: Client, transport: Arc<Transport>) {
    let pipeline = client.pipeline();
    let queue = pipeline.outbound_receiver();
    let mut buffer = SendBuffer::new();

    while !transport.is_closed() {
        let message = {
            let mut queue = queue.lock().await;
            tokio::select! {
                _ = transport.closed() => break,
                message = queue.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            }
        };

        buffer.push(&message);
        debug!("-> {}", message);

        match transport.write_all(buffer.as_bytes()).await {
            None => break,
            Some(Err(e)) => {
                client.report_io_error(Some(&transport), e, Step::Send);
                break;
            }
            Some(Ok(())) => buffer.clear(),
        }

        let (delay, burst) = (client.throttle_delay(), client.throttle_burst());
        let pause = pipeline
            .throttle
            .lock()
            .record_send(Instant::now(), delay, burst);

        match pause {
            Some(pause) => {
                tokio::select! {
                    _ = transport.closed() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
            None => tokio::task::yield_now().await,
        }
    }

    debug!("Send loop for {} finished", transport.peer());
}

pub(crate) async fn recv_loop(client: Client, transport: Arc<Transport>) {
    let pipeline = client.pipeline();
    let mut buffer = LineBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let read = match transport.read(&mut chunk).await {
            None => break,
            Some(Ok(0)) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )),
            Some(result) => result,
        };

        let n = match read {
            Ok(n) => n,
            Err(e) => {
                client.report_io_error(Some(&transport), e, Step::Recv);
                break;
            }
        };

        for line in buffer.push(&chunk[..n]) {
            match Message::parse(&line) {
                Ok(message) => {
                    debug!("<- {}", line);
                    pipeline.enqueue_inbound(Inbound::Message(message));
                }
                Err(e) => warn!("Skipping unparseable line {:?}: {}", line, e),
            }
        }

        tokio::task::yield_now().await;
    }

    debug!("Receive loop for {} finished", transport.peer());
}

pub(crate) async fn process_loop(client: Client) {
    let queue = client.pipeline().inbound_receiver();
    let mut queue = queue.lock().await;

    loop {
        if client.strict_ordering() {
            client.join_handlers().await;
        }

        let item = match queue.recv().await {
            Some(item) => item,
            None => break,
        };

        match item {
            Inbound::Error(error) => {
                client.trigger_handler(CLIENT_ERROR, Event::Error(error));
            }
            Inbound::Message(message) => {
                let key = message.event_key();
                let event = Event::message(message);
                client.trigger_handler(CLIENT_GLOBAL_RECV, event.clone());
                client.trigger_handler(&key, event);
            }
        }
    }
}
