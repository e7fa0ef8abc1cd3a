//! Connection lifecycle plugins: logging, shutdown and reconnection policy

use rustirc_core::event::{
    CLIENT_CONNECTED, CLIENT_DISCONNECTED, CLIENT_ERROR, CLIENT_GLOBAL_RECV, CLIENT_GLOBAL_SEND,
};
use rustirc_core::{EventMap, Handler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Logs connection events and all traffic through `tracing`
pub struct EventLogger;

impl Handler for EventLogger {
    fn name(&self) -> &str {
        "event_logger"
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();
        events.on(CLIENT_CONNECTED, |_, _| async {
            info!("Connected to server");
            Ok(())
        });
        events.on(CLIENT_DISCONNECTED, |_, _| async {
            info!("Disconnected from server");
            Ok(())
        });
        events.on(CLIENT_ERROR, |_, event| async move {
            if let Some(error) = event.as_error() {
                error!("Connection error: {}", error);
            }
            Ok(())
        });
        events.on(CLIENT_GLOBAL_SEND, |_, event| async move {
            if let Some(message) = event.as_message() {
                debug!("<< {}", message);
            }
            Ok(())
        });
        events.on(CLIENT_GLOBAL_RECV, |_, event| async move {
            if let Some(message) = event.as_message() {
                debug!(">> {}", message);
            }
            Ok(())
        });
        events
    }
}

/// Shuts the client down on a server ERROR or any transport failure
pub struct ShutdownOnError;

impl Handler for ShutdownOnError {
    fn name(&self) -> &str {
        "shutdown_on_error"
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();
        events.on("ERROR", |client, event| async move {
            let reason = event.as_message().and_then(|m| m.arg(0)).unwrap_or_default();
            warn!("Server closed the link: {}", reason);
            client.shutdown();
            Ok(())
        });
        events.on(CLIENT_ERROR, |client, _| async move {
            client.shutdown();
            Ok(())
        });
        events
    }
}

/// Reconnects after a transport failure
///
/// Once the client has sent QUIT, a failure is treated as the end of the
/// session and the client is shut down instead. A shutdown during the
/// reconnect delay cancels the reconnect.
pub struct AutoReconnect {
    delay: Duration,
    quitting: AtomicBool,
}

impl AutoReconnect {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            quitting: AtomicBool::new(false),
        }
    }
}

impl Handler for AutoReconnect {
    fn name(&self) -> &str {
        "auto_reconnect"
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();

        let this = self.clone();
        events.on(CLIENT_GLOBAL_SEND, move |_, event| {
            let this = this.clone();
            async move {
                if event.as_message().map(|m| m.event_key() == "QUIT").unwrap_or(false) {
                    this.quitting.store(true, Ordering::SeqCst);
                }
                Ok(())
            }
        });

        let this = self.clone();
        events.on(CLIENT_CONNECTED, move |_, _| {
            let this = this.clone();
            async move {
                this.quitting.store(false, Ordering::SeqCst);
                Ok(())
            }
        });

        events.on(CLIENT_ERROR, move |client, _| {
            let this = self.clone();
            async move {
                let epoch = client.shutdown_epoch();
                if this.quitting.load(Ordering::SeqCst) {
                    info!("Connection closed after QUIT, shutting down");
                    client.shutdown();
                    return Ok(());
                }
                client.stop();
                info!("Reconnecting in {:?}", this.delay);
                tokio::select! {
                    _ = client.shut_down_since(epoch) => {
                        debug!("Client shut down, not reconnecting");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(this.delay) => {}
                }
                client.reconnect(epoch).await;
                Ok(())
            }
        });

        events
    }
}
