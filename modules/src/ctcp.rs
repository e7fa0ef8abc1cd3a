//! Replies to the common CTCP requests: CLIENTINFO, VERSION and PING

use crate::events::{Ctcp, CTCP_REQUEST_PREFIX, MESSAGE_PROCESSOR};
use crate::util;
use rustirc_core::{commands, Capability, Client, EventMap, Handler};
use std::sync::Arc;

pub struct BasicCtcp {
    version: String,
}

impl BasicCtcp {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl Default for BasicCtcp {
    fn default() -> Self {
        Self::new(concat!("rustirc ", env!("CARGO_PKG_VERSION")))
    }
}

fn reply(client: &Client, request: &Ctcp, args: &[&str]) -> anyhow::Result<()> {
    let payload = util::ctcp(&request.command, args);
    client.send(commands::notice(request.source.nick(), &payload)?);
    Ok(())
}

impl Handler for BasicCtcp {
    fn name(&self) -> &str {
        "basic_ctcp"
    }

    fn dependencies(&self) -> Vec<Capability> {
        vec![MESSAGE_PROCESSOR]
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();

        events.on("ctcp_request_CLIENTINFO", |client, event| async move {
            let Some(request) = event.downcast::<Ctcp>() else {
                return Ok(());
            };
            let mut supported: Vec<String> = client
                .get_handled_events()
                .into_iter()
                .filter_map(|name| name.strip_prefix(CTCP_REQUEST_PREFIX).map(str::to_string))
                .collect();
            supported.sort();
            reply(&client, request, &[supported.join(" ").as_str()])
        });

        events.on("ctcp_request_VERSION", move |client, event| {
            let this = self.clone();
            async move {
                match event.downcast::<Ctcp>() {
                    Some(request) => reply(&client, request, &[this.version.as_str()]),
                    None => Ok(()),
                }
            }
        });

        events.on("ctcp_request_PING", |client, event| async move {
            let Some(request) = event.downcast::<Ctcp>() else {
                return Ok(());
            };
            match request.args.as_deref() {
                Some(token) => reply(&client, request, &[token]),
                None => reply(&client, request, &[]),
            }
        });

        events
    }
}
