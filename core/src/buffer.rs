//! Buffer management for the send and receive loops
//!
//! The receive side accumulates raw bytes and cuts them into CRLF-terminated
//! lines, keeping any incomplete tail for the next read. The send side
//! accumulates rendered lines until the transport accepts them.

use crate::Message;
use tracing::warn;

/// Number of bytes requested from the transport per read
pub const READ_CHUNK_SIZE: usize = 4096;

/// Longest line accepted, message tags included
pub const MAX_LINE_LENGTH: usize = 8704;

const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Receive buffer - turns a byte stream into complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    /// Bytes after the last complete line
    pending: Vec<u8>,
    /// Dropping the rest of an overlong line
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes and return every line they complete
    ///
    /// Lines are returned without the terminator, decoded as UTF-8 with
    /// invalid sequences replaced. Empty lines are dropped, and so are lines
    /// longer than [`MAX_LINE_LENGTH`].
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        // Bytes already held have been searched; only a trailing '\r' can
        // still begin a terminator
        let mut search = self.pending.len().saturating_sub(LINE_TERMINATOR.len() - 1);
        self.pending.extend_from_slice(data);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = find_terminator(&self.pending[search..]) {
            let end = search + pos;
            let line = &self.pending[start..end];
            if self.discarding {
                self.discarding = false;
            } else if line.len() > MAX_LINE_LENGTH {
                warn!("Dropping {}-byte line", line.len());
            } else if !line.is_empty() {
                lines.push(String::from_utf8_lossy(line).into_owned());
            }
            start = end + LINE_TERMINATOR.len();
            search = start;
        }
        self.pending.drain(..start);

        if self.pending.len() > MAX_LINE_LENGTH {
            if !self.discarding {
                warn!("No line terminator within {} bytes, discarding until the next one", MAX_LINE_LENGTH);
                self.discarding = true;
            }
            let keep = usize::from(self.pending.last() == Some(&b'\r'));
            let excess = self.pending.len() - keep;
            self.pending.drain(..excess);
        }

        lines
    }

    /// Number of bytes waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn has_incomplete_data(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.discarding = false;
    }
}

fn find_terminator(data: &[u8]) -> Option<usize> {
    data.windows(LINE_TERMINATOR.len())
        .position(|window| window == LINE_TERMINATOR)
}

/// Send buffer - rendered lines not yet accepted by the transport
#[derive(Debug, Default)]
pub struct SendBuffer {
    data: Vec<u8>,
}

impl SendBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` rendered and CRLF-terminated
    pub fn push(&mut self, message: &Message) {
        self.data.extend_from_slice(message.render().as_bytes());
        self.data.extend_from_slice(LINE_TERMINATOR);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Forget everything, after a successful write
    pub fn clear(&mut self) {
        self.data.clear();
    }
}
