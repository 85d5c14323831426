use nix::poll::PollFlags;
use socket2::{SockAddr, Socket};

use crate::buffer::Buffer;

/// Per-socket state: the fd, the event-loop intent flags and the two byte
/// queues. The connection never performs I/O itself; the event loop reads
/// into `incoming` and drains `outgoing`.
pub struct Conn {
    pub(crate) socket: Socket,
    peer: SockAddr,
    pub(crate) want_read: bool,
    pub(crate) want_write: bool,
    pub(crate) want_close: bool,
    pub(crate) incoming: Buffer,
    pub(crate) outgoing: Buffer,
}

impl Conn {
    pub(crate) fn new(socket: Socket, peer: SockAddr) -> Self {
        Self {
            socket,
            peer,
            want_read: true,
            want_write: false,
            want_close: false,
            incoming: Buffer::new(),
            outgoing: Buffer::new(),
        }
    }

    pub fn peer_address(&self) -> String {
        match self.peer.as_socket() {
            Some(addr) => addr.to_string(),
            None => String::from("<unknown>"),
        }
    }

    pub fn append_incoming(&mut self, data: &[u8]) {
        self.incoming.append(data);
    }

    /// Drop `n` consumed bytes from the front of `incoming`, saturating at
    /// the buffered size.
    pub fn consume_incoming(&mut self, n: usize) {
        self.incoming.consume(n.min(self.incoming.len()));
    }

    pub fn append_outgoing(&mut self, data: &[u8]) {
        self.outgoing.append(data);
    }

    /// Envelope a response payload (u32 total length, then the bytes) onto
    /// the outgoing queue.
    pub fn append_response(&mut self, payload: &[u8]) {
        self.outgoing.append_u32(payload.len() as u32);
        self.outgoing.append(payload);
    }

    pub fn consume_outgoing(&mut self, n: usize) {
        self.outgoing.consume(n.min(self.outgoing.len()));
    }

    /// Readiness interest for the next poll pass: errors always, plus
    /// whatever the intent flags ask for.
    pub(crate) fn poll_events(&self) -> PollFlags {
        let mut events = PollFlags::POLLERR;
        if self.want_read {
            events |= PollFlags::POLLIN;
        }
        if self.want_write {
            events |= PollFlags::POLLOUT;
        }
        events
    }
}
