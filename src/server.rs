use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};

use log::{debug, error, info, warn};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::buffer::Buffer;
use crate::command::{self, Db};
use crate::connection::Conn;
use crate::protocol::{self, ErrorCode, K_MAX_MSG};

pub const DEFAULT_ADDR: &str = "127.0.0.1:6379";

/// The event loop: one listener, one engine, one connection table, all
/// driven from a single thread. Commands run to completion between polls;
/// the only suspension point is the `poll` call itself.
pub struct Server {
    listener: Socket,
    db: Db,
    conns: HashMap<RawFd, Conn>,
}

impl Server {
    /// Create the listening socket and the empty engine. Also ignores
    /// SIGPIPE so a peer that went away surfaces as a write error instead
    /// of killing the process.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        ignore_sigpipe();

        let listener = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        listener.set_reuse_address(true)?;
        listener.bind(&SockAddr::from(addr))?;
        listener.listen(nix::libc::SOMAXCONN)?;
        listener.set_nonblocking(true)?;
        info!("listening on {}", addr);

        Ok(Self {
            listener,
            db: Db::new(),
            conns: HashMap::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()?.as_socket().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "listener has no inet address")
        })
    }

    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.step()?;
        }
    }

    /// One pass: poll for readiness, pump every ready connection, then reap
    /// the ones marked for close.
    pub fn step(&mut self) -> io::Result<()> {
        let listener_fd = self.listener.as_raw_fd();
        let ready = self.poll_once()?;

        for (fd, revents) in ready {
            if fd == listener_fd {
                if revents.contains(PollFlags::POLLIN) {
                    self.accept_new();
                }
                continue;
            }
            let Some(conn) = self.conns.get_mut(&fd) else {
                continue;
            };
            if revents.contains(PollFlags::POLLIN) && conn.want_read {
                handle_read(conn, &mut self.db);
            }
            if revents.contains(PollFlags::POLLOUT) && conn.want_write {
                handle_write(conn);
            }
            if revents.intersects(PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL) {
                conn.want_close = true;
            }
        }

        let closing: Vec<RawFd> = self
            .conns
            .iter()
            .filter(|(_, conn)| conn.want_close)
            .map(|(&fd, _)| fd)
            .collect();
        for fd in closing {
            if let Some(conn) = self.conns.remove(&fd) {
                info!("closing connection from {}", conn.peer_address());
                // Dropping the Conn closes the socket.
            }
        }
        Ok(())
    }

    /// Build the interest set, poll with no timeout, and return the fds
    /// that have events. EINTR yields an empty pass.
    fn poll_once(&self) -> io::Result<Vec<(RawFd, PollFlags)>> {
        let mut fds = Vec::with_capacity(self.conns.len() + 1);
        let mut poll_fds = Vec::with_capacity(self.conns.len() + 1);

        poll_fds.push(PollFd::new(&self.listener, PollFlags::POLLIN));
        fds.push(self.listener.as_raw_fd());
        for (&fd, conn) in &self.conns {
            poll_fds.push(PollFd::new(&conn.socket, conn.poll_events()));
            fds.push(fd);
        }

        match poll(&mut poll_fds, -1) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(Vec::new()),
            Err(e) => return Err(io::Error::from_raw_os_error(e as i32)),
        }

        Ok(fds
            .into_iter()
            .zip(poll_fds.iter())
            .filter_map(|(fd, pfd)| {
                let revents = pfd.revents().unwrap_or(PollFlags::empty());
                if revents.is_empty() {
                    None
                } else {
                    Some((fd, revents))
                }
            })
            .collect())
    }

    fn accept_new(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((socket, peer)) => {
                    if let Err(e) = socket.set_nonblocking(true) {
                        error!("failed to make accepted socket non-blocking: {}", e);
                        continue;
                    }
                    let fd = socket.as_raw_fd();
                    let conn = Conn::new(socket, peer);
                    info!("client connected: {}", conn.peer_address());
                    self.conns.insert(fd, conn);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("accept error: {}", e);
                    break;
                }
            }
        }
    }
}

fn ignore_sigpipe() {
    use nix::sys::signal::{signal, SigHandler, Signal};
    // Safe to repeat; without it a write to a closed peer raises SIGPIPE.
    unsafe {
        let _ = signal(Signal::SIGPIPE, SigHandler::SigIgn);
    }
}

/// Read whatever the socket has, then extract and dispatch every complete
/// frame. While a reply is pending the connection stops reading (simple
/// back-pressure) and tries one eager write to cut latency.
fn handle_read(conn: &mut Conn, db: &mut Db) {
    let mut scratch = [0u8; 64 * 1024];
    match conn.socket.read(&mut scratch) {
        Ok(0) => {
            debug!("peer {} closed the connection", conn.peer_address());
            conn.want_close = true;
            return;
        }
        Ok(n) => conn.append_incoming(&scratch[..n]),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
        Err(e) if e.kind() == io::ErrorKind::Interrupted => return,
        Err(e) => {
            warn!("read error from {}: {}", conn.peer_address(), e);
            conn.want_close = true;
            return;
        }
    }

    while try_one_request(conn, db) {}

    if !conn.outgoing.is_empty() {
        conn.want_read = false;
        conn.want_write = true;
        handle_write(conn);
    }
}

/// Frame extraction: 4-byte little-endian length, then the payload. Returns
/// true if a frame was dispatched and another attempt is worthwhile.
fn try_one_request(conn: &mut Conn, db: &mut Db) -> bool {
    let Some(header) = conn.incoming.peek(4) else {
        return false;
    };
    let payload_len = u32::from_le_bytes(header.try_into().expect("4-byte header")) as usize;
    if payload_len > K_MAX_MSG {
        // Framing can no longer be trusted; drop the connection, no reply.
        warn!(
            "peer {} declared a {} byte frame, closing",
            conn.peer_address(),
            payload_len
        );
        conn.want_close = true;
        return false;
    }
    if conn.incoming.len() < 4 + payload_len {
        return false;
    }

    let payload = conn.incoming.data()[4..4 + payload_len].to_vec();
    let mut response = Buffer::new();
    let mut keep_going = true;
    match protocol::parse_request(&payload) {
        Ok(cmd) => command::execute(db, &cmd, &mut response),
        Err(e) => {
            warn!("protocol error from {}: {}", conn.peer_address(), e);
            protocol::out_err(&mut response, ErrorCode::Protocol, "Protocol error");
            conn.want_close = true;
            keep_going = false;
        }
    }
    conn.append_response(response.data());
    conn.consume_incoming(4 + payload_len);
    keep_going
}

/// Flush as much of `outgoing` as the socket accepts. When it drains, flip
/// the intent flags back to reading.
fn handle_write(conn: &mut Conn) {
    if conn.outgoing.is_empty() {
        conn.want_read = true;
        conn.want_write = false;
        return;
    }
    match conn.socket.write(conn.outgoing.data()) {
        Ok(0) => conn.want_close = true,
        Ok(n) => {
            conn.consume_outgoing(n);
            if conn.outgoing.is_empty() {
                conn.want_write = false;
                conn.want_read = true;
            }
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
        Err(e) => {
            warn!("write error to {}: {}", conn.peer_address(), e);
            conn.want_close = true;
        }
    }
}
