use std::env;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::process;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use coredis::protocol::{self, K_MAX_MSG};

const DEFAULT_ADDR: &str = "127.0.0.1:6379";

fn main() {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut addr = String::from(DEFAULT_ADDR);
    if args.first().map(|a| a == "--addr").unwrap_or(false) {
        if args.len() < 2 {
            usage();
        }
        addr = args[1].clone();
        args.drain(..2);
    }
    if args.is_empty() {
        usage();
    }

    if let Err(e) = run(&addr, &args) {
        eprintln!("coredis-cli: {}", e);
        process::exit(1);
    }
}

fn usage() -> ! {
    eprintln!("usage: coredis-cli [--addr HOST:PORT] CMD [ARGS...]");
    process::exit(1);
}

fn run(addr: &str, cmd: &[String]) -> io::Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("bad address: {}", e)))?;
    let mut socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.connect(&SockAddr::from(addr))?;

    // One framed request out...
    let payload = protocol::build_request(cmd);
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    write_all(&mut socket, &frame)?;

    // ...one framed response back.
    let mut header = [0u8; 4];
    read_full(&mut socket, &mut header)?;
    let len = u32::from_le_bytes(header) as usize;
    if len > K_MAX_MSG {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "reply too long"));
    }
    let mut response = vec![0u8; len];
    read_full(&mut socket, &mut response)?;

    let mut rendered = String::new();
    if protocol::print_response(&mut rendered, &response, 0) == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "malformed response"));
    }
    print!("{}", rendered);
    Ok(())
}

// Read exactly `buf.len()` bytes.
fn read_full<T: Read>(socket: &mut T, buf: &mut [u8]) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match socket.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

// Write all of `buf`.
fn write_all<T: Write>(socket: &mut T, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match socket.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write to socket",
                ))
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
