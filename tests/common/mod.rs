#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use coredis::protocol;
use coredis::Server;

/// Bind the real server on an ephemeral port and run its event loop on a
/// background thread. The thread dies with the test process.
pub fn spawn_server() -> SocketAddr {
    let mut server = Server::bind("127.0.0.1:0".parse().unwrap()).expect("bind server");
    let addr = server.local_addr().expect("local addr");
    thread::spawn(move || {
        let _ = server.run();
    });
    addr
}

/// Decoded response value, for assertions.
#[derive(Debug, PartialEq)]
pub enum Resp {
    Nil,
    Err(u32, String),
    Str(String),
    Int(i64),
    Arr(Vec<Resp>),
}

pub fn decode(bytes: &[u8]) -> Resp {
    let mut cursor = bytes;
    let value = decode_one(&mut cursor);
    assert!(cursor.is_empty(), "trailing bytes after response");
    value
}

fn decode_one(cursor: &mut &[u8]) -> Resp {
    let tag = cursor[0];
    *cursor = &cursor[1..];
    match tag {
        0 => Resp::Nil,
        1 => {
            let code = take_u32(cursor);
            let len = take_u32(cursor) as usize;
            let (msg, rest) = cursor.split_at(len);
            let msg = String::from_utf8(msg.to_vec()).unwrap();
            *cursor = rest;
            Resp::Err(code, msg)
        }
        2 => {
            let len = take_u32(cursor) as usize;
            let (val, rest) = cursor.split_at(len);
            let val = String::from_utf8(val.to_vec()).unwrap();
            *cursor = rest;
            Resp::Str(val)
        }
        3 => {
            let (raw, rest) = cursor.split_at(8);
            let val = i64::from_le_bytes(raw.try_into().unwrap());
            *cursor = rest;
            Resp::Int(val)
        }
        4 => {
            let count = take_u32(cursor);
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(decode_one(cursor));
            }
            Resp::Arr(items)
        }
        other => panic!("unknown response tag {}", other),
    }
}

fn take_u32(cursor: &mut &[u8]) -> u32 {
    let (raw, rest) = cursor.split_at(4);
    *cursor = rest;
    u32::from_le_bytes(raw.try_into().unwrap())
}

pub struct TestClient {
    stream: TcpStream,
}

impl TestClient {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect to server");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        Self { stream }
    }

    pub fn send(&mut self, cmd: &[&str]) {
        let payload = protocol::build_request(cmd);
        self.send_payload(&payload);
    }

    /// Frame an arbitrary payload; lets tests send malformed requests.
    pub fn send_payload(&mut self, payload: &[u8]) {
        let mut frame = Vec::with_capacity(4 + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload);
        self.send_raw(&frame);
    }

    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).expect("send bytes");
    }

    pub fn recv(&mut self) -> Resp {
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header).expect("read frame header");
        let len = u32::from_le_bytes(header) as usize;
        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).expect("read frame payload");
        decode(&payload)
    }

    pub fn query(&mut self, cmd: &[&str]) -> Resp {
        self.send(cmd);
        self.recv()
    }

    /// True once the server has closed this connection.
    pub fn wait_for_close(&mut self) -> bool {
        let mut byte = [0u8; 1];
        matches!(self.stream.read(&mut byte), Ok(0))
    }
}
