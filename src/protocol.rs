use std::fmt::Write as _;

use thiserror::Error;

use crate::buffer::Buffer;

/// Largest frame payload accepted on the wire. A peer declaring more is
/// disconnected without a reply.
pub const K_MAX_MSG: usize = 32 << 20;
/// Largest argument count accepted in a request.
pub const K_MAX_ARGS: usize = 1024;

/// First byte of every serialized response value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    Nil = 0,
    Err = 1,
    Str = 2,
    Int = 3,
    Arr = 4,
}

/// Error code carried by an ERR response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    UnknownCommand = 0,
    WrongArgs = 1,
    Protocol = 2,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("truncated length field")]
    Truncated,
    #[error("too many arguments")]
    TooManyArgs,
    #[error("argument length exceeds payload")]
    LengthOverrun,
    #[error("trailing bytes after request")]
    TrailingBytes,
    #[error("argument is not valid UTF-8")]
    InvalidUtf8,
}

/// Decode a request payload: `u32 argc`, then argc length-prefixed strings.
/// The whole payload must be consumed. An empty command vector is a valid
/// parse; rejecting it is the dispatcher's job.
pub fn parse_request(payload: &[u8]) -> Result<Vec<String>, ParseError> {
    let mut cursor = payload;
    let argc = read_u32(&mut cursor).ok_or(ParseError::Truncated)? as usize;
    if argc > K_MAX_ARGS {
        return Err(ParseError::TooManyArgs);
    }
    let mut args = Vec::with_capacity(argc);
    for _ in 0..argc {
        let len = read_u32(&mut cursor).ok_or(ParseError::Truncated)? as usize;
        if len > cursor.len() {
            return Err(ParseError::LengthOverrun);
        }
        let (arg, rest) = cursor.split_at(len);
        cursor = rest;
        args.push(String::from_utf8(arg.to_vec()).map_err(|_| ParseError::InvalidUtf8)?);
    }
    if !cursor.is_empty() {
        return Err(ParseError::TrailingBytes);
    }
    Ok(args)
}

/// Encode a command as a request payload (no outer frame).
pub fn build_request<S: AsRef<str>>(cmd: &[S]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&(cmd.len() as u32).to_le_bytes());
    for part in cmd {
        let bytes = part.as_ref().as_bytes();
        payload.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        payload.extend_from_slice(bytes);
    }
    payload
}

pub fn out_nil(out: &mut Buffer) {
    out.append_u8(Tag::Nil as u8);
}

pub fn out_err(out: &mut Buffer, code: ErrorCode, msg: &str) {
    out.append_u8(Tag::Err as u8);
    out.append_u32(code as u32);
    out.append_u32(msg.len() as u32);
    out.append(msg.as_bytes());
}

pub fn out_str(out: &mut Buffer, val: &str) {
    out.append_u8(Tag::Str as u8);
    out.append_u32(val.len() as u32);
    out.append(val.as_bytes());
}

pub fn out_int(out: &mut Buffer, val: i64) {
    out.append_u8(Tag::Int as u8);
    out.append_i64(val);
}

/// Arrays serialize a fixed element count up front; the caller must emit
/// exactly `n` values afterwards.
pub fn out_arr(out: &mut Buffer, n: u32) {
    out.append_u8(Tag::Arr as u8);
    out.append_u32(n);
}

/// Render one response value into `out` for terminal display, one line per
/// value, nested array elements indented. Returns the number of bytes
/// consumed, or 0 if the response is truncated or malformed.
pub fn print_response(out: &mut String, resp: &[u8], indent: usize) -> usize {
    if resp.is_empty() {
        return 0;
    }
    let tag = resp[0];
    let mut cursor = &resp[1..];

    for _ in 0..indent {
        out.push(' ');
    }

    match tag {
        t if t == Tag::Nil as u8 => {
            out.push_str("(nil)\n");
        }
        t if t == Tag::Err as u8 => {
            let Some(code) = read_u32(&mut cursor) else { return 0 };
            let Some(len) = read_u32(&mut cursor) else { return 0 };
            if (len as usize) > cursor.len() {
                return 0;
            }
            let (msg, rest) = cursor.split_at(len as usize);
            cursor = rest;
            let _ = writeln!(out, "(err) code {}: {}", code, String::from_utf8_lossy(msg));
        }
        t if t == Tag::Str as u8 => {
            let Some(len) = read_u32(&mut cursor) else { return 0 };
            if (len as usize) > cursor.len() {
                return 0;
            }
            let (val, rest) = cursor.split_at(len as usize);
            cursor = rest;
            let _ = writeln!(out, "\"{}\"", String::from_utf8_lossy(val));
        }
        t if t == Tag::Int as u8 => {
            if cursor.len() < 8 {
                return 0;
            }
            let (raw, rest) = cursor.split_at(8);
            cursor = rest;
            let val = i64::from_le_bytes(raw.try_into().expect("8-byte slice"));
            let _ = writeln!(out, "(integer) {}", val);
        }
        t if t == Tag::Arr as u8 => {
            let Some(count) = read_u32(&mut cursor) else { return 0 };
            let _ = writeln!(out, "(arr) {} elements:", count);
            for _ in 0..count {
                let consumed = print_response(out, cursor, indent + 1);
                if consumed == 0 {
                    return 0;
                }
                cursor = &cursor[consumed..];
            }
        }
        _ => return 0,
    }

    resp.len() - cursor.len()
}

fn read_u32(cursor: &mut &[u8]) -> Option<u32> {
    if cursor.len() < 4 {
        return None;
    }
    let (head, rest) = cursor.split_at(4);
    *cursor = rest;
    Some(u32::from_le_bytes(head.try_into().expect("4-byte slice")))
}
