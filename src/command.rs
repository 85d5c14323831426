use log::debug;

use crate::buffer::Buffer;
use crate::hashtable::{fnv1a_hash, HMap};
use crate::protocol::{out_arr, out_err, out_int, out_nil, out_str, ErrorCode};
use crate::zset::SortedSet;

const WRONG_TYPE_MSG: &str = "Operation against a key holding the wrong kind of value";

pub enum Value {
    Str(String),
    Zset(SortedSet),
}

/// One keyspace record: the key, its value, and (inside the hash map node)
/// the precomputed hash code.
pub struct DataEntry {
    key: String,
    value: Value,
}

/// All engine state. Lives inside the server object; nothing is global.
pub struct Db {
    store: HMap<DataEntry>,
}

impl Db {
    pub fn new() -> Self {
        Self { store: HMap::new() }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }
}

impl Default for Db {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute one parsed request against the engine, serializing the reply
/// into `out`. The command name is matched case-insensitively; handlers
/// check arity before touching any state.
pub fn execute(db: &mut Db, cmd: &[String], out: &mut Buffer) {
    if cmd.is_empty() {
        out_err(out, ErrorCode::UnknownCommand, "Empty command");
        return;
    }
    debug!("executing {:?}", cmd);
    match cmd[0].to_ascii_lowercase().as_str() {
        "ping" => ping(cmd, out),
        "get" => get(db, cmd, out),
        "set" => set(db, cmd, out),
        "del" => del(db, cmd, out),
        "keys" => keys(db, cmd, out),
        "zadd" => zadd(db, cmd, out),
        "zrem" => zrem(db, cmd, out),
        "zrange" => zrange(db, cmd, out),
        _ => out_err(
            out,
            ErrorCode::UnknownCommand,
            &format!("Unknown command '{}'", cmd[0]),
        ),
    }
}

fn ping(cmd: &[String], out: &mut Buffer) {
    match cmd.len() {
        1 => out_str(out, "PONG"),
        2 => out_str(out, &cmd[1]),
        _ => out_err(out, ErrorCode::WrongArgs, "Wrong number of arguments for 'ping'"),
    }
}

fn get(db: &mut Db, cmd: &[String], out: &mut Buffer) {
    if cmd.len() != 2 {
        out_err(out, ErrorCode::WrongArgs, "Wrong number of arguments for 'get'");
        return;
    }
    let key = &cmd[1];
    let hcode = fnv1a_hash(key.as_bytes());
    match db.store.lookup(hcode, |e| e.key == *key) {
        Some(entry) => match &entry.value {
            Value::Str(val) => out_str(out, val),
            Value::Zset(_) => out_err(out, ErrorCode::WrongArgs, WRONG_TYPE_MSG),
        },
        None => out_nil(out),
    }
}

fn set(db: &mut Db, cmd: &[String], out: &mut Buffer) {
    if cmd.len() != 3 {
        out_err(out, ErrorCode::WrongArgs, "Wrong number of arguments for 'set'");
        return;
    }
    let key = &cmd[1];
    let hcode = fnv1a_hash(key.as_bytes());
    // SET overwrites whatever was there, sorted sets included.
    db.store.remove(hcode, |e| e.key == *key);
    db.store.insert(
        hcode,
        DataEntry {
            key: key.clone(),
            value: Value::Str(cmd[2].clone()),
        },
    );
    out_nil(out);
}

fn del(db: &mut Db, cmd: &[String], out: &mut Buffer) {
    if cmd.len() != 2 {
        out_err(out, ErrorCode::WrongArgs, "Wrong number of arguments for 'del'");
        return;
    }
    let key = &cmd[1];
    let hcode = fnv1a_hash(key.as_bytes());
    let removed = db.store.remove(hcode, |e| e.key == *key).is_some();
    out_int(out, removed as i64);
}

fn keys(db: &mut Db, cmd: &[String], out: &mut Buffer) {
    if cmd.len() != 1 {
        out_err(out, ErrorCode::WrongArgs, "Wrong number of arguments for 'keys'");
        return;
    }
    out_arr(out, db.store.len() as u32);
    db.store.for_each(|entry| out_str(out, &entry.key));
}

fn zadd(db: &mut Db, cmd: &[String], out: &mut Buffer) {
    if cmd.len() < 4 || cmd.len() % 2 != 0 {
        out_err(out, ErrorCode::WrongArgs, "Wrong number of arguments for 'zadd'");
        return;
    }
    // Validate every (score, member) pair before mutating anything.
    let mut pairs = Vec::with_capacity((cmd.len() - 2) / 2);
    let mut i = 2;
    while i + 1 < cmd.len() {
        match cmd[i].parse::<f64>() {
            Ok(score) => pairs.push((score, cmd[i + 1].as_str())),
            Err(_) => {
                out_err(
                    out,
                    ErrorCode::WrongArgs,
                    &format!("value '{}' is not a valid float", cmd[i]),
                );
                return;
            }
        }
        i += 2;
    }

    let key = &cmd[1];
    let hcode = fnv1a_hash(key.as_bytes());
    let mut entry = match db.store.remove(hcode, |e| e.key == *key) {
        Some(entry) => {
            if !matches!(entry.value, Value::Zset(_)) {
                // Wrong type: put the record back untouched.
                db.store.insert(hcode, entry);
                out_err(out, ErrorCode::WrongArgs, WRONG_TYPE_MSG);
                return;
            }
            entry
        }
        None => DataEntry {
            key: key.clone(),
            value: Value::Zset(SortedSet::new()),
        },
    };

    let mut added = 0i64;
    if let Value::Zset(zset) = &mut entry.value {
        for (score, member) in pairs {
            if zset.add(score, member) {
                added += 1;
            }
        }
    }
    db.store.insert(hcode, entry);
    out_int(out, added);
}

fn zrem(db: &mut Db, cmd: &[String], out: &mut Buffer) {
    if cmd.len() < 3 {
        out_err(out, ErrorCode::WrongArgs, "Wrong number of arguments for 'zrem'");
        return;
    }
    let key = &cmd[1];
    let hcode = fnv1a_hash(key.as_bytes());
    let mut entry = match db.store.remove(hcode, |e| e.key == *key) {
        Some(entry) => {
            if !matches!(entry.value, Value::Zset(_)) {
                db.store.insert(hcode, entry);
                out_err(out, ErrorCode::WrongArgs, WRONG_TYPE_MSG);
                return;
            }
            entry
        }
        None => {
            out_int(out, 0);
            return;
        }
    };

    let mut removed = 0i64;
    if let Value::Zset(zset) = &mut entry.value {
        for member in &cmd[2..] {
            if zset.remove(member) {
                removed += 1;
            }
        }
    }
    // An emptied set stays in place under its key; DEL removes keys.
    db.store.insert(hcode, entry);
    out_int(out, removed);
}

fn zrange(db: &mut Db, cmd: &[String], out: &mut Buffer) {
    if cmd.len() != 4 {
        out_err(out, ErrorCode::WrongArgs, "Wrong number of arguments for 'zrange'");
        return;
    }
    let (start, stop) = match (cmd[2].parse::<i64>(), cmd[3].parse::<i64>()) {
        (Ok(start), Ok(stop)) => (start, stop),
        _ => {
            out_err(out, ErrorCode::WrongArgs, "value is not an integer or out of range");
            return;
        }
    };

    let key = &cmd[1];
    let hcode = fnv1a_hash(key.as_bytes());
    let zset = match db.store.lookup(hcode, |e| e.key == *key) {
        Some(entry) => match &entry.value {
            Value::Zset(zset) => zset,
            Value::Str(_) => {
                out_err(out, ErrorCode::WrongArgs, WRONG_TYPE_MSG);
                return;
            }
        },
        None => {
            out_arr(out, 0);
            return;
        }
    };

    // Redis-style index resolution: negative indices count from the end,
    // start clamps up to 0, stop clamps down to the last rank.
    let n = zset.len() as i64;
    let start = (if start < 0 { n + start } else { start }).max(0);
    let stop = (if stop < 0 { n + stop } else { stop }).min(n - 1);
    if n == 0 || start > stop {
        out_arr(out, 0);
        return;
    }

    let count = (stop - start + 1) as u32;
    out_arr(out, count * 2);
    let mut emitted = 0u32;
    let mut node = zset.select(start as usize);
    while let Some(id) = node {
        if emitted == count {
            break;
        }
        let (member, score) = zset.entry(id);
        out_str(out, member);
        out_str(out, &score.to_string());
        emitted += 1;
        node = zset.next(id);
    }
    debug_assert_eq!(emitted, count);
}
