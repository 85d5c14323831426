use std::ops::Deref;

/// Append-only byte queue with O(1) consumption from the front.
///
/// Valid bytes live in `data[start..end]`. Consuming advances `start`;
/// appending either writes past `end`, compacts the live bytes back to the
/// front, or grows the backing storage.
pub struct Buffer {
    data: Vec<u8>,
    start: usize,
    end: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            start: 0,
            end: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            start: 0,
            end: 0,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn append(&mut self, bytes: &[u8]) {
        if self.end + bytes.len() > self.data.len() {
            self.make_room(bytes.len());
        }
        self.data[self.end..self.end + bytes.len()].copy_from_slice(bytes);
        self.end += bytes.len();
    }

    /// Remove `n` bytes from the front.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.len(), "cannot consume more bytes than buffered");
        self.start += n;
        // Empty buffer: rewind so appended data starts at offset zero again.
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    /// The first `n` bytes, without consuming them.
    pub fn peek(&self, n: usize) -> Option<&[u8]> {
        if n <= self.len() {
            Some(&self.data[self.start..self.start + n])
        } else {
            None
        }
    }

    fn make_room(&mut self, needed: usize) {
        let len = self.len();
        if self.start > 0 && len + needed <= self.data.len() {
            // Shifting the live bytes to the front frees enough space.
            self.data.copy_within(self.start..self.end, 0);
        } else {
            let new_size = (self.data.len() * 2).max(len + needed).max(64);
            let mut grown = vec![0; new_size];
            grown[..len].copy_from_slice(&self.data[self.start..self.end]);
            self.data = grown;
        }
        self.start = 0;
        self.end = len;
    }

    pub fn append_u8(&mut self, value: u8) {
        self.append(&[value]);
    }

    pub fn append_u32(&mut self, value: u32) {
        self.append(&value.to_le_bytes());
    }

    pub fn append_i64(&mut self, value: i64) {
        self.append(&value.to_le_bytes());
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_consume() {
        let mut buf = Buffer::new();
        buf.append(b"hello");
        buf.append(b" world");
        assert_eq!(buf.data(), b"hello world");
        assert_eq!(buf.len(), 11);

        buf.consume(6);
        assert_eq!(buf.data(), b"world");

        buf.consume(5);
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn consume_resets_offsets_when_drained() {
        let mut buf = Buffer::new();
        buf.append(b"abcd");
        buf.consume(4);
        buf.append(b"xy");
        assert_eq!(buf.data(), b"xy");
    }

    #[test]
    fn peek_does_not_consume() {
        let mut buf = Buffer::new();
        buf.append(&7u32.to_le_bytes());
        assert_eq!(buf.peek(4), Some(&7u32.to_le_bytes()[..]));
        assert_eq!(buf.peek(5), None);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn make_room_compacts_before_growing() {
        let mut buf = Buffer::with_capacity(8);
        buf.append(b"abcdef");
        buf.consume(4);
        // Two live bytes at offset 4; six more fit only after compaction.
        buf.append(b"123456");
        assert_eq!(buf.data(), b"ef123456");
    }

    #[test]
    fn little_endian_primitives() {
        let mut buf = Buffer::new();
        buf.append_u8(0xab);
        buf.append_u32(0x01020304);
        buf.append_i64(-2);
        assert_eq!(buf.data()[0], 0xab);
        assert_eq!(&buf.data()[1..5], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&buf.data()[5..13], &(-2i64).to_le_bytes());
    }

    #[test]
    #[should_panic(expected = "cannot consume")]
    fn over_consume_panics() {
        let mut buf = Buffer::new();
        buf.append(b"ab");
        buf.consume(3);
    }
}
