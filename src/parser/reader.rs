extern crate byteorder;

use self::byteorder::{LittleEndian, ReadBytesExt};
use super::limits;
use super::DecodeError;
use std::io;

/// A sequential, peekable cursor over an in-memory module.
pub struct Reader {
    bytes: Vec<u8>,
    pos: usize,
    depth: usize,
}

impl Reader {
    pub fn new(bytes: Vec<u8>) -> Reader {
        Reader {
            bytes: bytes,
            pos: 0,
            depth: 0,
        }
    }
}

impl Reader {
    // Basic operations --------------------------------------------------------
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn has_more_bytes(&self) -> bool {
        self.pos < self.bytes.len()
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn skip_bytes(&mut self, len: usize) -> Result<(), DecodeError> {
        if len > self.remaining() {
            self.pos = self.bytes.len();
            return Err(DecodeError::UnexpectedEof);
        }
        self.pos += len;
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        self.next().ok_or(DecodeError::UnexpectedEof)
    }

    /// Read one byte that must be a member of `allowed`. Tag bytes and
    /// reserved zero bytes all go through here.
    pub fn expect_byte(&mut self, allowed: &[u8], context: &'static str) -> Result<u8, DecodeError> {
        let received = self.read_byte()?;
        if allowed.contains(&received) {
            Ok(received)
        } else {
            Err(DecodeError::UnexpectedByte {
                received,
                expected: allowed.to_vec(),
                context,
            })
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        let vec = self.bytes[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(vec)
    }

    // Read and interpret types ------------------------------------------------

    pub fn read_vu64(&mut self) -> Result<u64, DecodeError> {
        read_vu64(&mut || self.read_byte())
    }

    pub fn read_vu32(&mut self) -> Result<u32, DecodeError> {
        read_vu32(&mut || self.read_byte())
    }

    pub fn read_vs64(&mut self) -> Result<i64, DecodeError> {
        read_vs64(&mut || self.read_byte())
    }

    pub fn read_vs32(&mut self) -> Result<i32, DecodeError> {
        read_vs32(&mut || self.read_byte())
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        read_f32(&mut || self.read_byte())
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        read_f64(&mut || self.read_byte())
    }

    /// Read a length-prefixed UTF-8 name.
    pub fn read_name(&mut self) -> Result<String, DecodeError> {
        let bytes = self.read_u8vec()?;
        String::from_utf8(bytes).map_err(|e| DecodeError::InvalidUtf8(e.into_bytes()))
    }

    pub fn read_u8vec(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_vu32()?;
        self.read_bytes(len as usize)
    }

    /// Read a u32 count, then exactly that many `T`.
    pub fn read_vec<T, F>(&mut self, mut read_item: F) -> Result<Vec<T>, DecodeError>
    where
        F: FnMut(&mut Reader) -> Result<T, DecodeError>,
    {
        let count = self.read_vu32()? as usize;
        // every item takes at least one byte, don't trust the count beyond that
        let mut vec = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            vec.push(read_item(self)?);
        }
        Ok(vec)
    }

    // Nesting -----------------------------------------------------------------

    pub(crate) fn enter_block(&mut self) -> Result<(), DecodeError> {
        if self.depth >= limits::MAX_NESTING_DEPTH {
            return Err(DecodeError::LimitExceeded("block nesting depth"));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn exit_block(&mut self) {
        self.depth -= 1;
    }
}

impl Iterator for Reader {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos < self.bytes.len() {
            let byte = self.bytes[self.pos];
            self.pos += 1;
            Some(byte)
        } else {
            None
        }
    }
}

/// Unsigned LEB128. Bits past the 64th are dropped.
pub fn read_vu64<F>(reader: &mut F) -> Result<u64, DecodeError>
where
    F: FnMut() -> Result<u8, DecodeError>,
{
    let mut result: u64 = 0;
    let mut shift = 0;

    loop {
        let b = reader()?;
        if shift < 64 {
            result |= ((b & 0x7f) as u64) << shift;
        }
        shift += 7;
        if (b & 0x80) == 0 {
            break;
        }
    }

    Ok(result)
}

pub fn read_vu32<F>(reader: &mut F) -> Result<u32, DecodeError>
where
    F: FnMut() -> Result<u8, DecodeError>,
{
    read_vu64(reader).map(|v| v as u32)
}

/// Signed LEB128. After the last byte, if its sign bit (0x40) is set and
/// fewer than 64 bits were filled, the untouched high bits are set.
pub fn read_vs64<F>(reader: &mut F) -> Result<i64, DecodeError>
where
    F: FnMut() -> Result<u8, DecodeError>,
{
    let mut result: i64 = 0;
    let mut shift = 0;
    let mut b;

    loop {
        b = reader()?;
        if shift < 64 {
            result |= ((b & 0x7f) as i64) << shift;
        }
        shift += 7;
        if (b & 0x80) == 0 {
            break;
        }
    }

    if shift < 64 && (b & 0x40) != 0 {
        result |= !0i64 << shift;
    }

    Ok(result)
}

pub fn read_vs32<F>(reader: &mut F) -> Result<i32, DecodeError>
where
    F: FnMut() -> Result<u8, DecodeError>,
{
    read_vs64(reader).map(|v| v as i32)
}

pub fn read_f32<F>(reader: &mut F) -> Result<f32, DecodeError>
where
    F: FnMut() -> Result<u8, DecodeError>,
{
    let mut buf = [0u8; 4];
    for byte in buf.iter_mut() {
        *byte = reader()?;
    }
    let mut rdr = io::Cursor::new(buf);
    rdr.read_f32::<LittleEndian>()
        .map_err(|_| DecodeError::UnexpectedEof)
}

pub fn read_f64<F>(reader: &mut F) -> Result<f64, DecodeError>
where
    F: FnMut() -> Result<u8, DecodeError>,
{
    let mut buf = [0u8; 8];
    for byte in buf.iter_mut() {
        *byte = reader()?;
    }
    let mut rdr = io::Cursor::new(buf);
    rdr.read_f64::<LittleEndian>()
        .map_err(|_| DecodeError::UnexpectedEof)
}

#[test]
fn test_read_vu64() {
    let read = |v: Vec<u8>| {
        let mut reader = Reader::new(v);
        reader.read_vu64().expect("Failed to read vu64")
    };

    assert_eq!(read(vec![0]), 0);
    assert_eq!(read(vec![0x03]), 3);
    assert_eq!(read(vec![0x83, 0x00]), 3);
    assert_eq!(read(vec![0xE5, 0x8E, 0x26]), 624485);
    assert_eq!(read(vec![0x7f]), 127);
    assert_eq!(read(vec![0x80, 0x7f]), 16256);
    assert_eq!(read(vec![0xff, 0xff, 0xff, 0xff, 0xf]), 0xffffffff);
    assert_eq!(
        read(vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]),
        u64::MAX
    );
}

#[test]
fn test_read_vu32() {
    let read = |v: Vec<u8>| {
        let mut reader = Reader::new(v);
        reader.read_vu32().expect("Failed to read vu32")
    };

    assert_eq!(read(vec![0x03]), 3);
    assert_eq!(read(vec![0xE5, 0x8E, 0x26]), 624485);
    assert_eq!(read(vec![128, 128, 128, 128, 8]), 0x80000000);
    // narrowing keeps the low 32 bits
    assert_eq!(read(vec![0x80, 0x80, 0x80, 0x80, 0x10]), 0);
}

#[test]
fn test_read_vs64() {
    let read = |v: Vec<u8>| {
        let mut reader = Reader::new(v);
        reader.read_vs64().expect("Failed to read vs64")
    };

    assert_eq!(read(vec![0x03]), 3);
    assert_eq!(read(vec![0x83, 0x00]), 3);
    assert_eq!(read(vec![0xC0, 0xBB, 0x78]), -123456);
    assert_eq!(read(vec![0x7E]), -2);
    assert_eq!(read(vec![0xFE, 0x7F]), -2);
    assert_eq!(read(vec![0xFE, 0xFF, 0x7F]), -2);
    assert_eq!(read(vec![0x7f]), -1);
    assert_eq!(read(vec![0x80, 0x7f]), -128);
    assert_eq!(
        read(vec![128, 128, 128, 128, 128, 128, 128, 128, 128, 127]),
        i64::MIN
    );
}

#[test]
fn test_read_vs32() {
    let read = |v: Vec<u8>| {
        let mut reader = Reader::new(v);
        reader.read_vs32().expect("Failed to read vs32")
    };

    assert_eq!(read(vec![0xC0, 0xBB, 0x78]), -123456);
    assert_eq!(read(vec![0xFE, 0xFF, 0x7F]), -2);
    assert_eq!(read(vec![0xff, 0xff, 0xff, 0xff, 0x07]), i32::MAX);
    assert_eq!(read(vec![0x80, 0x80, 0x80, 0x80, 0x78]), i32::MIN);
}

#[test]
fn test_read_f32() {
    let read = |v: Vec<u8>| {
        let mut reader = Reader::new(v);
        reader.read_f32().expect("Failed to read f32")
    };

    assert_eq!(read(vec![0x33, 0x33, 0x63, 0x42]), 56.8);
    assert!(read(vec![0, 0, 192, 127]).is_nan());
    assert_eq!(read(vec![0, 0, 0, 0]), 0.0);
    assert!(read(vec![0, 0, 0, 128]).is_sign_negative());
    assert_eq!(read(vec![0, 0, 128, 127]), f32::INFINITY);
}

#[test]
fn test_read_f64() {
    let read = |v: Vec<u8>| {
        let mut reader = Reader::new(v);
        reader.read_f64().expect("Failed to read f64")
    };

    assert_eq!(read(vec![0, 0, 0, 0, 0, 0, 0xf0, 0x3f]), 1.0);
    assert_eq!(read(vec![0x18, 0x2d, 0x44, 0x54, 0xfb, 0x21, 0x09, 0x40]), std::f64::consts::PI);
    assert!(read(vec![0, 0, 0, 0, 0, 0, 0xf8, 0x7f]).is_nan());
}

#[test]
fn test_short_reads() {
    assert!(matches!(
        Reader::new(vec![0x80, 0x80]).read_vu32(),
        Err(DecodeError::UnexpectedEof)
    ));
    assert!(matches!(
        Reader::new(vec![0x00, 0x00]).read_f32(),
        Err(DecodeError::UnexpectedEof)
    ));
    assert!(matches!(
        Reader::new(vec![0x05, b'a']).read_name(),
        Err(DecodeError::UnexpectedEof)
    ));
    let mut reader = Reader::new(vec![1, 2, 3]);
    assert!(matches!(reader.skip_bytes(4), Err(DecodeError::UnexpectedEof)));
}

#[test]
fn test_read_name() {
    let mut reader = Reader::new(vec![0x03, b'a', b'd', b'd', 0x02, 0xc3, 0x28]);
    assert_eq!(reader.read_name().expect("Failed to read name"), "add");
    match reader.read_name() {
        Err(DecodeError::InvalidUtf8(bytes)) => assert_eq!(bytes, vec![0xc3, 0x28]),
        other => panic!("expected invalid utf-8, got {:?}", other),
    }
}

#[test]
fn test_expect_byte() {
    let mut reader = Reader::new(vec![0x60, 0x02]);
    assert_eq!(reader.expect_byte(&[0x60], "function type").unwrap(), 0x60);
    match reader.expect_byte(&[0x00, 0x01], "limits") {
        Err(DecodeError::UnexpectedByte {
            received,
            expected,
            context,
        }) => {
            assert_eq!(received, 0x02);
            assert_eq!(expected, vec![0x00, 0x01]);
            assert_eq!(context, "limits");
        }
        other => panic!("expected unexpected byte, got {:?}", other),
    }
}

#[test]
fn test_peek_and_skip() {
    let mut reader = Reader::new(vec![1, 2, 3, 4]);
    assert_eq!(reader.peek_byte(), Some(1));
    assert_eq!(reader.pos(), 0);
    reader.skip_bytes(2).unwrap();
    assert_eq!(reader.peek_byte(), Some(3));
    assert_eq!(reader.read_vec(|r| r.read_byte()).unwrap_err().to_string(), "unexpected end of input");
}
