use anyhow::{anyhow, Result};
use std::time::{SystemTime, UNIX_EPOCH};

pub const WIRE_VARINT: u8 = 0;
pub const WIRE_LEN: u8 = 2;

pub fn put_uvarint(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push((v as u8) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

pub fn put_tag(buf: &mut Vec<u8>, field: u8, wire: u8) {
    put_uvarint(buf, ((field as u64) << 3) | wire as u64);
}

/// Signed values travel as their two's-complement u64 image, so a negative
/// i32 decodes back through i64 truncation.
pub fn put_int_field(buf: &mut Vec<u8>, field: u8, v: i64) {
    put_tag(buf, field, WIRE_VARINT);
    put_uvarint(buf, v as u64);
}

pub fn put_bool_field(buf: &mut Vec<u8>, field: u8, v: bool) {
    put_tag(buf, field, WIRE_VARINT);
    put_uvarint(buf, v as u64);
}

pub fn put_bytes_field(buf: &mut Vec<u8>, field: u8, bytes: &[u8]) {
    put_tag(buf, field, WIRE_LEN);
    put_uvarint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Sequential reader over an encoded record. Unknown fields are skippable so
/// old binaries can read records written with appended fields.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn done(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn read_uvarint(&mut self) -> Result<u64> {
        let mut v: u64 = 0;
        let mut shift = 0u32;
        loop {
            let b = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| anyhow!("truncated varint at offset {}", self.pos))?;
            self.pos += 1;
            if shift >= 64 {
                return Err(anyhow!("varint overflows 64 bits"));
            }
            v |= ((b & 0x7f) as u64) << shift;
            if b & 0x80 == 0 {
                return Ok(v);
            }
            shift += 7;
        }
    }

    pub fn read_tag(&mut self) -> Result<(u8, u8)> {
        let raw = self.read_uvarint()?;
        let field = (raw >> 3) as u8;
        let wire = (raw & 0x7) as u8;
        Ok((field, wire))
    }

    pub fn read_int(&mut self) -> Result<i64> {
        Ok(self.read_uvarint()? as i64)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_uvarint()? != 0)
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_uvarint()? as usize;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&e| e <= self.buf.len())
            .ok_or_else(|| anyhow!("length-delimited field overruns buffer"))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        Ok(std::str::from_utf8(bytes)
            .map_err(|_| anyhow!("invalid UTF-8 in string field"))?
            .to_string())
    }

    pub fn skip(&mut self, wire: u8) -> Result<()> {
        match wire {
            WIRE_VARINT => {
                self.read_uvarint()?;
            }
            WIRE_LEN => {
                self.read_bytes()?;
            }
            other => return Err(anyhow!("unsupported wire type {}", other)),
        }
        Ok(())
    }
}

pub fn systemtime_to_unix_secs(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
