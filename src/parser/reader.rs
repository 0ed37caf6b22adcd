//! Byte reader for WebAssembly function bodies
//!
//! Function bodies reach the compiler as raw code bytes. This reader walks
//! them, decoding LEB128 immediates and little-endian float constants. Every
//! read past the end of the body surfaces as an `UnexpectedEof` I/O error so
//! the compiler can attribute it to the instruction being decoded.

use byteorder::{ByteOrder, LittleEndian};
use std::io;

pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader { bytes, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_byte(&mut self) -> Result<u8, io::Error> {
        match self.next() {
            Some(byte) => Ok(byte),
            None => Err(eof()),
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], io::Error> {
        if len > self.remaining() {
            return Err(eof());
        }
        let bytes = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_vu32(&mut self) -> Result<u32, io::Error> {
        read_vu32(&mut || self.read_byte())
    }

    pub fn read_vs32(&mut self) -> Result<i32, io::Error> {
        read_vs32(&mut || self.read_byte())
    }

    pub fn read_vs64(&mut self) -> Result<i64, io::Error> {
        read_vs64(&mut || self.read_byte())
    }

    // le
    pub fn read_f32(&mut self) -> Result<f32, io::Error> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    // le
    pub fn read_f64(&mut self) -> Result<f64, io::Error> {
        Ok(LittleEndian::read_f64(self.read_bytes(8)?))
    }
}

impl Iterator for Reader<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        let byte = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }
}

fn eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "EOF")
}

fn overflow() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "integer representation too long")
}

fn read_vu<F>(reader: &mut F, size: u32) -> Result<u64, io::Error>
where
    F: FnMut() -> Result<u8, io::Error>,
{
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        let b = reader()?;
        if shift >= size {
            return Err(overflow());
        }
        let payload = (b & 0x7f) as u64;
        // the last permitted byte may only carry the bits that fit
        if size - shift < 7 && payload >> (size - shift) != 0 {
            return Err(overflow());
        }
        result |= payload << shift;
        shift += 7;
        if b & 0x80 == 0 {
            return Ok(result);
        }
    }
}

fn read_vs<F>(reader: &mut F, size: u32) -> Result<i64, io::Error>
where
    F: FnMut() -> Result<u8, io::Error>,
{
    let mut result: i64 = 0;
    let mut shift = 0u32;
    loop {
        let b = reader()?;
        if shift >= size {
            return Err(overflow());
        }
        result |= ((b & 0x7f) as i64) << shift;
        shift += 7;
        if b & 0x80 == 0 {
            if shift < 64 && (b & 0x40) != 0 {
                result |= -1i64 << shift;
            }
            return Ok(result);
        }
    }
}

pub fn read_vu32<F>(reader: &mut F) -> Result<u32, io::Error>
where
    F: FnMut() -> Result<u8, io::Error>,
{
    read_vu(reader, 32).map(|v| v as u32)
}

pub fn read_vs32<F>(reader: &mut F) -> Result<i32, io::Error>
where
    F: FnMut() -> Result<u8, io::Error>,
{
    read_vs(reader, 32).map(|v| v as i32)
}

pub fn read_vs64<F>(reader: &mut F) -> Result<i64, io::Error>
where
    F: FnMut() -> Result<u8, io::Error>,
{
    read_vs(reader, 64)
}

pub fn emit_vu32(v: u32) -> Vec<u8> {
    let mut result = vec![];
    let mut value = v;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            result.push(byte);
            return result;
        }
        result.push(byte | 0x80);
    }
}

pub fn emit_vs64(v: i64) -> Vec<u8> {
    let mut result = vec![];
    let mut value = v;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if (value == 0 && (byte & 0x40) == 0) || (value == -1 && (byte & 0x40) != 0) {
            result.push(byte);
            return result;
        }
        result.push(byte | 0x80);
    }
}

pub fn emit_vs32(v: i32) -> Vec<u8> {
    emit_vs64(v as i64)
}
