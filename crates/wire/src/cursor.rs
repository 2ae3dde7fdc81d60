//! A minimal checked-read cursor over a byte slice, used by every frame
//! decoder so truncation is always reported as [`CodecError::Truncated`]
//! instead of panicking.

use crate::error::CodecError;
use byteorder::{ByteOrder, LittleEndian};

pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn require(&self, len: usize) -> Result<(), CodecError> {
        let have = self.buf.len().saturating_sub(self.pos);
        if have < len {
            return Err(CodecError::Truncated {
                need: self.pos + len,
                have: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        self.require(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn i16(&mut self) -> Result<i16, CodecError> {
        self.require(2)?;
        let v = LittleEndian::read_i16(&self.buf[self.pos..]);
        self.pos += 2;
        Ok(v)
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        self.require(2)?;
        let v = LittleEndian::read_u16(&self.buf[self.pos..]);
        self.pos += 2;
        Ok(v)
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        self.require(4)?;
        let v = LittleEndian::read_u32(&self.buf[self.pos..]);
        self.pos += 4;
        Ok(v)
    }

    pub fn u64(&mut self) -> Result<u64, CodecError> {
        self.require(8)?;
        let v = LittleEndian::read_u64(&self.buf[self.pos..]);
        self.pos += 8;
        Ok(v)
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.require(len)?;
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }
}
