// Length-prefixed list writer

use crate::error::{ProbeError, ProbeResult};
use bytes::{BufMut, BytesMut};

/// Byte list whose length header width follows its maximum size
/// (1 byte up to 0xFF, 2 up to 0xFFFF, 3 up to 0xFFFFFF, else 4)
#[derive(Debug, Clone)]
pub struct HList {
    max_len: usize,
    data: BytesMut,
}

impl HList {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            data: BytesMut::new(),
        }
    }

    fn check(&self, extra: usize) -> ProbeResult<()> {
        if self.data.len() + extra > self.max_len {
            return Err(ProbeError::Protocol("List size exceeded".to_string()));
        }
        Ok(())
    }

    pub fn put_u8(&mut self, v: u8) -> ProbeResult<()> {
        self.check(1)?;
        self.data.put_u8(v);
        Ok(())
    }

    pub fn put_u16(&mut self, v: u16) -> ProbeResult<()> {
        self.check(2)?;
        self.data.put_u16(v);
        Ok(())
    }

    pub fn put_u24(&mut self, v: u32) -> ProbeResult<()> {
        self.check(3)?;
        self.data.put_slice(&v.to_be_bytes()[1..]);
        Ok(())
    }

    pub fn put_u32(&mut self, v: u32) -> ProbeResult<()> {
        self.check(4)?;
        self.data.put_u32(v);
        Ok(())
    }

    pub fn put_slice(&mut self, buf: &[u8]) -> ProbeResult<()> {
        self.check(buf.len())?;
        self.data.put_slice(buf);
        Ok(())
    }

    /// Append a nested list, header included
    pub fn put_list(&mut self, list: &HList) -> ProbeResult<()> {
        self.put_slice(&list.to_vec())
    }

    /// Payload length, header excluded
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn header_len(&self) -> usize {
        match self.max_len {
            0..=0xFF => 1,
            0x100..=0xFFFF => 2,
            0x10000..=0xFFFFFF => 3,
            _ => 4,
        }
    }

    /// Encoded list: length header then payload
    pub fn to_vec(&self) -> Vec<u8> {
        let hlen = self.header_len();
        let len = self.data.len() as u32;
        let mut out = Vec::with_capacity(hlen + self.data.len());
        out.extend_from_slice(&len.to_be_bytes()[4 - hlen..]);
        out.extend_from_slice(&self.data);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_width_follows_max() {
        let mut l = HList::new(0xFF);
        l.put_u8(7).unwrap();
        assert_eq!(l.to_vec(), vec![1, 7]);

        let mut l = HList::new(0xFFFF);
        l.put_u16(0x0102).unwrap();
        assert_eq!(l.to_vec(), vec![0, 2, 1, 2]);

        let mut l = HList::new(0xFFFFFF);
        l.put_u24(0x0A0B0C).unwrap();
        assert_eq!(l.to_vec(), vec![0, 0, 3, 0x0A, 0x0B, 0x0C]);

        let l = HList::new(0x1000000);
        assert_eq!(l.to_vec(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let mut l = HList::new(3);
        l.put_u16(1).unwrap();
        assert!(l.put_u16(2).is_err());
        l.put_u8(3).unwrap();
        assert!(l.put_u8(4).is_err());
        assert_eq!(l.len(), 3);
    }

    #[test]
    fn test_nested_lists() {
        let mut inner = HList::new(0xFF);
        inner.put_slice(b"ab").unwrap();
        let mut outer = HList::new(0xFFFF);
        outer.put_list(&inner).unwrap();
        assert_eq!(outer.to_vec(), vec![0, 3, 2, b'a', b'b']);
    }
}
