// Handshake message cursor with nested length-prefixed structures

use super::record::RecordLayer;
use crate::error::ProbeResult;
use crate::probe_bail;
use tokio::io::{AsyncRead, AsyncWrite};

/// One handshake message, read whole from the record layer. Reads are
/// bounded by the innermost open structure; `open`/`close` maintain the
/// structure stack and closing the outermost level finishes the message.
#[derive(Debug)]
pub struct HandshakeMessage {
    msg_type: u8,
    data: Vec<u8>,
    pos: usize,
    rem_len: usize,
    lengths: Vec<usize>,
    finished: bool,
}

impl HandshakeMessage {
    /// Read the 4-byte header and the message body
    pub async fn read<S>(rec: &mut RecordLayer<S>) -> ProbeResult<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut header = [0u8; 4];
        rec.read_exact(&mut header).await?;
        let len = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;
        let mut data = vec![0u8; len];
        rec.read_exact(&mut data).await?;
        Ok(Self::new(header[0], data))
    }

    pub fn new(msg_type: u8, data: Vec<u8>) -> Self {
        let rem_len = data.len();
        Self {
            msg_type,
            data,
            pos: 0,
            rem_len,
            lengths: Vec::new(),
            finished: false,
        }
    }

    pub fn msg_type(&self) -> u8 {
        self.msg_type
    }

    /// Bytes left in the innermost open structure
    pub fn remaining(&self) -> usize {
        self.rem_len
    }

    pub fn end_of_struct(&self) -> bool {
        self.rem_len == 0
    }

    fn check_open(&self) -> ProbeResult<()> {
        if self.finished {
            probe_bail!("Message is finished");
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> ProbeResult<&[u8]> {
        self.check_open()?;
        if len > self.rem_len {
            probe_bail!("Read beyond structure end");
        }
        let start = self.pos;
        self.pos += len;
        self.rem_len -= len;
        Ok(&self.data[start..start + len])
    }

    fn read_n(&mut self, n: usize) -> ProbeResult<usize> {
        Ok(self.take(n)?.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize))
    }

    pub fn read1(&mut self) -> ProbeResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read2(&mut self) -> ProbeResult<u16> {
        Ok(self.read_n(2)? as u16)
    }

    pub fn read3(&mut self) -> ProbeResult<u32> {
        Ok(self.read_n(3)? as u32)
    }

    pub fn read4(&mut self) -> ProbeResult<u32> {
        Ok(self.read_n(4)? as u32)
    }

    pub fn read_blob_fixed(&mut self, len: usize) -> ProbeResult<Vec<u8>> {
        Ok(self.take(len)?.to_vec())
    }

    /// Blob preceded by a `len_of_len`-byte length header
    pub fn read_blob_var(&mut self, len_of_len: usize) -> ProbeResult<Vec<u8>> {
        let len = self.read_n(len_of_len)?;
        self.read_blob_fixed(len)
    }

    /// Open a sub-structure whose length is in a `len_of_len`-byte header
    pub fn open_var(&mut self, len_of_len: usize) -> ProbeResult<()> {
        let len = self.read_n(len_of_len)?;
        self.open(len)
    }

    pub fn open(&mut self, len: usize) -> ProbeResult<()> {
        self.check_open()?;
        if len > self.rem_len {
            probe_bail!("Read beyond structure end");
        }
        self.lengths.push(self.rem_len - len);
        self.rem_len = len;
        Ok(())
    }

    /// Close the innermost structure; unread bytes are an error unless
    /// `skip` is set
    pub fn close(&mut self, skip: bool) -> ProbeResult<()> {
        self.check_open()?;
        if self.rem_len > 0 {
            if !skip {
                probe_bail!("Unread data in structure");
            }
            self.pos += self.rem_len;
        }
        match self.lengths.pop() {
            Some(len) => self.rem_len = len,
            None => {
                self.rem_len = 0;
                self.finished = true;
            }
        }
        Ok(())
    }

    /// Discard the rest of the current structure without closing it
    pub fn skip_remainder(&mut self) -> ProbeResult<()> {
        self.check_open()?;
        self.pos += self.rem_len;
        self.rem_len = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{HANDSHAKE, SERVER_HELLO_DONE};
    use super::*;
    use tokio::io::{AsyncWriteExt, duplex};

    #[test]
    fn test_nested_structures() {
        // u16, then var1 blob, then a var2 structure holding one u8
        let mut hm = HandshakeMessage::new(2, vec![0x12, 0x34, 2, 0xAA, 0xBB, 0, 1, 9]);
        assert_eq!(hm.read2().unwrap(), 0x1234);
        assert_eq!(hm.read_blob_var(1).unwrap(), vec![0xAA, 0xBB]);
        hm.open_var(2).unwrap();
        assert_eq!(hm.remaining(), 1);
        assert_eq!(hm.read1().unwrap(), 9);
        assert!(hm.end_of_struct());
        hm.close(false).unwrap();
        assert!(hm.end_of_struct());
        hm.close(false).unwrap();
        let err = hm.read1().unwrap_err();
        assert!(err.to_string().contains("Message is finished"));
    }

    #[test]
    fn test_bounds_are_enforced() {
        let mut hm = HandshakeMessage::new(2, vec![0, 1, 5, 6]);
        hm.open_var(2).unwrap();
        assert!(hm.read2().unwrap_err().to_string().contains("Read beyond structure end"));
        hm.close(true).unwrap();
        assert!(hm.close(false).unwrap_err().to_string().contains("Unread data"));

        let mut hm = HandshakeMessage::new(2, vec![0, 9, 1]);
        assert!(hm.open_var(2).is_err());
    }

    #[test]
    fn test_skip_remainder_keeps_structure_open() {
        let mut hm = HandshakeMessage::new(12, vec![0, 3, 1, 2, 3, 7]);
        hm.open_var(2).unwrap();
        hm.skip_remainder().unwrap();
        hm.close(false).unwrap();
        assert_eq!(hm.read1().unwrap(), 7);
        hm.close(false).unwrap();
    }

    #[tokio::test]
    async fn test_read_from_records() {
        let (client, mut server) = duplex(1024);
        server.write_all(&[22, 3, 3, 0, 4, SERVER_HELLO_DONE, 0, 0, 0]).await.unwrap();
        let mut rec = RecordLayer::new(client, None);
        rec.set_expected_type(HANDSHAKE);
        let mut hm = HandshakeMessage::read(&mut rec).await.unwrap();
        assert_eq!(hm.msg_type(), SERVER_HELLO_DONE);
        hm.close(false).unwrap();
    }
}
